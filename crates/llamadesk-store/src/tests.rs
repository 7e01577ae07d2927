//! Snapshot tests for store listings

#[cfg(test)]
mod snapshot_tests {
    use crate::{ChatMessage, ConversationStore, ExperimentConfig, ExperimentStore};
    use insta::assert_yaml_snapshot;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_conversation_listing_snapshot() {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        let records = [
            ("rust_20240301_090000", "2024-03-01 09:00:00", "mistral", "Rust lifetimes"),
            ("tea_20240305_170000", "2024-03-05 17:00:00", "llama3", ""),
        ];
        for (key, created_at, model, title) in records {
            let record = serde_json::json!({
                "version_key": key,
                "title": title,
                "messages": [ChatMessage::user("How do I brew green tea properly at home?")],
                "model_id": model,
                "created_at": created_at,
            });
            fs::write(dir.path().join(format!("{}.json", key)), record.to_string()).unwrap();
        }

        assert_yaml_snapshot!(store.list_all(), @r###"
        - version_key: tea_20240305_170000
          label: "2024-03-05 - llama3: How do I brew green tea properly at home..."
        - version_key: rust_20240301_090000
          label: "2024-03-01 - mistral: Rust lifetimes"
        "###);
    }

    #[test]
    fn test_experiment_listing_snapshot() {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();

        let config = ExperimentConfig {
            llm_model: "mistral".to_string(),
            embedding_model: "nomic-embed".to_string(),
            chunk_size: 200,
            top_k: 3,
            total_documents: 1,
            ..Default::default()
        };
        assert!(store.save("Contracts", &vec!["chunk"], &config));

        let configs: Vec<ExperimentConfig> =
            store.list_all().into_iter().map(|(_, config)| config).collect();

        assert_yaml_snapshot!(configs, @r###"
        - experiment_name: Contracts
          llm_model: mistral
          embedding_model: nomic-embed
          chunk_size: 200
          top_k: 3
          total_documents: 1
        "###);
    }
}
