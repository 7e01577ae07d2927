//! Snapshot tests for retrieval records

#[cfg(test)]
mod snapshot_tests {
    use crate::{ChunkingConfig, ParentChunk};
    use insta::assert_yaml_snapshot;

    #[test]
    fn test_default_chunking_snapshot() {
        assert_yaml_snapshot!(ChunkingConfig::from_child(300).unwrap(), @r###"
        child_chunk_size: 300
        child_overlap: 30
        parent_chunk_size: 1500
        parent_overlap: 150
        "###);
    }

    #[test]
    fn test_parent_chunk_snapshot() {
        let parent = ParentChunk {
            id: "p-1".to_string(),
            source: "tea.txt".to_string(),
            content: "Green tea steeps for two minutes".to_string(),
        };

        assert_yaml_snapshot!(parent, @r###"
        id: p-1
        source: tea.txt
        content: Green tea steeps for two minutes
        "###);
    }
}
