//! RAG experiment persistence
//!
//! An experiment is two blobs under one sanitized name:
//! `{name}_retriever.json` (retriever state, opaque to this store) and
//! `{name}_config.json` (an [`ExperimentConfig`]). It exists only while both
//! are present.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

use llamadesk_core::{ExperimentConfig, Result};

use crate::fs_util::{read_json, write_json_atomic};

pub const RETRIEVER_SUFFIX: &str = "_retriever.json";
pub const CONFIG_SUFFIX: &str = "_config.json";

/// Keep alphanumerics, space, hyphen and underscore; strip trailing whitespace
pub fn sanitize_experiment_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    safe.trim_end().to_string()
}

/// Manages RAG experiment persistence
#[derive(Debug, Clone)]
pub struct ExperimentStore {
    base_dir: PathBuf,
}

impl ExperimentStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `(retriever_path, config_path)` for an experiment name
    pub fn paths(&self, experiment_name: &str) -> (PathBuf, PathBuf) {
        let safe_name = sanitize_experiment_name(experiment_name);
        (
            self.base_dir.join(format!("{}{}", safe_name, RETRIEVER_SUFFIX)),
            self.base_dir.join(format!("{}{}", safe_name, CONFIG_SUFFIX)),
        )
    }

    /// Raw name of a *different* stored experiment that sanitizes to the same
    /// file names as `experiment_name`, if any. Trailing whitespace never
    /// distinguishes two names.
    pub fn find_collision(&self, experiment_name: &str) -> Option<String> {
        let (_, config_path) = self.paths(experiment_name);
        let stored: ExperimentConfig = read_json(&config_path).ok()?;
        let stored_name = stored.experiment_name.trim_end();
        (!stored_name.is_empty() && stored_name != experiment_name.trim_end())
            .then_some(stored.experiment_name)
    }

    /// Save an experiment with its configuration.
    ///
    /// Saving under an existing name overwrites both blobs. A name that only
    /// collides with another experiment after sanitization is refused.
    pub fn save<R: Serialize + ?Sized>(
        &self,
        experiment_name: &str,
        retriever: &R,
        config: &ExperimentConfig,
    ) -> bool {
        if sanitize_experiment_name(experiment_name).is_empty() {
            error!(experiment = %experiment_name, "experiment name has no usable characters");
            return false;
        }
        if let Some(existing) = self.find_collision(experiment_name) {
            warn!(
                experiment = %experiment_name,
                existing = %existing,
                "experiment name collides with an existing experiment"
            );
            return false;
        }

        let (retriever_path, config_path) = self.paths(experiment_name);
        let config = ExperimentConfig {
            experiment_name: experiment_name.to_string(),
            ..config.clone()
        };

        let written = write_json_atomic(&retriever_path, retriever)
            .and_then(|_| write_json_atomic(&config_path, &config));

        match written {
            Ok(()) => true,
            Err(e) => {
                error!(experiment = %experiment_name, error = %e, "error saving experiment");
                false
            }
        }
    }

    /// Load a saved experiment; if either blob is unreadable, neither is returned
    pub fn load<R: DeserializeOwned>(&self, experiment_name: &str) -> Option<(R, ExperimentConfig)> {
        let (retriever_path, config_path) = self.paths(experiment_name);

        let loaded = read_json::<R>(&retriever_path)
            .and_then(|retriever| Ok((retriever, read_json::<ExperimentConfig>(&config_path)?)));

        match loaded {
            Ok(pair) => Some(pair),
            Err(e) => {
                error!(experiment = %experiment_name, error = %e, "error loading experiment");
                None
            }
        }
    }

    /// Delete both blobs; absent files are not an error
    pub fn delete(&self, experiment_name: &str) -> bool {
        let (retriever_path, config_path) = self.paths(experiment_name);

        let mut ok = true;
        for path in [retriever_path, config_path] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    error!(file = %path.display(), error = %e, "error deleting experiment");
                    ok = false;
                }
            }
        }
        ok
    }

    /// List all experiments with their configurations, sorted by name.
    ///
    /// Enumeration is driven by config blobs only; retriever blobs are not read.
    pub fn list_all(&self) -> Vec<(String, ExperimentConfig)> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    error!(dir = %self.base_dir.display(), error = %e, "error listing experiments");
                }
                return Vec::new();
            }
        };

        let mut experiments: Vec<(String, ExperimentConfig)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name().to_str()?.to_string();
                let name = file_name.strip_suffix(CONFIG_SUFFIX)?.to_string();
                match read_json::<ExperimentConfig>(&entry.path()) {
                    Ok(config) => Some((name, config)),
                    Err(e) => {
                        error!(experiment = %name, error = %e, "error loading experiment config");
                        None
                    }
                }
            })
            .collect();

        experiments.sort_by(|a, b| a.0.cmp(&b.0));
        experiments
    }

    /// True iff both blobs are present on disk
    pub fn exists(&self, experiment_name: &str) -> bool {
        let (retriever_path, config_path) = self.paths(experiment_name);
        retriever_path.exists() && config_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct FakeRetriever {
        chunks: Vec<String>,
    }

    fn retriever() -> FakeRetriever {
        FakeRetriever {
            chunks: vec!["alpha".to_string(), "beta".to_string()],
        }
    }

    fn config() -> ExperimentConfig {
        ExperimentConfig {
            llm_model: "llama3".to_string(),
            embedding_model: "local-hash".to_string(),
            chunk_size: 300,
            top_k: 4,
            total_documents: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_experiment_name("My/Experiment: Test"), "MyExperiment Test");
        assert_eq!(sanitize_experiment_name("keep-this_one  "), "keep-this_one");
        assert_eq!(sanitize_experiment_name("../.."), "");
    }

    #[test]
    fn test_save_uses_sanitized_file_names() {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();

        assert!(store.save("My/Experiment: Test", &retriever(), &config()));

        assert!(dir.path().join("MyExperiment Test_retriever.json").exists());
        assert!(dir.path().join("MyExperiment Test_config.json").exists());
        assert!(store.exists("My/Experiment: Test"));
    }

    #[test]
    fn test_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();
        assert!(store.save("papers", &retriever(), &config()));

        let (loaded, loaded_config): (FakeRetriever, ExperimentConfig) =
            store.load("papers").unwrap();

        assert_eq!(loaded, retriever());
        assert_eq!(loaded_config.experiment_name, "papers");
        assert_eq!(loaded_config.top_k, 4);
    }

    #[test]
    fn test_exists_requires_both_blobs() {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();
        assert!(store.save("pair", &retriever(), &config()));

        let (retriever_path, _) = store.paths("pair");
        fs::remove_file(retriever_path).unwrap();

        assert!(!store.exists("pair"));
        assert!(store.load::<FakeRetriever>("pair").is_none());

        assert!(store.save("other", &retriever(), &config()));
        let (_, config_path) = store.paths("other");
        fs::remove_file(config_path).unwrap();

        assert!(!store.exists("other"));
        assert!(store.load::<FakeRetriever>("other").is_none());
    }

    #[test]
    fn test_trailing_whitespace_is_not_a_collision() {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();
        assert!(store.save("papers", &retriever(), &config()));

        assert_eq!(store.find_collision("papers "), None);
        assert!(store.save("papers ", &retriever(), &config()));
        assert!(store.save("papers", &retriever(), &config()));
        assert_eq!(store.list_all().len(), 1);

        assert_eq!(store.find_collision("papers?"), Some("papers".to_string()));
        assert!(!store.save("papers?", &retriever(), &config()));
    }

    #[test]
    fn test_load_fails_closed_on_corrupt_config() {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();
        assert!(store.save("pair", &retriever(), &config()));

        let (_, config_path) = store.paths("pair");
        fs::write(config_path, b"not json").unwrap();

        assert!(store.load::<FakeRetriever>("pair").is_none());
    }

    #[test]
    fn test_save_overwrites_same_name() {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();
        assert!(store.save("papers", &retriever(), &config()));

        let updated = ExperimentConfig {
            top_k: 8,
            ..config()
        };
        assert!(store.save("papers", &retriever(), &updated));

        let listed = store.list_all();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].1.top_k, 8);
    }

    #[test]
    fn test_sanitized_collision_is_refused() {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();
        assert!(store.save("a/b", &retriever(), &config()));

        assert_eq!(store.find_collision("ab"), Some("a/b".to_string()));
        assert!(!store.save("ab", &retriever(), &config()));
        assert_eq!(store.load::<FakeRetriever>("ab").unwrap().1.experiment_name, "a/b");
    }

    #[test]
    fn test_empty_sanitized_name_is_refused() {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();
        assert!(!store.save("///", &retriever(), &config()));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_delete_tolerates_missing_files() {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();
        assert!(store.delete("never-saved"));

        assert!(store.save("papers", &retriever(), &config()));
        assert!(store.delete("papers"));
        assert!(!store.exists("papers"));
        assert!(store.list_all().is_empty());
    }

    #[test]
    fn test_list_skips_corrupt_configs_and_ignores_retrievers() {
        let dir = tempdir().unwrap();
        let store = ExperimentStore::new(dir.path()).unwrap();
        assert!(store.save("good", &retriever(), &config()));
        fs::write(dir.path().join("bad_config.json"), b"{").unwrap();
        fs::write(dir.path().join("orphan_retriever.json"), b"{").unwrap();

        let listed = store.list_all();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "good");
        assert_eq!(listed[0].1.embedding_model, "local-hash");
    }
}
