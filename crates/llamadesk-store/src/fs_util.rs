//! File helpers shared by the stores

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use llamadesk_core::{Error, Result};

/// Serialize `value` to `path` through a sibling temp file, so readers never
/// observe a half-written blob.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::InvalidInput(format!("No parent directory for {}", path.display())))?;
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| Error::StorageIo(e.error))?;
    Ok(())
}

/// Read and parse a JSON blob; parse failures are `StorageCorrupt`
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read(path)?;
    serde_json::from_slice(&content)
        .map_err(|e| Error::StorageCorrupt(format!("{}: {}", path.display(), e)))
}

/// A key is usable as a file name only if it cannot escape the store directory
pub(crate) fn is_plain_file_name(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains('/')
        && !key.contains('\\')
        && !key.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("value.json");
        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = read_json(&path).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_corrupt_blob_is_storage_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, b"{\"messages\": [").unwrap();
        let err = read_json::<serde_json::Value>(&path).unwrap_err();
        assert!(matches!(err, Error::StorageCorrupt(_)));
    }

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("chat_20240101_100000"));
        assert!(!is_plain_file_name("../etc/passwd"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
    }
}
