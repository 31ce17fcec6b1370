//! FileDestinationStore - 転送先を JSON ファイル 1 つに保存する
//!
//! `{"destination_folder": "<name>"}` だけを持つ。バージョンも移行もない。

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::RemoteFolderReference;
use crate::ports::{DESTINATION_KEY, DestinationError, DestinationStore};

pub struct FileDestinationStore {
    path: PathBuf,
}

impl FileDestinationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>, DestinationError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Write through a sibling temp file so a crash never leaves half a file.
    fn write(&self, values: &BTreeMap<String, String>) -> Result<(), DestinationError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DestinationStore for FileDestinationStore {
    fn load(&self) -> Result<Option<RemoteFolderReference>, DestinationError> {
        let values = self.read()?;
        Ok(values
            .get(DESTINATION_KEY)
            .and_then(|v| RemoteFolderReference::parse(v.as_str())))
    }

    fn save(&self, destination: &RemoteFolderReference) -> Result<(), DestinationError> {
        let mut values = self.read()?;
        values.insert(DESTINATION_KEY.to_string(), destination.as_str().to_string());
        self.write(&values)?;
        debug!(path = %self.path.display(), destination = %destination, "destination saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), DestinationError> {
        let mut values = self.read()?;
        if values.remove(DESTINATION_KEY).is_some() {
            self.write(&values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_clear() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileDestinationStore::new(tmp.path().join("state").join("state.json"));
        assert_eq!(store.load().unwrap(), None);

        let dest = RemoteFolderReference::parse("recsync").unwrap();
        store.save(&dest).unwrap();
        assert_eq!(store.load().unwrap(), Some(dest));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["destination_folder"], "recsync");

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{oops").unwrap();

        let result = FileDestinationStore::new(path).load();
        assert!(matches!(result, Err(DestinationError::Corrupt(_))));
    }

    #[test]
    fn blank_value_counts_as_unset() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, r#"{"destination_folder": "  "}"#).unwrap();

        assert_eq!(FileDestinationStore::new(path).load().unwrap(), None);
    }
}
