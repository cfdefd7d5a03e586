//! Profile document persistence.
//!
//! One JSON document per (account, segment), laid out as
//! `<root>/<accountId>/<profileId>.json`. Documents are human-readable and
//! hand-seedable; writes go through a temp file and rename so a crash never
//! leaves a half-written document behind.

use crate::error::{ProfileError, Result};
use crate::types::{ProfileDocument, ProfileType};
use serde_json::Value;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Disk boundary for profile documents.
pub struct ProfileStorage {
    /// Base directory, one subdirectory per account.
    root: PathBuf,
}

impl ProfileStorage {
    /// Open storage rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load one segment document. Missing documents are `None`, not an
    /// error; unreadable ones surface as `Corruption` so the caller does
    /// not silently wipe an account.
    pub fn load(
        &self,
        account_id: &str,
        profile_type: ProfileType,
    ) -> Result<Option<ProfileDocument>> {
        let path = self.document_path(account_id, profile_type);
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read(&path)?;
        let value: Value = serde_json::from_slice(&raw)
            .map_err(|e| ProfileError::Corruption(format!("{}: {}", path.display(), e)))?;
        let value = unwrap_legacy_document(value);

        let doc: ProfileDocument = serde_json::from_value(value)
            .map_err(|e| ProfileError::Corruption(format!("{}: {}", path.display(), e)))?;

        debug!(account = account_id, profile = %profile_type, rvn = %doc.rvn, "loaded profile document");
        Ok(Some(doc))
    }

    /// Write one segment document atomically (temp file + rename).
    pub fn store(&self, doc: &ProfileDocument) -> Result<()> {
        let dir = self.root.join(&doc.account_id);
        fs::create_dir_all(&dir)?;

        let path = self.document_path(&doc.account_id, doc.profile_id);
        let tmp_path = path.with_extension("json.tmp");

        let file = File::create(&tmp_path)?;
        serde_json::to_writer_pretty(&file, doc)
            .map_err(|e| ProfileError::Serialization(e.to_string()))?;
        file.sync_all()?;
        fs::rename(&tmp_path, &path)?;

        debug!(account = %doc.account_id, profile = %doc.profile_id, rvn = %doc.rvn, "stored profile document");
        Ok(())
    }

    /// Account ids that have at least one document on disk.
    pub fn account_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn document_path(&self, account_id: &str, profile_type: ProfileType) -> PathBuf {
        self.root
            .join(account_id)
            .join(format!("{}.json", profile_type))
    }
}

/// Older exports wrap the document in a query response:
/// `{"profileChanges": [{"profile": {...}}]}`. Unwrap it so such files can
/// be dropped into the storage directory as-is.
fn unwrap_legacy_document(value: Value) -> Value {
    if let Some(profile) = value
        .get("profileChanges")
        .and_then(|changes| changes.get(0))
        .and_then(|change| change.get("profile"))
    {
        return profile.clone();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_document_is_none() {
        let dir = TempDir::new().unwrap();
        let storage = ProfileStorage::open(dir.path().join("profiles")).unwrap();
        assert!(storage
            .load("ghost", ProfileType::Profile0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_store_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let storage = ProfileStorage::open(dir.path().join("profiles")).unwrap();

        let doc = ProfileDocument::new("acc-1", ProfileType::Levels);
        storage.store(&doc).unwrap();

        let loaded = storage.load("acc-1", ProfileType::Levels).unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_legacy_wrapped_document_is_unwrapped() {
        let dir = TempDir::new().unwrap();
        let storage = ProfileStorage::open(dir.path().join("profiles")).unwrap();

        let wrapped = json!({
            "profileRevision": 7,
            "profileChanges": [{
                "changeType": "fullProfileUpdate",
                "profile": {
                    "accountId": "acc-2",
                    "profileId": "profile0",
                    "rvn": 7
                }
            }]
        });
        let dir_path = storage.root().join("acc-2");
        fs::create_dir_all(&dir_path).unwrap();
        fs::write(
            dir_path.join("profile0.json"),
            serde_json::to_vec(&wrapped).unwrap(),
        )
        .unwrap();

        let doc = storage.load("acc-2", ProfileType::Profile0).unwrap().unwrap();
        assert_eq!(doc.rvn.0, 7);
        assert_eq!(doc.account_id, "acc-2");
    }

    #[test]
    fn test_unparseable_document_is_corruption() {
        let dir = TempDir::new().unwrap();
        let storage = ProfileStorage::open(dir.path().join("profiles")).unwrap();

        let dir_path = storage.root().join("acc-3");
        fs::create_dir_all(&dir_path).unwrap();
        fs::write(dir_path.join("profile0.json"), b"{ not json").unwrap();

        let err = storage.load("acc-3", ProfileType::Profile0).unwrap_err();
        assert!(matches!(err, ProfileError::Corruption(_)));
    }
}
