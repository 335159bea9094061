//! [`DocumentProvider`] backed by a host directory.
//!
//! Stands in for a document-tree provider on desktop hosts and in tests. The
//! tree root maps onto `root_dir`; segments map onto path components. Like a
//! real provider it creates exactly one level per call.

use std::fs::{self, File, OpenOptions};
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::debug;

use super::locator::{LocatorBase, ResourceLocator};
use super::provider::{DocumentProvider, OpenMode, MIME_TYPE_DIR};
use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct DirectoryTreeProvider {
    root_dir: PathBuf,
}

impl DirectoryTreeProvider {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn host_path(&self, locator: &ResourceLocator) -> Result<PathBuf, StorageError> {
        match locator.base() {
            LocatorBase::Tree(_) | LocatorBase::Content { .. } => {
                let mut path = self.root_dir.clone();
                for segment in locator.segments() {
                    if segment == ".." || segment == "." {
                        return Err(StorageError::permission(locator, "relative segment in document id"));
                    }
                    path.push(segment);
                }
                Ok(path)
            }
            LocatorBase::Filesystem => Err(StorageError::permission(
                locator,
                "filesystem locators are not served by a document provider",
            )),
        }
    }
}

impl DocumentProvider for DirectoryTreeProvider {
    fn query_exists(&self, locator: &ResourceLocator) -> Result<bool, StorageError> {
        Ok(self.host_path(locator)?.exists())
    }

    fn query_last_modified(&self, locator: &ResourceLocator) -> Result<Option<i64>, StorageError> {
        let path = self.host_path(locator)?;
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(_) => return Ok(None),
        };
        let modified = meta
            .modified()
            .map_err(|err| StorageError::permission(locator, err))?;
        Ok(modified
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_millis() as i64))
    }

    fn create_document(
        &self,
        parent: &ResourceLocator,
        mime_type: &str,
        name: &str,
    ) -> Result<ResourceLocator, StorageError> {
        let parent_path = self.host_path(parent)?;
        if !parent_path.is_dir() {
            return Err(StorageError::io(parent, "parent document does not exist"));
        }
        let created = parent.child(name);
        let path = self.host_path(&created)?;
        let result = if mime_type == MIME_TYPE_DIR {
            fs::create_dir(&path)
        } else {
            File::create_new(&path).map(drop)
        };
        result.map_err(|err| StorageError::io(&created, err))?;
        debug!(document = %created, mime_type, "document created");
        Ok(created)
    }

    fn delete_document(&self, locator: &ResourceLocator) -> Result<(), StorageError> {
        let path = self.host_path(locator)?;
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|err| StorageError::io(locator, err))
    }

    fn open_descriptor(
        &self,
        locator: &ResourceLocator,
        mode: OpenMode,
    ) -> Result<OwnedFd, StorageError> {
        let path = self.host_path(locator)?;
        let mut options = OpenOptions::new();
        options.read(true);
        if mode == OpenMode::Write {
            options.write(true);
        }
        let file = options
            .open(&path)
            .map_err(|err| StorageError::io(locator, err))?;
        Ok(OwnedFd::from(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::locator::TreeRoot;
    use crate::storage::provider::MIME_TYPE_BINARY;

    fn loc(segments: &[&str]) -> ResourceLocator {
        ResourceLocator::tree(
            TreeRoot::new("local", "root"),
            segments.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_create_document_one_level_only() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirectoryTreeProvider::new(dir.path());

        let save = provider.create_document(&loc(&[]), MIME_TYPE_DIR, "save").unwrap();
        assert_eq!(save, loc(&["save"]));
        assert!(dir.path().join("save").is_dir());

        let err = provider
            .create_document(&loc(&["missing"]), MIME_TYPE_BINARY, "f")
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[test]
    fn test_create_existing_name_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirectoryTreeProvider::new(dir.path());
        provider.create_document(&loc(&[]), MIME_TYPE_BINARY, "a").unwrap();
        assert!(provider.create_document(&loc(&[]), MIME_TYPE_BINARY, "a").is_err());
    }

    #[test]
    fn test_query_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirectoryTreeProvider::new(dir.path());
        fs::write(dir.path().join("0.txt"), b"x").unwrap();

        assert!(provider.query_exists(&loc(&["0.txt"])).unwrap());
        assert!(provider.query_last_modified(&loc(&["0.txt"])).unwrap().is_some());
        assert_eq!(provider.query_last_modified(&loc(&["nope"])).unwrap(), None);

        provider.delete_document(&loc(&["0.txt"])).unwrap();
        assert!(!provider.query_exists(&loc(&["0.txt"])).unwrap());
    }

    #[test]
    fn test_rejects_filesystem_locators() {
        let provider = DirectoryTreeProvider::new("/tmp");
        assert!(provider
            .query_exists(&ResourceLocator::filesystem("/etc/hosts"))
            .is_err());
    }
}
