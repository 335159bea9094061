//! Locator -> raw descriptor, creating files and directories on demand.

use std::fs::{self, OpenOptions};
use std::os::fd::{IntoRawFd, OwnedFd, RawFd};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use tracing::{debug, warn};

use super::grant::HostCapabilities;
use super::locator::{LocatorBase, Regime, ResourceLocator};
use super::provider::{DocumentProvider, OpenMode, MIME_TYPE_BINARY, MIME_TYPE_DIR};
use crate::error::{log_storage_error, StorageError};

/// Failure value returned across the native boundary.
pub const INVALID_FD: RawFd = -1;

pub struct DescriptorProvisioner {
    provider: Arc<dyn DocumentProvider>,
    caps: HostCapabilities,
}

impl DescriptorProvisioner {
    pub fn new(provider: Arc<dyn DocumentProvider>, caps: HostCapabilities) -> Self {
        Self { provider, caps }
    }

    pub fn capabilities(&self) -> &HostCapabilities {
        &self.caps
    }

    /// Detached descriptor for `locator`, or `-1`.
    pub fn open(&self, locator: &ResourceLocator, mode: OpenMode) -> RawFd {
        match self.try_open(locator, mode) {
            Ok(fd) => fd.into_raw_fd(),
            Err(err) => {
                log_storage_error(&err, "open");
                INVALID_FD
            }
        }
    }

    pub fn exists(&self, locator: &ResourceLocator) -> bool {
        match self.try_exists(locator) {
            Ok(found) => found,
            Err(err) => {
                log_storage_error(&err, "exists");
                false
            }
        }
    }

    /// Last-modified milliseconds since the epoch, or `-1`.
    pub fn stat(&self, locator: &ResourceLocator) -> i64 {
        match self.try_stat(locator) {
            Ok(Some(millis)) => millis,
            Ok(None) => -1,
            Err(err) => {
                log_storage_error(&err, "stat");
                -1
            }
        }
    }

    /// `0` on success, `-1` otherwise.
    pub fn mkdir(&self, locator: &ResourceLocator) -> i32 {
        match self.try_mkdir(locator) {
            Ok(()) => 0,
            Err(err) => {
                log_storage_error(&err, "mkdir");
                -1
            }
        }
    }

    pub fn try_open(&self, locator: &ResourceLocator, mode: OpenMode) -> Result<OwnedFd, StorageError> {
        if mode == OpenMode::Write {
            if let Some(path) = self.redirected_path(locator) {
                debug!(target = %locator, redirected = %path.display(), "tree write redirected to private storage");
                return open_file(&path, mode);
            }
        }

        match locator.regime() {
            Regime::DirectFilesystem => {
                let path = host_path(locator)?;
                open_file(&path, mode)
            }
            Regime::PermissionedTree => self.open_tree(locator, mode),
            Regime::OpaqueContent => {
                if !self.exists(locator) {
                    return Err(StorageError::io(locator, "content does not exist"));
                }
                self.provider.open_descriptor(locator, mode)
            }
        }
    }

    fn open_tree(&self, locator: &ResourceLocator, mode: OpenMode) -> Result<OwnedFd, StorageError> {
        // a failed provider query counts as "missing", not as an error
        let exists = self.exists(locator);
        if mode == OpenMode::Read {
            if !exists {
                return Err(StorageError::io(locator, "file does not exist"));
            }
            return self.provider.open_descriptor(locator, mode);
        }

        // No in-place overwrite in this regime: delete, then recreate.
        if exists {
            self.provider.delete_document(locator)?;
        }
        let (parent, name) = split_parent(locator)?;
        self.ensure_tree_directory(&parent)?;
        let created = self.provider.create_document(&parent, MIME_TYPE_BINARY, name)?;
        if created != *locator {
            warn!(requested = %locator, created = %created, "provider renamed created document");
        }
        self.provider.open_descriptor(&created, mode)
    }

    /// Make sure the immediate parent exists, creating only that one level.
    fn ensure_tree_directory(&self, dir: &ResourceLocator) -> Result<(), StorageError> {
        if self.exists(dir) {
            return Ok(());
        }
        let (grandparent, name) = split_parent(dir)?;
        self.provider.create_document(&grandparent, MIME_TYPE_DIR, name)?;
        Ok(())
    }

    pub fn try_exists(&self, locator: &ResourceLocator) -> Result<bool, StorageError> {
        match locator.regime() {
            Regime::DirectFilesystem => Ok(host_path(locator)?.exists()),
            _ => {
                self.require_metadata_queries(locator)?;
                self.provider.query_exists(locator)
            }
        }
    }

    pub fn try_stat(&self, locator: &ResourceLocator) -> Result<Option<i64>, StorageError> {
        match locator.regime() {
            Regime::DirectFilesystem => {
                let path = host_path(locator)?;
                let meta = match fs::metadata(&path) {
                    Ok(meta) => meta,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                    Err(err) => return Err(StorageError::io(path.display(), err)),
                };
                let modified = meta
                    .modified()
                    .map_err(|err| StorageError::io(path.display(), err))?;
                let millis = modified
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);
                Ok(Some(millis))
            }
            _ => {
                self.require_metadata_queries(locator)?;
                self.provider.query_last_modified(locator)
            }
        }
    }

    pub fn try_mkdir(&self, locator: &ResourceLocator) -> Result<(), StorageError> {
        if let Some(path) = self.redirected_path(locator) {
            return fs::create_dir_all(&path).map_err(|err| StorageError::io(path.display(), err));
        }
        match locator.regime() {
            Regime::DirectFilesystem => {
                let path = host_path(locator)?;
                fs::create_dir_all(&path).map_err(|err| StorageError::io(path.display(), err))
            }
            Regime::PermissionedTree => {
                let (parent, name) = split_parent(locator)?;
                self.provider.create_document(&parent, MIME_TYPE_DIR, name)?;
                Ok(())
            }
            Regime::OpaqueContent => Err(StorageError::io(
                locator,
                "directories cannot be created under opaque content",
            )),
        }
    }

    /// Private-storage target for tree writes on hosts without persisted
    /// tree permissions.
    fn redirected_path(&self, locator: &ResourceLocator) -> Option<PathBuf> {
        if self.caps.persisted_tree_permissions {
            return None;
        }
        match locator.base() {
            LocatorBase::Tree(_) => {
                let mut path = self.caps.private_storage.clone();
                path.extend(locator.segments());
                Some(path)
            }
            _ => None,
        }
    }

    fn require_metadata_queries(&self, locator: &ResourceLocator) -> Result<(), StorageError> {
        if self.caps.metadata_queries {
            Ok(())
        } else {
            Err(StorageError::permission(
                locator,
                "host cannot query provider metadata",
            ))
        }
    }
}

fn host_path(locator: &ResourceLocator) -> Result<PathBuf, StorageError> {
    locator
        .file_path()
        .ok_or_else(|| StorageError::io(locator, "not a filesystem locator"))
}

fn split_parent(locator: &ResourceLocator) -> Result<(ResourceLocator, &str), StorageError> {
    match (locator.parent(), locator.name()) {
        (Some(parent), Some(name)) => Ok((parent, name)),
        _ => Err(StorageError::io(locator, "grant root has no parent")),
    }
}

fn open_file(path: &std::path::Path, mode: OpenMode) -> Result<OwnedFd, StorageError> {
    let file = match mode {
        OpenMode::Read => {
            if !path.exists() {
                return Err(StorageError::io(path.display(), "file does not exist"));
            }
            OpenOptions::new().read(true).open(path)
        }
        OpenMode::Write => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|err| StorageError::io(parent.display(), err))?;
            }
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)
        }
    }
    .map_err(|err| StorageError::io(path.display(), err))?;
    Ok(OwnedFd::from(file))
}
