//! Host metadata/document provider seam for the tree and content regimes.

use std::os::fd::OwnedFd;

use super::locator::ResourceLocator;
use crate::error::StorageError;

pub const MIME_TYPE_DIR: &str = "vnd.android.document/directory";
pub const MIME_TYPE_BINARY: &str = "application/octet-stream";

/// Descriptor access mode requested by the engine (`0` read, anything else write).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl OpenMode {
    pub fn from_engine(mode: i32) -> Self {
        if mode == 0 {
            OpenMode::Read
        } else {
            OpenMode::Write
        }
    }

    /// Provider mode string.
    pub fn as_provider_mode(&self) -> &'static str {
        match self {
            OpenMode::Read => "r",
            OpenMode::Write => "rw",
        }
    }
}

/// Storage provider for [`Regime::PermissionedTree`] and
/// [`Regime::OpaqueContent`] locators.
///
/// Providers create one level at a time: `create_document` never creates
/// missing ancestors of `parent`.
///
/// [`Regime::PermissionedTree`]: super::Regime::PermissionedTree
/// [`Regime::OpaqueContent`]: super::Regime::OpaqueContent
pub trait DocumentProvider: Send + Sync {
    /// Whether the provider returns a row for `locator`.
    fn query_exists(&self, locator: &ResourceLocator) -> Result<bool, StorageError>;

    /// Last-modified time in milliseconds since the epoch, `None` when absent.
    fn query_last_modified(&self, locator: &ResourceLocator) -> Result<Option<i64>, StorageError>;

    /// Create `name` directly inside `parent`, returning the created document.
    fn create_document(
        &self,
        parent: &ResourceLocator,
        mime_type: &str,
        name: &str,
    ) -> Result<ResourceLocator, StorageError>;

    fn delete_document(&self, locator: &ResourceLocator) -> Result<(), StorageError>;

    fn open_descriptor(&self, locator: &ResourceLocator, mode: OpenMode)
        -> Result<OwnedFd, StorageError>;
}
