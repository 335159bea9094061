//! Permission grant obtained once from the configured game root.

use std::path::PathBuf;

use super::locator::{
    split_scheme, LocatorBase, Regime, ResourceLocator, TreeRoot, SCHEME_CONTENT, SCHEME_FILE,
};
use crate::error::StorageError;

/// What the host platform can do for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Persisted document-tree permissions (Android 5.0+).
    pub persisted_tree_permissions: bool,
    /// Provider metadata queries for content locators (Android 4.4+).
    pub metadata_queries: bool,
    /// Always-reachable app-private directory.
    pub private_storage: PathBuf,
}

impl HostCapabilities {
    /// Capabilities of a host exposing a given Android SDK level.
    pub fn for_sdk_level(sdk: u32, private_storage: impl Into<PathBuf>) -> Self {
        Self {
            persisted_tree_permissions: sdk >= 21,
            metadata_queries: sdk >= 19,
            private_storage: private_storage.into(),
        }
    }

    /// Desktop hosts, where the tree regime is emulated by a provider.
    pub fn desktop(private_storage: impl Into<PathBuf>) -> Self {
        Self {
            persisted_tree_permissions: true,
            metadata_queries: true,
            private_storage: private_storage.into(),
        }
    }
}

/// Scope a grant covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantScope {
    Filesystem,
    Tree(TreeRoot),
}

/// Root + scheme + capability, fixed for the bridge's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    scope: GrantScope,
    read: bool,
    write: bool,
}

impl PermissionGrant {
    pub fn filesystem() -> Self {
        Self {
            scope: GrantScope::Filesystem,
            read: true,
            write: true,
        }
    }

    pub fn tree(root: TreeRoot) -> Self {
        Self {
            scope: GrantScope::Tree(root),
            read: true,
            write: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.write = false;
        self
    }

    pub fn scope(&self) -> &GrantScope {
        &self.scope
    }

    pub fn is_tree(&self) -> bool {
        matches!(self.scope, GrantScope::Tree(_))
    }

    pub fn scheme(&self) -> &'static str {
        match self.scope {
            GrantScope::Filesystem => SCHEME_FILE,
            GrantScope::Tree(_) => SCHEME_CONTENT,
        }
    }

    pub fn can_read(&self) -> bool {
        self.read
    }

    pub fn can_write(&self) -> bool {
        self.write
    }

    pub fn root_locator(&self) -> ResourceLocator {
        match &self.scope {
            GrantScope::Filesystem => ResourceLocator::filesystem("/"),
            GrantScope::Tree(root) => ResourceLocator::tree(root.clone(), Vec::new()),
        }
    }

    /// Locator for `segments` under this grant.
    pub fn locate(&self, segments: Vec<String>) -> ResourceLocator {
        match &self.scope {
            GrantScope::Filesystem => ResourceLocator::from_segments(LocatorBase::Filesystem, segments),
            GrantScope::Tree(root) => ResourceLocator::tree(root.clone(), segments),
        }
    }
}

/// Game directory as seen through its grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRoot {
    pub grant: PermissionGrant,
    /// Segments of the game directory relative to the grant root.
    pub segments: Vec<String>,
}

impl GameRoot {
    /// Derive the grant from the configured game root.
    ///
    /// A `content://` root must be a document tree and requires persisted
    /// tree permissions; anything else is a structural failure.
    pub fn parse(root: &str, caps: &HostCapabilities) -> Result<Self, StorageError> {
        let normalized = root.replace('\\', "/");
        match split_scheme(&normalized) {
            Some((scheme, _)) if scheme.eq_ignore_ascii_case(SCHEME_CONTENT) => {
                if !caps.persisted_tree_permissions {
                    return Err(StorageError::Structural {
                        reason: format!(
                            "content game root {} needs persisted tree permissions",
                            root
                        ),
                    });
                }
                let locator = ResourceLocator::parse(&normalized)
                    .ok_or_else(|| StorageError::resolution(root, "malformed content URI"))?;
                match locator.base() {
                    LocatorBase::Tree(tree) => Ok(Self {
                        grant: PermissionGrant::tree(tree.clone()),
                        segments: locator.segments().to_vec(),
                    }),
                    _ => Err(StorageError::Structural {
                        reason: format!("content game root {} is not a document tree", root),
                    }),
                }
            }
            Some((scheme, _)) if scheme.eq_ignore_ascii_case(SCHEME_FILE) => {
                let locator = ResourceLocator::parse(&normalized)
                    .ok_or_else(|| StorageError::resolution(root, "malformed file URI"))?;
                Ok(Self {
                    grant: PermissionGrant::filesystem(),
                    segments: locator.segments().to_vec(),
                })
            }
            Some((scheme, _)) => Err(StorageError::resolution(
                root,
                format!("unrecognized scheme '{}'", scheme),
            )),
            None if normalized.starts_with('/') => {
                let locator = ResourceLocator::filesystem(&normalized);
                debug_assert_eq!(locator.regime(), Regime::DirectFilesystem);
                Ok(Self {
                    grant: PermissionGrant::filesystem(),
                    segments: locator.segments().to_vec(),
                })
            }
            None => Err(StorageError::resolution(root, "game root must be absolute")),
        }
    }

    /// Host directory handed to the engine at init; `None` under a tree grant
    /// since the engine then routes all I/O through the bridge.
    pub fn engine_directory(&self) -> Option<String> {
        match self.grant.scope() {
            GrantScope::Filesystem => Some(format!("/{}", self.segments.join("/"))),
            GrantScope::Tree(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE_GAME: &str = "content://com.android.externalstorage.documents/tree/primary%3Agames/document/primary%3Agames%2Fdemo";

    #[test]
    fn test_tree_game_root() {
        let caps = HostCapabilities::for_sdk_level(30, "/data/app");
        let game = GameRoot::parse(TREE_GAME, &caps).unwrap();
        assert!(game.grant.is_tree());
        assert_eq!(game.grant.scheme(), "content");
        assert_eq!(game.segments, vec!["demo".to_string()]);
        assert_eq!(game.engine_directory(), None);
    }

    #[test]
    fn test_content_root_without_tree_support_is_structural() {
        let caps = HostCapabilities::for_sdk_level(19, "/data/app");
        match GameRoot::parse(TREE_GAME, &caps) {
            Err(StorageError::Structural { .. }) => {}
            other => panic!("Expected Structural, got {:?}", other),
        }
    }

    #[test]
    fn test_filesystem_game_root() {
        let caps = HostCapabilities::for_sdk_level(16, "/data/app");
        let game = GameRoot::parse("/sdcard/ons/demo/", &caps).unwrap();
        assert_eq!(game.grant, PermissionGrant::filesystem());
        assert_eq!(game.engine_directory().as_deref(), Some("/sdcard/ons/demo"));

        let from_uri = GameRoot::parse("file:///sdcard/ons/demo", &caps).unwrap();
        assert_eq!(from_uri, game);
    }

    #[test]
    fn test_relative_and_foreign_roots_rejected() {
        let caps = HostCapabilities::desktop("/tmp");
        assert!(matches!(
            GameRoot::parse("games/demo", &caps),
            Err(StorageError::Resolution { .. })
        ));
        assert!(matches!(
            GameRoot::parse("smb://nas/games", &caps),
            Err(StorageError::Resolution { .. })
        ));
        assert!(matches!(
            GameRoot::parse("content://media/external/audio", &caps),
            Err(StorageError::Structural { .. })
        ));
    }
}
