//! Virtual engine path -> [`ResourceLocator`].

use tracing::debug;

use super::grant::{GameRoot, PermissionGrant};
use super::locator::{split_scheme, split_segments, ResourceLocator, SEPARATOR};
use crate::error::StorageError;

/// Maps engine paths onto the active grant.
///
/// Pure path logic: no host I/O happens here.
#[derive(Debug, Clone)]
pub struct FileResolver {
    grant: PermissionGrant,
    game_root: Vec<String>,
}

impl FileResolver {
    pub fn new(game: GameRoot) -> Self {
        Self {
            grant: game.grant,
            game_root: game.segments,
        }
    }

    pub fn grant(&self) -> &PermissionGrant {
        &self.grant
    }

    /// Locator of the game directory itself.
    pub fn game_root(&self) -> ResourceLocator {
        self.grant.locate(self.game_root.clone())
    }

    /// Resolve, discarding the reason on failure.
    pub fn resolve(&self, virtual_path: &str) -> Option<ResourceLocator> {
        match self.try_resolve(virtual_path) {
            Ok(locator) => Some(locator),
            Err(err) => {
                debug!(path = virtual_path, error = %err, "path did not resolve");
                None
            }
        }
    }

    /// Resolution order:
    /// 1. backslashes become `/`
    /// 2. absolute host path -> direct filesystem
    /// 3. `file://` / `content://` -> parsed as-is
    /// 4. anything else is relative to the game root under the grant
    pub fn try_resolve(&self, virtual_path: &str) -> Result<ResourceLocator, StorageError> {
        let normalized = normalize(virtual_path);

        if normalized.starts_with(SEPARATOR) {
            return Ok(ResourceLocator::filesystem(&normalized));
        }

        if let Some((scheme, _)) = split_scheme(&normalized) {
            return ResourceLocator::parse(&normalized).ok_or_else(|| {
                StorageError::resolution(
                    virtual_path,
                    format!("unrecognized or malformed '{}' URI", scheme),
                )
            });
        }

        let mut segments = self.game_root.clone();
        segments.extend(split_segments(&normalized));
        Ok(self.grant.locate(segments))
    }
}

/// Canonical separator form of an engine path.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}
