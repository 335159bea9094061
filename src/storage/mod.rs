// Storage module - virtual path resolution and descriptor provisioning across
// the direct filesystem, permissioned document trees and opaque content

pub mod grant;
pub mod locator;
pub mod provider;
pub mod provisioner;
pub mod resolver;
pub mod tree_dir;

#[cfg(target_os = "android")]
pub mod android;

pub use grant::{GameRoot, GrantScope, HostCapabilities, PermissionGrant};
pub use locator::{LocatorBase, Regime, ResourceLocator, TreeRoot};
pub use provider::{DocumentProvider, OpenMode};
pub use provisioner::{DescriptorProvisioner, INVALID_FD};
pub use resolver::FileResolver;
pub use tree_dir::DirectoryTreeProvider;
