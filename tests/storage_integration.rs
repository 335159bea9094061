// End-to-end storage behaviour through the engine-facing services

use std::fs::{self, File};
use std::io::{Read, Write};
use std::os::fd::{FromRawFd, OwnedFd};
use std::sync::Arc;

use ons_bridge::engine_sink::RecordingSink;
use ons_bridge::storage::{
    DescriptorProvisioner, DirectoryTreeProvider, FileResolver, GameRoot, HostCapabilities,
    OpenMode, Regime, INVALID_FD,
};
use ons_bridge::{BridgeBuilder, Platform};

const TREE_GAME: &str =
    "content://local.docs/tree/primary%3Agames/document/primary%3Agames%2Fdemo";

fn file_from(fd: i32) -> File {
    assert!(fd >= 0, "expected a descriptor, got {}", fd);
    File::from(unsafe { OwnedFd::from_raw_fd(fd) })
}

#[test]
fn save_roundtrip_through_tree_grant() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("games/demo")).unwrap();
    let platform = Platform::headless(
        dir.path().join("games"),
        dir.path().join("private"),
        Arc::new(RecordingSink::new()),
    );
    let bridge = BridgeBuilder::new(TREE_GAME).build(platform).unwrap();
    let services = &bridge.services;

    // engine checks first, then writes a save slot in a fresh directory
    assert_eq!(services.get_stat("save\\1.dat"), -1);
    assert_eq!(services.get_fd("save\\1.dat", 0), INVALID_FD);
    let mut out = file_from(services.get_fd("save\\1.dat", 1));
    out.write_all(b"first save").unwrap();
    drop(out);

    // overwrite: the document is replaced, not patched in place
    let mut out = file_from(services.get_fd("save/1.dat", 1));
    out.write_all(b"2nd").unwrap();
    drop(out);

    let mut body = String::new();
    file_from(services.get_fd("save/1.dat", 0))
        .read_to_string(&mut body)
        .unwrap();
    assert_eq!(body, "2nd");
    assert!(services.get_stat("save/1.dat") > 0);
    assert_eq!(
        fs::read(dir.path().join("games/demo/save/1.dat")).unwrap(),
        b"2nd"
    );
}

#[test]
fn absolute_paths_bypass_the_grant() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("games/demo")).unwrap();
    let outside = dir.path().join("outside.txt");
    fs::write(&outside, b"host file").unwrap();

    let platform = Platform::headless(
        dir.path().join("games"),
        dir.path().join("private"),
        Arc::new(RecordingSink::new()),
    );
    let bridge = BridgeBuilder::new(TREE_GAME).build(platform).unwrap();

    let locator = bridge
        .services
        .resolver()
        .resolve(&outside.to_string_lossy())
        .unwrap();
    assert_eq!(locator.regime(), Regime::DirectFilesystem);
    assert!(bridge.services.get_stat(&outside.to_string_lossy()) > 0);
}

#[test]
fn legacy_host_redirects_tree_writes_to_private_storage() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("games/demo")).unwrap();
    let caps = HostCapabilities {
        persisted_tree_permissions: false,
        metadata_queries: true,
        private_storage: dir.path().join("private"),
    };
    // the grant was persisted on a newer host; this one only has the shim
    let game = GameRoot::parse(TREE_GAME, &HostCapabilities::desktop(dir.path())).unwrap();
    let resolver = FileResolver::new(game);
    let provisioner =
        DescriptorProvisioner::new(Arc::new(DirectoryTreeProvider::new(dir.path().join("games"))), caps);

    let locator = resolver.resolve("save/2.dat").unwrap();
    file_from(provisioner.open(&locator, OpenMode::Write))
        .write_all(b"shim")
        .unwrap();

    assert!(!dir.path().join("games/demo/save/2.dat").exists());
    assert_eq!(
        fs::read(dir.path().join("private/demo/save/2.dat")).unwrap(),
        b"shim"
    );
}

#[test]
fn resolve_is_idempotent_on_its_string_form() {
    let game = GameRoot::parse(TREE_GAME, &HostCapabilities::desktop("/tmp")).unwrap();
    let resolver = FileResolver::new(game);
    for path in ["0.txt", "save\\1.dat", "a/b/../c.dat", "movie/op ening.mpg", "/data/x.bin"] {
        let first = resolver.resolve(path).unwrap();
        let second = resolver.resolve(&first.to_string()).unwrap();
        assert_eq!(first, second, "{}", path);
    }
}
