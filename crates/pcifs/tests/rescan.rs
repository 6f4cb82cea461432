//! 重新扫描

mod common;

use common::*;
use test_support::mock::pci::OpKind;
use uapi::cred::Credentials;
use uapi::fcntl::OpenFlags;
use vfs::FsError;

#[test]
fn test_rescan_picks_up_topology_changes() {
    let bus = mixed_bus();
    let fs = mount(&bus, &["-C", "4", "-u", "600"]);
    assert_eq!(fs.generation(), 0);
    let before = fs.store().len();

    bus.remove_function(AUDIO);
    fs.rescan().unwrap();

    assert_eq!(fs.generation(), 1);
    assert!(fs.lookup_path("/0000/00/1f/3").is_err());
    assert!(fs.lookup_path("/0000/00/1f/0/config").is_ok());
    // 音频功能目录、config、region0
    assert_eq!(fs.store().len(), before - 3);
}

#[test]
fn test_rescan_reapplies_rules() {
    let bus = nic_bus();
    let fs = mount(&bus, &["-C", "2", "-u", "500"]);
    fs.rescan().unwrap();
    let config = fs.lookup_path(&path_of(NIC, "config")).unwrap();
    assert_eq!(fs.getattr(config).unwrap().uid, 500);
}

#[test]
fn test_handles_go_stale() {
    let bus = nic_bus();
    let fs = mount(&bus, &[]);
    let config = fs.lookup_path(&path_of(NIC, "config")).unwrap();
    let file = fs.open(&Credentials::root(), config, OpenFlags::O_RDWR).unwrap();
    assert_eq!(fs.cache().len(), 1);

    fs.rescan().unwrap();
    assert!(fs.cache().is_empty());

    bus.clear_ops();
    let mut buf = [0u8; 4];
    assert_eq!(file.read(0, &mut buf), Err(FsError::StaleHandle));
    assert_eq!(file.getattr().err(), Some(FsError::StaleHandle));
    assert_eq!(file.conf_read(0, 3, 0, 0, &mut buf), Err(FsError::StaleHandle));
    assert!(bus.ops().is_empty());

    // 重新打开得到新一代的节点
    let fresh = fs.open(&Credentials::root(), config, OpenFlags::O_READ).unwrap();
    assert_eq!(fresh.node().generation(), 1);
    assert_eq!(fresh.read(0, &mut buf), Ok(4));
    drop(file);
    assert_eq!(fs.cache().len(), 1);
}

#[test]
fn test_failed_rescan_keeps_old_tree() {
    let bus = nic_bus();
    let fs = mount(&bus, &[]);
    let config = fs.lookup_path(&path_of(NIC, "config")).unwrap();
    let file = fs.open(&Credentials::root(), config, OpenFlags::O_READ).unwrap();

    bus.fail_nth(OpKind::Enumerate, 0);
    assert_eq!(fs.rescan(), Err(FsError::IoError));
    assert_eq!(fs.generation(), 0);

    let mut buf = [0u8; 2];
    assert_eq!(file.read(0, &mut buf), Ok(2));
}
