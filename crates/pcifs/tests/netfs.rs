//! 打开句柄上的身份检查

mod common;

use common::*;
use test_support::mock::pci::OpKind;
use uapi::cred::Credentials;
use uapi::fcntl::OpenFlags;
use vfs::FsError;

#[test]
fn test_owner_of_other_entries_is_denied() {
    let bus = mixed_bus();
    // uid 500 拥有网卡，音频设备仍归 root
    let fs = mount(&bus, &["-C", "2", "-u", "500"]);
    let user = Credentials::new(500, 500);

    let nic = fs.lookup_path(&path_of(NIC, "config")).unwrap();
    assert!(fs.open(&user, nic, OpenFlags::O_RDWR).is_ok());

    let audio = fs.lookup_path(&path_of(AUDIO, "config")).unwrap();
    assert_eq!(
        fs.open(&user, audio, OpenFlags::O_READ).err(),
        Some(FsError::PermissionDenied)
    );
}

#[test]
fn test_group_member_gets_group_bits() {
    let bus = nic_bus();
    let fs = mount(&bus, &["-D", "0", "-b", "0", "-d", "3", "-g", "40"]);
    let member = Credentials::new(600, 1).with_groups(&[40]);
    let config = fs.lookup_path(&path_of(NIC, "config")).unwrap();

    // 文件为 0640：属组只读
    assert!(fs.open(&member, config, OpenFlags::O_READ).is_ok());
    assert_eq!(
        fs.open(&member, config, OpenFlags::O_WRITE).err(),
        Some(FsError::PermissionDenied)
    );
}

#[test]
fn test_transfer_requires_open_mode() {
    let bus = nic_bus();
    let fs = mount(&bus, &[]);
    let config = fs.lookup_path(&path_of(NIC, "config")).unwrap();
    let file = fs.open(&Credentials::root(), config, OpenFlags::O_READ).unwrap();
    bus.clear_ops();

    assert_eq!(file.write(0x40, &[1]), Err(FsError::PermissionDenied));
    assert!(bus.ops().is_empty());
}

#[test]
fn test_mode_rechecked_after_owner_change() {
    let bus = nic_bus();
    let fs = mount(&bus, &["-C", "2", "-u", "500"]);
    let user = Credentials::new(500, 500);
    let config = fs.lookup_path(&path_of(NIC, "config")).unwrap();
    let file = fs.open(&user, config, OpenFlags::O_READ).unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(file.read(0, &mut buf), Ok(4));

    fs.set_permissions(Vec::new()).unwrap();
    bus.clear_ops();
    assert_eq!(file.read(0, &mut buf), Err(FsError::PermissionDenied));
    assert!(bus.ops().is_empty());
}

#[test]
fn test_conf_access_bound_to_opened_function() {
    let bus = mixed_bus();
    let fs = mount(&bus, &[]);
    let config = fs.lookup_path(&path_of(NIC, "config")).unwrap();
    let file = fs.open(&Credentials::root(), config, OpenFlags::O_RDWR).unwrap();
    bus.clear_ops();

    let mut buf = [0u8; 2];
    assert_eq!(file.conf_read(0, 3, 0, 0, &mut buf), Ok(2));
    assert_eq!(buf, [0x86, 0x80]);

    // 其它功能的地址一律拒绝，即便调用方是 root
    assert_eq!(
        file.conf_read(0, 0x1f, 3, 0, &mut buf),
        Err(FsError::PermissionDenied)
    );
    assert_eq!(
        file.conf_write(0, 3, 1, 0x40, &[1, 2]),
        Err(FsError::PermissionDenied)
    );
    assert_eq!(bus.ops_of(OpKind::ConfigRead).len(), 1);
    assert!(bus.ops_of(OpKind::ConfigWrite).is_empty());

    assert_eq!(file.conf_write(0, 3, 0, 0x40, &[1, 2, 3]), Ok(3));
    assert_eq!(&bus.config(NIC).unwrap()[0x40..0x43], &[1, 2, 3]);
}

#[test]
fn test_conf_access_needs_function_level_handle() {
    let bus = nic_bus();
    let fs = mount(&bus, &[]);
    let slot = fs.lookup_path("/0000/00/03").unwrap();
    let dir = fs.open(&Credentials::root(), slot, OpenFlags::O_READ).unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(
        dir.conf_read(0, 3, 0, 0, &mut buf),
        Err(FsError::PermissionDenied)
    );
}

#[test]
fn test_conf_access_clips_to_config_space() {
    let bus = nic_bus();
    let fs = mount(&bus, &[]);
    let func = fs.lookup_path("/0000/00/03/0").unwrap();
    let file = fs.open(&Credentials::root(), func, OpenFlags::O_READ).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(file.conf_read(0, 3, 0, 252, &mut buf), Ok(4));
    assert_eq!(
        file.conf_read(0, 3, 0, 300, &mut buf),
        Err(FsError::InvalidArgument)
    );
}

#[test]
fn test_lookup_and_readdir_through_handle() {
    let bus = nic_bus();
    let fs = mount(&bus, &["-D", "0", "-b", "0", "-d", "3", "-f", "0", "-u", "500"]);
    let root = fs.open(&Credentials::root(), fs.root(), OpenFlags::O_READ).unwrap();

    let names: Vec<_> = root.readdir().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, ["0000"]);

    let domain = root.lookup("0000", OpenFlags::O_READ).unwrap();
    let bus_dir = domain.lookup("00", OpenFlags::O_READ).unwrap();
    assert_eq!(bus_dir.lookup("07", OpenFlags::O_READ).err(), Some(FsError::NotFound));

    // 非 root 用户不能穿过 0750 的根目录
    let user = Credentials::new(500, 500);
    let as_user = fs.open(&user, fs.root(), OpenFlags::empty()).unwrap();
    assert_eq!(
        as_user.lookup("0000", OpenFlags::empty()).err(),
        Some(FsError::PermissionDenied)
    );
    assert_eq!(as_user.readdir().err(), Some(FsError::PermissionDenied));

    let config = bus_dir
        .lookup("03", OpenFlags::O_READ)
        .unwrap()
        .lookup("0", OpenFlags::O_READ)
        .unwrap()
        .lookup("config", OpenFlags::O_READ)
        .unwrap();
    assert_eq!(config.getattr().unwrap().uid, 500);
    assert_eq!(config.readdir().err(), Some(FsError::NotDirectory));
    // 查找得到的句柄沿用父句柄的身份
    assert_eq!(config.credentials(), &Credentials::root());
    assert_eq!(as_user.credentials().uid, 500);
}
