//! 目录树构建

mod common;

use std::collections::HashSet;

use common::*;
use device::{ClassCode, PciAccess, PciAddress, PciDevice, PciRegion, RegionFlags};
use pcifs::{EntryId, EntryKind, EntryStore, TreeBuilder, derive_root_stat};
use test_support::mock::pci::{MockPciBus, OpKind};
use uapi::time::TimeSpec;
use vfs::{FsError, InodeType};

fn build(bus: &MockPciBus) -> Result<EntryStore, FsError> {
    init_once();
    let root = derive_root_stat(&underlying(), TimeSpec::zero());
    pcifs::build(bus, &root, TimeSpec::new(1, 0), 0)
}

#[test]
fn test_single_device_entry_count() {
    // root + domain + bus + dev + func + config + region0 + region2 + rom
    let store = build(&nic_bus()).unwrap();
    assert_eq!(store.len(), 9);
    assert_eq!(store.devices().len(), 1);
}

#[test]
fn test_empty_catalog() {
    let store = build(&MockPciBus::new()).unwrap();
    assert_eq!(store.len(), 2);
    let domain = store.lookup(EntryId::ROOT, "0000").unwrap();
    assert!(store.children(domain).unwrap().is_empty());
}

#[test]
fn test_every_entry_listed_once_by_parent() {
    let store = build(&mixed_bus()).unwrap();

    for entry in store.iter() {
        if let Some(parent) = entry.parent() {
            let hits = store
                .children(parent)
                .unwrap()
                .iter()
                .filter(|&&c| c == entry.id())
                .count();
            assert_eq!(hits, 1, "{} listed {} times", entry.name(), hits);
        }
    }

    // 从根出发的遍历恰好访问每一项一次
    let mut seen = HashSet::new();
    let mut stack = vec![EntryId::ROOT];
    while let Some(id) = stack.pop() {
        assert!(seen.insert(id));
        assert!(seen.len() <= store.len());
        if store.get(id).unwrap().kind().is_dir() {
            stack.extend_from_slice(store.children(id).unwrap());
        }
    }
    assert_eq!(seen.len(), store.len());
}

#[test]
fn test_layout_and_names() {
    let store = build(&mixed_bus()).unwrap();

    let bus_dir = store.lookup_path("/0000/00").unwrap();
    let slots: Vec<_> = store
        .list(bus_dir)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(slots, ["00", "03", "1f"]);

    let funcs: Vec<_> = store
        .list(store.lookup_path("/0000/00/1f").unwrap())
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(funcs, ["0", "3"]);

    let files: Vec<_> = store
        .list(store.lookup_path("/0000/00/03/0").unwrap())
        .unwrap()
        .into_iter()
        .map(|e| (e.name, e.inode_type))
        .collect();
    assert_eq!(
        files,
        [
            ("config".to_string(), InodeType::File),
            ("region0".to_string(), InodeType::File),
            ("region2".to_string(), InodeType::File),
            ("rom".to_string(), InodeType::File),
        ]
    );

    let rom = store.lookup_path(&path_of(NIC, "rom")).unwrap();
    assert_eq!(store.path(rom).unwrap(), "/0000/00/03/0/rom");
    assert_eq!(store.path(EntryId::ROOT).unwrap(), "/");
}

#[test]
fn test_lookup_errors_and_dots() {
    let store = build(&nic_bus()).unwrap();
    let func = store.lookup_path("/0000/00/03/0").unwrap();
    let config = store.lookup(func, "config").unwrap();

    assert_eq!(store.lookup(func, "region1"), Err(FsError::NotFound));
    assert_eq!(store.lookup(config, "x"), Err(FsError::NotDirectory));
    assert_eq!(store.lookup(func, "."), Ok(func));
    assert_eq!(store.lookup(func, ".."), Ok(store.parent(func).unwrap()));
    assert_eq!(store.lookup(EntryId::ROOT, ".."), Ok(EntryId::ROOT));
}

#[test]
fn test_file_attributes() {
    let store = build(&nic_bus()).unwrap();
    let stat = |name: &str| {
        store
            .get(store.lookup_path(&path_of(NIC, name)).unwrap())
            .unwrap()
            .stat()
    };

    let root = store.root().stat();
    assert!(root.is_dir());
    assert_eq!(root.mode.permissions().bits(), 0o750);

    let func = store.get(store.lookup_path("/0000/00/03/0").unwrap()).unwrap().stat();
    assert!(func.is_dir());
    assert_eq!(func.mode.permissions().bits(), 0o750);

    let config = stat("config");
    assert_eq!(config.inode_type, InodeType::File);
    assert_eq!(config.mode.permissions().bits(), 0o640);
    assert_eq!(config.size, 256);

    assert_eq!(stat("region0").size, 0x2_0000);
    assert_eq!(stat("region2").size, 8);

    let rom = stat("rom");
    assert_eq!(rom.mode.permissions().bits(), 0o440);
    assert_eq!(rom.size, 2048);
}

#[test]
fn test_files_carry_function_address() {
    let store = build(&nic_bus()).unwrap();
    let region = store.get(store.lookup_path(&path_of(NIC, "region2")).unwrap()).unwrap();
    assert_eq!(region.kind(), EntryKind::Region(2));
    assert_eq!(region.addr().to_pci(), Some(NIC));
    assert_eq!(region.class(), Some(nic_class()));
    assert_eq!(store.device_of(region.id()).unwrap().addr(), NIC);

    let bus_dir = store.get(store.lookup_path("/0000/00").unwrap()).unwrap();
    assert_eq!(bus_dir.addr().depth(), 2);
    assert_eq!(bus_dir.class(), None);
    assert!(store.device_of(bus_dir.id()).is_none());
}

#[test]
fn test_inode_numbers_unique() {
    let store = build(&mixed_bus()).unwrap();
    let inos: HashSet<_> = store.iter().map(|e| e.stat().ino).collect();
    assert_eq!(inos.len(), store.len());
}

#[test]
fn test_foreign_domain_skipped() {
    let mut nic = PciDevice::new(NIC, nic_class());
    nic.regions[0] = PciRegion {
        base_addr: 0xfe00_0000,
        size: 0x1000,
        flags: RegionFlags::empty(),
    };
    let foreign = PciDevice::new(PciAddress::new(0, 1, 0).with_domain(1), ClassCode::new(1, 0, 0));

    let root = derive_root_stat(&underlying(), TimeSpec::zero());
    let store = TreeBuilder::new(&root, TimeSpec::zero(), 0)
        .build(vec![foreign, nic])
        .unwrap();

    // root + domain + bus + dev + func + config + region0
    assert_eq!(store.len(), 7);
    assert_eq!(store.devices().len(), 1);
    assert!(store.lookup_path("/0001").is_err());
}

#[test]
fn test_unsorted_records_are_ordered() {
    let root = derive_root_stat(&underlying(), TimeSpec::zero());
    let store = TreeBuilder::new(&root, TimeSpec::zero(), 0)
        .build(vec![
            PciDevice::new(PciAddress::new(2, 0, 0), nic_class()),
            PciDevice::new(PciAddress::new(0, 5, 0), nic_class()),
            PciDevice::new(PciAddress::new(0, 1, 0), nic_class()),
        ])
        .unwrap();

    let domain = store.lookup_path("/0000").unwrap();
    let buses: Vec<_> = store.list(domain).unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(buses, ["00", "02"]);
    let slots: Vec<_> = store
        .list(store.lookup_path("/0000/00").unwrap())
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(slots, ["01", "05"]);
}

#[test]
fn test_enumeration_failure_propagates() {
    let bus = nic_bus();
    bus.fail_nth(OpKind::Enumerate, 0);
    assert!(matches!(build(&bus), Err(FsError::IoError)));
    // 失败后目录恢复可用
    assert!(bus.enumerate().is_ok());
}
