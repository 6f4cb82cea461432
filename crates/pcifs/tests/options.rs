//! 运行时选项解析

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use device::{ClassCode, PciAddress};
use pcifs::{Options, PciFs, PermissionRule, Scope};
use test_support::mock::pci::MockPciBus;
use vfs::FsError;

fn parse(args: &[&str]) -> Result<Options, FsError> {
    Options::parse(args.iter().copied())
}

#[test]
fn test_defaults() {
    let opts = parse(&[]).unwrap();
    assert!(opts.rules().is_empty());
    assert_eq!(opts.node_cache_max(), 16);
    assert_eq!(opts, Options::default());
}

#[test]
fn test_address_rule() {
    let opts = parse(&["-D", "0", "-b", "1f", "-d", "0a", "-f", "2", "-u", "1000", "-g", "20"]).unwrap();
    assert_eq!(
        opts.rules(),
        [PermissionRule {
            scope: Scope::Address {
                domain: 0,
                bus: Some(0x1f),
                dev: Some(0x0a),
                func: Some(2),
            },
            uid: Some(1000),
            gid: Some(20),
        }]
    );
}

#[test]
fn test_long_forms() {
    let short = parse(&["-C", "02", "-s", "0", "-u", "500", "-n", "4"]).unwrap();
    let long = parse(&["--class=02", "--subclass", "0", "--uid=500", "--ncache=4"]).unwrap();
    let attached = parse(&["-C02", "-s0", "-u500", "-n4"]).unwrap();
    assert_eq!(short, long);
    assert_eq!(short, attached);
    assert_eq!(short.node_cache_max(), 4);
}

#[test]
fn test_repeated_scope_starts_new_rule() {
    let opts = parse(&["-C", "2", "-u", "500", "-C", "3", "-g", "30", "-D", "0", "-u", "1"]).unwrap();
    let scopes: Vec<_> = opts.rules().iter().map(|r| r.scope).collect();
    assert_eq!(
        scopes,
        [
            Scope::Class {
                class: 2,
                subclass: None
            },
            Scope::Class {
                class: 3,
                subclass: None
            },
            Scope::Address {
                domain: 0,
                bus: None,
                dev: None,
                func: None
            },
        ]
    );
    assert_eq!(opts.rules()[1].gid, Some(30));
    assert_eq!(opts.rules()[1].uid, None);
}

#[test]
fn test_dependency_errors() {
    for args in [
        &["-D", "0", "-f", "1", "-u", "1"][..],
        &["-D", "0", "-d", "1", "-u", "1"][..],
        &["-b", "1", "-u", "1"][..],
        &["-s", "1", "-u", "1"][..],
        &["-C", "2"][..],
        &["-u", "1"][..],
    ] {
        assert_eq!(parse(args), Err(FsError::InvalidArgument), "{:?}", args);
    }
}

#[test]
fn test_malformed_values() {
    assert_eq!(parse(&["-C", "xyz", "-u", "1"]), Err(FsError::InvalidArgument));
    assert_eq!(parse(&["-C", "100", "-u", "1"]), Err(FsError::InvalidArgument));
    assert_eq!(parse(&["-C", "2", "-u", "ff"]), Err(FsError::InvalidArgument));
    assert_eq!(parse(&["-n"]), Err(FsError::InvalidArgument));
    assert_eq!(parse(&["-n", "-u"]), Err(FsError::InvalidArgument));
    assert_eq!(parse(&["--verbose"]), Err(FsError::InvalidArgument));
}

#[test]
fn test_to_args_round_trip() {
    let args = ["-D", "0", "-b", "1f", "-u", "7", "-C", "c", "-s", "3", "-g", "9", "-n", "32"];
    let opts = parse(&args).unwrap();
    assert_eq!(opts.to_args(), args);

    let rendered = opts.to_args();
    let again = Options::parse(rendered.iter().map(String::as_str)).unwrap();
    assert_eq!(again, opts);
}

#[test]
fn test_reconfigure_applies_new_options() {
    let bus = mixed_bus();
    let fs = mount(&bus, &["-C", "2", "-u", "500"]);
    let nic = fs.lookup_path(&path_of(NIC, "config")).unwrap();
    let audio = fs.lookup_path(&path_of(AUDIO, "config")).unwrap();
    assert_eq!(fs.getattr(nic).unwrap().uid, 500);

    fs.reconfigure(parse(&["-C", "4", "-s", "3", "-u", "600", "-n", "2"]).unwrap())
        .unwrap();
    assert_eq!(fs.getattr(nic).unwrap().uid, 0);
    assert_eq!(fs.getattr(audio).unwrap().uid, 600);
    assert_eq!(fs.cache().capacity(), 2);
    assert_eq!(fs.options().to_args(), ["-C", "4", "-s", "3", "-u", "600", "-n", "2"]);
}

fn domain_rule(uid: u32) -> PermissionRule {
    PermissionRule {
        scope: Scope::Address {
            domain: 0,
            bus: None,
            dev: None,
            func: None,
        },
        uid: Some(uid),
        gid: None,
    }
}

/// 8 条总线各 32 个设备，目录项足够多以拉长一次重新配置
fn wide_bus() -> Arc<MockPciBus> {
    let bus = Arc::new(MockPciBus::new());
    for b in 0..8 {
        for d in 0..32 {
            let addr = PciAddress::new(b, d, 0);
            bus.add_function(addr, 0x8086, 0x1000, ClassCode::new(0x02, 0x00, 0x00), 0);
        }
    }
    bus
}

/// 除根目录外所有目录项的属主都等于当前选项中规则给出的属主
fn assert_consistent(fs: &PciFs) {
    let options = fs.options();
    let uid = options.rules()[0].uid.unwrap();
    let store = fs.store();
    let stray = store
        .iter()
        .skip(1)
        .filter(|entry| entry.stat().uid != uid)
        .count();
    assert_eq!(stray, 0, "entries not owned by uid {}", uid);
    assert_eq!(fs.cache().capacity(), options.node_cache_max());
}

#[test]
fn test_concurrent_reloads_are_serialized() {
    const ROUNDS: usize = 30;

    let bus = wide_bus();
    let fs = mount(&bus, &["-D", "0", "-u", "1"]);
    assert_eq!(fs.store().len(), 1 + 1 + 8 + 8 * 32 * 3);

    for round in 0..ROUNDS {
        let barrier = Barrier::new(3);
        thread::scope(|s| {
            s.spawn(|| {
                barrier.wait();
                fs.set_permissions(vec![domain_rule(500)]).unwrap();
            });
            s.spawn(|| {
                barrier.wait();
                fs.reconfigure(Options::new(vec![domain_rule(600)], 32).unwrap())
                    .unwrap();
            });
            s.spawn(|| {
                barrier.wait();
                fs.set_node_cache_max(4 + round);
            });
        });
        assert_consistent(&fs);
    }
}
