//! 运行时选项
//!
//! 选项形如命令行参数，可在运行中整体替换：
//!
//! ```text
//! -C, --class=CLASS       按设备类别圈定（十六进制）
//! -s, --subclass=SUB      子类别，需配合 -C（十六进制）
//! -D, --domain=DOMAIN     按地址圈定，起始于段号（十六进制）
//! -b, --bus=BUS           总线号，需配合 -D（十六进制）
//! -d, --dev=DEV           设备号，需配合 -b（十六进制）
//! -f, --func=FUNC         功能号，需配合 -d（十六进制）
//! -u, --uid=UID           属主（十进制）
//! -g, --gid=GID           属组（十进制）
//! -n, --ncache=LEN        节点缓存容量（十进制）
//! ```
//!
//! 每组 `-C`/`-D` 开始一条新规则；同一规则不能同时按类别和按地址圈定。

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use vfs::FsError;

use crate::config::NCACHE_DEFAULT_LEN;
use crate::perms::{PermissionRule, Scope};

/// 运行时选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    rules: Vec<PermissionRule>,
    node_cache_max: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            node_cache_max: NCACHE_DEFAULT_LEN,
        }
    }
}

impl Options {
    /// 由规则与缓存容量构造，逐条校验规则
    pub fn new(rules: Vec<PermissionRule>, node_cache_max: usize) -> Result<Self, FsError> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self {
            rules,
            node_cache_max,
        })
    }

    /// 解析参数
    pub fn parse<'s, I>(args: I) -> Result<Self, FsError>
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut sets: Vec<PermSet> = Vec::new();
        let mut cur = PermSet::default();
        let mut node_cache_max = NCACHE_DEFAULT_LEN;

        let mut args = args.into_iter().peekable();
        while let Some(arg) = args.next() {
            let (opt, inline) = split_option(arg)?;
            let value = match inline {
                Some(v) => v,
                None => match args.next_if(|next| !next.starts_with('-')) {
                    Some(v) => v,
                    None => {
                        log::error!("pcifs: option {} requires an argument", arg);
                        return Err(FsError::InvalidArgument);
                    }
                },
            };

            match opt {
                'C' => {
                    if cur.class.is_some() || cur.has_address() {
                        sets.push(core::mem::take(&mut cur));
                    }
                    cur.class = Some(parse_hex(value)?);
                }
                's' => cur.subclass = Some(parse_hex(value)?),
                'D' => {
                    if cur.domain.is_some() || cur.class.is_some() {
                        sets.push(core::mem::take(&mut cur));
                    }
                    cur.domain = Some(parse_hex(value)?);
                }
                'b' => cur.bus = Some(parse_hex(value)?),
                'd' => cur.dev = Some(parse_hex(value)?),
                'f' => cur.func = Some(parse_hex(value)?),
                'u' => cur.uid = Some(parse_dec(value)?),
                'g' => cur.gid = Some(parse_dec(value)?),
                'n' => node_cache_max = parse_dec(value)?,
                _ => return unknown(arg),
            }
        }
        sets.push(cur);

        let mut rules = Vec::new();
        for set in sets {
            if let Some(rule) = set.into_rule()? {
                rules.push(rule);
            }
        }

        Ok(Self {
            rules,
            node_cache_max,
        })
    }

    /// 权限规则，按声明顺序
    pub fn rules(&self) -> &[PermissionRule] {
        &self.rules
    }

    /// 节点缓存容量
    pub fn node_cache_max(&self) -> usize {
        self.node_cache_max
    }

    /// 设置节点缓存容量
    pub fn set_node_cache_max(&mut self, len: usize) {
        self.node_cache_max = len;
    }

    /// 转回参数形式，`parse(to_args())` 得到相同的选项
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        let mut push = |opt: &str, value: String| {
            args.push(opt.to_string());
            args.push(value);
        };

        for rule in &self.rules {
            match rule.scope {
                Scope::Address {
                    domain,
                    bus,
                    dev,
                    func,
                } => {
                    push("-D", format!("{:x}", domain));
                    if let Some(bus) = bus {
                        push("-b", format!("{:x}", bus));
                    }
                    if let Some(dev) = dev {
                        push("-d", format!("{:x}", dev));
                    }
                    if let Some(func) = func {
                        push("-f", format!("{:x}", func));
                    }
                }
                Scope::Class { class, subclass } => {
                    push("-C", format!("{:x}", class));
                    if let Some(subclass) = subclass {
                        push("-s", format!("{:x}", subclass));
                    }
                }
            }
            if let Some(uid) = rule.uid {
                push("-u", uid.to_string());
            }
            if let Some(gid) = rule.gid {
                push("-g", gid.to_string());
            }
        }
        push("-n", self.node_cache_max.to_string());
        args
    }
}

/// 解析中的一组选项
#[derive(Debug, Default)]
struct PermSet {
    domain: Option<u16>,
    bus: Option<u8>,
    dev: Option<u8>,
    func: Option<u8>,
    class: Option<u8>,
    subclass: Option<u8>,
    uid: Option<u32>,
    gid: Option<u32>,
}

impl PermSet {
    fn has_address(&self) -> bool {
        self.domain.is_some() || self.bus.is_some() || self.dev.is_some() || self.func.is_some()
    }

    fn is_empty(&self) -> bool {
        !self.has_address()
            && self.class.is_none()
            && self.subclass.is_none()
            && self.uid.is_none()
            && self.gid.is_none()
    }

    fn into_rule(self) -> Result<Option<PermissionRule>, FsError> {
        if self.is_empty() {
            return Ok(None);
        }

        let reject = |msg: &str| {
            log::error!("pcifs: {}", msg);
            Err(FsError::InvalidArgument)
        };

        if self.func.is_some() && self.dev.is_none() {
            return reject("-f is only valid with -d");
        }
        if self.dev.is_some() && self.bus.is_none() {
            return reject("-d is only valid with -b");
        }
        if self.bus.is_some() && self.domain.is_none() {
            return reject("-b is only valid with -D");
        }
        if self.subclass.is_some() && self.class.is_none() {
            return reject("-s is only valid with -C");
        }

        let scope = match (self.domain, self.class) {
            (Some(domain), None) => Scope::Address {
                domain,
                bus: self.bus,
                dev: self.dev,
                func: self.func,
            },
            (None, Some(class)) => Scope::Class {
                class,
                subclass: self.subclass,
            },
            _ => return reject("each permission set needs exactly one of -D or -C"),
        };

        let rule = PermissionRule {
            scope,
            uid: self.uid,
            gid: self.gid,
        };
        if rule.validate().is_err() {
            return reject("each permission set needs -u or -g");
        }
        Ok(Some(rule))
    }
}

/// 拆出选项字母与内联值
fn split_option(arg: &str) -> Result<(char, Option<&str>), FsError> {
    if let Some(long) = arg.strip_prefix("--") {
        let (name, value) = match long.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (long, None),
        };
        let opt = match name {
            "class" => 'C',
            "subclass" => 's',
            "domain" => 'D',
            "bus" => 'b',
            "dev" => 'd',
            "func" => 'f',
            "uid" => 'u',
            "gid" => 'g',
            "ncache" => 'n',
            _ => return unknown(arg),
        };
        return Ok((opt, value));
    }

    let Some(short) = arg.strip_prefix('-') else {
        return unknown(arg);
    };
    let mut chars = short.chars();
    match chars.next() {
        Some(opt @ ('C' | 's' | 'D' | 'b' | 'd' | 'f' | 'u' | 'g' | 'n')) => {
            let rest = chars.as_str();
            Ok((opt, (!rest.is_empty()).then_some(rest)))
        }
        _ => unknown(arg),
    }
}

fn unknown<T>(arg: &str) -> Result<T, FsError> {
    log::error!("pcifs: unrecognized option '{}'", arg);
    Err(FsError::InvalidArgument)
}

fn parse_hex<T: TryFrom<u32>>(value: &str) -> Result<T, FsError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| {
            log::error!("pcifs: invalid hexadecimal value '{}'", value);
            FsError::InvalidArgument
        })
}

fn parse_dec<T: core::str::FromStr>(value: &str) -> Result<T, FsError> {
    value.parse().map_err(|_| {
        log::error!("pcifs: invalid decimal value '{}'", value);
        FsError::InvalidArgument
    })
}
