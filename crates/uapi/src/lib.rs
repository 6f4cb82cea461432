//! 与客户端共用的定义和声明
//!
//! 包含时间、凭据和打开标志等类型，确保仲裁器与调用方的一致性

#![no_std]

extern crate alloc;

pub mod cred;
pub mod fcntl;
pub mod time;
