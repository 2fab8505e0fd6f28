//! nanite mapper 可执行程序的启动与关闭流程

pub mod common;
pub mod shutdown;
