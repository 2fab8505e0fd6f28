//! 配置管理
//!
//! 配置按以下顺序加载，后者覆盖前者：
//!
//! 1. 内置默认值
//! 2. TOML 配置文件
//! 3. `NANITE_` 前缀的环境变量（如 `NANITE_MAPPER__PING_INTERVAL_SECONDS=5`）

pub mod models;

pub use models::*;
