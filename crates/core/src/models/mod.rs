//! # 数据模型
//!
//! 协调器与nanite之间交换的数据结构。
//!
//! - [`WorkerRecord`]: 注册表中的nanite记录（身份、服务、负载、最后心跳时间）
//! - [`Packet`]: 消息总线上传输的数据包
//! - [`Answer`]: 协调器侧的在途请求记录
//! - [`RequestOptions`] / [`RequestDefaults`] / [`SelectionPolicy`]: 请求的路由选项及其默认值

pub mod answer;
pub mod message;
pub mod options;
pub mod worker;

pub use answer::*;
pub use message::*;
pub use options::*;
pub use worker::*;

/// 关联令牌，连接一次请求与它最终的应答或超时
pub type Token = String;

/// 生成新的唯一令牌
pub fn generate_token() -> Token {
    uuid::Uuid::new_v4().simple().to_string()
}
