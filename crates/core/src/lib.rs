//! nanite 协调器核心库
//!
//! 提供 mapper 及其周边组件共享的数据模型、错误类型、消息总线抽象和配置。

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::*;
pub use errors::*;
pub use models::{
    Answer, DeliveryState, HeartbeatReply, Packet, RequestDefaults, RequestOptions, RequestPacket,
    ResultPacket, SelectionPolicy, Token, WorkerRecord,
};
pub use traits::{MessageBus, PacketReceiver};
