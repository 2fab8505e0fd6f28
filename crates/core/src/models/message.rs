use serde::{Deserialize, Serialize};

use super::{generate_token, Token};
use crate::MapperResult;

/// 消息总线上传输的数据包
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    /// nanite周期性心跳
    Ping { identity: String, status: f64 },
    /// 协调器对已知nanite心跳的确认
    Pong,
    /// 协调器要求未知nanite重新注册
    Advertise,
    /// nanite注册公告
    Register {
        identity: String,
        services: Vec<String>,
        status: f64,
    },
    Request(RequestPacket),
    Result(ResultPacket),
}

/// 发往nanite的请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestPacket {
    pub service_type: String,
    pub payload: serde_json::Value,
    pub from: String,
    pub token: Token,
    /// 需要回复时为协调器身份，push请求为空
    pub reply_to: Option<String>,
}

/// nanite返回给协调器的结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultPacket {
    pub token: Token,
    /// 产生结果的nanite身份
    pub from: String,
    pub to: String,
    pub results: serde_json::Value,
}

impl RequestPacket {
    /// 创建新的请求，生成唯一令牌
    pub fn new(service_type: &str, payload: serde_json::Value, from: &str) -> Self {
        Self {
            service_type: service_type.to_string(),
            payload,
            from: from.to_string(),
            token: generate_token(),
            reply_to: None,
        }
    }

    pub fn with_reply_to(mut self, reply_to: &str) -> Self {
        self.reply_to = Some(reply_to.to_string());
        self
    }

    pub fn expects_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}

impl Packet {
    pub fn encode(&self) -> MapperResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> MapperResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Ping { .. } => "ping",
            Packet::Pong => "pong",
            Packet::Advertise => "advertise",
            Packet::Register { .. } => "register",
            Packet::Request(_) => "request",
            Packet::Result(_) => "result",
        }
    }
}
