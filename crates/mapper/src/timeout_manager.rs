//! 在途请求的超时跟踪
//!
//! 每个令牌的状态只有 `Armed -> Disarmed | Expired` 两种转换，结束后即被遗忘。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use nanite_core::{models::Token, MapperError, MapperResult};

/// 等待中的超时
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTimeout {
    pub token: Token,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TimeoutManager {
    pending: HashMap<Token, PendingTimeout>,
}

impl TimeoutManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为令牌设置截止时间
    pub fn arm(&mut self, token: &str, deadline: DateTime<Utc>, now: DateTime<Utc>) -> MapperResult<()> {
        if deadline <= now {
            return Err(MapperError::InvalidDeadline {
                token: token.to_string(),
            });
        }
        if self.pending.contains_key(token) {
            return Err(MapperError::TokenInUse {
                token: token.to_string(),
            });
        }

        self.pending.insert(
            token.to_string(),
            PendingTimeout {
                token: token.to_string(),
                deadline,
            },
        );
        debug!("令牌 {} 设置超时，截止时间: {}", token, deadline);
        Ok(())
    }

    /// 收到应答后取消超时，返回令牌此前是否处于等待状态
    pub fn disarm(&mut self, token: &str) -> bool {
        let removed = self.pending.remove(token).is_some();
        if removed {
            debug!("令牌 {} 已取消超时", token);
        }
        removed
    }

    /// 移除所有已到期的令牌并返回它们，每个令牌只会返回一次
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<Token> {
        let expired: Vec<Token> = self
            .pending
            .values()
            .filter(|pending| pending.deadline <= now)
            .map(|pending| pending.token.clone())
            .collect();

        for token in &expired {
            self.pending.remove(token);
            info!("请求超时: {}", token);
        }

        expired
    }

    pub fn is_armed(&self, token: &str) -> bool {
        self.pending.contains_key(token)
    }

    pub fn deadline(&self, token: &str) -> Option<DateTime<Utc>> {
        self.pending.get(token).map(|pending| pending.deadline)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
