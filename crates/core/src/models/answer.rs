use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Token;

/// 一次请求的聚合结果：nanite身份 -> 结果
pub type Results = BTreeMap<String, serde_json::Value>;

/// 单个目标nanite的投递状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DeliveryState {
    Waiting,
    Received(serde_json::Value),
}

/// 协调器侧的在途请求记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub token: Token,
    pub targets: BTreeMap<String, DeliveryState>,
}

impl Answer {
    /// 为每个目标nanite创建一条等待中的记录
    pub fn new<I, S>(token: Token, workers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            token,
            targets: workers
                .into_iter()
                .map(|w| (w.into(), DeliveryState::Waiting))
                .collect(),
        }
    }

    pub fn workers(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// 记录某个nanite的结果，非目标nanite的结果返回false
    pub fn record(&mut self, worker: &str, results: serde_json::Value) -> bool {
        match self.targets.get_mut(worker) {
            Some(state) => {
                *state = DeliveryState::Received(results);
                true
            }
            None => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.targets
            .values()
            .all(|state| matches!(state, DeliveryState::Received(_)))
    }

    /// 已收到的结果
    pub fn results(&self) -> Results {
        self.targets
            .iter()
            .filter_map(|(worker, state)| match state {
                DeliveryState::Received(value) => Some((worker.clone(), value.clone())),
                DeliveryState::Waiting => None,
            })
            .collect()
    }
}
