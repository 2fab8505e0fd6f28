use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use nanite_core::models::{HeartbeatReply, WorkerRecord};

/// nanite注册表
///
/// 只由心跳与注册事件修改。成员资格是一份租约：超过存活窗口未收到心跳的
/// nanite会在下一次清理时被移除。记录按身份排序存放，候选列表的顺序即遍历顺序。
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<String, WorkerRecord>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册或覆盖nanite记录
    pub fn register(&mut self, identity: &str, services: Vec<String>, load: f64, now: DateTime<Utc>) {
        match self.workers.get_mut(identity) {
            Some(record) => {
                record.services = services;
                record.refresh(load, now);
                debug!("nanite {} 重新注册，服务: {:?}", identity, record.services);
            }
            None => {
                let record = WorkerRecord::new(identity.to_string(), services, load, now);
                info!(
                    "注册nanite: {} (服务: {:?}, 负载: {})",
                    identity, record.services, load
                );
                self.workers.insert(identity.to_string(), record);
            }
        }
    }

    /// 处理心跳，已知nanite刷新租约，未知nanite需要重新注册
    pub fn heartbeat(&mut self, identity: &str, load: f64, now: DateTime<Utc>) -> HeartbeatReply {
        match self.workers.get_mut(identity) {
            Some(record) => {
                record.refresh(load, now);
                debug!("更新了 nanite {} 的心跳信息 (负载: {})", identity, load);
                HeartbeatReply::Pong
            }
            None => {
                debug!("收到未知 nanite {} 的心跳，要求其重新注册", identity);
                HeartbeatReply::Advertise
            }
        }
    }

    /// 移除所有超过存活窗口的nanite，返回被移除的身份
    pub fn expire_stale(&mut self, now: DateTime<Utc>, window: Duration) -> Vec<String> {
        let stale: Vec<String> = self
            .workers
            .values()
            .filter(|record| record.is_stale(now, window))
            .map(|record| record.identity.clone())
            .collect();

        for identity in &stale {
            if let Some(record) = self.workers.remove(identity) {
                info!(
                    "移除失效nanite: {} (上次心跳: {})",
                    identity,
                    record.last_seen.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }

        stale
    }

    /// 提供指定服务的所有nanite
    pub fn candidates_for(&self, service: &str) -> Vec<&WorkerRecord> {
        self.workers
            .values()
            .filter(|record| record.offers(service))
            .collect()
    }

    pub fn get(&self, identity: &str) -> Option<&WorkerRecord> {
        self.workers.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.workers.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn identities(&self) -> Vec<String> {
        self.workers.keys().cloned().collect()
    }

    /// 当前所有记录的快照
    pub fn snapshot(&self) -> Vec<WorkerRecord> {
        self.workers.values().cloned().collect()
    }
}
