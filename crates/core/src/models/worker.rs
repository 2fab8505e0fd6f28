use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// nanite节点信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerRecord {
    pub identity: String,
    pub services: Vec<String>,
    /// 负载值，越小越空闲
    pub load: f64,
    pub last_seen: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

/// 心跳处理结果，决定回复给nanite的数据包
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatReply {
    /// 已知nanite，回复存活确认
    Pong,
    /// 未知nanite，要求其重新注册
    Advertise,
}

impl WorkerRecord {
    /// 创建新的nanite记录
    pub fn new(identity: String, services: Vec<String>, load: f64, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            services,
            load,
            last_seen: now,
            registered_at: now,
        }
    }

    /// 检查nanite是否提供指定服务
    pub fn offers(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service)
    }

    /// 更新心跳信息
    pub fn refresh(&mut self, load: f64, now: DateTime<Utc>) {
        self.load = load;
        self.last_seen = now;
    }

    /// 检查心跳是否超出存活窗口
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.last_seen > window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offers() {
        let record = WorkerRecord::new(
            "nanite-1".to_string(),
            vec!["/calc/add".to_string(), "/calc/sub".to_string()],
            0.5,
            Utc::now(),
        );
        assert!(record.offers("/calc/add"));
        assert!(!record.offers("/calc/mul"));
    }

    #[test]
    fn test_is_stale_boundary() {
        let now = Utc::now();
        let record = WorkerRecord::new("nanite-1".to_string(), vec![], 0.0, now);
        let window = Duration::seconds(16);

        // 恰好等于窗口时仍然存活
        assert!(!record.is_stale(now + window, window));
        assert!(record.is_stale(now + window + Duration::milliseconds(1), window));
    }

    #[test]
    fn test_refresh_keeps_registration_time() {
        let now = Utc::now();
        let mut record = WorkerRecord::new("nanite-1".to_string(), vec![], 3.0, now);
        let later = now + Duration::seconds(10);
        record.refresh(1.0, later);

        assert_eq!(record.load, 1.0);
        assert_eq!(record.last_seen, later);
        assert_eq!(record.registered_at, now);
    }
}
