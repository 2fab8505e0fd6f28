use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{RequestDefaults, SelectionPolicy};

/// Mapper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// 协调器身份，为空时启动时自动生成
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// 存活检查周期，与nanite心跳周期一致
    pub ping_interval_seconds: u64,
    /// 超过该时长未收到心跳的nanite将被移除
    pub liveness_window_seconds: u64,
    pub default_timeout_seconds: u64,
    pub default_selector: String, // "least_loaded", "all", "random", "round_robin"
    /// 命令通道容量
    pub command_buffer: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            identity: None,
            ping_interval_seconds: 15,
            liveness_window_seconds: 16, // 心跳周期 + 1秒
            default_timeout_seconds: 60,
            default_selector: "least_loaded".to_string(),
            command_buffer: 256,
        }
    }
}

impl MapperConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(identity) = &self.identity {
            if identity.is_empty() {
                return Err(anyhow::anyhow!("协调器身份不能为空字符串"));
            }
        }

        if self.ping_interval_seconds == 0 {
            return Err(anyhow::anyhow!("存活检查周期必须大于0"));
        }

        if self.liveness_window_seconds < self.ping_interval_seconds {
            return Err(anyhow::anyhow!(
                "存活窗口({}秒)不能小于心跳周期({}秒)",
                self.liveness_window_seconds,
                self.ping_interval_seconds
            ));
        }

        if self.command_buffer == 0 {
            return Err(anyhow::anyhow!("命令通道容量必须大于0"));
        }

        self.default_selector
            .parse::<SelectionPolicy>()
            .map_err(|_| {
                anyhow::anyhow!(
                    "无效的选择策略: {}，支持的策略: {:?}",
                    self.default_selector,
                    ["least_loaded", "all", "random", "round_robin"]
                )
            })?;

        Ok(())
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_seconds)
    }

    pub fn liveness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.liveness_window_seconds as i64)
    }

    /// 默认超时，0 表示不设置超时
    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_seconds > 0).then(|| Duration::from_secs(self.default_timeout_seconds))
    }

    pub fn default_policy(&self) -> SelectionPolicy {
        self.default_selector.parse().unwrap_or_default()
    }

    /// 请求未指定策略或超时时使用的默认值
    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            policy: self.default_policy(),
            timeout: self.default_timeout(),
        }
    }

    /// 返回配置的身份，未配置时按主机名生成
    pub fn resolve_identity(&self) -> String {
        match &self.identity {
            Some(identity) => identity.clone(),
            None => {
                let host = hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| "localhost".to_string());
                format!("mapper-{}-{}", host, crate::models::generate_token())
            }
        }
    }
}
