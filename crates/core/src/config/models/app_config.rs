use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    mapper::MapperConfig, message_queue::MessageQueueConfig, observability::ObservabilityConfig,
};

/// 默认配置文件查找路径
const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/nanite.toml",
    "nanite.toml",
    "/etc/nanite/config.toml",
];

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mapper: MapperConfig,
    pub message_queue: MessageQueueConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: NANITE_, nested keys separated by `__`)
    ///
    /// An explicit `config_path` must exist; without one the default paths are
    /// tried and a missing file is not an error.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default(
                "mapper.ping_interval_seconds",
                defaults.mapper.ping_interval_seconds,
            )?
            .set_default(
                "mapper.liveness_window_seconds",
                defaults.mapper.liveness_window_seconds,
            )?
            .set_default(
                "mapper.default_timeout_seconds",
                defaults.mapper.default_timeout_seconds,
            )?
            .set_default("mapper.default_selector", defaults.mapper.default_selector)?
            .set_default("mapper.command_buffer", defaults.mapper.command_buffer as u64)?
            .set_default("message_queue.url", defaults.message_queue.url)?
            .set_default(
                "message_queue.heartbeat_exchange",
                defaults.message_queue.heartbeat_exchange,
            )?
            .set_default(
                "message_queue.registration_exchange",
                defaults.message_queue.registration_exchange,
            )?
            .set_default(
                "message_queue.connection_timeout_seconds",
                defaults.message_queue.connection_timeout_seconds,
            )?
            .set_default("observability.log_level", defaults.observability.log_level)?
            .set_default("observability.log_format", defaults.observability.log_format)?
            .set_default(
                "observability.metrics_enabled",
                defaults.observability.metrics_enabled,
            )?
            .set_default(
                "observability.metrics_port",
                defaults.observability.metrics_port as u64,
            )?;

        // 1. Load config file
        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        // 2. Environment variable overrides - highest priority
        builder = builder.add_source(
            Environment::with_prefix("NANITE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// Validate configuration effectiveness
    pub fn validate(&self) -> Result<()> {
        self.mapper.validate().context("Mapper配置验证失败")?;

        self.message_queue
            .validate()
            .context("消息队列配置验证失败")?;

        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.mapper.ping_interval_seconds, 15);
        assert_eq!(config.mapper.liveness_window_seconds, 16);
        assert_eq!(config.message_queue.heartbeat_exchange, "heartbeat");
        assert_eq!(config.message_queue.registration_exchange, "registration");
    }

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
[mapper]
identity = "mapper-test"
ping_interval_seconds = 5
liveness_window_seconds = 6
default_timeout_seconds = 10
default_selector = "round_robin"

[message_queue]
url = "amqp://test:5672/%2f"

[observability]
log_level = "debug"
"#;

        let config = AppConfig::from_toml(toml_content).unwrap();

        assert_eq!(config.mapper.identity.as_deref(), Some("mapper-test"));
        assert_eq!(config.mapper.ping_interval_seconds, 5);
        assert_eq!(config.mapper.default_selector, "round_robin");
        assert_eq!(config.message_queue.url, "amqp://test:5672/%2f");
        // 未指定的字段使用默认值
        assert_eq!(config.message_queue.heartbeat_exchange, "heartbeat");
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_config_from_toml_invalid() {
        let toml_content = r#"
[mapper]
ping_interval_seconds = 0
"#;
        assert!(AppConfig::from_toml(toml_content).is_err());
    }

    #[test]
    fn test_config_to_toml() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[mapper]"));

        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(
            parsed.mapper.ping_interval_seconds,
            config.mapper.ping_interval_seconds
        );
    }
}
