use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use nanite_core::AppConfig;
use nanite_infrastructure::RabbitMQMessageBus;
use nanite_mapper::MapperService;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::shutdown::ShutdownManager;

/// 等待事件循环退出的最长时间
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// 命令行提供的启动参数，未指定的项使用配置文件中的值
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    pub config_path: Option<String>,
    pub identity: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

/// 初始化日志系统
pub fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 安装Prometheus指标导出器
pub fn init_metrics(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .map_err(|e| anyhow::anyhow!("安装Prometheus导出器失败: {e}"))?;

    info!("Prometheus指标导出器已启动，端口: {}", port);
    Ok(())
}

/// 加载应用配置并应用命令行覆盖
pub fn load_config(startup_config: &StartupConfig) -> Result<AppConfig> {
    let mut config = AppConfig::load(startup_config.config_path.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            startup_config.config_path.as_deref().unwrap_or("<默认路径>")
        )
    })?;

    if let Some(identity) = &startup_config.identity {
        config.mapper.identity = Some(identity.clone());
    }
    if let Some(log_level) = &startup_config.log_level {
        config.observability.log_level = log_level.clone();
    }
    if let Some(log_format) = &startup_config.log_format {
        config.observability.log_format = log_format.clone();
    }

    config.validate()?;
    Ok(config)
}

/// 启动Mapper并运行到收到关闭信号
pub async fn start_mapper(startup_config: StartupConfig) -> Result<()> {
    let config = load_config(&startup_config)?;

    init_logging(&config.observability.log_level, &config.observability.log_format)?;
    if config.observability.metrics_enabled {
        init_metrics(config.observability.metrics_port)?;
    }

    info!("启动 nanite mapper");
    if let Some(path) = &startup_config.config_path {
        info!("配置文件: {}", path);
    }

    let bus = Arc::new(
        RabbitMQMessageBus::new(&config.message_queue)
            .await
            .context("连接消息总线失败")?,
    );

    let (service, handle) = MapperService::from_config(&config, bus.clone());
    info!("Mapper 身份: {}", handle.identity());

    let shutdown_manager = ShutdownManager::new();
    let shutdown_rx = shutdown_manager.subscribe().await;
    let service_handle = tokio::spawn(async move {
        if let Err(e) = service.run(shutdown_rx).await {
            error!("Mapper运行失败: {e}");
        }
    });

    wait_for_shutdown_signal().await;

    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, service_handle).await {
        Ok(Ok(())) => info!("Mapper已优雅关闭"),
        Ok(Err(e)) => error!("Mapper关闭时发生错误: {e}"),
        Err(_) => warn!("Mapper关闭超时，强制退出"),
    }

    // 句柄释放前事件循环不会因命令通道关闭而退出
    drop(handle);
    if let Err(e) = bus.close().await {
        warn!("关闭消息总线失败: {e}");
    }

    info!("nanite mapper 已退出");
    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.unwrap_or_else(|e| {
            error!("安装Ctrl+C信号处理器失败: {}", e);
            std::process::exit(1);
        })
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => signal.recv().await,
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {}", e);
                std::process::exit(1);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_applies_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[mapper]
identity = "mapper-from-file"

[observability]
log_level = "warn"
"#
        )
        .unwrap();

        let startup = StartupConfig {
            config_path: Some(file.path().to_string_lossy().into_owned()),
            identity: Some("mapper-cli".to_string()),
            log_format: Some("json".to_string()),
            ..Default::default()
        };
        let config = load_config(&startup).unwrap();

        assert_eq!(config.mapper.identity.as_deref(), Some("mapper-cli"));
        assert_eq!(config.observability.log_level, "warn");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_load_config_rejects_bad_override() {
        let file = NamedTempFile::new().unwrap();
        let startup = StartupConfig {
            config_path: Some(file.path().to_string_lossy().into_owned()),
            log_level: Some("loud".to_string()),
            ..Default::default()
        };
        assert!(load_config(&startup).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let startup = StartupConfig {
            config_path: Some("/nonexistent/nanite.toml".to_string()),
            ..Default::default()
        };
        assert!(load_config(&startup).is_err());
    }
}
