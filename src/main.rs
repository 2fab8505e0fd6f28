use anyhow::Result;
use clap::Parser;

use nanite::common::{start_mapper, StartupConfig};

/// nanite 请求路由协调器
#[derive(Parser, Debug)]
#[command(name = "nanite-mapper", version, about)]
struct Cli {
    /// 配置文件路径，未指定时查找默认路径
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 覆盖配置中的协调器身份
    #[arg(long, value_name = "ID")]
    identity: Option<String>,

    /// 日志级别
    #[arg(short = 'l', long, value_name = "LEVEL",
          value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式
    #[arg(long, value_name = "FORMAT", value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    start_mapper(StartupConfig {
        config_path: cli.config,
        identity: cli.identity,
        log_level: cli.log_level,
        log_format: cli.log_format,
    })
    .await
}
