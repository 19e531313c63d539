//! # fanout CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - stdin 转发到多个输出
//! - 优雅关闭处理

mod cli;
mod commands;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_forwarder, run_schemes, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // stdout may be an output, so logs go to stderr
    observability::init_with_config(logging_config(&cli))?;

    info!(version = env!("CARGO_PKG_VERSION"), "fanout starting");

    // Execute command
    let result = match &cli.command {
        Commands::Run(args) => run_forwarder(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Schemes(args) => run_schemes(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

fn logging_config(cli: &Cli) -> ObservabilityConfig {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
        log_to_stderr: true,
    }
}
