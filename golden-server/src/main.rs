//! 急救黄金时间响应服务主程序

use anyhow::{Context, Result};
use clap::Parser;
use golden_admin::{build_state, init_tracing, ConfigValidator, GoldenConfig};
use golden_integration::ApiServer;
use tracing::{error, info};

/// 服务命令行参数，优先于配置文件和环境变量
#[derive(Parser, Debug)]
#[command(name = "golden-server")]
#[command(about = "急救黄金时间响应服务：分诊、医院筛选、路线评估与告警")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 监听主机
    #[arg(long)]
    host: Option<String>,

    /// 服务器端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut GoldenConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = GoldenConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    init_tracing(&config.logging)?;
    ConfigValidator::new().validate(&config)?;

    info!("启动急救响应服务...");
    info!("  监听地址: {}", config.server.bind_address());
    info!("  候选上限: {}", config.workflow.max_candidates);
    info!("  路线查询超时: {} ms", config.workflow.lookup_timeout_ms);

    let state = build_state(&config).await.context("Failed to build application state")?;
    let orchestrator = state.orchestrator.clone();

    let server = ApiServer::new(state);
    if let Err(e) = server.run(&config.server.bind_address(), shutdown_signal()).await {
        error!("服务器运行失败: {}", e);
        orchestrator.shutdown().await;
        return Err(e);
    }

    // 等待队列中的告警投递完成
    orchestrator.shutdown().await;
    info!("急救响应服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
