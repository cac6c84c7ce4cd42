//! URL Pinger 主程序入口
//!
//! 定时探测URL，保持远程服务在线

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use url_pinger::cli::args::{Args, Commands};
use url_pinger::cli::commands::{
    print_outcome, Command, InitCommand, OnceCommand, OutcomeFeed, ValidateCommand,
    VersionCommand,
};
use url_pinger::common::format_duration;
use url_pinger::config::{validate_config, Config};
use url_pinger::logging::{LogConfig, LoggingSystem};
use url_pinger::task::TaskRegistry;
use url_pinger::web::{AppState, WebServer};

/// 关闭时等待任务退出的最长时间
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// 前台模式刷新输出的间隔
const RUN_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 常驻命令和单次探测需要先加载配置，日志级别可能来自配置文件
    let config = if args.needs_config() {
        Some(args.load_config().await.with_context(|| {
            format!(
                "加载配置文件失败: {}\n提示：运行 'url-pinger init' 创建默认配置文件",
                args.get_config_path().display()
            )
        })?)
    } else {
        None
    };

    // 初始化日志系统
    let mut log_config = match (args.log_level, &config) {
        (Some(level), _) => LogConfig {
            level: level.into(),
            ..Default::default()
        },
        (None, Some(config)) => LogConfig::with_level_name(&config.global.log_level),
        (None, None) => LogConfig::default(),
    };
    log_config.json_format = args.json_logs;

    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    // 执行命令
    if let Err(e) = execute_command(&args, config).await {
        error!("命令执行失败: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args, config: Option<Config>) -> Result<()> {
    match &args.command {
        Commands::Serve {
            bind,
            port,
            interval,
            timeout,
        } => {
            let config = config.context("配置未加载")?;
            run_server(config, bind.clone(), *port, *interval, *timeout).await
        }
        Commands::Run { urls, interval } => {
            let config = config.context("配置未加载")?;
            run_foreground(config, urls.clone(), *interval).await
        }
        Commands::Once { .. } => {
            let config = config.context("配置未加载")?;
            let registry = TaskRegistry::from_config(&config.global)?;
            OnceCommand::new(registry).execute(args).await?;
            Ok(())
        }
        Commands::Init { .. } => Ok(InitCommand.execute(args).await?),
        Commands::Validate { .. } => Ok(ValidateCommand.execute(args).await?),
        Commands::Version { .. } => Ok(VersionCommand.execute(args).await?),
    }
}

/// 监听 Ctrl+C，收到后广播关闭信号
fn spawn_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("收到中断信号，正在停止...");
                let _ = shutdown_tx.send(());
            }
            Err(err) => {
                error!("监听中断信号失败: {}", err);
            }
        }
    });
}

/// 启动HTTP服务，直到收到关闭信号
async fn run_server(
    mut config: Config,
    bind: Option<String>,
    port: Option<u16>,
    interval: Option<u64>,
    timeout: Option<u64>,
) -> Result<()> {
    info!("URL Pinger v{} 启动", url_pinger::VERSION);

    // 应用命令行参数覆盖
    if let Some(bind) = bind {
        config.web.bind_address = bind;
    }
    if let Some(port) = port {
        config.web.port = port;
    }
    if let Some(interval_secs) = interval {
        config.global.default_interval_seconds = interval_secs;
    }
    if let Some(timeout_secs) = timeout {
        config.global.request_timeout_seconds = timeout_secs;
    }
    validate_config(&config).map_err(|e| anyhow::anyhow!("配置验证失败: {}", e))?;

    let registry = Arc::new(
        TaskRegistry::from_config(&config.global).context("创建任务注册表失败")?,
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    spawn_signal_handler(shutdown_tx);

    info!(
        "启动 Web 服务，地址: {}，默认探测间隔: {}",
        config.web.listen_addr(),
        format_duration(config.global.default_interval_seconds)
    );
    let server = WebServer::new(
        config.web.clone(),
        AppState::new(Arc::clone(&registry), config.global.clone()),
    );
    server.start(shutdown_rx).await.context("Web 服务运行失败")?;

    let stopped = registry.shutdown(SHUTDOWN_GRACE).await;
    info!("服务已停止，共停止 {} 个任务", stopped);
    Ok(())
}

/// 前台探测模式：启动一个任务并持续打印新的结果
async fn run_foreground(config: Config, urls: Vec<String>, interval: Option<u64>) -> Result<()> {
    let urls = if urls.is_empty() {
        config.global.default_urls.clone()
    } else {
        urls
    };
    if urls.is_empty() {
        anyhow::bail!("未指定URL，请在命令行或配置文件的 default_urls 中提供");
    }
    let interval = interval.unwrap_or(config.global.default_interval_seconds);

    let registry = TaskRegistry::from_config(&config.global).context("创建任务注册表失败")?;
    let started = registry
        .start_task(urls, Duration::from_secs(interval))
        .await?;

    println!(
        "开始探测 {} 个URL，间隔 {}",
        started.urls.len(),
        format_duration(started.interval.as_secs())
    );
    for url in &started.urls {
        println!("  - {url}");
    }
    println!("按 Ctrl+C 停止");

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
    spawn_signal_handler(shutdown_tx);

    let mut feed = OutcomeFeed::new(started.task_id, config.global.history_capacity);
    let mut ticker = tokio::time::interval(RUN_POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                match feed.next_batch(&registry).await? {
                    Some(outcomes) => outcomes.iter().for_each(print_outcome),
                    None => {
                        println!("任务 {} 已结束", started.task_id);
                        break;
                    }
                }
            }
        }
    }

    registry.shutdown(SHUTDOWN_GRACE).await;
    println!("已停止探测");
    Ok(())
}
