//! 命令处理逻辑
//!
//! 实现一次性CLI命令的处理逻辑；`serve` 和 `run` 是常驻命令，由主程序驱动

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::common::format_duration;
use crate::config::{Config, ConfigLoader, TomlConfigLoader};
use crate::error::{RegistryError, Result};
use crate::probe::ProbeOutcome;
use crate::task::{TaskId, TaskRegistry};
use async_trait::async_trait;
use std::path::Path;
use uuid::Uuid;

/// 默认配置文件模板
const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../../configs/default_config.toml");

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            if self.create_config_file(config_path, *force).await? {
                println!("配置文件已创建: {}", config_path.display());
                println!("请编辑 default_urls 以添加需要保持在线的服务");
            } else {
                eprintln!("配置文件已存在: {}", config_path.display());
                eprintln!("使用 --force 参数覆盖现有文件");
            }
        }
        Ok(())
    }
}

impl InitCommand {
    /// 写入默认配置文件
    ///
    /// # 返回
    /// * `Result<bool>` - 文件已存在且未指定覆盖时返回 false
    pub async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<bool> {
        if config_path.exists() && !force {
            return Ok(false);
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(config_path, DEFAULT_CONFIG_TEMPLATE).await?;
        Ok(true)
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        {
            let config_file = config_path
                .clone()
                .unwrap_or_else(|| args.get_config_path());

            println!("验证配置文件: {}", config_file.display());
            let config = TomlConfigLoader::new(true)
                .load_from_file(&config_file)
                .await?;
            self.print_summary(&config, *verbose);
        }
        Ok(())
    }
}

impl ValidateCommand {
    fn print_summary(&self, config: &Config, verbose: bool) {
        let global = &config.global;
        println!("✓ 配置文件验证通过");
        println!("✓ 默认URL数量: {}", global.default_urls.len());

        if verbose {
            println!("全局配置:");
            println!(
                "  默认间隔: {}",
                format_duration(global.default_interval_seconds)
            );
            println!(
                "  间隔范围: {} ~ {}",
                format_duration(global.min_interval_seconds),
                format_duration(global.max_interval_seconds)
            );
            println!("  请求超时: {}秒", global.request_timeout_seconds);
            println!(
                "  重试: {}次，间隔{}秒",
                global.retry_attempts, global.retry_delay_seconds
            );
            println!("  单任务URL上限: {}", global.max_urls_per_task);
            println!("  历史容量: {}", global.history_capacity);
            println!("  日志级别: {}", global.log_level);
            println!("Web配置:");
            println!("  监听地址: {}", config.web.listen_addr());
            println!(
                "  跨域访问: {}",
                if config.web.cors_enabled { "是" } else { "否" }
            );

            for (i, url) in global.default_urls.iter().enumerate() {
                println!("  {}. {}", i + 1, url);
            }
        }
    }
}

/// 单次探测命令
pub struct OnceCommand {
    registry: TaskRegistry,
}

impl OnceCommand {
    pub fn new(registry: TaskRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Command for OnceCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Once { url, format } = &args.command {
            let outcome = self.registry.ping_once(url).await?;
            match format {
                OutputFormat::Json => println!("{}", outcome.to_json()?),
                OutputFormat::Text => print_outcome(&outcome),
            }
        }
        Ok(())
    }
}

/// 以文本格式打印一条探测结果
pub fn print_outcome(outcome: &ProbeOutcome) {
    let status_icon = if outcome.kind.is_success() { "✓" } else { "✗" };
    println!("{status_icon} {outcome}");
    if outcome.attempts > 1 {
        println!("  尝试次数: {}", outcome.attempts);
    }
}

/// 前台模式的结果游标，每次只返回上次读取之后的新结果
pub struct OutcomeFeed {
    task_id: TaskId,
    window: usize,
    last_seen: Option<Uuid>,
}

impl OutcomeFeed {
    pub fn new(task_id: TaskId, window: usize) -> Self {
        Self {
            task_id,
            window,
            last_seen: None,
        }
    }

    /// 读取新结果
    ///
    /// # 返回
    /// * `Ok(None)` - 任务已结束并注销
    pub async fn next_batch(
        &mut self,
        registry: &TaskRegistry,
    ) -> std::result::Result<Option<Vec<ProbeOutcome>>, RegistryError> {
        let results = match registry.recent_results(self.task_id, self.window).await {
            Ok(results) => results,
            Err(RegistryError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let start = self
            .last_seen
            .and_then(|id| results.iter().position(|o| o.id == id))
            .map_or(0, |pos| pos + 1);
        if let Some(last) = results.last() {
            self.last_seen = Some(last.id);
        }
        Ok(Some(results[start..].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Prober;
    use crate::task::TaskLimits;
    use clap::Parser;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct StubProber;

    #[async_trait]
    impl Prober for StubProber {
        async fn probe(&self, url: &str) -> ProbeOutcome {
            ProbeOutcome::from_response(url, 200, Duration::from_millis(1))
        }

        async fn probe_with(&self, url: &str, _timeout: Duration, _retries: u32) -> ProbeOutcome {
            self.probe(url).await
        }
    }

    #[tokio::test]
    async fn test_init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(InitCommand.create_config_file(&path, false).await.unwrap());
        assert!(path.exists());

        // 生成的模板必须能通过验证
        let config = TomlConfigLoader::new(true)
            .load_from_file(&path)
            .await
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_init_respects_force_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "# custom").await.unwrap();

        assert!(!InitCommand.create_config_file(&path, false).await.unwrap());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "# custom");

        assert!(InitCommand.create_config_file(&path, true).await.unwrap());
        assert_ne!(tokio::fs::read_to_string(&path).await.unwrap(), "# custom");
    }

    #[tokio::test]
    async fn test_validate_command_reports_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        tokio::fs::write(&path, "[global]\nrequest_timeout_seconds = 0\n")
            .await
            .unwrap();

        let args = Args::try_parse_from([
            "url-pinger",
            "validate",
            path.to_str().unwrap(),
        ])
        .unwrap();
        assert!(ValidateCommand.execute(&args).await.is_err());
    }

    #[tokio::test]
    async fn test_once_command_rejects_invalid_url() {
        let registry = TaskRegistry::from_config(&Default::default()).unwrap();
        let args = Args::try_parse_from(["url-pinger", "once", "ftp://example.com"]).unwrap();
        assert!(OnceCommand::new(registry).execute(&args).await.is_err());
    }

    #[tokio::test]
    async fn test_outcome_feed_returns_only_new_results_and_ends_with_task() {
        let limits = TaskLimits {
            min_interval: Duration::from_millis(10),
            stop_check: Duration::from_millis(10),
            ..TaskLimits::default()
        };
        let registry = TaskRegistry::new(Arc::new(StubProber), limits);
        let started = registry
            .start_task(vec!["https://a.example".to_string()], Duration::from_millis(20))
            .await
            .unwrap();

        let mut feed = OutcomeFeed::new(started.task_id, 50);
        let mut seen = Vec::new();
        for _ in 0..200 {
            let batch = feed.next_batch(&registry).await.unwrap().unwrap();
            seen.extend(batch.into_iter().map(|o| o.id));
            if seen.len() >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(seen.len() >= 3);
        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), seen.len());

        registry.stop_task(started.task_id).await.unwrap();
        for _ in 0..200 {
            if feed.next_batch(&registry).await.unwrap().is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("任务注销后游标仍在返回结果");
    }
}
