//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use crate::config::Config;
use crate::models::{HistoryEntry, RunCounters};
use anyhow::Result;
use std::fs;
use std::io::Write;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化控制台日志
///
/// `RUST_LOG` 优先；未设置时按 `verbose` 选择 debug / info。
pub fn init(verbose: bool) {
    let default_level = if verbose { "auto_apply=debug" } else { "auto_apply=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n职位申请日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 向日志文件追加一行
pub fn append_log_line(log_file_path: &str, line: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%H:%M:%S"),
        line
    )?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 职位自动申请模式");
    info!("🌐 目标页面: {}", config.target_url);
    info!(
        "🖥️ 浏览器: {}",
        if config.headless {
            "自行启动无头浏览器".to_string()
        } else {
            format!("连接调试端口 {}", config.browser_debug_port)
        }
    );
    info!("💾 存储文件: {}", config.store_path);
    info!("{}", "=".repeat(60));
}

/// 记录控制端可用的命令
pub fn log_commands_help() {
    info!("⌨️ 可用命令: stop / pause / resume / skip / status（回车发送）");
    info!("💡 Ctrl+C 等同于 stop\n");
}

/// 打印最终统计信息
///
/// # 参数
/// - `counters`: 累计计数
/// - `recent`: 最近的历史记录（最新在前）
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(counters: &RunCounters, recent: &[HistoryEntry], log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 已申请: {}", counters.applied);
    info!("⏭️ 已跳过: {}", counters.skipped);
    info!("❌ 失败: {}", counters.failed);
    if !recent.is_empty() {
        info!("{}", "─".repeat(60));
        for entry in recent {
            info!(
                "  [{}] {} @ {}",
                entry.status.as_str(),
                truncate_text(&entry.job_title, 40),
                truncate_text(&entry.company, 20)
            );
        }
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("高级后端工程师（Rust）", 6), "高级后端工程...");
        assert_eq!(truncate_text("Engineer", 20), "Engineer");
    }

    #[test]
    fn test_log_file_header_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let path = path.to_str().unwrap();

        init_log_file(path).unwrap();
        append_log_line(path, "职位 40001: applied").unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("职位申请日志"));
        assert!(content.trim_end().ends_with("职位 40001: applied"));
    }
}
