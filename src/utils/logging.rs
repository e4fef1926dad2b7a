/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::info;

use crate::config::Config;

/// 记录服务启动信息
///
/// 只输出配置概要，密钥只显示是否已配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 批改代理启动");
    info!(
        "启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🌐 监听地址: {}", config.bind_addr);
    info!("🤖 模型服务: {} ({})", config.provider, config.model_name());
    info!("⏱️ 上游超时: {} 秒", config.upstream_timeout_secs);
    info!("🔓 允许来源: {}", config.allowed_origins.join(", "));
    info!(
        "🔑 TURNSTILE_SECRET: {}",
        configured(config.turnstile_secret.is_some())
    );
    info!("{}", "=".repeat(60));
}

fn configured(present: bool) -> &'static str {
    if present {
        "已配置"
    } else {
        "未配置"
    }
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
