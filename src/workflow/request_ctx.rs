//! 请求上下文
//!
//! 封装"这批题目来自谁"这一信息，仅用于校验和日志

use std::fmt::Display;

/// 请求上下文
#[derive(Debug, Clone, Default)]
pub struct RequestCtx {
    /// 客户端 IP（取自 X-Forwarded-For 的第一项）
    pub client_ip: Option<String>,

    /// 请求来源（Origin 头，仅用于日志显示）
    pub origin: Option<String>,
}

impl RequestCtx {
    /// 创建新的请求上下文
    pub fn new(forwarded_for: Option<&str>, origin: Option<&str>) -> Self {
        let client_ip = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(String::from);

        Self {
            client_ip,
            origin: origin.map(String::from),
        }
    }
}

impl Display for RequestCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[IP#{} 来源#{}]",
            self.client_ip.as_deref().unwrap_or("-"),
            self.origin.as_deref().unwrap_or("-")
        )
    }
}
