/// Turnstile 校验客户端
///
/// 每批请求只校验一次，结果以 `success` 字段为准
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::utils::logging::truncate_text;

const SERVICE: &str = "Turnstile";

/// 校验结果
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    /// 是否通过
    pub success: bool,
    /// 校验服务返回的原始内容
    pub payload: Value,
}

impl VerificationOutcome {
    /// 从校验服务的响应构建，只有 `success == true` 才算通过
    pub fn from_payload(payload: Value) -> Self {
        let success = payload.get("success").and_then(Value::as_bool) == Some(true);
        Self { success, payload }
    }
}

/// 人机校验
#[async_trait]
pub trait ChallengeVerifier: Send + Sync {
    async fn verify(
        &self,
        secret: &str,
        token: &str,
        client_ip: Option<&str>,
    ) -> AppResult<VerificationOutcome>;
}

/// Turnstile 客户端
pub struct TurnstileClient {
    http: Client,
    verify_url: String,
    timeout_secs: u64,
}

impl TurnstileClient {
    /// 创建新的 Turnstile 客户端
    pub fn new(config: &Config, http: Client) -> Self {
        Self {
            http,
            verify_url: config.turnstile_verify_url.clone(),
            timeout_secs: config.upstream_timeout_secs,
        }
    }
}

#[async_trait]
impl ChallengeVerifier for TurnstileClient {
    async fn verify(
        &self,
        secret: &str,
        token: &str,
        client_ip: Option<&str>,
    ) -> AppResult<VerificationOutcome> {
        let mut form = vec![("secret", secret), ("response", token)];
        if let Some(ip) = client_ip {
            form.push(("remoteip", ip));
        }

        debug!("正在校验 Turnstile token");

        let response = self
            .http
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, self.timeout_secs, e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, self.timeout_secs, e))?;

        if !status.is_success() {
            warn!("Turnstile 返回错误 ({}): {}", status, truncate_text(&raw, 300));
            return Err(AppError::upstream(SERVICE, Some(status.as_u16()), raw));
        }

        let payload: Value = serde_json::from_str(&raw)
            .map_err(|_| AppError::upstream(SERVICE, Some(status.as_u16()), raw.clone()))?;

        Ok(VerificationOutcome::from_payload(payload))
    }
}
