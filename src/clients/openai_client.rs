/// OpenAI Responses API 客户端
///
/// 使用 system + user 两条消息，并通过 JSON Schema 约束输出结构，
/// 回复信封中的 message 条目即为评分 JSON。
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::clients::provider::{CompletionProvider, RawReply};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::Submission;
use crate::services::prompt::{batch_payload, result_schema};
use crate::utils::logging::truncate_text;

const SERVICE: &str = "OpenAI";

/// OpenAI 客户端
pub struct OpenAiClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    model_name: String,
    temperature: f64,
    max_output_tokens: u32,
    timeout_secs: u64,
}

impl OpenAiClient {
    /// 创建新的 OpenAI 客户端
    pub fn new(config: &Config, http: Client) -> Self {
        Self {
            http,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model_name: config.openai_model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timeout_secs: config.upstream_timeout_secs,
        }
    }

    fn build_body(&self, rubric: &str, batch: &[Submission]) -> Value {
        json!({
            "model": self.model_name,
            "input": [
                { "role": "system", "content": rubric },
                { "role": "user", "content": batch_payload(batch) }
            ],
            "temperature": self.temperature,
            "max_output_tokens": self.max_output_tokens,
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": "grade_results",
                    "strict": true,
                    "schema": result_schema()
                }
            }
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    fn name(&self) -> &str {
        SERVICE
    }

    fn api_key_var(&self) -> &str {
        "OPENAI_API_KEY"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, rubric: &str, batch: &[Submission]) -> AppResult<RawReply> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::missing_config(self.api_key_var()))?;

        debug!("调用 OpenAI API，模型: {}，题目数: {}", self.model_name, batch.len());

        let response = self
            .http
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(api_key)
            .json(&self.build_body(rubric, batch))
            .send()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, self.timeout_secs, e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, self.timeout_secs, e))?;

        if !status.is_success() {
            warn!(
                "OpenAI API 返回错误 ({}): {}",
                status,
                truncate_text(&raw, 300)
            );
            return Err(AppError::upstream(SERVICE, Some(status.as_u16()), raw));
        }

        let envelope: Value = serde_json::from_str(&raw).map_err(|e| {
            warn!("OpenAI 响应不是合法 JSON: {}", e);
            AppError::upstream(SERVICE, Some(status.as_u16()), raw.clone())
        })?;

        if let Some(state) = envelope.get("status").and_then(Value::as_str) {
            if state != "completed" {
                warn!("OpenAI 响应状态为 {}，输出可能不完整", state);
            }
        }

        debug!("OpenAI API 调用成功");

        Ok(RawReply::Structured(envelope))
    }
}
