/// Gemini API 客户端
///
/// 调用 generateContent，评分标准与题目作为同一条用户消息的两个文本片段发送，
/// 回复是自由文本，需要再做 JSON 提取。
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::clients::provider::{CompletionProvider, RawReply};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::Submission;
use crate::services::prompt::{batch_payload, DATA_LABEL};
use crate::utils::logging::truncate_text;

const SERVICE: &str = "Gemini";

/// Gemini 客户端
pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    model_name: String,
    temperature: f64,
    max_output_tokens: u32,
    timeout_secs: u64,
}

impl GeminiClient {
    /// 创建新的 Gemini 客户端
    pub fn new(config: &Config, http: Client) -> Self {
        Self {
            http,
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model_name: config.gemini_model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            timeout_secs: config.upstream_timeout_secs,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model_name
        )
    }

    fn build_body(&self, rubric: &str, batch: &[Submission]) -> Value {
        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [
                        { "text": rubric },
                        { "text": format!("{}{}", DATA_LABEL, batch_payload(batch)) }
                    ]
                }
            ],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens
            }
        })
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    fn name(&self) -> &str {
        SERVICE
    }

    fn api_key_var(&self) -> &str {
        "GEMINI_API_KEY"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, rubric: &str, batch: &[Submission]) -> AppResult<RawReply> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::missing_config(self.api_key_var()))?;

        debug!("调用 Gemini API，模型: {}，题目数: {}", self.model_name, batch.len());

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
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
                "Gemini API 返回错误 ({}): {}",
                status,
                truncate_text(&raw, 300)
            );
            return Err(AppError::upstream(SERVICE, Some(status.as_u16()), raw));
        }

        let data: Value = serde_json::from_str(&raw).map_err(|e| {
            warn!("Gemini 响应不是合法 JSON: {}", e);
            AppError::upstream(SERVICE, Some(status.as_u16()), raw.clone())
        })?;

        let text = candidate_text(&data);
        debug!("Gemini API 调用成功，回复长度: {} 字符", text.len());

        Ok(RawReply::FreeText(text))
    }
}

/// 拼接第一个候选回复的全部文本片段
fn candidate_text(data: &Value) -> String {
    data.pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .map(|p| p.get("text").and_then(Value::as_str).unwrap_or(""))
                .collect::<String>()
        })
        .unwrap_or_default()
}
