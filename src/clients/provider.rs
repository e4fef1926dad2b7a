//! 模型服务商统一接口
//!
//! 批改流程只依赖 [`CompletionProvider`]，不关心具体是哪家服务。

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::clients::{GeminiClient, OpenAiClient};
use crate::config::{Config, ProviderKind};
use crate::error::AppResult;
use crate::models::Submission;

/// 模型的原始回复
#[derive(Debug, Clone, PartialEq)]
pub enum RawReply {
    /// 自由文本，可能夹带 markdown 代码块或前后缀说明
    FreeText(String),
    /// 结构化输出的完整响应信封
    Structured(Value),
}

/// 模型服务商
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// 服务名称，用于错误信息
    fn name(&self) -> &str;

    /// API 密钥对应的环境变量名
    fn api_key_var(&self) -> &str;

    /// 是否已配置 API 密钥
    fn is_configured(&self) -> bool;

    /// 发送评分标准和整批题目，返回原始回复
    async fn complete(&self, rubric: &str, batch: &[Submission]) -> AppResult<RawReply>;
}

/// 按配置创建模型服务商
pub fn build_provider(config: &Config, http: Client) -> Arc<dyn CompletionProvider> {
    match config.provider {
        ProviderKind::Gemini => Arc::new(GeminiClient::new(config, http)),
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(config, http)),
    }
}
