pub mod gemini_client;
pub mod openai_client;
pub mod provider;
pub mod turnstile_client;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

pub use gemini_client::GeminiClient;
pub use openai_client::OpenAiClient;
pub use provider::{build_provider, CompletionProvider, RawReply};
pub use turnstile_client::{ChallengeVerifier, TurnstileClient, VerificationOutcome};

/// 创建所有上游共用的 HTTP 客户端，每个请求都带超时
pub fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("无法创建 HTTP 客户端")
}
