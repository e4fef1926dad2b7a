//! 批改流程 - 流程层
//!
//! 核心职责：定义"一批题目"的完整处理流程
//!
//! 流程顺序：
//! 1. 检查 token / submissions / 密钥（不发任何网络请求）
//! 2. Turnstile 校验（整批一次）
//! 3. 调用模型
//! 4. 提取 JSON → 解析
//! 5. 按满分截断分数
//!
//! 任一步失败立即结束，不返回部分结果，也不重试。

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::clients::{ChallengeVerifier, CompletionProvider};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{GradeReport, GradeRequest};
use crate::services::extractor::extract_reply;
use crate::services::normalizer::normalize;
use crate::services::prompt::rubric_prompt;
use crate::utils::logging::truncate_text;
use crate::workflow::request_ctx::RequestCtx;

/// 批改流程
///
/// - 只依赖校验与模型两个接口，不关心具体实现
/// - 不持有任何跨请求的可变状态
pub struct GradeFlow {
    verifier: Arc<dyn ChallengeVerifier>,
    provider: Arc<dyn CompletionProvider>,
    turnstile_secret: Option<String>,
    rubric: String,
}

impl GradeFlow {
    /// 创建新的批改流程
    pub fn new(
        config: &Config,
        verifier: Arc<dyn ChallengeVerifier>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            verifier,
            provider,
            turnstile_secret: config.turnstile_secret.clone(),
            rubric: rubric_prompt(config.rubric_prompt.as_deref()).to_string(),
        }
    }

    pub async fn run(&self, body: &Value, ctx: &RequestCtx) -> AppResult<GradeReport> {
        // ========== 前置检查 ==========
        let request = GradeRequest::from_body(body)?;
        let batch = &request.submissions;

        let secret = self
            .turnstile_secret
            .as_deref()
            .ok_or_else(|| AppError::missing_config("TURNSTILE_SECRET"))?;
        if !self.provider.is_configured() {
            return Err(AppError::missing_config(self.provider.api_key_var()));
        }

        info!("{} 📥 收到 {} 道题目", ctx, batch.len());

        // ========== 1. Turnstile 校验 ==========
        let outcome = self
            .verifier
            .verify(secret, &request.turnstile_token, ctx.client_ip.as_deref())
            .await?;
        if !outcome.success {
            warn!("{} ⚠️ Turnstile 校验未通过", ctx);
            return Err(AppError::ChallengeRejected {
                verify: outcome.payload,
            });
        }

        // ========== 2. 调用模型 ==========
        info!("{} 🤖 正在调用 {} 批改...", ctx, self.provider.name());
        let reply = self.provider.complete(&self.rubric, batch).await?;

        // ========== 3. 提取并解析 JSON ==========
        let extracted = extract_reply(&reply);
        let mut report = match GradeReport::parse(&extracted.json_text) {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    "{} ⚠️ {} 返回内容无法解析: {} | {}",
                    ctx,
                    self.provider.name(),
                    e,
                    truncate_text(&extracted.text, 120)
                );
                return Err(AppError::MalformedResult {
                    service: self.provider.name().to_string(),
                    text: extracted.text,
                    json_text: extracted.json_text,
                    parse_error: e.to_string(),
                });
            }
        };

        // ========== 4. 截断分数 ==========
        let stats = normalize(&mut report, batch);
        if stats.unmatched > 0 {
            warn!("{} ⚠️ {} 条结果找不到对应题目，分数未截断", ctx, stats.unmatched);
        }

        info!(
            "{} ✓ 批改完成: {} 条结果，{} 条分数被修正",
            ctx,
            report.results().len(),
            stats.clamped
        );

        Ok(report)
    }
}
