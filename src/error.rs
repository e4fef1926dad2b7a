use serde_json::{json, Value};
use thiserror::Error;

/// 应用程序错误类型
///
/// 每个变体对应一类失败，并自带 HTTP 状态码和响应体，
/// 服务层只负责转换，不再做判断。
#[derive(Debug, Error)]
pub enum AppError {
    /// 请求体缺少 Turnstile token
    #[error("缺少 Turnstile token")]
    MissingToken,

    /// submissions 缺失、不是数组或为空
    #[error("缺少 submissions")]
    EmptyBatch,

    /// submissions 中存在非对象元素
    #[error("第 {index} 个 submission 不是对象")]
    InvalidSubmission { index: usize },

    /// 必需的环境变量未配置
    #[error("环境变量 {var_name} 未配置")]
    MissingConfig { var_name: String },

    /// Turnstile 校验未通过
    #[error("Turnstile 校验未通过")]
    ChallengeRejected { verify: Value },

    /// 上游服务返回非成功状态，或网络/响应格式错误
    #[error("{service} 上游错误 (status: {status:?}): {detail}")]
    Upstream {
        service: String,
        status: Option<u16>,
        detail: String,
    },

    /// 上游请求超时
    #[error("{service} 请求超时 ({timeout_secs} 秒)")]
    UpstreamTimeout { service: String, timeout_secs: u64 },

    /// 模型输出无法解析为评分 JSON
    #[error("{service} 返回内容无法解析为 JSON: {parse_error}")]
    MalformedResult {
        service: String,
        text: String,
        json_text: String,
        parse_error: String,
    },

    /// 兜底错误
    #[error("{0}")]
    Unexpected(String),
}

impl AppError {
    /// 创建配置缺失错误
    pub fn missing_config(var_name: impl Into<String>) -> Self {
        AppError::MissingConfig {
            var_name: var_name.into(),
        }
    }

    /// 创建上游错误
    pub fn upstream(service: impl Into<String>, status: Option<u16>, detail: impl Into<String>) -> Self {
        AppError::Upstream {
            service: service.into(),
            status,
            detail: detail.into(),
        }
    }

    /// 将 reqwest 的传输层错误转换为上游错误
    ///
    /// 超时单独归类，其余一律视为上游不可用
    pub fn from_transport(service: &str, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::UpstreamTimeout {
                service: service.to_string(),
                timeout_secs,
            }
        } else {
            AppError::upstream(service, err.status().map(|s| s.as_u16()), err.to_string())
        }
    }

    /// HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::MissingToken | AppError::ChallengeRejected { .. } => 403,
            AppError::EmptyBatch | AppError::InvalidSubmission { .. } => 400,
            AppError::MissingConfig { .. } | AppError::Unexpected(_) => 500,
            AppError::Upstream { .. }
            | AppError::UpstreamTimeout { .. }
            | AppError::MalformedResult { .. } => 502,
        }
    }

    /// 返回给调用方的 JSON 响应体
    pub fn to_body(&self) -> Value {
        match self {
            AppError::MissingToken => json!({ "error": "Missing Turnstile token" }),
            AppError::EmptyBatch => json!({ "error": "Missing submissions" }),
            AppError::InvalidSubmission { index } => {
                json!({ "error": "Invalid submission", "index": index })
            }
            AppError::MissingConfig { var_name } => {
                json!({ "error": format!("Missing env {}", var_name) })
            }
            AppError::ChallengeRejected { verify } => {
                json!({ "error": "Turnstile not passed", "verify": verify })
            }
            AppError::Upstream {
                service,
                status,
                detail,
            } => json!({
                "error": format!("{} error", service),
                "status": status,
                "detail": detail,
            }),
            AppError::UpstreamTimeout {
                service,
                timeout_secs,
            } => json!({
                "error": format!("{} error", service),
                "status": Value::Null,
                "detail": format!("request timed out after {}s", timeout_secs),
            }),
            AppError::MalformedResult {
                service,
                text,
                json_text,
                parse_error,
            } => json!({
                "error": format!("{} returned non-JSON", service),
                "detail": {
                    "text": text,
                    "jsonText": json_text,
                    "parseError": parse_error,
                },
            }),
            AppError::Unexpected(message) => {
                json!({ "error": "Server error", "message": message })
            }
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
