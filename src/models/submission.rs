use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::models::{coerce_field, present};

/// 单道待批改的题目
///
/// 除 `qid` 与 `points` 外，其余字段（prompt、solutionKey、rubric 等）
/// 原样透传给模型，不做任何修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// 批次内题目编号，缺失时为 `None`
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub qid: Option<Value>,

    /// 满分，缺失时为 `None`
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub points: Option<Value>,

    /// 题目上下文
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

impl Submission {
    /// 题号的数值形式，缺失时为 NaN
    pub fn qid_number(&self) -> f64 {
        coerce_field(self.qid.as_ref())
    }

    /// 满分的数值形式，缺失或无法转换时为 NaN，显式的 null 为 0
    pub fn max_points(&self) -> f64 {
        coerce_field(self.points.as_ref())
    }
}

/// 批改请求
#[derive(Debug, Clone)]
pub struct GradeRequest {
    pub turnstile_token: String,
    pub submissions: Vec<Submission>,
}

impl GradeRequest {
    /// 从请求体解析批改请求
    ///
    /// 校验顺序：先 token，后 submissions
    pub fn from_body(body: &Value) -> AppResult<Self> {
        let turnstile_token = body
            .get("turnstileToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::MissingToken)?
            .to_string();

        let items = body
            .get("submissions")
            .and_then(Value::as_array)
            .filter(|items| !items.is_empty())
            .ok_or(AppError::EmptyBatch)?;

        let submissions = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                if !item.is_object() {
                    return Err(AppError::InvalidSubmission { index });
                }
                serde_json::from_value::<Submission>(item.clone())
                    .map_err(|_| AppError::InvalidSubmission { index })
            })
            .collect::<AppResult<Vec<Submission>>>()?;

        Ok(Self {
            turnstile_token,
            submissions,
        })
    }
}

/// 按宽松规则把 JSON 值转换为数字
///
/// - null / 空字符串 / 空数组 → 0
/// - 布尔值 → 1 或 0
/// - 字符串按十进制、`0x`/`0o`/`0b` 前缀或 `Infinity` 解析
/// - 其他情况 → NaN
pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_numeric_str(s),
        Value::Array(items) if items.is_empty() => 0.0,
        Value::Array(items) if items.len() == 1 => match &items[0] {
            Value::Number(_) | Value::String(_) | Value::Null => coerce_number(&items[0]),
            _ => f64::NAN,
        },
        _ => f64::NAN,
    }
}

fn parse_numeric_str(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }

    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix = match t.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&t[2..], radix)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }

    // Rust 额外接受 "inf"/"nan" 等写法，这里排除
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }

    t.parse::<f64>().unwrap_or(f64::NAN)
}
