use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::present;

/// 单道题的批改结果
///
/// 所有字段保留原始 JSON 值，缺失的字段输出时仍然缺失。
/// 只有能对应到题目的结果才会改写 `score`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub qid: Option<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub score: Option<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub key_points_hit: Option<Value>,

    /// 模型额外返回的字段
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 整批批改结果，即 200 响应体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    /// 外层 `None` 表示没有 `results` 字段，`Some(None)` 表示 `"results": null`
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub results: Option<Option<Vec<GradeResult>>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GradeReport {
    /// 解析模型输出的 JSON 文本
    ///
    /// 顶层必须是对象，`results` 若存在必须是对象数组或 null
    pub fn parse(json_text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_text)
    }

    /// 所有结果条目，没有时为空
    pub fn results(&self) -> &[GradeResult] {
        match &self.results {
            Some(Some(results)) => results.as_slice(),
            _ => &[],
        }
    }

    pub fn results_mut(&mut self) -> &mut [GradeResult] {
        match &mut self.results {
            Some(Some(results)) => results.as_mut_slice(),
            _ => &mut [],
        }
    }
}
