//! 分数归一化 - 业务能力层
//!
//! 不论模型给出什么分数，只要结果能对应到批次内的题目，
//! 最终分数一定落在 `[0, points]` 区间内。

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::models::{coerce_field, GradeReport, Submission};

/// 归一化统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    /// 分数被改写的条目数
    pub clamped: usize,
    /// 找不到对应题目的条目数
    pub unmatched: usize,
}

/// 按题目满分截断每条结果的分数
///
/// - 题号和满分都按宽松规则转为数字
/// - 同一题号出现多次时，以最后一次的满分为准
/// - 满分不是有限数（包括缺失）的题目不参与截断
/// - 结果条目不会被增删或重排，除 `score` 外不改动任何字段
pub fn normalize(report: &mut GradeReport, batch: &[Submission]) -> NormalizeStats {
    let max_by_id: HashMap<u64, f64> = batch
        .iter()
        .map(|s| (qid_key(s.qid_number()), s.max_points()))
        .collect();

    let mut stats = NormalizeStats::default();

    for result in report.results_mut() {
        let max = match max_by_id.get(&qid_key(coerce_field(result.qid.as_ref()))) {
            Some(max) if max.is_finite() => *max,
            _ => {
                stats.unmatched += 1;
                continue;
            }
        };

        let raw = coerce_field(result.score.as_ref());
        let score = if raw.is_nan() { 0.0 } else { raw };
        let clamped = number_value(score.min(max).max(0.0));

        if result.score.as_ref() != Some(&clamped) {
            debug!(
                "qid {:?} 分数 {:?} → {} (满分 {})",
                result.qid, result.score, clamped, max
            );
            stats.clamped += 1;
        }
        result.score = Some(clamped);
    }

    stats
}

/// 题号的哈希键：+0/-0 视为同一题，所有 NaN 视为同一题
fn qid_key(qid: f64) -> u64 {
    if qid.is_nan() {
        f64::NAN.to_bits()
    } else if qid == 0.0 {
        0.0f64.to_bits()
    } else {
        qid.to_bits()
    }
}

/// 整数值输出为 JSON 整数，其余输出为浮点数
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}
