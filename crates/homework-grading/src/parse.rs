//! Model reply parsing and coercion into [`GradingResult`] records.
//!
//! The reply is untrusted free text. The span from the first `{` to the last
//! `}` is parsed as JSON, and every element of its `results` array becomes
//! one record. Missing or mistyped fields fall back to defaults; no element
//! is dropped.

use serde_json::Value;

use crate::types::{format_score, GradingError, GradingResult, HomeworkResult};

/// Max score assumed when the model gives none.
pub const DEFAULT_MAX_SCORE: f64 = 5.0;

/// Parse a free-text model reply into grading records.
pub fn parse_model_reply(content: &str) -> HomeworkResult<Vec<GradingResult>> {
    let parsed = extract_json(content)?;
    let results = parsed
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| GradingError::BadShape("JSON格式不正确，缺少results字段".to_string()))?;

    let records = results
        .iter()
        .enumerate()
        .map(|(i, r)| coerce_result(r, i))
        .collect::<Vec<_>>();

    tracing::info!("作业批改完成，共批改 {} 道题", records.len());
    Ok(records)
}

/// Parse the greedy `{ … }` span of `content`.
pub fn extract_json(content: &str) -> HomeworkResult<Value> {
    let span = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if end > start => &content[start..=end],
        _ => {
            return Err(GradingError::ParseFailed(
                "无法从模型返回内容中提取JSON".to_string(),
            ))
        }
    };

    serde_json::from_str(span).map_err(|e| GradingError::ParseFailed(e.to_string()))
}

/// Coerce one element of `results` (0-based `index`) to the typed shape.
pub fn coerce_result(r: &Value, index: usize) -> GradingResult {
    let n = index + 1;

    let question_id = truthy_field(r, "questionId")
        .map(to_text)
        .unwrap_or_else(|| format!("question_{n}"));
    let question_content = truthy_field(r, "questionContent")
        .or_else(|| truthy_field(r, "question"))
        .map(to_text)
        .unwrap_or_else(|| format!("第{n}题"));

    let max_score = to_number(r.get("maxScore"))
        .filter(|v| *v > 0.0)
        .unwrap_or(DEFAULT_MAX_SCORE);
    let score = to_number(r.get("score"))
        .unwrap_or(0.0)
        .clamp(0.0, max_score);

    GradingResult {
        question_id,
        question_content,
        is_correct: r.get("isCorrect").is_some_and(is_truthy),
        student_answer: text_field(r, "studentAnswer"),
        correct_answer: text_field(r, "correctAnswer"),
        explanation: text_field(r, "explanation"),
        score,
        max_score,
        feedback: text_field(r, "feedback"),
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn truthy_field<'a>(r: &'a Value, key: &str) -> Option<&'a Value> {
    r.get(key).filter(|v| is_truthy(v))
}

fn text_field(r: &Value, key: &str) -> String {
    truthy_field(r, key).map(to_text).unwrap_or_default()
}

fn to_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => format_score(f),
            None => n.to_string(),
        },
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => v.to_string(),
    }
}

/// Numeric value of a field; `None` when absent, zero or not a number.
fn to_number(v: Option<&Value>) -> Option<f64> {
    let f = match v? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        Value::Bool(true) => 1.0,
        _ => return None,
    };
    (f.is_finite() && f != 0.0).then_some(f)
}
