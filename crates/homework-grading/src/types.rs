//! Core data types for submissions, grading results, and errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Points a question is worth when the caller does not say otherwise.
pub const DEFAULT_QUESTION_POINTS: u32 = 5;

/// Kind of question on the homework sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Choice,
    Fill,
    Essay,
    Calculation,
}

/// Optional hint describing one question, forwarded to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_answer: Option<String>,
    #[serde(default = "default_points")]
    pub points: u32,
}

fn default_points() -> u32 {
    DEFAULT_QUESTION_POINTS
}

/// An accepted image, held as a `data:<mediaType>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalImage {
    media_type: String,
    data_uri: String,
}

impl CanonicalImage {
    pub fn new(media_type: impl Into<String>, payload: &str) -> Self {
        let media_type = media_type.into();
        let data_uri = format!("data:{media_type};base64,{payload}");
        Self {
            media_type,
            data_uri,
        }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    /// The base64 payload without its `data:…;base64,` prefix.
    pub fn payload(&self) -> &str {
        crate::validate::strip_data_uri_prefix(&self.data_uri)
    }

    /// Approximate decoded size in bytes.
    pub fn approx_decoded_len(&self) -> usize {
        self.data_uri.len() * 3 / 4
    }
}

/// A single homework submission, alive for one tool invocation.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: Uuid,
    pub student_name: String,
    pub subject: String,
    pub image: CanonicalImage,
    pub questions: Option<Vec<Question>>,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(
        student_name: impl Into<String>,
        subject: impl Into<String>,
        image: CanonicalImage,
        questions: Option<Vec<Question>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_name: student_name.into(),
            subject: subject.into(),
            image,
            questions,
            submitted_at: Utc::now(),
        }
    }
}

/// Per-question verdict, coerced from the model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    pub question_id: String,
    pub question_content: String,
    pub is_correct: bool,
    pub student_answer: String,
    pub correct_answer: String,
    pub explanation: String,
    pub score: f64,
    pub max_score: f64,
    pub feedback: String,
}

/// Letter grade assigned by percentage band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Lower bounds are inclusive: 90 → A, 89.999 → B.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 90.0 {
            Grade::A
        } else if percentage >= 80.0 {
            Grade::B
        } else if percentage >= 70.0 {
            Grade::C
        } else if percentage >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn from_scores(total: f64, max_total: f64) -> Self {
        Self::from_percentage(percentage(total, max_total))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `total / max_total · 100`, or 0 when nothing was gradable.
pub fn percentage(total: f64, max_total: f64) -> f64 {
    if max_total > 0.0 {
        total / max_total * 100.0
    } else {
        0.0
    }
}

/// Aggregated outcome for one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResponse {
    pub submission_id: Uuid,
    pub total_score: f64,
    pub max_total_score: f64,
    pub grade: Grade,
    pub results: Vec<GradingResult>,
    pub overall_feedback: String,
    pub graded_at: DateTime<Utc>,
}

/// Render a score the way a person writes it: `5`, `3.5`.
pub fn format_score(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Errors that can occur while grading a submission.
#[derive(thiserror::Error, Debug)]
pub enum GradingError {
    #[error("{0}")]
    ValidationFailed(String),

    #[error("图片格式不正确：{0}")]
    BadBase64(String),

    #[error("图片下载失败: {status} {status_text}")]
    DownloadFailed { status: u16, status_text: String },

    #[error("图片下载超时，请检查网络连接或稍后重试")]
    DownloadTimeout,

    #[error("图片URL无法访问: {0}，请检查网络连接和URL有效性")]
    DownloadUnreachable(String),

    #[error("URL返回的内容不是图片格式: {0}")]
    WrongContentType(String),

    #[error("图片文件过大（{size_mb:.2}MB），请使用小于10MB的图片")]
    ImageTooLarge { size_mb: f64 },

    #[error("MODELSCOPE_API_KEY 环境变量未设置")]
    MissingApiKey,

    #[error("模型调用失败: {0}")]
    ModelCallFailed(String),

    #[error("模型调用失败: 模型返回内容为空")]
    EmptyModelReply,

    #[error("解析失败: {0}")]
    ParseFailed(String),

    #[error("解析失败: {0}")]
    BadShape(String),

    #[error("批改失败: {0}")]
    Failed(Box<GradingError>),
}

/// Convenience result type.
pub type HomeworkResult<T> = Result<T, GradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(Grade::from_percentage(89.999), Grade::B);
        assert_eq!(Grade::from_percentage(90.0), Grade::A);
        assert_eq!(Grade::from_percentage(79.999), Grade::C);
        assert_eq!(Grade::from_percentage(80.0), Grade::B);
        assert_eq!(Grade::from_percentage(69.999), Grade::D);
        assert_eq!(Grade::from_percentage(70.0), Grade::C);
        assert_eq!(Grade::from_percentage(59.999), Grade::F);
        assert_eq!(Grade::from_percentage(60.0), Grade::D);
    }

    #[test]
    fn test_grade_empty_totals() {
        assert_eq!(Grade::from_scores(0.0, 0.0), Grade::F);
        assert_eq!(percentage(3.0, 0.0), 0.0);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(5.0), "5");
        assert_eq!(format_score(3.5), "3.5");
        assert_eq!(format_score(0.0), "0");
    }

    #[test]
    fn test_question_defaults_points() {
        let q: Question = serde_json::from_value(serde_json::json!({
            "id": "1",
            "type": "choice",
            "content": "1+1=?"
        }))
        .unwrap();
        assert_eq!(q.points, DEFAULT_QUESTION_POINTS);
        assert!(q.standard_answer.is_none());
    }

    #[test]
    fn test_error_messages() {
        let err = GradingError::Failed(Box::new(GradingError::DownloadFailed {
            status: 404,
            status_text: "Not Found".to_string(),
        }));
        assert_eq!(err.to_string(), "批改失败: 图片下载失败: 404 Not Found");
        let err = GradingError::ImageTooLarge { size_mb: 10.5 };
        assert_eq!(err.to_string(), "图片文件过大（10.50MB），请使用小于10MB的图片");
    }

    #[test]
    fn test_canonical_image_payload() {
        let img = CanonicalImage::new("image/png", "iVBORw0KGgo=");
        assert_eq!(img.data_uri(), "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(img.payload(), "iVBORw0KGgo=");
        assert_eq!(img.media_type(), "image/png");
    }
}
