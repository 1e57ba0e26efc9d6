//! Homework grading: turn a photo of a worksheet into per-question verdicts and a letter grade.

pub mod acquire;
pub mod compress;
pub mod grader;
pub mod model;
pub mod parse;
pub mod prompt;
pub mod service;
pub mod types;
pub mod validate;

pub use acquire::ImageAcquirer;
pub use model::{ModelConfig, OpenAiCompatibleClient, VisionModel};
pub use service::{GradeRequest, GradingService, ImageSource};
pub use types::*;
pub use validate::{classify, is_http_url, validate_base64, InputKind};
