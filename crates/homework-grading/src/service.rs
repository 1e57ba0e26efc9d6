//! The grading pipeline: acquire → compress → prompt → model → parse → aggregate.

use std::sync::Arc;

use crate::acquire::ImageAcquirer;
use crate::compress::{compress_image, COMPRESS_THRESHOLD_KB};
use crate::grader::build_response;
use crate::model::VisionModel;
use crate::parse::parse_model_reply;
use crate::prompt::build_messages;
use crate::types::{
    CanonicalImage, GradingError, GradingResponse, HomeworkResult, Question, Submission,
};

pub const DEFAULT_SUBJECT: &str = "自动识别";
pub const DEFAULT_STUDENT_NAME: &str = "学生";

/// Where the homework image comes from. Exactly one source per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Data-URI or bare base64.
    Base64(String),
    /// Absolute http(s) URL.
    Url(String),
}

/// One grading request, already validated at the tool boundary.
#[derive(Debug, Clone)]
pub struct GradeRequest {
    pub source: ImageSource,
    pub subject: String,
    pub student_name: String,
    pub questions: Option<Vec<Question>>,
}

impl GradeRequest {
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            subject: DEFAULT_SUBJECT.to_string(),
            student_name: DEFAULT_STUDENT_NAME.to_string(),
            questions: None,
        }
    }
}

/// Runs submissions through the model and aggregates the outcome.
pub struct GradingService {
    acquirer: ImageAcquirer,
    model: Option<Arc<dyn VisionModel>>,
}

impl GradingService {
    /// `model` is `None` when no credential is configured; every call then
    /// fails with [`GradingError::MissingApiKey`].
    pub fn new(acquirer: ImageAcquirer, model: Option<Arc<dyn VisionModel>>) -> Self {
        Self { acquirer, model }
    }

    /// Grade one request. Every failure is wrapped in [`GradingError::Failed`].
    pub async fn grade(&self, request: GradeRequest) -> HomeworkResult<GradingResponse> {
        self.grade_inner(request)
            .await
            .map_err(|e| GradingError::Failed(Box::new(e)))
    }

    async fn grade_inner(&self, request: GradeRequest) -> HomeworkResult<GradingResponse> {
        let model = self.model.as_ref().ok_or(GradingError::MissingApiKey)?;
        validate_labels(&request)?;

        let image = self.acquire(&request.source).await?;
        let image = compress_image(image, COMPRESS_THRESHOLD_KB);

        let submission = Submission::new(
            request.student_name,
            request.subject,
            image,
            request.questions,
        );
        tracing::info!(
            "开始批改{}的{}作业 (submission {})",
            submission.student_name,
            submission.subject,
            submission.id
        );

        let messages = build_messages(&submission);
        let reply = model.complete(&messages).await?;
        let results = parse_model_reply(&reply)?;

        Ok(build_response(submission.id, results))
    }

    async fn acquire(&self, source: &ImageSource) -> HomeworkResult<CanonicalImage> {
        match source {
            ImageSource::Base64(data) => self.acquirer.from_base64(data),
            ImageSource::Url(url) => self.acquirer.from_url(url).await,
        }
    }

    /// Grade requests one after another, keeping only the successes.
    pub async fn grade_batch(&self, requests: Vec<GradeRequest>) -> Vec<GradingResponse> {
        let count = requests.len();
        tracing::info!("开始批量批改 {count} 份作业");

        let mut responses = Vec::with_capacity(count);
        let mut failures = 0usize;
        for (i, request) in requests.into_iter().enumerate() {
            let student = request.student_name.clone();
            match self.grade(request).await {
                Ok(response) => {
                    tracing::info!("第 {}/{count} 份作业批改完成", i + 1);
                    responses.push(response);
                }
                Err(e) => {
                    failures += 1;
                    tracing::error!("第 {} 份作业({student})批改失败: {e}", i + 1);
                }
            }
        }

        if failures > 0 {
            tracing::warn!("批量批改完成，其中 {failures} 份作业批改失败");
        } else {
            tracing::info!("批量批改完成，所有 {} 份作业都成功批改", responses.len());
        }
        responses
    }
}

fn validate_labels(request: &GradeRequest) -> HomeworkResult<()> {
    if request.student_name.trim().is_empty() {
        return Err(GradingError::ValidationFailed("学生姓名不能为空".to_string()));
    }
    if request.subject.trim().is_empty() {
        return Err(GradingError::ValidationFailed("作业科目不能为空".to_string()));
    }
    Ok(())
}
