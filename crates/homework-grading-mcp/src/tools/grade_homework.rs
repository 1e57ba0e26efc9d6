//! Tool: grade_homework. Grades a photographed homework sheet.

use serde::Deserialize;
use serde_json::{json, Value};

use homework_grading::{
    classify, format_score, is_http_url, GradeRequest, GradingResponse, GradingService,
    ImageSource, InputKind, Question,
};

use crate::types::{McpResult, ToolCallResult, ToolDefinition};

pub const TOOL_NAME: &str = "grade_homework";

const FAILURE_PREFIX: &str = "❌ 作业批改失败：";

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: TOOL_NAME.to_string(),
        description: Some(
            "📝 智能批改学生作业图片，支持Base64和URL两种方式，自动识别题目并给出评分和解析"
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "imageData": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Base64编码的作业图片数据（支持PNG、JPG、JPEG格式），与imageUrl二选一"
                },
                "imageUrl": {
                    "type": "string",
                    "format": "uri",
                    "description": "作业图片的URL地址，与imageData二选一"
                },
                "subject": {
                    "type": "string",
                    "description": "作业科目，默认自动识别"
                },
                "studentName": {
                    "type": "string",
                    "description": "学生姓名，默认\"学生\""
                },
                "questions": {
                    "type": "array",
                    "description": "可选的题目列表，帮助模型对照批改",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "type": { "type": "string", "enum": ["choice", "fill", "essay", "calculation"] },
                            "content": { "type": "string" },
                            "standardAnswer": { "type": "string" },
                            "points": { "type": "integer", "default": 5 }
                        },
                        "required": ["id", "type", "content"]
                    }
                }
            },
            "oneOf": [
                { "required": ["imageData"] },
                { "required": ["imageUrl"] }
            ]
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GradeHomeworkParams {
    #[serde(default)]
    image_data: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    student_name: Option<String>,
    #[serde(default)]
    questions: Option<Vec<Question>>,
}

pub async fn execute(args: Value, service: &GradingService) -> McpResult<ToolCallResult> {
    let request = match parse_request(args) {
        Ok(request) => request,
        Err(message) => {
            tracing::warn!("grade_homework 参数校验失败: {message}");
            return Ok(failure(message));
        }
    };

    match service.grade(request).await {
        Ok(response) => {
            tracing::info!(
                "作业批改完成: {}/{} ({})",
                format_score(response.total_score),
                format_score(response.max_total_score),
                response.grade
            );
            Ok(ToolCallResult::text(format_reply(&response)))
        }
        Err(e) => {
            tracing::error!("作业批改失败: {e}");
            Ok(failure(e.to_string()))
        }
    }
}

fn failure(message: impl std::fmt::Display) -> ToolCallResult {
    ToolCallResult::error(format!("{FAILURE_PREFIX}{message}"))
}

/// Validate raw arguments and collapse them into a single image source.
fn parse_request(args: Value) -> Result<GradeRequest, String> {
    let params: GradeHomeworkParams =
        serde_json::from_value(args).map_err(|e| format!("参数格式不正确: {e}"))?;

    let source = match (params.image_data, params.image_url) {
        (Some(_), Some(_)) => return Err("imageData 与 imageUrl 只能提供其中一个".to_string()),
        (None, None) => return Err("必须提供图片数据（imageData或imageUrl）".to_string()),
        (Some(data), None) => image_data_source(data)?,
        (None, Some(url)) => image_url_source(url)?,
    };

    let mut request = GradeRequest::new(source);
    if let Some(subject) = params.subject {
        request.subject = subject;
    }
    if let Some(student_name) = params.student_name {
        request.student_name = student_name;
    }
    request.questions = params.questions;
    Ok(request)
}

fn image_data_source(data: String) -> Result<ImageSource, String> {
    if data.is_empty() {
        return Err("图片数据不能为空".to_string());
    }
    // Callers sometimes paste a link into imageData.
    if classify(&data) == InputKind::Url {
        tracing::info!("imageData 是URL，按URL方式下载");
        return image_url_source(data);
    }
    Ok(ImageSource::Base64(data))
}

fn image_url_source(url: String) -> Result<ImageSource, String> {
    if !is_http_url(&url) {
        return Err("请输入有效的图片URL地址".to_string());
    }
    Ok(ImageSource::Url(url))
}

/// Render a graded submission as the reply text block.
pub fn format_reply(response: &GradingResponse) -> String {
    let questions = response
        .results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let status = if r.is_correct { "正确" } else { "错误" };
            let content = if r.question_content.is_empty() {
                format!("第{}题", i + 1)
            } else {
                r.question_content.clone()
            };
            format!(
                "题号：{}\n题目：{content}\n答案：{} （{status}）\n题目解析：{}",
                i + 1,
                r.student_answer,
                r.explanation
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "✅ 作业批改完成！\n\n📊 批改结果：\n• 总分：{}/{}\n• 等级：{}\n\n📝 题目详情：\n{questions}\n\n💭 总体评价：\n{}",
        format_score(response.total_score),
        format_score(response.max_total_score),
        response.grade,
        response.overall_feedback
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graded(results: Value, total: f64, max_total: f64, grade: &str) -> GradingResponse {
        serde_json::from_value(json!({
            "submissionId": "6f1c2f4e-8d0b-4a43-9d59-2b8f4f1e2a10",
            "totalScore": total,
            "maxTotalScore": max_total,
            "grade": grade,
            "results": results,
            "overallFeedback": "中等！需要更加努力，注意细节。",
            "gradedAt": "2026-10-14T08:00:00Z"
        }))
        .unwrap()
    }

    fn result(content: &str, answer: &str, correct: bool, explanation: &str) -> Value {
        json!({
            "questionId": "q",
            "questionContent": content,
            "isCorrect": correct,
            "studentAnswer": answer,
            "correctAnswer": "",
            "explanation": explanation,
            "score": 3.5,
            "maxScore": 5,
            "feedback": ""
        })
    }

    #[test]
    fn test_definition_is_union() {
        let def = definition();
        assert_eq!(def.name, "grade_homework");
        let one_of = def.input_schema["oneOf"].as_array().unwrap();
        assert_eq!(one_of.len(), 2);
        assert_eq!(one_of[0]["required"][0], "imageData");
        assert_eq!(one_of[1]["required"][0], "imageUrl");
    }

    #[test]
    fn test_format_reply() {
        let response = graded(
            json!([
                result("1+1=?", "2", true, "加法"),
                result("", "5", false, "减法借位")
            ]),
            7.0,
            10.0,
            "C",
        );
        let text = format_reply(&response);
        assert!(text.starts_with("✅ 作业批改完成！\n\n📊 批改结果：\n• 总分：7/10\n• 等级：C\n\n📝 题目详情：\n"));
        assert!(text.contains("题号：1\n题目：1+1=?\n答案：2 （正确）\n题目解析：加法\n\n题号：2"));
        assert!(text.contains("题号：2\n题目：第2题\n答案：5 （错误）\n题目解析：减法借位"));
        assert!(text.ends_with("\n\n💭 总体评价：\n中等！需要更加努力，注意细节。"));
    }

    #[test]
    fn test_parse_defaults_labels() {
        let request = parse_request(json!({"imageData": "AAAA"})).unwrap();
        assert_eq!(request.source, ImageSource::Base64("AAAA".to_string()));
        assert_eq!(request.subject, "自动识别");
        assert_eq!(request.student_name, "学生");
        assert!(request.questions.is_none());
    }

    #[test]
    fn test_parse_optional_fields() {
        let request = parse_request(json!({
            "imageUrl": "https://example.com/hw.png",
            "subject": "数学",
            "studentName": "小明",
            "questions": [{"id": "1", "type": "fill", "content": "3×4=?"}]
        }))
        .unwrap();
        assert_eq!(request.source, ImageSource::Url("https://example.com/hw.png".to_string()));
        assert_eq!(request.subject, "数学");
        assert_eq!(request.student_name, "小明");
        assert_eq!(request.questions.unwrap()[0].points, 5);
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert_eq!(
            parse_request(json!({})).unwrap_err(),
            "必须提供图片数据（imageData或imageUrl）"
        );
        assert_eq!(
            parse_request(json!({"imageData": "AAAA", "imageUrl": "https://a.com/x.png"}))
                .unwrap_err(),
            "imageData 与 imageUrl 只能提供其中一个"
        );
        assert_eq!(parse_request(json!({"imageData": ""})).unwrap_err(), "图片数据不能为空");
        assert_eq!(
            parse_request(json!({"imageUrl": "not a url"})).unwrap_err(),
            "请输入有效的图片URL地址"
        );
        assert_eq!(
            parse_request(json!({"imageUrl": "ftp://example.com/a.png"})).unwrap_err(),
            "请输入有效的图片URL地址"
        );
        assert!(parse_request(json!({"imageData": 42}))
            .unwrap_err()
            .starts_with("参数格式不正确"));
    }

    #[test]
    fn test_url_in_image_data_is_downloaded() {
        let request = parse_request(json!({"imageData": "https://example.com/hw.jpg"})).unwrap();
        assert_eq!(request.source, ImageSource::Url("https://example.com/hw.jpg".to_string()));
    }
}
