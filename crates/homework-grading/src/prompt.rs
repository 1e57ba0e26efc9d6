//! Grading prompt construction.

use crate::model::{ChatMessage, ContentPart};
use crate::types::{Question, Submission};

/// Fixed system prompt establishing the grading role and scoring policy.
pub const SYSTEM_PROMPT: &str =
    "你是一个专业的作业批改老师。请仔细查看学生提交的作业图片，逐题批改并给出详细的评分和反馈。

要求：
1. 准确识别图片中的题目和学生答案
2. 逐题判断答案正确与否
3. 为每道题提供简洁明了的解析说明
4. 给出具体的得分和满分
5. 提供建设性的反馈意见
6. 输出格式必须为JSON格式

评分标准：
- 完全正确：满分
- 部分正确：给部分分数
- 完全错误：0分
- 步骤正确但答案错误：给步骤分";

const JSON_TEMPLATE: &str = r#"请按照以下JSON格式返回批改结果：
{
  "results": [
    {
      "questionId": "题目编号",
      "questionContent": "题目具体内容（从图片中准确识别，不能简化为\"第1题\"等）",
      "studentAnswer": "学生答案",
      "isCorrect": true/false,
      "correctAnswer": "正确答案",
      "explanation": "详细解析说明",
      "score": 得分,
      "maxScore": 满分,
      "feedback": "具体反馈意见"
    }
  ]
}

重要提醒：questionContent字段必须包含图片中识别的具体题目文本，不能使用"第1题"、"第2题"等占位符。"#;

/// Build the text portion of the user message.
pub fn build_user_text(
    subject: &str,
    student_name: &str,
    questions: Option<&[Question]>,
) -> String {
    let mut prompt = format!(
        "请批改{student_name}同学的{subject}作业。

请严格按照以下要求输出：
1. 每道题都要包含：题号、题目内容、学生答案、是否正确、详细解析
2. 题目内容必须准确识别图片中的具体题目文本，不能简化为\"第1题\"等占位符
3. 解析要简洁明了，说明解题思路和关键步骤
4. 按照指定的JSON格式返回结果

"
    );

    if let Some(questions) = questions.filter(|q| !q.is_empty()) {
        prompt.push_str("题目信息：\n");
        for (i, question) in questions.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, question.content));
            if let Some(answer) = &question.standard_answer {
                prompt.push_str(&format!("标准答案：{answer}\n"));
            }
            prompt.push_str(&format!("分值：{}分\n\n", question.points));
        }
    }

    prompt.push_str(JSON_TEMPLATE);
    prompt
}

/// The image part as sent to the model. The envelope is always labelled
/// `image/jpeg`, whatever the source media type.
pub fn image_part(payload: &str) -> ContentPart {
    ContentPart::image_url(format!("data:image/jpeg;base64,{payload}"))
}

/// Build the system and user messages for one submission.
pub fn build_messages(submission: &Submission) -> Vec<ChatMessage> {
    let text = build_user_text(
        &submission.subject,
        &submission.student_name,
        submission.questions.as_deref(),
    );
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user_parts(vec![
            ContentPart::text(text),
            image_part(submission.image.payload()),
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageContent;
    use crate::types::{CanonicalImage, QuestionType};

    fn question(content: &str, answer: Option<&str>, points: u32) -> Question {
        Question {
            id: "q".to_string(),
            question_type: QuestionType::Fill,
            content: content.to_string(),
            standard_answer: answer.map(str::to_string),
            points,
        }
    }

    #[test]
    fn test_user_text_header() {
        let text = build_user_text("数学", "小明", None);
        assert!(text.starts_with("请批改小明同学的数学作业。"));
        assert!(!text.contains("题目信息："));
        assert!(text.contains("\"questionContent\""));
        assert!(text.contains("\"maxScore\": 满分"));
    }

    #[test]
    fn test_user_text_question_block() {
        let qs = vec![question("1+1=?", Some("2"), 5), question("写出春天", None, 10)];
        let text = build_user_text("自动识别", "学生", Some(&qs));
        assert!(text.contains("题目信息：\n1. 1+1=?\n标准答案：2\n分值：5分\n\n2. 写出春天\n分值：10分\n\n"));
    }

    #[test]
    fn test_empty_question_list_is_omitted() {
        let text = build_user_text("语文", "学生", Some(&[]));
        assert!(!text.contains("题目信息："));
    }

    #[test]
    fn test_messages_envelope_jpeg() {
        let image = CanonicalImage::new("image/png", "iVBORw0KGgo=");
        let submission = Submission::new("学生", "自动识别", image, None);
        let messages = build_messages(&submission);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");

        let MessageContent::Parts(parts) = &messages[1].content else {
            panic!("user message should be multipart");
        };
        assert_eq!(parts.len(), 2);
        match &parts[1] {
            ContentPart::ImageUrl { image_url } => {
                assert_eq!(image_url.url, "data:image/jpeg;base64,iVBORw0KGgo=");
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }
}
