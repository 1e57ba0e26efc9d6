//! Score aggregation, letter grades, and the overall feedback narrative.

use chrono::Utc;
use uuid::Uuid;

use crate::types::{format_score, percentage, Grade, GradingResponse, GradingResult};

/// Number of incorrect answers whose explanations are listed for review.
pub const REVIEW_ITEM_LIMIT: usize = 3;

/// `(Σ score, Σ maxScore)` over all results.
pub fn totals(results: &[GradingResult]) -> (f64, f64) {
    results.iter().fold((0.0, 0.0), |(total, max), r| {
        (total + r.score, max + r.max_score)
    })
}

/// Header line for a percentage band, matching the letter-grade thresholds.
pub fn feedback_header(percentage: f64) -> &'static str {
    match Grade::from_percentage(percentage) {
        Grade::A => "优秀！作业完成得非常出色，继续保持！",
        Grade::B => "良好！整体表现不错，还有提升空间。",
        Grade::C => "中等！需要更加努力，注意细节。",
        Grade::D => "及格！需要加强学习，多做练习。",
        Grade::F => "需要改进！建议重新学习相关知识，寻求帮助。",
    }
}

/// Build the overall feedback text for a set of results.
pub fn overall_feedback(results: &[GradingResult], total: f64, max_total: f64) -> String {
    let pct = percentage(total, max_total);
    let pct_rounded = (pct * 10.0).round() / 10.0;
    let total_count = results.len();
    let correct_count = results.iter().filter(|r| r.is_correct).count();

    let mut feedback = String::from(feedback_header(pct));
    feedback.push_str("\n\n详细情况：\n");
    feedback.push_str(&format!(
        "- 总得分：{}/{} ({pct_rounded:.1}%)\n",
        format_score(total),
        format_score(max_total)
    ));
    feedback.push_str(&format!("- 正确题数：{correct_count}/{total_count}\n"));
    feedback.push_str(&format!(
        "- 错误题数：{}/{total_count}\n",
        total_count - correct_count
    ));

    if correct_count < total_count {
        feedback.push_str("\n建议重点复习以下知识点：\n");
        for (i, r) in results
            .iter()
            .filter(|r| !r.is_correct)
            .take(REVIEW_ITEM_LIMIT)
            .enumerate()
        {
            feedback.push_str(&format!("{}. {}\n", i + 1, r.explanation));
        }
    }

    feedback
}

/// Aggregate parsed results into a full response.
pub fn build_response(submission_id: Uuid, results: Vec<GradingResult>) -> GradingResponse {
    let (total_score, max_total_score) = totals(&results);
    let grade = Grade::from_scores(total_score, max_total_score);
    let overall_feedback = overall_feedback(&results, total_score, max_total_score);

    GradingResponse {
        submission_id,
        total_score,
        max_total_score,
        grade,
        results,
        overall_feedback,
        graded_at: Utc::now(),
    }
}
