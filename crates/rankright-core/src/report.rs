//! Plain-text rendering and history statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Analysis, RankingCounts};

/// Number of recurring recommendations reported in history statistics.
pub const MOST_COMMON_ISSUES: usize = 5;

/// Format a stored timestamp for display.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Truncate to at most `max_length` characters, ending in "..." when cut.
pub fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let keep = max_length.saturating_sub(3);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}

/// Render an analysis as a downloadable text report.
pub fn export_analysis_to_text(analysis: &Analysis) -> String {
    let mut lines = vec![
        "=== RANKRIGHT ANALYSIS REPORT ===".to_string(),
        format!("Analysis ID: {}", analysis.id),
        format!("Timestamp: {}", format_timestamp(&analysis.timestamp)),
        format!("Source: {}", analysis.source_info),
        String::new(),
        "SUMMARY:".to_string(),
        analysis.summary.clone(),
        String::new(),
        "EVALUATION RESULTS:".to_string(),
        "-".repeat(50),
    ];

    for (criterion, result) in analysis.evaluation_results.iter() {
        lines.push(format!("\n{}:", criterion.to_uppercase()));
        lines.push(format!(
            "Ranking: {} {}",
            result.ranking.emoji(),
            result.ranking
        ));
        lines.push(format!("Score: {:.1}/10", result.score));
        lines.push(format!("Explanation: {}", result.explanation));

        if !result.key_findings.is_empty() {
            lines.push("Key Findings:".to_string());
            lines.extend(result.key_findings.iter().map(|f| format!("  • {}", f)));
        }

        if !result.recommendations.is_empty() {
            lines.push("Recommendations:".to_string());
            lines.extend(result.recommendations.iter().map(|r| format!("  • {}", r)));
        }

        lines.push(String::new());
    }

    lines.join("\n")
}

/// Statistics across a set of analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_analyses: usize,

    /// Mean of every criterion score, rounded to two decimals
    pub avg_score: f64,

    pub ranking_distribution: RankingCounts,

    /// Most frequent recommendations, most frequent first
    pub most_common_issues: Vec<String>,
}

/// Summarize a history of analyses.
pub fn summarize_history(analyses: &[Analysis]) -> HistoryStats {
    let mut scores = Vec::new();
    let mut distribution = RankingCounts::default();
    // First-seen order breaks ties between equally common recommendations.
    let mut issue_counts: Vec<(&str, usize)> = Vec::new();

    for analysis in analyses {
        for result in analysis.evaluation_results.values() {
            scores.push(result.score);
            distribution.record(result.ranking);

            for rec in &result.recommendations {
                match issue_counts.iter_mut().find(|(issue, _)| *issue == rec.as_str()) {
                    Some((_, count)) => *count += 1,
                    None => issue_counts.push((rec.as_str(), 1)),
                }
            }
        }
    }

    let avg_score = if scores.is_empty() {
        0.0
    } else {
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        (mean * 100.0).round() / 100.0
    };

    issue_counts.sort_by(|a, b| b.1.cmp(&a.1));

    HistoryStats {
        total_analyses: analyses.len(),
        avg_score,
        ranking_distribution: distribution,
        most_common_issues: issue_counts
            .into_iter()
            .take(MOST_COMMON_ISSUES)
            .map(|(issue, _)| issue.to_string())
            .collect(),
    }
}
