//! Prompts sent to the model.
//!
//! Each request is a fixed system instruction plus a user prompt that embeds
//! the document. The evaluation prompt spells out the exact JSON shape the
//! validator expects.

/// System instruction for summaries.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are an expert document analyst. \
Provide clear, concise summaries that capture the essence of the content.";

/// System instruction for criterion evaluation.
pub const EVALUATION_SYSTEM_PROMPT: &str = "You are an expert document evaluator. \
Provide objective, detailed analysis in the exact JSON format requested.";

/// User message for the connectivity check.
pub const CONNECTION_TEST_PROMPT: &str = "Hello, this is a connection test.";

/// Build the summary prompt for a target length in words.
pub fn summary_prompt(content: &str, target_length: usize) -> String {
    format!(
        r#"Please provide a concise summary of the following content in approximately {target_length} words.
Focus on the main points, key insights, and overall purpose of the document.

Content:
{content}

Summary:"#
    )
}

/// Build the evaluation prompt for one criterion.
pub fn evaluation_prompt(criterion_name: &str, criterion_description: &str, content: &str) -> String {
    format!(
        r#"You are an expert document analyst. Evaluate the following content against the specified criterion and provide a detailed analysis.

Criterion: {criterion_name}
Description: {criterion_description}

Content to evaluate:
{content}

Please provide your evaluation in JSON format with the following structure:
{{
    "ranking": "Green|Amber|Red",
    "score": 7.5,
    "explanation": "Detailed explanation of the evaluation",
    "key_findings": ["Finding 1", "Finding 2", "Finding 3"],
    "recommendations": ["Recommendation 1", "Recommendation 2"]
}}

Ranking criteria:
- Green: Excellent performance (8-10 points) - meets or exceeds expectations
- Amber: Good performance with room for improvement (5-7 points) - partially meets expectations
- Red: Poor performance requiring significant improvement (1-4 points) - does not meet expectations

Score should be between 1-10 where 10 is excellent and 1 is very poor."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_prompt_embeds_length_and_content() {
        let prompt = summary_prompt("The quarterly report.", 250);
        assert!(prompt.contains("approximately 250 words"));
        assert!(prompt.contains("The quarterly report."));
        assert!(prompt.trim_end().ends_with("Summary:"));
    }

    #[test]
    fn test_evaluation_prompt_embeds_criterion() {
        let prompt = evaluation_prompt(
            "Clarity & Readability",
            "Evaluate how clear the content is.",
            "Body text",
        );
        assert!(prompt.contains("Criterion: Clarity & Readability"));
        assert!(prompt.contains("Description: Evaluate how clear the content is."));
        assert!(prompt.contains("Body text"));
    }

    #[test]
    fn test_evaluation_prompt_describes_json_shape() {
        let prompt = evaluation_prompt("A", "B", "C");
        for key in ["\"ranking\"", "\"score\"", "\"explanation\"", "\"key_findings\"", "\"recommendations\""] {
            assert!(prompt.contains(key), "missing {key}");
        }
        assert!(prompt.contains("Green|Amber|Red"));
    }
}
