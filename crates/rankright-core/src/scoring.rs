//! Aggregation of criterion results into an overall assessment.
//!
//! Scoring rules are fixed:
//! 1. Overall score is the arithmetic mean of criterion scores
//! 2. Mean >= 8.0 is Green, >= 5.0 is Amber, anything lower is Red
//! 3. No results means a score of 0.0 and a Red ranking

use crate::types::{EvaluationResults, OverallAssessment, Ranking, RankingCounts};

/// Minimum mean score for an overall Green ranking.
pub const GREEN_THRESHOLD: f64 = 8.0;

/// Minimum mean score for an overall Amber ranking.
pub const AMBER_THRESHOLD: f64 = 5.0;

/// Recommendations taken from Red-ranked criteria.
pub const RED_RECOMMENDATION_LIMIT: usize = 3;

/// Recommendations taken from Amber-ranked criteria.
pub const AMBER_RECOMMENDATION_LIMIT: usize = 2;

/// Ranking for an overall mean score.
pub fn ranking_for_score(score: f64) -> Ranking {
    if score >= GREEN_THRESHOLD {
        Ranking::Green
    } else if score >= AMBER_THRESHOLD {
        Ranking::Amber
    } else {
        Ranking::Red
    }
}

/// Compute the overall assessment for a set of results.
pub fn calculate_overall_score(results: &EvaluationResults) -> OverallAssessment {
    if results.is_empty() {
        return OverallAssessment {
            overall_score: 0.0,
            overall_ranking: Ranking::Red,
            total_criteria: 0,
            green_count: 0,
            amber_count: 0,
            red_count: 0,
            individual_scores: Vec::new(),
        };
    }

    let mut counts = RankingCounts::default();
    let individual_scores: Vec<f64> = results
        .values()
        .map(|result| {
            counts.record(result.ranking);
            result.score
        })
        .collect();

    let mean = individual_scores.iter().sum::<f64>() / individual_scores.len() as f64;

    OverallAssessment {
        overall_score: round_two(mean),
        overall_ranking: ranking_for_score(mean),
        total_criteria: results.len(),
        green_count: counts.green,
        amber_count: counts.amber,
        red_count: counts.red,
        individual_scores,
    }
}

/// Prioritized improvement list: the first Red recommendations, then the
/// first Amber ones, each tagged `[criterion]`. Green criteria contribute
/// nothing. Order follows the iteration order of `results`.
pub fn generate_improvement_recommendations(results: &EvaluationResults) -> Vec<String> {
    let mut red = Vec::new();
    let mut amber = Vec::new();

    for (criterion, result) in results.iter() {
        let bucket = match result.ranking {
            Ranking::Red => &mut red,
            Ranking::Amber => &mut amber,
            Ranking::Green => continue,
        };
        bucket.extend(
            result
                .recommendations
                .iter()
                .map(|rec| format!("[{}] {}", criterion, rec)),
        );
    }

    red.into_iter()
        .take(RED_RECOMMENDATION_LIMIT)
        .chain(amber.into_iter().take(AMBER_RECOMMENDATION_LIMIT))
        .collect()
}

fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CriterionResult;
    use proptest::prelude::*;

    fn result(ranking: Ranking, score: f64, recommendations: &[&str]) -> CriterionResult {
        CriterionResult {
            ranking,
            score,
            explanation: "x".to_string(),
            key_findings: vec![],
            recommendations: recommendations.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_empty_results() {
        let overall = calculate_overall_score(&EvaluationResults::new());
        assert_eq!(overall.overall_score, 0.0);
        assert_eq!(overall.overall_ranking, Ranking::Red);
        assert_eq!(overall.total_criteria, 0);
        assert_eq!(
            (overall.green_count, overall.amber_count, overall.red_count),
            (0, 0, 0)
        );
    }

    #[test]
    fn test_all_nines_is_green() {
        let results: EvaluationResults = ["A", "B", "C"]
            .iter()
            .map(|name| (name.to_string(), result(Ranking::Green, 9.0, &[])))
            .collect();

        let overall = calculate_overall_score(&results);
        assert_eq!(overall.overall_score, 9.0);
        assert_eq!(overall.overall_ranking, Ranking::Green);
        assert_eq!(overall.total_criteria, 3);
        assert_eq!(overall.green_count, 3);
        assert_eq!(overall.individual_scores, vec![9.0, 9.0, 9.0]);
    }

    #[test]
    fn test_counts_and_thresholds() {
        let mut results = EvaluationResults::new();
        results.insert("A", result(Ranking::Green, 8.0, &[]));
        results.insert("B", result(Ranking::Amber, 5.0, &[]));
        results.insert("C", result(Ranking::Red, 2.0, &[]));

        let overall = calculate_overall_score(&results);
        assert_eq!(overall.overall_score, 5.0);
        assert_eq!(overall.overall_ranking, Ranking::Amber);
        assert_eq!(
            (overall.green_count, overall.amber_count, overall.red_count),
            (1, 1, 1)
        );
    }

    #[test]
    fn test_score_rounded_to_two_decimals() {
        let mut results = EvaluationResults::new();
        results.insert("A", result(Ranking::Amber, 7.0, &[]));
        results.insert("B", result(Ranking::Amber, 7.0, &[]));
        results.insert("C", result(Ranking::Amber, 6.0, &[]));

        assert_eq!(calculate_overall_score(&results).overall_score, 6.67);
    }

    #[test]
    fn test_ranking_boundaries() {
        assert_eq!(ranking_for_score(8.0), Ranking::Green);
        assert_eq!(ranking_for_score(7.99), Ranking::Amber);
        assert_eq!(ranking_for_score(5.0), Ranking::Amber);
        assert_eq!(ranking_for_score(4.99), Ranking::Red);
    }

    #[test]
    fn test_recommendation_slicing() {
        let mut results = EvaluationResults::new();
        results.insert("Clarity", result(Ranking::Red, 2.0, &["r1", "r2"]));
        results.insert("Polish", result(Ranking::Green, 9.0, &["g1"]));
        results.insert("Coverage", result(Ranking::Amber, 6.0, &["a1", "a2", "a3"]));
        results.insert("Accuracy", result(Ranking::Red, 3.0, &["r3", "r4"]));

        let recs = generate_improvement_recommendations(&results);
        assert_eq!(
            recs,
            vec![
                "[Clarity] r1",
                "[Clarity] r2",
                "[Accuracy] r3",
                "[Coverage] a1",
                "[Coverage] a2",
            ]
        );
        assert!(recs.iter().all(|r| !r.contains("g1")));
    }

    #[test]
    fn test_recommendations_all_green() {
        let mut results = EvaluationResults::new();
        results.insert("A", result(Ranking::Green, 9.5, &["keep going"]));
        assert!(generate_improvement_recommendations(&results).is_empty());
    }

    proptest! {
        #[test]
        fn prop_overall_score_within_bounds(scores in prop::collection::vec(1.0f64..=10.0, 1..12)) {
            let results: EvaluationResults = scores
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("c{i}"), result(Ranking::Amber, *s, &[])))
                .collect();

            let overall = calculate_overall_score(&results);
            prop_assert!(overall.overall_score >= 1.0 && overall.overall_score <= 10.0);
            prop_assert_eq!(overall.total_criteria, scores.len());
            prop_assert_eq!(overall.amber_count, scores.len());
        }
    }
}
