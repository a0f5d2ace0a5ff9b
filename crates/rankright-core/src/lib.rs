//! # rankright-core
//!
//! Deterministic building blocks for RankRight document evaluation.
//!
//! This crate holds everything that does not talk to a model or a database:
//! - The fixed catalog of six evaluation criteria
//! - The canonical result types (`CriterionResult`, `Analysis`, ...)
//! - The validator that turns untrusted model JSON into typed results
//! - Overall scoring and prioritized recommendations
//! - Plain-text report rendering
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No I/O**: No model calls, no storage
//! 3. **Stable order**: Criteria are always walked in catalog order
//!
//! ## Example
//!
//! ```rust
//! use rankright_core::{calculate_overall_score, RawCriterionResult, ResultValidator, EvaluationResults};
//!
//! let raw = RawCriterionResult::try_from(serde_json::json!({
//!     "ranking": "excellent",
//!     "score": "12",
//!     "explanation": "Very clear.",
//! })).unwrap();
//!
//! let result = ResultValidator::new().normalize(raw).unwrap();
//! assert_eq!(result.score, 10.0);
//!
//! let mut results = EvaluationResults::new();
//! results.insert("Clarity & Readability", result);
//! assert_eq!(calculate_overall_score(&results).total_criteria, 1);
//! ```

pub mod criteria;
pub mod report;
pub mod scoring;
pub mod types;
pub mod validator;

// Re-export main types at crate root
pub use criteria::{CatalogError, CriteriaCatalog, Criterion};
pub use report::{export_analysis_to_text, summarize_history, truncate_text, HistoryStats};
pub use scoring::{calculate_overall_score, generate_improvement_recommendations, ranking_for_score};
pub use types::{
    Analysis, AnalysisId, CriterionResult, EvaluationResults, OverallAssessment, ParseRankingError,
    Ranking, RankingCounts, StoredCriterionResult, DEFAULT_SCORE, MAX_SCORE, MIN_SCORE,
};
pub use validator::{
    normalize_list, NotAnObject, RawCriterionResult, ResultValidator, ValidationError,
};
