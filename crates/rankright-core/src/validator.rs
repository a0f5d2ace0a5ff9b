//! Normalization of untrusted model output into [`CriterionResult`].
//!
//! Model output is free-form structured text. The validator rejects it only
//! when a required key is absent; every other irregularity is repaired toward
//! a safe default so one malformed field never sinks a batch.

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::types::{CriterionResult, Ranking, DEFAULT_SCORE, MAX_SCORE, MIN_SCORE};

/// Keys that must be present in every raw result.
pub const REQUIRED_FIELDS: [&str; 3] = ["ranking", "score", "explanation"];

/// Substituted for an empty explanation.
pub const MISSING_EXPLANATION: &str = "No explanation provided";

/// Errors from result validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Error converting a JSON value that is not an object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected a JSON object, found {found}")]
pub struct NotAnObject {
    pub found: &'static str,
}

/// Untyped model output for one criterion, before validation.
///
/// This is the only place untyped JSON is allowed to live. It is consumed by
/// [`ResultValidator::normalize`] exactly once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawCriterionResult {
    fields: Map<String, JsonValue>,
}

impl RawCriterionResult {
    pub fn new(fields: Map<String, JsonValue>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn into_fields(self) -> Map<String, JsonValue> {
        self.fields
    }
}

impl TryFrom<JsonValue> for RawCriterionResult {
    type Error = NotAnObject;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::Object(fields) => Ok(Self { fields }),
            other => Err(NotAnObject {
                found: json_kind(&other),
            }),
        }
    }
}

/// Converts raw model output into canonical results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultValidator;

impl ResultValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate and repair a raw result.
    ///
    /// Fails only with [`ValidationError::MissingField`].
    pub fn normalize(&self, raw: RawCriterionResult) -> Result<CriterionResult, ValidationError> {
        for field in REQUIRED_FIELDS {
            if !raw.contains(field) {
                return Err(ValidationError::MissingField(field.to_string()));
            }
        }

        let mut fields = raw.into_fields();

        let ranking = fields
            .remove("ranking")
            .map(|v| normalize_ranking(&v))
            .unwrap_or(Ranking::Amber);
        let score = fields
            .remove("score")
            .map(|v| normalize_score(&v))
            .unwrap_or(DEFAULT_SCORE);
        let explanation = fields
            .remove("explanation")
            .map(normalize_explanation)
            .unwrap_or_else(|| MISSING_EXPLANATION.to_string());
        let key_findings = normalize_list(fields.remove("key_findings"));
        let recommendations = normalize_list(fields.remove("recommendations"));

        if !fields.is_empty() {
            tracing::debug!(
                extra = ?fields.keys().collect::<Vec<_>>(),
                "Ignoring unexpected fields in model result"
            );
        }

        Ok(CriterionResult {
            ranking,
            score,
            explanation,
            key_findings,
            recommendations,
        })
    }
}

/// Map a model-supplied ranking onto the three canonical values.
pub fn normalize_ranking(value: &JsonValue) -> Ranking {
    let Some(label) = value.as_str() else {
        return Ranking::Amber;
    };

    if let Ok(ranking) = label.parse::<Ranking>() {
        return ranking;
    }

    match label.trim().to_lowercase().as_str() {
        "green" | "good" | "excellent" => Ranking::Green,
        "amber" | "yellow" | "warning" | "moderate" => Ranking::Amber,
        "red" | "poor" | "bad" | "critical" => Ranking::Red,
        _ => Ranking::Amber,
    }
}

/// Read a score from a number or numeric string and clamp it into range.
pub fn normalize_score(value: &JsonValue) -> f64 {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(score) if !score.is_nan() => score.clamp(MIN_SCORE, MAX_SCORE),
        _ => DEFAULT_SCORE,
    }
}

fn normalize_explanation(value: JsonValue) -> String {
    let text = value_to_text(value);
    if text.trim().is_empty() {
        MISSING_EXPLANATION.to_string()
    } else {
        text
    }
}

/// Coerce a list field to strings. Absent or null is empty, a scalar becomes
/// one item and non-string items are rendered as JSON text.
pub fn normalize_list(value: Option<JsonValue>) -> Vec<String> {
    match value {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => items.into_iter().map(value_to_text).collect(),
        Some(scalar) => vec![value_to_text(scalar)],
    }
}

fn value_to_text(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn raw(value: JsonValue) -> RawCriterionResult {
        RawCriterionResult::try_from(value).unwrap()
    }

    fn normalize(value: JsonValue) -> Result<CriterionResult, ValidationError> {
        ResultValidator::new().normalize(raw(value))
    }

    #[test]
    fn test_well_formed_result() {
        let result = normalize(json!({
            "ranking": "Green",
            "score": 8.5,
            "explanation": "Clear and concise.",
            "key_findings": ["Short sentences"],
            "recommendations": ["Add a glossary"]
        }))
        .unwrap();

        assert_eq!(result.ranking, Ranking::Green);
        assert_eq!(result.score, 8.5);
        assert_eq!(result.explanation, "Clear and concise.");
        assert_eq!(result.key_findings, vec!["Short sentences"]);
        assert_eq!(result.recommendations, vec!["Add a glossary"]);
    }

    #[test]
    fn test_missing_required_fields() {
        for missing in REQUIRED_FIELDS {
            let mut value = json!({"ranking": "Red", "score": 2, "explanation": "x"});
            value.as_object_mut().unwrap().remove(missing);

            assert_eq!(
                normalize(value),
                Err(ValidationError::MissingField(missing.to_string()))
            );
        }
    }

    #[test]
    fn test_ranking_variations() {
        let cases = [
            ("excellent", Ranking::Green),
            ("GOOD", Ranking::Green),
            ("green", Ranking::Green),
            ("Yellow", Ranking::Amber),
            ("warning", Ranking::Amber),
            ("moderate", Ranking::Amber),
            ("poor", Ranking::Red),
            ("Critical", Ranking::Red),
            ("bad", Ranking::Red),
            ("purple", Ranking::Amber),
        ];
        for (label, expected) in cases {
            assert_eq!(normalize_ranking(&json!(label)), expected, "label {label}");
        }
        assert_eq!(normalize_ranking(&json!(3)), Ranking::Amber);
        assert_eq!(normalize_ranking(&JsonValue::Null), Ranking::Amber);
    }

    #[test]
    fn test_score_string_out_of_range() {
        assert_eq!(normalize_score(&json!("12")), 10.0);
        assert_eq!(normalize_score(&json!("abc")), 5.0);
        assert_eq!(normalize_score(&json!(-4)), 1.0);
        assert_eq!(normalize_score(&json!(" 7.25 ")), 7.25);
        assert_eq!(normalize_score(&json!("NaN")), 5.0);
        assert_eq!(normalize_score(&json!(null)), 5.0);
        assert_eq!(normalize_score(&json!([7])), 5.0);
    }

    #[test]
    fn test_explanation_coerced_to_text() {
        let result = normalize(json!({"ranking": "Red", "score": 3, "explanation": 42})).unwrap();
        assert_eq!(result.explanation, "42");

        let result = normalize(json!({"ranking": "Red", "score": 3, "explanation": "  "})).unwrap();
        assert_eq!(result.explanation, MISSING_EXPLANATION);
    }

    #[test]
    fn test_lists_default_and_scalar() {
        let result = normalize(json!({
            "ranking": "Amber",
            "score": 6,
            "explanation": "fine",
            "recommendations": "Split the long section"
        }))
        .unwrap();

        assert!(result.key_findings.is_empty());
        assert_eq!(result.recommendations, vec!["Split the long section"]);

        let result = normalize(json!({
            "ranking": "Amber",
            "score": 6,
            "explanation": "fine",
            "key_findings": [1, "two", null]
        }))
        .unwrap();
        assert_eq!(result.key_findings, vec!["1", "two", "null"]);
    }

    #[test]
    fn test_non_object_rejected_at_boundary() {
        let err = RawCriterionResult::try_from(json!(["ranking"])).unwrap_err();
        assert_eq!(err.found, "an array");
    }

    fn arbitrary_json() -> impl Strategy<Value = JsonValue> {
        let leaf = prop_oneof![
            Just(JsonValue::Null),
            any::<bool>().prop_map(JsonValue::from),
            any::<i64>().prop_map(JsonValue::from),
            (-1.0e6f64..1.0e6).prop_map(JsonValue::from),
            ".*".prop_map(JsonValue::from),
        ];
        leaf.prop_recursive(2, 8, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(JsonValue::Array)
        })
    }

    proptest! {
        #[test]
        fn prop_normalized_results_hold_invariants(
            ranking in arbitrary_json(),
            score in arbitrary_json(),
            explanation in arbitrary_json(),
            findings in arbitrary_json(),
        ) {
            let result = normalize(json!({
                "ranking": ranking,
                "score": score,
                "explanation": explanation,
                "key_findings": findings,
            })).unwrap();

            prop_assert!(result.score >= MIN_SCORE && result.score <= MAX_SCORE);
            prop_assert!(Ranking::ALL.contains(&result.ranking));
            prop_assert!(!result.explanation.trim().is_empty());
        }

        #[test]
        fn prop_missing_score_always_rejected(ranking in ".*", explanation in ".*") {
            let outcome = normalize(json!({"ranking": ranking, "explanation": explanation}));
            prop_assert_eq!(outcome, Err(ValidationError::MissingField("score".to_string())));
        }
    }
}
