//! Core types for RankRight evaluations.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Lowest score a criterion can receive.
pub const MIN_SCORE: f64 = 1.0;

/// Highest score a criterion can receive.
pub const MAX_SCORE: f64 = 10.0;

/// Score used when the model's score cannot be read.
pub const DEFAULT_SCORE: f64 = 5.0;

/// Traffic-light verdict for a single criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ranking {
    Green,
    Amber,
    Red,
}

impl Ranking {
    /// All rankings, best first.
    pub const ALL: [Ranking; 3] = [Ranking::Green, Ranking::Amber, Ranking::Red];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ranking::Green => "Green",
            Ranking::Amber => "Amber",
            Ranking::Red => "Red",
        }
    }

    /// Marker used in text reports.
    pub fn emoji(&self) -> &'static str {
        match self {
            Ranking::Green => "🟢",
            Ranking::Amber => "🟡",
            Ranking::Red => "🔴",
        }
    }
}

impl fmt::Display for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored ranking is not one of the three labels.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ranking '{0}'")]
pub struct ParseRankingError(pub String);

impl FromStr for Ranking {
    type Err = ParseRankingError;

    /// Strict parse of the canonical labels. Lenient mapping of model output
    /// lives in the validator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Green" => Ok(Ranking::Green),
            "Amber" => Ok(Ranking::Amber),
            "Red" => Ok(Ranking::Red),
            other => Err(ParseRankingError(other.to_string())),
        }
    }
}

/// Validated result of evaluating one document against one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    /// Traffic-light verdict
    pub ranking: Ranking,

    /// Score in [1.0, 10.0]
    pub score: f64,

    /// Why the model reached this verdict
    pub explanation: String,

    /// Observations supporting the verdict
    #[serde(default)]
    pub key_findings: Vec<String>,

    /// Suggested improvements
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl CriterionResult {
    /// The fixed result substituted when a criterion could not be evaluated.
    pub fn fallback(cause: impl fmt::Display) -> Self {
        Self {
            ranking: Ranking::Amber,
            score: DEFAULT_SCORE,
            explanation: format!("Evaluation failed: {}", cause),
            key_findings: vec!["Unable to complete automated evaluation".to_string()],
            recommendations: vec!["Manual review required due to evaluation error".to_string()],
        }
    }
}

/// Criterion results keyed by criterion name, in insertion order.
///
/// Serializes as a JSON object. Deserialization keeps the document order of
/// the keys, so a stored mapping reads back in the order it was written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationResults {
    entries: Vec<(String, CriterionResult)>,
}

impl EvaluationResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result. An existing entry for the same criterion is replaced
    /// in place and returned.
    pub fn insert(&mut self, criterion: impl Into<String>, result: CriterionResult) -> Option<CriterionResult> {
        let criterion = criterion.into();
        match self.entries.iter_mut().find(|(name, _)| *name == criterion) {
            Some((_, existing)) => Some(std::mem::replace(existing, result)),
            None => {
                self.entries.push((criterion, result));
                None
            }
        }
    }

    pub fn get(&self, criterion: &str) -> Option<&CriterionResult> {
        self.entries
            .iter()
            .find(|(name, _)| name == criterion)
            .map(|(_, result)| result)
    }

    pub fn contains(&self, criterion: &str) -> bool {
        self.get(criterion).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CriterionResult)> {
        self.entries.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &CriterionResult> {
        self.entries.iter().map(|(_, result)| result)
    }
}

impl FromIterator<(String, CriterionResult)> for EvaluationResults {
    fn from_iter<I: IntoIterator<Item = (String, CriterionResult)>>(iter: I) -> Self {
        let mut results = Self::new();
        for (name, result) in iter {
            results.insert(name, result);
        }
        results
    }
}

impl IntoIterator for EvaluationResults {
    type Item = (String, CriterionResult);
    type IntoIter = std::vec::IntoIter<(String, CriterionResult)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for EvaluationResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, result) in &self.entries {
            map.serialize_entry(name, result)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EvaluationResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ResultsVisitor;

        impl<'de> Visitor<'de> for ResultsVisitor {
            type Value = EvaluationResults;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of criterion name to result")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut results = EvaluationResults::new();
                while let Some((name, result)) = access.next_entry::<String, CriterionResult>()? {
                    results.insert(name, result);
                }
                Ok(results)
            }
        }

        deserializer.deserialize_map(ResultsVisitor)
    }
}

/// Identifier assigned to an analysis by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(pub i64);

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AnalysisId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(AnalysisId)
    }
}

/// One complete evaluation run over one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: AnalysisId,

    /// Full extracted or scraped text
    pub content: String,

    /// Provenance, e.g. file names or a URL
    pub source_info: String,

    pub summary: String,

    pub evaluation_results: EvaluationResults,

    /// When the analysis was stored
    pub timestamp: DateTime<Utc>,
}

/// A per-criterion row as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCriterionResult {
    pub criterion_name: String,

    #[serde(flatten)]
    pub result: CriterionResult,
}

/// Number of results per ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingCounts {
    pub green: usize,
    pub amber: usize,
    pub red: usize,
}

impl RankingCounts {
    pub fn record(&mut self, ranking: Ranking) {
        match ranking {
            Ranking::Green => self.green += 1,
            Ranking::Amber => self.amber += 1,
            Ranking::Red => self.red += 1,
        }
    }

    pub fn get(&self, ranking: Ranking) -> usize {
        match ranking {
            Ranking::Green => self.green,
            Ranking::Amber => self.amber,
            Ranking::Red => self.red,
        }
    }

    pub fn total(&self) -> usize {
        self.green + self.amber + self.red
    }
}

/// Aggregate assessment across all criteria of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    /// Mean criterion score, rounded to two decimals (0.0 when empty)
    pub overall_score: f64,
    pub overall_ranking: Ranking,
    pub total_criteria: usize,
    pub green_count: usize,
    pub amber_count: usize,
    pub red_count: usize,

    /// Per-criterion scores in result order
    pub individual_scores: Vec<f64>,
}
