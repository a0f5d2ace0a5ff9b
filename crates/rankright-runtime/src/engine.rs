//! Multi-criterion evaluation.
//!
//! The engine walks the criteria catalog, asks the gateway for each
//! criterion and validates every payload. A failed criterion never sinks the
//! batch: it is recorded as a [`CriterionOutcome::Failed`] and surfaces as
//! the fixed fallback result.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;

use rankright_core::{
    calculate_overall_score, generate_improvement_recommendations, CatalogError, CriteriaCatalog,
    Criterion, CriterionResult, EvaluationResults, OverallAssessment, ResultValidator,
    ValidationError,
};

use crate::config::DEFAULT_SUMMARY_LENGTH;
use crate::gateway::{GatewayError, ModelGateway};

/// Errors evaluating a single criterion.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    UnknownCriterion(#[from] CatalogError),
}

/// What happened to one criterion in a batch.
#[derive(Debug)]
pub enum CriterionOutcome {
    Evaluated(CriterionResult),
    Failed(EvaluationError),
}

impl CriterionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, CriterionOutcome::Failed(_))
    }

    /// The evaluated result, or the fallback carrying the failure cause.
    pub fn into_result(self) -> CriterionResult {
        match self {
            CriterionOutcome::Evaluated(result) => result,
            CriterionOutcome::Failed(cause) => CriterionResult::fallback(cause),
        }
    }
}

impl From<Result<CriterionResult, EvaluationError>> for CriterionOutcome {
    fn from(result: Result<CriterionResult, EvaluationError>) -> Self {
        match result {
            Ok(result) => CriterionOutcome::Evaluated(result),
            Err(e) => CriterionOutcome::Failed(e),
        }
    }
}

/// Evaluates documents against the criteria catalog.
#[derive(Debug)]
pub struct EvaluationEngine {
    gateway: Arc<ModelGateway>,
    catalog: CriteriaCatalog,
    validator: ResultValidator,
    max_concurrency: usize,
    summary_length: usize,
}

impl EvaluationEngine {
    /// An engine over the standard catalog, one criterion at a time.
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self {
            gateway,
            catalog: CriteriaCatalog::standard(),
            validator: ResultValidator::new(),
            max_concurrency: 1,
            summary_length: DEFAULT_SUMMARY_LENGTH,
        }
    }

    /// Evaluate up to `limit` criteria at once. Result order is unaffected.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    pub fn with_summary_length(mut self, words: usize) -> Self {
        self.summary_length = words;
        self
    }

    pub fn criteria(&self) -> &CriteriaCatalog {
        &self.catalog
    }

    pub fn gateway(&self) -> &Arc<ModelGateway> {
        &self.gateway
    }

    /// Summarize `text` at the configured target length.
    pub async fn summarize(&self, text: &str) -> Result<String, GatewayError> {
        self.gateway.summarize(text, self.summary_length).await
    }

    /// Evaluate `text` against every criterion.
    ///
    /// Never fails: there is exactly one entry per criterion, in catalog
    /// order, with failures replaced by the fallback result.
    pub async fn evaluate_content(&self, text: &str) -> EvaluationResults {
        self.evaluate_outcomes(text)
            .await
            .into_iter()
            .map(|(name, outcome)| (name.to_string(), outcome.into_result()))
            .collect()
    }

    /// Per-criterion outcomes in catalog order.
    pub async fn evaluate_outcomes(&self, text: &str) -> Vec<(&'static str, CriterionOutcome)> {
        let outcomes: Vec<(&'static str, CriterionOutcome)> = stream::iter(self.catalog.iter())
            .map(|criterion| async move {
                let outcome = CriterionOutcome::from(self.evaluate_criterion(text, criterion).await);
                if let CriterionOutcome::Failed(e) = &outcome {
                    tracing::warn!(criterion = %criterion.name, error = %e, "Criterion evaluation failed, using fallback");
                }
                (criterion.name, outcome)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|(_, o)| o.is_failed()).count();
        tracing::info!(
            criteria = outcomes.len(),
            failed,
            "Evaluated content"
        );

        outcomes
    }

    /// Evaluate `text` against one named criterion. Errors propagate.
    pub async fn evaluate_single_criterion(
        &self,
        text: &str,
        criterion_name: &str,
    ) -> Result<CriterionResult, EvaluationError> {
        let criterion = self.catalog.require(criterion_name)?;
        self.evaluate_criterion(text, criterion).await
    }

    pub fn calculate_overall_score(&self, results: &EvaluationResults) -> OverallAssessment {
        calculate_overall_score(results)
    }

    pub fn generate_improvement_recommendations(&self, results: &EvaluationResults) -> Vec<String> {
        generate_improvement_recommendations(results)
    }

    async fn evaluate_criterion(
        &self,
        text: &str,
        criterion: &Criterion,
    ) -> Result<CriterionResult, EvaluationError> {
        let raw = self
            .gateway
            .evaluate(text, criterion.name, criterion.description)
            .await?;
        Ok(self.validator.normalize(raw)?)
    }
}
