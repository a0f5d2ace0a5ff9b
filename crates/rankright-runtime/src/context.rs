//! Application context.
//!
//! Built once at startup and passed by reference. Owns the model gateway, the
//! evaluation engine and the analysis store.

use std::sync::Arc;

use thiserror::Error;

use rankright_core::{AnalysisId, EvaluationResults, OverallAssessment};
use rankright_store::{AnalysisStore, StoreError};

use crate::config::{ConfigError, RuntimeConfig};
use crate::engine::EvaluationEngine;
use crate::gateway::{GatewayError, ModelGateway};
use crate::providers::ProviderRegistry;

/// Errors surfaced by the application layer.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No content to analyze")]
    EmptyContent,

    #[error("Background store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Everything one analysis produced.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub id: AnalysisId,
    pub summary: String,
    pub results: EvaluationResults,
    pub overall: OverallAssessment,
    pub recommendations: Vec<String>,
}

#[derive(Debug)]
pub struct AppContext {
    config: RuntimeConfig,
    gateway: Arc<ModelGateway>,
    engine: EvaluationEngine,
    store: Arc<AnalysisStore>,
}

impl AppContext {
    /// Build the context from configuration, opening the store at
    /// `config.database_path`.
    ///
    /// An unusable model backend does not fail startup; the gateway reports
    /// it on first use.
    pub fn from_config(config: RuntimeConfig) -> Result<Self, AppError> {
        config.validate()?;

        let registry = ProviderRegistry::with_defaults();
        let gateway = ModelGateway::from_registry(
            &registry,
            &config.provider,
            &config.provider_config,
            config.gateway_settings(),
        );
        let store = AnalysisStore::open(&config.database_path)?;

        Ok(Self::new(config, Arc::new(gateway), store))
    }

    /// Assemble a context from already-built parts.
    pub fn new(config: RuntimeConfig, gateway: Arc<ModelGateway>, store: AnalysisStore) -> Self {
        let engine = EvaluationEngine::new(gateway.clone())
            .with_max_concurrency(config.max_concurrency)
            .with_summary_length(config.summary_length);

        Self {
            config,
            gateway,
            engine,
            store: Arc::new(store),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<ModelGateway> {
        &self.gateway
    }

    pub fn engine(&self) -> &EvaluationEngine {
        &self.engine
    }

    pub fn store(&self) -> &AnalysisStore {
        &self.store
    }

    /// Summarize, evaluate, store, then score one document.
    ///
    /// Summary failures abort before anything is stored. Criterion failures
    /// do not: they are stored as fallback results.
    pub async fn analyze(&self, text: &str, source_info: &str) -> Result<AnalysisOutcome, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::EmptyContent);
        }

        tracing::info!(source = source_info, chars = text.len(), "Analyzing content");

        let summary = self.engine.summarize(text).await?;
        let results = self.engine.evaluate_content(text).await;
        let id = self.persist(text, source_info, &summary, &results).await?;

        let overall = self.engine.calculate_overall_score(&results);
        let recommendations = self.engine.generate_improvement_recommendations(&results);

        tracing::info!(
            analysis_id = id.0,
            overall_score = overall.overall_score,
            overall_ranking = %overall.overall_ranking,
            "Analysis complete"
        );

        Ok(AnalysisOutcome {
            id,
            summary,
            results,
            overall,
            recommendations,
        })
    }

    /// SQLite writes block, so they run on the blocking pool.
    async fn persist(
        &self,
        text: &str,
        source_info: &str,
        summary: &str,
        results: &EvaluationResults,
    ) -> Result<AnalysisId, AppError> {
        let store = Arc::clone(&self.store);
        let (text, source_info, summary, results) = (
            text.to_string(),
            source_info.to_string(),
            summary.to_string(),
            results.clone(),
        );

        let id = tokio::task::spawn_blocking(move || {
            store.store_analysis(&text, &source_info, &summary, &results)
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Store task failed");
            AppError::Task(e)
        })??;

        Ok(id)
    }
}
