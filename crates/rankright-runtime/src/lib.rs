//! # rankright-runtime
//!
//! Model-backed evaluation for RankRight.
//!
//! This crate owns everything that talks to a language model: the provider
//! layer, the [`ModelGateway`] that adds timeouts and retries, and the
//! [`EvaluationEngine`] that runs every criterion. [`AppContext`] ties those
//! to the analysis store.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rankright_runtime::{AppContext, RuntimeConfig};
//!
//! let config = RuntimeConfig::load("rankright.json".as_ref())?;
//! let ctx = AppContext::from_config(config)?;
//!
//! let outcome = ctx.analyze(&text, "Files: report.txt").await?;
//! println!("{} ({})", outcome.overall.overall_score, outcome.overall.overall_ranking);
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod gateway;
pub mod prompts;
pub mod providers;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, RuntimeConfig};
pub use context::{AnalysisOutcome, AppContext, AppError};
pub use engine::{CriterionOutcome, EvaluationEngine, EvaluationError};
pub use gateway::{GatewayError, GatewaySettings, ModelGateway, TransportError};
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};
