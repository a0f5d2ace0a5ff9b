//! # rankright-store
//!
//! SQLite persistence for RankRight analyses.
//!
//! Every analysis is one parent row in `analyses` plus one child row per
//! criterion in `criteria_results`. Writes that touch several rows run in a
//! single transaction, so a failed store leaves nothing behind.

mod migrations;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use store::{AnalysisStore, StoreStats};

/// Errors from the analysis store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Failed to serialize evaluation results: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    #[error("Database version ({found}) is newer than supported schema ({supported})")]
    UnsupportedSchema { found: i32, supported: i32 },

    #[error("Failed to create database directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
