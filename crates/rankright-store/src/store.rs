//! The [`AnalysisStore`] and its row mapping.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use rankright_core::{
    normalize_list, Analysis, AnalysisId, CriterionResult, EvaluationResults, Ranking,
    RankingCounts, RawCriterionResult, ResultValidator, StoredCriterionResult,
};

use crate::migrations::run_migrations;
use crate::{StoreError, StoreResult};

/// Timestamp layout written by older databases (`CURRENT_TIMESTAMP`).
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Aggregate statistics over everything in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_analyses: usize,

    /// Criterion rows per ranking
    pub ranking_distribution: RankingCounts,

    /// Mean score per criterion name, highest first
    pub average_scores: Vec<(String, f64)>,
}

impl StoreStats {
    pub fn average_score(&self, criterion: &str) -> Option<f64> {
        self.average_scores
            .iter()
            .find(|(name, _)| name == criterion)
            .map(|(_, score)| *score)
    }
}

/// Durable record of analyses and their per-criterion results.
///
/// All access goes through one connection guarded by a mutex. Callers never
/// hold the lock across anything but SQL.
pub struct AnalysisStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for AnalysisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl AnalysisStore {
    /// Open (or create) a database file and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::initialize(conn, Some(path.to_path_buf()))
    }

    /// A private database that disappears when the store is dropped.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::initialize(Connection::open_in_memory()?, None)
    }

    fn initialize(mut conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        run_migrations(&mut conn)?;

        match &path {
            Some(path) => tracing::debug!(path = %path.display(), "Opened analysis store"),
            None => tracing::debug!("Opened in-memory analysis store"),
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Location of the database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Persist an analysis and every criterion result atomically.
    pub fn store_analysis(
        &self,
        content: &str,
        source_info: &str,
        summary: &str,
        results: &EvaluationResults,
    ) -> StoreResult<AnalysisId> {
        let results_json = serde_json::to_string(results)?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let mut child_rows = Vec::with_capacity(results.len());
        for (criterion, result) in results.iter() {
            child_rows.push((
                criterion,
                result,
                serde_json::to_string(&result.key_findings)?,
                serde_json::to_string(&result.recommendations)?,
            ));
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO analyses (
                content,
                source_info,
                summary,
                evaluation_results,
                timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![content, source_info, summary, results_json, timestamp],
        )?;
        let analysis_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO criteria_results (
                    analysis_id,
                    criterion_name,
                    ranking,
                    score,
                    explanation,
                    key_findings,
                    recommendations
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for (criterion, result, key_findings, recommendations) in &child_rows {
                stmt.execute(params![
                    analysis_id,
                    criterion,
                    result.ranking.as_str(),
                    result.score,
                    result.explanation,
                    key_findings,
                    recommendations,
                ])?;
            }
        }

        tx.commit()?;

        tracing::info!(
            analysis_id,
            criteria = child_rows.len(),
            "Stored analysis"
        );

        Ok(AnalysisId(analysis_id))
    }

    /// Load one analysis, `None` when the id is unknown.
    pub fn get_analysis(&self, id: AnalysisId) -> StoreResult<Option<Analysis>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT
                    id,
                    content,
                    source_info,
                    summary,
                    evaluation_results,
                    timestamp
                FROM analyses
                WHERE id = ?1",
                params![id.0],
                AnalysisRow::from_row,
            )
            .optional()?;
        drop(conn);

        row.map(AnalysisRow::into_analysis).transpose()
    }

    /// Every analysis, newest first. Ties on timestamp go to the higher id.
    ///
    /// Rows that cannot be decoded are skipped with a warning so one bad row
    /// does not hide the rest. [`get_analysis`](Self::get_analysis) still
    /// reports them as [`StoreError::Corrupt`].
    pub fn get_all_analyses(&self) -> StoreResult<Vec<Analysis>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT
                    id,
                    content,
                    source_info,
                    summary,
                    evaluation_results,
                    timestamp
                FROM analyses
                ORDER BY timestamp DESC, id DESC",
            )?;

            let rows_iter = stmt.query_map([], AnalysisRow::from_row)?;

            let mut rows = Vec::new();
            for row in rows_iter {
                rows.push(row?);
            }
            rows
        };

        let mut analyses = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.into_analysis() {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => tracing::warn!(analysis_id = id, error = %e, "Skipping unreadable analysis"),
            }
        }
        Ok(analyses)
    }

    /// Child rows of one analysis ordered by criterion name.
    pub fn get_criteria_results(&self, id: AnalysisId) -> StoreResult<Vec<StoredCriterionResult>> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT
                    criterion_name,
                    ranking,
                    score,
                    explanation,
                    key_findings,
                    recommendations
                FROM criteria_results
                WHERE analysis_id = ?1
                ORDER BY criterion_name ASC",
            )?;

            let rows_iter = stmt.query_map(params![id.0], CriterionRow::from_row)?;

            let mut rows = Vec::new();
            for row in rows_iter {
                rows.push(row?);
            }
            rows
        };

        rows.into_iter().map(CriterionRow::into_stored).collect()
    }

    /// Delete one analysis and its criterion rows. Returns whether it existed.
    pub fn delete_analysis(&self, id: AnalysisId) -> StoreResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        // Databases created before cascading keys still need the explicit delete.
        tx.execute(
            "DELETE FROM criteria_results WHERE analysis_id = ?1",
            params![id.0],
        )?;
        let removed = tx.execute("DELETE FROM analyses WHERE id = ?1", params![id.0])?;

        tx.commit()?;

        if removed > 0 {
            tracing::info!(analysis_id = id.0, "Deleted analysis");
        }
        Ok(removed > 0)
    }

    /// Remove every analysis and criterion row.
    pub fn clear_all_data(&self) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let criteria = tx.execute("DELETE FROM criteria_results", [])?;
        let analyses = tx.execute("DELETE FROM analyses", [])?;

        tx.commit()?;

        tracing::info!(analyses, criteria, "Cleared analysis store");
        Ok(())
    }

    /// Totals, ranking distribution and per-criterion averages.
    pub fn get_summary_stats(&self) -> StoreResult<StoreStats> {
        let conn = self.conn.lock();

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM analyses", [], |row| row.get(0))?;

        let mut ranking_distribution = RankingCounts::default();
        {
            let mut stmt = conn.prepare(
                "SELECT ranking, COUNT(*)
                FROM criteria_results
                GROUP BY ranking",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            for row in rows {
                let (label, count) = row?;
                match label.parse::<Ranking>() {
                    Ok(ranking) => {
                        for _ in 0..count {
                            ranking_distribution.record(ranking);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(ranking = %label, count, error = %e, "Skipping unknown ranking in stats");
                    }
                }
            }
        }

        let mut average_scores = Vec::new();
        {
            let mut stmt = conn.prepare(
                "SELECT criterion_name, AVG(score) AS avg_score
                FROM criteria_results
                GROUP BY criterion_name
                ORDER BY avg_score DESC, criterion_name ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?;

            for row in rows {
                average_scores.push(row?);
            }
        }

        Ok(StoreStats {
            total_analyses: to_usize(total),
            ranking_distribution,
            average_scores,
        })
    }
}

struct AnalysisRow {
    id: i64,
    content: String,
    source_info: String,
    summary: String,
    evaluation_results: String,
    timestamp: String,
}

impl AnalysisRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            source_info: row.get(2)?,
            summary: row.get(3)?,
            evaluation_results: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }

    fn into_analysis(self) -> StoreResult<Analysis> {
        let evaluation_results = decode_results(&self.evaluation_results).map_err(|message| {
            StoreError::Corrupt {
                table: "analyses",
                message: format!("analysis {}: invalid evaluation_results: {message}", self.id),
            }
        })?;

        Ok(Analysis {
            id: AnalysisId(self.id),
            content: self.content,
            source_info: self.source_info,
            summary: self.summary,
            evaluation_results,
            timestamp: parse_timestamp(&self.timestamp)?,
        })
    }
}

struct CriterionRow {
    criterion_name: String,
    ranking: String,
    score: f64,
    explanation: String,
    key_findings: Option<String>,
    recommendations: Option<String>,
}

impl CriterionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            criterion_name: row.get(0)?,
            ranking: row.get(1)?,
            score: row.get(2)?,
            explanation: row.get(3)?,
            key_findings: row.get(4)?,
            recommendations: row.get(5)?,
        })
    }

    fn into_stored(self) -> StoreResult<StoredCriterionResult> {
        let ranking = self.ranking.parse::<Ranking>().map_err(|e| StoreError::Corrupt {
            table: "criteria_results",
            message: format!("{}: {e}", self.criterion_name),
        })?;
        let key_findings = parse_list(&self.criterion_name, self.key_findings.as_deref())?;
        let recommendations = parse_list(&self.criterion_name, self.recommendations.as_deref())?;

        Ok(StoredCriterionResult {
            criterion_name: self.criterion_name,
            result: CriterionResult {
                ranking,
                score: self.score,
                explanation: self.explanation,
                key_findings,
                recommendations,
            },
        })
    }
}

/// Criterion entries of the JSON column in document order.
struct RawResults(Vec<(String, JsonValue)>);

impl<'de> Deserialize<'de> for RawResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawResults;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of criterion name to result")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = access.next_entry::<String, JsonValue>()? {
                    entries.push(entry);
                }
                Ok(RawResults(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Decode the stored results through the validator.
///
/// Older databases hold the model's objects as written, so list items may be
/// numbers or objects and scores may be strings.
fn decode_results(json: &str) -> Result<EvaluationResults, String> {
    let RawResults(entries) = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let validator = ResultValidator::new();

    entries
        .into_iter()
        .map(|(criterion, value)| {
            let raw = RawCriterionResult::try_from(value).map_err(|e| format!("{criterion}: {e}"))?;
            let result = validator
                .normalize(raw)
                .map_err(|e| format!("{criterion}: {e}"))?;
            Ok((criterion, result))
        })
        .collect()
}

fn parse_list(criterion: &str, value: Option<&str>) -> StoreResult<Vec<String>> {
    match value {
        None => Ok(Vec::new()),
        Some(text) => serde_json::from_str::<JsonValue>(text)
            .map(|value| normalize_list(Some(value)))
            .map_err(|e| StoreError::Corrupt {
                table: "criteria_results",
                message: format!("{criterion}: invalid list column: {e}"),
            }),
    }
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, LEGACY_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::Corrupt {
            table: "analyses",
            message: format!("invalid timestamp '{value}': {e}"),
        })
}

fn to_usize(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn result(ranking: Ranking, score: f64) -> CriterionResult {
        CriterionResult {
            ranking,
            score,
            explanation: format!("{ranking} because reasons"),
            key_findings: vec!["finding one".to_string(), "finding two".to_string()],
            recommendations: vec!["do better".to_string()],
        }
    }

    fn sample_results() -> EvaluationResults {
        let mut results = EvaluationResults::new();
        results.insert("Structure & Organization", result(Ranking::Green, 8.5));
        results.insert("Clarity & Readability", result(Ranking::Amber, 6.25));
        results.insert("Accuracy & Reliability", result(Ranking::Red, 2.0));
        results
    }

    fn count(store: &AnalysisStore, table: &str) -> i64 {
        store
            .conn
            .lock()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_store_and_load_round_trip() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let results = sample_results();

        let id = store
            .store_analysis("the content", "Files: a.txt", "the summary", &results)
            .unwrap();
        let analysis = store.get_analysis(id).unwrap().unwrap();

        assert_eq!(analysis.id, id);
        assert_eq!(analysis.content, "the content");
        assert_eq!(analysis.source_info, "Files: a.txt");
        assert_eq!(analysis.summary, "the summary");
        assert_eq!(analysis.evaluation_results, results);
        // Insertion order survives the JSON column.
        assert_eq!(
            analysis.evaluation_results.names().collect::<Vec<_>>(),
            vec![
                "Structure & Organization",
                "Clarity & Readability",
                "Accuracy & Reliability"
            ]
        );
    }

    #[test]
    fn test_get_analysis_is_idempotent() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let id = store
            .store_analysis("c", "s", "sum", &sample_results())
            .unwrap();

        let first = store.get_analysis(id).unwrap();
        let second = store.get_analysis(id).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_id_is_none() {
        let store = AnalysisStore::open_in_memory().unwrap();
        assert!(store.get_analysis(AnalysisId(42)).unwrap().is_none());
        assert!(store.get_criteria_results(AnalysisId(42)).unwrap().is_empty());
    }

    #[test]
    fn test_criteria_results_ordered_by_name() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let id = store
            .store_analysis("c", "s", "sum", &sample_results())
            .unwrap();

        let rows = store.get_criteria_results(id).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.criterion_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Accuracy & Reliability",
                "Clarity & Readability",
                "Structure & Organization"
            ]
        );
        assert_eq!(rows[1].result.score, 6.25);
        assert_eq!(rows[1].result.ranking, Ranking::Amber);
        assert_eq!(rows[1].result.key_findings, vec!["finding one", "finding two"]);
    }

    #[test]
    fn test_all_analyses_newest_first() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let first = store.store_analysis("1", "s", "sum", &sample_results()).unwrap();
        let second = store.store_analysis("2", "s", "sum", &sample_results()).unwrap();
        let third = store.store_analysis("3", "s", "sum", &sample_results()).unwrap();

        let ids: Vec<_> = store
            .get_all_analyses()
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![third, second, first]);
    }

    #[test]
    fn test_clear_all_data() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let ids = [
            store.store_analysis("1", "s", "sum", &sample_results()).unwrap(),
            store.store_analysis("2", "s", "sum", &sample_results()).unwrap(),
        ];

        store.clear_all_data().unwrap();

        for id in ids {
            assert!(store.get_analysis(id).unwrap().is_none());
            assert!(store.get_criteria_results(id).unwrap().is_empty());
        }
        assert!(store.get_all_analyses().unwrap().is_empty());
        assert_eq!(count(&store, "criteria_results"), 0);
        assert_eq!(store.get_summary_stats().unwrap(), StoreStats::default());
    }

    #[test]
    fn test_delete_analysis_removes_children() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let keep = store.store_analysis("keep", "s", "sum", &sample_results()).unwrap();
        let gone = store.store_analysis("gone", "s", "sum", &sample_results()).unwrap();

        assert!(store.delete_analysis(gone).unwrap());
        assert!(!store.delete_analysis(gone).unwrap());

        assert!(store.get_analysis(gone).unwrap().is_none());
        assert!(store.get_criteria_results(gone).unwrap().is_empty());
        assert_eq!(store.get_criteria_results(keep).unwrap().len(), 3);
    }

    #[test]
    fn test_foreign_keys_cascade() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let id = store.store_analysis("c", "s", "sum", &sample_results()).unwrap();

        store
            .conn
            .lock()
            .execute("DELETE FROM analyses WHERE id = ?1", params![id.0])
            .unwrap();

        assert_eq!(count(&store, "criteria_results"), 0);
    }

    #[test]
    fn test_failed_store_leaves_nothing() {
        let store = AnalysisStore::open_in_memory().unwrap();
        store
            .conn
            .lock()
            .execute_batch(
                "CREATE TRIGGER reject_red BEFORE INSERT ON criteria_results
                 WHEN NEW.ranking = 'Red'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let err = store
            .store_analysis("c", "s", "sum", &sample_results())
            .unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));

        assert_eq!(count(&store, "analyses"), 0);
        assert_eq!(count(&store, "criteria_results"), 0);
    }

    #[test]
    fn test_summary_stats() {
        let store = AnalysisStore::open_in_memory().unwrap();
        store.store_analysis("1", "s", "sum", &sample_results()).unwrap();

        let mut second = EvaluationResults::new();
        second.insert("Clarity & Readability", result(Ranking::Green, 9.75));
        store.store_analysis("2", "s", "sum", &second).unwrap();

        let stats = store.get_summary_stats().unwrap();
        assert_eq!(stats.total_analyses, 2);
        assert_eq!(
            stats.ranking_distribution,
            RankingCounts {
                green: 2,
                amber: 1,
                red: 1
            }
        );
        assert_eq!(
            stats.average_scores,
            vec![
                ("Structure & Organization".to_string(), 8.5),
                ("Clarity & Readability".to_string(), 8.0),
                ("Accuracy & Reliability".to_string(), 2.0),
            ]
        );
        assert_eq!(stats.average_score("Clarity & Readability"), Some(8.0));
        assert_eq!(stats.average_score("Completeness & Coverage"), None);
    }

    #[test]
    fn test_legacy_timestamp_and_null_lists() {
        let store = AnalysisStore::open_in_memory().unwrap();
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO analyses (content, source_info, summary, evaluation_results, timestamp)
                 VALUES ('c', 's', 'sum', '{}', '2024-06-01 12:30:00')",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO criteria_results
                    (analysis_id, criterion_name, ranking, score, explanation, key_findings, recommendations)
                 VALUES (1, 'Clarity & Readability', 'Amber', 5.0, 'x', NULL, NULL)",
                [],
            )
            .unwrap();
        }

        let analysis = store.get_analysis(AnalysisId(1)).unwrap().unwrap();
        assert_eq!(analysis.timestamp.to_rfc3339(), "2024-06-01T12:30:00+00:00");
        assert!(analysis.evaluation_results.is_empty());

        let rows = store.get_criteria_results(AnalysisId(1)).unwrap();
        assert!(rows[0].result.key_findings.is_empty());
        assert!(rows[0].result.recommendations.is_empty());
    }

    fn insert_legacy_analysis(store: &AnalysisStore, evaluation_results: &str) -> AnalysisId {
        let conn = store.conn.lock();
        conn.execute(
            "INSERT INTO analyses (content, source_info, summary, evaluation_results, timestamp)
             VALUES ('legacy', 'Files: old.txt', 'sum', ?1, '2020-01-01 00:00:00')",
            params![evaluation_results],
        )
        .unwrap();
        AnalysisId(conn.last_insert_rowid())
    }

    #[test]
    fn test_legacy_results_with_untyped_list_items() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let good = store.store_analysis("c", "s", "sum", &sample_results()).unwrap();
        let legacy = insert_legacy_analysis(
            &store,
            r#"{"Clarity & Readability": {"ranking": "Red", "score": "3", "explanation": "Dense",
                "key_findings": [{"finding": "a"}, 7], "recommendations": "Split paragraphs"}}"#,
        );
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO criteria_results
                    (analysis_id, criterion_name, ranking, score, explanation, key_findings, recommendations)
                 VALUES (?1, 'Clarity & Readability', 'Red', 3.0, 'Dense', '[{\"finding\":\"a\"},7]', '\"Split paragraphs\"')",
                params![legacy.0],
            )
            .unwrap();
        }

        let analysis = store.get_analysis(legacy).unwrap().unwrap();
        let result = analysis.evaluation_results.get("Clarity & Readability").unwrap();
        assert_eq!(result.ranking, Ranking::Red);
        assert_eq!(result.score, 3.0);
        assert_eq!(result.key_findings, vec![r#"{"finding":"a"}"#, "7"]);
        assert_eq!(result.recommendations, vec!["Split paragraphs"]);

        let rows = store.get_criteria_results(legacy).unwrap();
        assert_eq!(rows[0].result.key_findings, vec![r#"{"finding":"a"}"#, "7"]);
        assert_eq!(rows[0].result.recommendations, vec!["Split paragraphs"]);

        let ids: Vec<_> = store.get_all_analyses().unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![good, legacy]);
    }

    #[test]
    fn test_unreadable_row_does_not_hide_the_rest() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let good = store.store_analysis("c", "s", "sum", &sample_results()).unwrap();
        let broken = insert_legacy_analysis(&store, r#"{"Clarity & Readability": {"score": 4}}"#);

        let err = store.get_analysis(broken).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { table: "analyses", .. }));
        assert!(err.to_string().contains("Missing required field: ranking"));

        let listed = store.get_all_analyses().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, good);
    }

    #[test]
    fn test_corrupt_ranking_reported() {
        let store = AnalysisStore::open_in_memory().unwrap();
        let id = store.store_analysis("c", "s", "sum", &sample_results()).unwrap();
        store
            .conn
            .lock()
            .execute("UPDATE criteria_results SET ranking = 'Purple'", [])
            .unwrap();

        let err = store.get_criteria_results(id).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { table: "criteria_results", .. }));
    }

    #[test]
    fn test_reopen_keeps_schema_version() {
        let dir = std::env::temp_dir().join(format!("rankright-store-{}", std::process::id()));
        let path = dir.join("nested").join("analyses.db");

        {
            let store = AnalysisStore::open(&path).unwrap();
            store.store_analysis("c", "s", "sum", &sample_results()).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }

        let store = AnalysisStore::open(&path).unwrap();
        assert_eq!(store.get_all_analyses().unwrap().len(), 1);

        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    proptest! {
        #[test]
        fn prop_distribution_matches_stored_rows(
            rankings in prop::collection::vec(0usize..3, 0..10),
        ) {
            let store = AnalysisStore::open_in_memory().unwrap();
            let results: EvaluationResults = rankings
                .iter()
                .enumerate()
                .map(|(i, r)| (format!("criterion {i}"), result(Ranking::ALL[*r], 5.0)))
                .collect();

            let id = store.store_analysis("c", "s", "sum", &results).unwrap();
            let stats = store.get_summary_stats().unwrap();

            prop_assert_eq!(stats.total_analyses, 1);
            prop_assert_eq!(stats.ranking_distribution.total(), rankings.len());
            prop_assert_eq!(store.get_criteria_results(id).unwrap().len(), rankings.len());
        }
    }
}
