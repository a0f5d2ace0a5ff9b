use std::fmt::Write as _;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use rankright_core::report::format_timestamp;
use rankright_core::{
    calculate_overall_score, export_analysis_to_text, summarize_history, truncate_text, Analysis,
    AnalysisId, CriteriaCatalog, Ranking, StoredCriterionResult,
};
use rankright_runtime::{AnalysisOutcome, AppContext, ModelGateway, ProviderRegistry, RuntimeConfig};
use rankright_store::{AnalysisStore, StoreStats};

use crate::cli::{
    AnalyzeArgs, ClearArgs, HistoryArgs, OutputFormat, ResultsArgs, ShowArgs, StatsArgs,
};

const SUMMARY_PREVIEW_CHARS: usize = 80;

pub async fn analyze(config: RuntimeConfig, args: AnalyzeArgs) -> Result<()> {
    let (text, source_info) = if args.stdin {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read standard input")?;
        (text, args.source)
    } else {
        read_files(&args.files)?
    };

    let ctx = AppContext::from_config(config)?;
    let outcome = ctx.analyze(&text, &source_info).await?;

    match args.format {
        OutputFormat::Text => print!("{}", render_outcome(&outcome)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "id": outcome.id,
                "summary": outcome.summary,
                "evaluation_results": outcome.results,
                "overall": outcome.overall,
                "recommendations": outcome.recommendations,
            }))?
        ),
    }
    Ok(())
}

pub fn show(config: &RuntimeConfig, args: ShowArgs) -> Result<()> {
    let store = open_store(config)?;
    let analysis = require_analysis(&store, AnalysisId(args.id))?;

    match args.format {
        OutputFormat::Text => println!("{}", export_analysis_to_text(&analysis)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&analysis)?),
    }
    Ok(())
}

pub fn history(config: &RuntimeConfig, args: HistoryArgs) -> Result<()> {
    let store = open_store(config)?;
    let mut analyses = store.get_all_analyses()?;
    if let Some(limit) = args.limit {
        analyses.truncate(limit);
    }

    match args.format {
        OutputFormat::Text => print!("{}", render_history(&analyses)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&analyses)?),
    }
    Ok(())
}

pub fn results(config: &RuntimeConfig, args: ResultsArgs) -> Result<()> {
    let store = open_store(config)?;
    let id = AnalysisId(args.id);
    require_analysis(&store, id)?;
    let rows = store.get_criteria_results(id)?;

    match args.format {
        OutputFormat::Text => print!("{}", render_results(&rows)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

pub fn criteria() -> Result<()> {
    print!("{}", render_criteria(&CriteriaCatalog::standard()));
    Ok(())
}

pub fn stats(config: &RuntimeConfig, args: StatsArgs) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.get_summary_stats()?;
    let analyses = store.get_all_analyses()?;

    match args.format {
        OutputFormat::Text => print!("{}", render_stats(&stats, &analyses)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "store": stats,
                "history": summarize_history(&analyses),
            }))?
        ),
    }
    Ok(())
}

pub fn clear(config: &RuntimeConfig, args: ClearArgs) -> Result<()> {
    if !args.yes {
        bail!("refusing to delete every analysis without --yes");
    }

    let store = open_store(config)?;
    store.clear_all_data()?;
    info!(path = %config.database_path.display(), "cleared all analyses");
    println!("All analyses deleted.");
    Ok(())
}

pub async fn test_connection(config: &RuntimeConfig) -> Result<()> {
    let gateway = ModelGateway::from_registry(
        &ProviderRegistry::with_defaults(),
        &config.provider,
        &config.provider_config,
        config.gateway_settings(),
    );

    let (ok, message) = gateway.test_connection().await;
    if !ok {
        bail!("connection test failed: {message}");
    }
    println!("{message}");
    Ok(())
}

fn open_store(config: &RuntimeConfig) -> Result<AnalysisStore> {
    AnalysisStore::open(&config.database_path).with_context(|| {
        format!(
            "failed to open database {}",
            config.database_path.display()
        )
    })
}

fn require_analysis(store: &AnalysisStore, id: AnalysisId) -> Result<Analysis> {
    match store.get_analysis(id)? {
        Some(analysis) => Ok(analysis),
        None => bail!("analysis {id} not found"),
    }
}

/// Concatenate files into one document. Source info lists the file names.
fn read_files(paths: &[PathBuf]) -> Result<(String, String)> {
    let mut text = String::new();
    let mut names = Vec::with_capacity(paths.len());

    for path in paths {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            warn!(path = %path.display(), "skipping empty file");
            continue;
        }
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&content);
        names.push(display_name(path));
    }

    if names.is_empty() {
        bail!("no readable content in the given files");
    }

    Ok((text, format!("Files: {}", names.join(", "))))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn render_outcome(outcome: &AnalysisOutcome) -> String {
    let mut out = String::new();
    let overall = &outcome.overall;

    let _ = writeln!(out, "Analysis {} stored.", outcome.id);
    let _ = writeln!(out);
    let _ = writeln!(out, "SUMMARY:");
    let _ = writeln!(out, "{}", outcome.summary);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Overall: {} {} {:.1}/10 ({} green, {} amber, {} red)",
        overall.overall_ranking.emoji(),
        overall.overall_ranking,
        overall.overall_score,
        overall.green_count,
        overall.amber_count,
        overall.red_count
    );
    let _ = writeln!(out);

    for (criterion, result) in outcome.results.iter() {
        let _ = writeln!(
            out,
            "{} {:<28} {:>4.1}  {}",
            result.ranking.emoji(),
            criterion,
            result.score,
            truncate_text(&result.explanation, SUMMARY_PREVIEW_CHARS)
        );
    }

    if !outcome.recommendations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "PRIORITY IMPROVEMENTS:");
        for rec in &outcome.recommendations {
            let _ = writeln!(out, "  • {rec}");
        }
    }
    out
}

fn render_history(analyses: &[Analysis]) -> String {
    if analyses.is_empty() {
        return "No analyses stored.\n".to_string();
    }

    let mut out = String::new();
    for analysis in analyses {
        let overall = calculate_overall_score(&analysis.evaluation_results);
        let _ = writeln!(
            out,
            "#{:<5} {}  {} {:>4.1}  {}",
            analysis.id,
            format_timestamp(&analysis.timestamp),
            overall.overall_ranking.emoji(),
            overall.overall_score,
            truncate_text(&analysis.source_info, SUMMARY_PREVIEW_CHARS)
        );
    }
    out
}

fn render_results(rows: &[StoredCriterionResult]) -> String {
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(
            out,
            "{} {} {:.1}/10",
            row.result.ranking.emoji(),
            row.criterion_name,
            row.result.score
        );
        let _ = writeln!(out, "  {}", row.result.explanation);
        for finding in &row.result.key_findings {
            let _ = writeln!(out, "  • {finding}");
        }
        for rec in &row.result.recommendations {
            let _ = writeln!(out, "  → {rec}");
        }
    }
    out
}

fn render_criteria(catalog: &CriteriaCatalog) -> String {
    let mut out = String::new();
    for (index, criterion) in catalog.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", index + 1, criterion.name);
        let _ = writeln!(out, "   {}", criterion.description);
    }
    out
}

fn render_stats(stats: &StoreStats, analyses: &[Analysis]) -> String {
    let history = summarize_history(analyses);
    let mut out = String::new();

    let _ = writeln!(out, "Total analyses: {}", stats.total_analyses);
    let _ = writeln!(out, "Average score: {:.2}", history.avg_score);
    let _ = writeln!(out, "Ranking distribution:");
    for ranking in Ranking::ALL {
        let _ = writeln!(
            out,
            "  {} {:<6} {}",
            ranking.emoji(),
            ranking,
            stats.ranking_distribution.get(ranking)
        );
    }

    if !stats.average_scores.is_empty() {
        let _ = writeln!(out, "Average score per criterion:");
        for (criterion, score) in &stats.average_scores {
            let _ = writeln!(out, "  {criterion:<28} {score:.2}");
        }
    }

    if !history.most_common_issues.is_empty() {
        let _ = writeln!(out, "Most common issues:");
        for issue in &history.most_common_issues {
            let _ = writeln!(out, "  • {issue}");
        }
    }
    out
}
