use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "rankright",
    version,
    about = "Evaluate documents against quality criteria with a language model"
)]
pub struct Cli {
    /// Configuration file (JSON, or YAML by extension)
    #[arg(long, global = true, default_value = "rankright.json")]
    pub config: PathBuf,

    /// Database path, overriding the configured one
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize and evaluate documents, then store the analysis
    Analyze(AnalyzeArgs),
    /// Print the text report of a stored analysis
    Show(ShowArgs),
    /// List stored analyses, newest first
    History(HistoryArgs),
    /// Print the per-criterion rows of a stored analysis
    Results(ResultsArgs),
    /// List the evaluation criteria
    Criteria,
    /// Aggregate statistics over the store
    Stats(StatsArgs),
    /// Delete every stored analysis
    Clear(ClearArgs),
    /// Check that the model backend answers
    TestConnection,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// UTF-8 text files, analyzed together as one document
    #[arg(required_unless_present = "stdin", conflicts_with = "stdin")]
    pub files: Vec<PathBuf>,

    /// Read the document from standard input
    #[arg(long, default_value_t = false)]
    pub stdin: bool,

    /// Source description recorded with stdin input
    #[arg(long, default_value = "Pasted text")]
    pub source: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    pub id: i64,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Show at most this many analyses
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ResultsArgs {
    pub id: i64,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ClearArgs {
    /// Confirm deletion
    #[arg(long, default_value_t = false)]
    pub yes: bool,
}
