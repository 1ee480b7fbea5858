use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors (default)
    Warn,
    /// Informational messages
    Info,
    /// Debug messages, including compilation summaries
    Debug,
    /// Trace-level messages (most verbose)
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// How compiled queries are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// SQL text followed by one comment line per parameter
    #[default]
    Text,
    /// `{"sql": ..., "parameters": [...]}`
    Json,
}

#[derive(Parser)]
#[command(name = "corpusql")]
#[command(about = "corpusql - compile annotation-store queries and search matrices into SQL")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    /// If not specified, uses RUST_LOG, then the config file, then 'warn'
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (defaults to ~/.config/corpusql/config.toml)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile an expression selecting transcripts
    Transcripts(QueryArgs),

    /// Compile an expression selecting annotations of one layer
    Annotations(QueryArgs),

    /// Compile a search matrix into an INSERT ... SELECT statement
    Search {
        /// Matrix JSON file, or '-' for stdin
        matrix: String,

        /// Search id written into every result row
        #[arg(long, default_value_t = 0)]
        search_id: i64,

        /// Only match turns of this participant (can be repeated)
        #[arg(short = 'p', long = "participant", value_name = "NAME")]
        participants: Vec<String>,

        /// Only match turns of main participants
        #[arg(long)]
        main_only: bool,

        /// Results table (overrides config)
        #[arg(long)]
        results_table: Option<String>,
    },

    /// List the layers of the configured schema
    Layers,
}

/// Options shared by the translator subcommands
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Query-language expression
    pub expression: String,

    /// Projection list (defaults per scope)
    #[arg(long)]
    pub columns: Option<String>,

    /// Raw SQL condition ANDed into the WHERE clause
    #[arg(long = "where", value_name = "SQL")]
    pub where_clause: Option<String>,

    /// ORDER BY list in the query language, e.g. "label DESC, ordinal"
    #[arg(long)]
    pub order: Option<String>,

    /// LIMIT clause, with or without the keyword
    #[arg(long)]
    pub limit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_flags() {
        let cli = Cli::try_parse_from([
            "corpusql",
            "--format",
            "json",
            "search",
            "matrix.json",
            "-p",
            "ada",
            "-p",
            "bob",
            "--main-only",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Search {
                matrix,
                participants,
                main_only,
                search_id,
                ..
            } => {
                assert_eq!(matrix, "matrix.json");
                assert_eq!(participants, vec!["ada", "bob"]);
                assert!(main_only);
                assert_eq!(search_id, 0);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_parse_query_args() {
        let cli = Cli::try_parse_from([
            "corpusql",
            "annotations",
            "layer.id == 'word'",
            "--where",
            "annotation.ag_id = 3",
            "--limit",
            "5",
        ])
        .unwrap();
        let Commands::Annotations(args) = cli.command else {
            panic!("expected annotations command");
        };
        assert_eq!(args.expression, "layer.id == 'word'");
        assert_eq!(args.where_clause.as_deref(), Some("annotation.ag_id = 3"));
        assert_eq!(args.limit.as_deref(), Some("5"));
        assert!(args.order.is_none());
    }
}
