use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use corpusql_cli::{
    cli::{Cli, Commands},
    commands::{self, search::SearchArgs},
    config::CliConfig,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = CliConfig::load(cli.config.clone())?;
    init_logging(&cli, &config);
    debug!(
        results_table = %config.search.results_table,
        custom_schema = config.schema.is_some(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Transcripts(args) => commands::transcripts::execute(&config, args, cli.format)?,

        Commands::Annotations(args) => commands::annotations::execute(&config, args, cli.format)?,

        Commands::Search {
            matrix,
            search_id,
            participants,
            main_only,
            results_table,
        } => commands::search::execute(
            &config,
            SearchArgs {
                matrix,
                search_id,
                participants,
                main_only,
                results_table,
            },
            cli.format,
        )?,

        Commands::Layers => commands::layers::execute(&config, cli.format)?,
    }

    Ok(())
}

/// Flags win over `RUST_LOG`, which wins over the config file; the
/// fallback is `warn`. Logs go to stderr.
fn init_logging(cli: &Cli, config: &CliConfig) {
    let flag_level: Option<LevelFilter> = match (cli.log_level, cli.verbose) {
        (Some(level), _) => Some(level.into()),
        (None, true) => Some(LevelFilter::DEBUG),
        (None, false) => None,
    };

    let filter = match flag_level {
        Some(level) => level_filter(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = config
                .logging
                .level
                .as_deref()
                .and_then(|l| l.parse::<LevelFilter>().ok())
                .unwrap_or(LevelFilter::WARN);
            level_filter(level)
        }),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn level_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy("")
}
