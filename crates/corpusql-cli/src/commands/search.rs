use crate::cli::OutputFormat;
use crate::config::CliConfig;
use crate::output::render_query;
use anyhow::{Context, Result};
use corpusql_query::{Matrix, MatrixCompiler, NoRestriction, SearchOptions};
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};

/// Flags of the `search` subcommand
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub matrix: String,
    pub search_id: i64,
    pub participants: Vec<String>,
    pub main_only: bool,
    pub results_table: Option<String>,
}

/// Read a matrix from a JSON file, or stdin for `-`
fn read_matrix(source: &str) -> Result<Matrix> {
    let json = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read matrix from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read matrix file: {}", source))?
    };
    serde_json::from_str(&json).with_context(|| format!("Failed to parse matrix: {}", source))
}

/// Compile a search matrix and print the statement
pub fn execute(config: &CliConfig, args: SearchArgs, format: OutputFormat) -> Result<()> {
    let matrix = read_matrix(&args.matrix)?;
    debug!(columns = matrix.columns.len(), "Loaded search matrix");

    let options = SearchOptions {
        search_id: args.search_id,
        main_participant_only: args.main_only || config.search.main_participant_only,
        participant_ids: args.participants,
        results_table: args
            .results_table
            .unwrap_or_else(|| config.search.results_table.clone()),
    };

    let compiler = MatrixCompiler::new(Arc::new(config.schema()?));
    let query = compiler.compile(&matrix, &options, &NoRestriction)?;
    info!(parameters = query.parameters.len(), "Compiled search matrix");
    print!("{}", render_query(&query, format)?);
    Ok(())
}
