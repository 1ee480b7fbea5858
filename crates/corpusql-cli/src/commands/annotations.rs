use super::query_request;
use crate::cli::{OutputFormat, QueryArgs};
use crate::config::CliConfig;
use crate::output::render_query;
use anyhow::Result;
use corpusql_query::{AnnotationTranslator, SqlTranslator};
use std::sync::Arc;
use tracing::info;

/// Compile an annotation-scope expression and print it
pub fn execute(config: &CliConfig, args: QueryArgs, format: OutputFormat) -> Result<()> {
    let translator = AnnotationTranslator::new(Arc::new(config.schema()?));
    let request = query_request(args)?;
    let query = translator.translate(&request)?;
    info!(parameters = query.parameters.len(), "Compiled annotation query");
    print!("{}", render_query(&query, format)?);
    Ok(())
}
