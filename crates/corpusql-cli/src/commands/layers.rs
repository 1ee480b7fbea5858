use crate::cli::OutputFormat;
use crate::config::CliConfig;
use crate::output::render_layers;
use anyhow::Result;

/// Print the configured schema's layers
pub fn execute(config: &CliConfig, format: OutputFormat) -> Result<()> {
    let schema = config.schema()?;
    print!("{}", render_layers(&schema, format)?);
    Ok(())
}
