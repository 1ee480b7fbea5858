//! Output formatting for compiled queries and schema listings

use crate::cli::OutputFormat;
use anyhow::Result;
use corpusql_query::schema::{AttributeClass, LayerStorage, LayerType};
use corpusql_query::{Layer, Query, Schema};
use tabled::{settings::Style, Table, Tabled};

/// Render a compiled query
pub fn render_query(query: &Query, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(query)?),
        OutputFormat::Text => {
            let mut out = format!("{};\n", query.sql);
            for (i, value) in query.parameters.iter().enumerate() {
                out.push_str(&format!("-- ?{} = {}\n", i + 1, value));
            }
            Ok(out)
        }
    }
}

/// One row of the `layers` listing
#[derive(Debug, Tabled)]
struct LayerRow {
    #[tabled(rename = "LAYER")]
    layer: String,
    #[tabled(rename = "STORAGE")]
    storage: String,
    #[tabled(rename = "SCOPE")]
    scope: String,
    #[tabled(rename = "TYPE")]
    layer_type: &'static str,
}

impl LayerRow {
    fn new(layer: &Layer) -> Self {
        Self {
            layer: layer.id.clone(),
            storage: storage(layer),
            scope: layer
                .scope
                .map(|s| s.code().to_ascii_uppercase().to_string())
                .unwrap_or_else(|| "-".to_string()),
            layer_type: type_name(layer.layer_type),
        }
    }
}

/// Render every layer of a schema
pub fn render_layers(schema: &Schema, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let layers: Vec<&Layer> = schema.layers().collect();
            Ok(serde_json::to_string_pretty(&layers)?)
        }
        OutputFormat::Text => {
            let rows: Vec<LayerRow> = schema.layers().map(LayerRow::new).collect();
            Ok(format!("{}\n", Table::new(rows).with(Style::modern())))
        }
    }
}

fn storage(layer: &Layer) -> String {
    match &layer.storage {
        LayerStorage::Table { layer_id } => format!("table {}", layer_id),
        LayerStorage::Attribute {
            class_id,
            attribute,
        } => {
            let class = match class_id {
                AttributeClass::Transcript => "transcript",
                AttributeClass::Speaker => "speaker",
            };
            format!("{} attribute {}", class, attribute)
        }
        LayerStorage::Pseudo { .. } => "pseudo".to_string(),
    }
}

fn type_name(layer_type: LayerType) -> &'static str {
    match layer_type {
        LayerType::String => "string",
        LayerType::Number => "number",
        LayerType::Ipa => "ipa",
        LayerType::Date => "date",
        LayerType::Boolean => "boolean",
    }
}
