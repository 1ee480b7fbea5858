//! Schema loading and sharing tests

use corpusql_query::schema::{LayerStorage, Scope};
use corpusql_query::testing;
use corpusql_query::{
    AnnotationTranslator, Column, LayerMatch, Matrix, MatrixCompiler, NoRestriction, Schema,
    SchemaDefinition, SchemaError, SearchOptions, SqlTranslator, TranscriptTranslator,
};
use std::sync::Arc;
use std::thread;

const SCHEMA_TOML: &str = r#"
word_layer_id = "token"

[[layers]]
id = "transcript"
storage = { kind = "pseudo", pseudo = "transcript" }

[[layers]]
id = "participant"
parent_id = "transcript"
storage = { kind = "pseudo", pseudo = "participant" }

[[layers]]
id = "corpus"
storage = { kind = "pseudo", pseudo = "corpus" }

[[layers]]
id = "episode"
storage = { kind = "pseudo", pseudo = "episode" }

[[layers]]
id = "turn"
parent_id = "participant"
scope = "M"
alignment = "interval"
storage = { kind = "table", layer_id = 11 }

[[layers]]
id = "utterance"
parent_id = "turn"
scope = "M"
storage = { kind = "table", layer_id = 12 }

[[layers]]
id = "token"
parent_id = "turn"
scope = "W"
storage = { kind = "table", layer_id = 0 }

[[layers]]
id = "phonology"
parent_id = "token"
scope = "W"
type = "ipa"
storage = { kind = "table", layer_id = 7 }

[[layers]]
id = "dialect"
storage = { kind = "attribute", class_id = "speaker", attribute = "dialect" }
"#;

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_schema_from_toml() {
    let schema: Schema = toml::from_str(SCHEMA_TOML).unwrap();
    assert_eq!(schema.word_layer_id(), "token");
    assert_eq!(schema.word_table_id(), 0);
    assert_eq!(schema.turn_table_id(), 11);

    let phonology = schema.layer("phonology").unwrap();
    assert_eq!(phonology.scope, Some(Scope::Word));
    assert!(phonology.is_case_sensitive());
    assert!(matches!(
        schema.layer("dialect").unwrap().storage,
        LayerStorage::Attribute { .. }
    ));
}

#[test]
fn test_toml_schema_drives_translation() {
    let schema: Arc<Schema> = Arc::new(toml::from_str(SCHEMA_TOML).unwrap());
    let sql = AnnotationTranslator::new(Arc::clone(&schema))
        .translate_text("layer.id == 'phonology' && label == 'kat'")
        .unwrap()
        .sql;
    assert!(sql.starts_with("SELECT DISTINCT annotation.*, 'phonology' AS layer FROM annotation_layer_7 annotation"));

    let matrix = Matrix::new().with_column(
        Column::new()
            .with_match(LayerMatch::new("token", "cat"))
            .with_match(LayerMatch::new("phonology", "kat")),
    );
    let sql = MatrixCompiler::new(schema)
        .compile(&matrix, &SearchOptions::default(), &NoRestriction)
        .unwrap()
        .sql;
    assert!(sql.contains("CAST(search_0_7.label AS BINARY) REGEXP BINARY ?"));
}

#[test]
fn test_invalid_schema_is_rejected() {
    let broken = SCHEMA_TOML.replace("layer_id = 7", "layer_id = 0");
    let err = toml::from_str::<Schema>(&broken).unwrap_err();
    assert!(err.to_string().contains("table id 0"), "{}", err);

    let definition = SchemaDefinition::standard().without_layer("word");
    assert!(matches!(
        Schema::new(definition),
        Err(SchemaError::MissingDesignatedLayer { role: "word", .. })
    ));
}

// ============================================================================
// Sharing
// ============================================================================

#[test]
fn test_schema_shared_across_threads() {
    let schema = Arc::new(testing::schema());
    let expected = TranscriptTranslator::new(Arc::clone(&schema))
        .translate_text("labels('transcript_language').includes('en')")
        .unwrap();

    let results: Vec<_> = (0..8)
        .map(|_| {
            let schema = Arc::clone(&schema);
            thread::spawn(move || {
                TranscriptTranslator::new(schema)
                    .translate_text("labels('transcript_language').includes('en')")
                    .unwrap()
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert!(results.iter().all(|query| *query == expected));
}
