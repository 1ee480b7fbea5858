//! Search matrix integration tests

use corpusql_query::render::placeholder_count;
use corpusql_query::testing;
use corpusql_query::{
    Column, CompileError, LayerMatch, Matrix, MatrixCompiler, NoRestriction, Query, SearchOptions,
    SearchRestriction,
};
use serde_json::json;
use std::sync::Arc;

fn compile(matrix: &Matrix) -> Query {
    MatrixCompiler::new(Arc::new(testing::schema()))
        .compile(matrix, &SearchOptions::default(), &NoRestriction)
        .unwrap()
}

fn single(layer: &str, pattern: &str) -> Matrix {
    Matrix::new().with_column(Column::new().with_match(LayerMatch::new(layer, pattern)))
}

struct AccessControl;

impl SearchRestriction for AccessControl {
    fn transcript_filter(&self, ag_id: &str) -> Option<String> {
        Some(format!(
            "{} IN (SELECT ag_id FROM transcript WHERE corpus_name = 'public')",
            ag_id
        ))
    }

    fn extra_joins(&self) -> Option<String> {
        Some("INNER JOIN transcript access ON access.ag_id = turn.ag_id".to_string())
    }

    fn extra_where(&self) -> Option<String> {
        Some("access.type_id <> 3".to_string())
    }
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn test_single_word_search() {
    let query = compile(&single("word", "needle"));
    assert!(query.sql.starts_with("INSERT INTO _result ("));
    assert!(query.sql.contains(
        "FROM annotation_layer_11 turn INNER JOIN annotation_layer_0 search_0_0 \
         ON search_0_0.turn_annotation_id = turn.annotation_id AND search_0_0.label REGEXP ?"
    ));
    assert!(query.sql.contains("CAST(turn.label AS SIGNED)"));
    assert_eq!(query.parameters, vec![json!("^(needle)$")]);
}

#[test]
fn test_two_word_search_snapshot() {
    let matrix = Matrix::new()
        .with_column(Column::new().with_match(LayerMatch::new("word", "the")))
        .with_column(Column::new().with_match(LayerMatch::new("pos", "N.*")));
    let query = compile(&matrix);
    insta::assert_snapshot!(
        query.sql,
        @"INSERT INTO _result (search_id, ag_id, speaker_number, start_anchor_id, end_anchor_id, target_annotation_id, segment_annotation_id, turn_annotation_id, first_matched_word_annotation_id, last_matched_word_annotation_id, complete) SELECT 0, turn.ag_id, CAST(turn.label AS SIGNED), search_0_0.start_anchor_id, search_1_3.end_anchor_id, search_0_0.annotation_id, NULL, turn.annotation_id, search_0_0.word_annotation_id, search_1_3.word_annotation_id, 0 FROM annotation_layer_11 turn INNER JOIN annotation_layer_0 search_0_0 ON search_0_0.turn_annotation_id = turn.annotation_id AND search_0_0.label REGEXP ? INNER JOIN annotation_layer_3 search_1_3 ON search_1_3.turn_annotation_id = search_0_0.turn_annotation_id AND search_1_3.ordinal_in_turn = search_0_0.ordinal_in_turn + 1 AND search_1_3.label REGEXP ? WHERE 1=1 ORDER BY search_0_0.turn_annotation_id, search_0_0.ordinal_in_turn"
    );
}

// ============================================================================
// Case sensitivity
// ============================================================================

#[test]
fn test_ipa_layer_uses_binary_match() {
    let ipa = compile(&single("phonemes", "kat")).sql;
    let text = compile(&single("orthography", "kat")).sql;
    assert!(ipa.contains("CAST(search_0_4.label AS BINARY) REGEXP BINARY ?"));
    assert!(!text.contains("BINARY"));
    assert!(text.contains("search_0_2.label REGEXP ?"));
}

#[test]
fn test_negated_ipa_match_keeps_binary_comparison() {
    let matrix = Matrix::new()
        .with_column(Column::new().with_match(LayerMatch::new("phonemes", "kat").negated()));
    let query = compile(&matrix);
    assert!(query
        .sql
        .contains("CAST(search_0_4.label AS BINARY) NOT REGEXP BINARY ?"));
    assert_eq!(query.parameters, vec![json!("^(kat)$")]);
}

// ============================================================================
// Parameter alignment
// ============================================================================

#[test]
fn test_parameters_follow_placeholders() {
    let matrix = Matrix::new()
        .with_column(
            Column::new()
                .with_match(LayerMatch::new("word", "a"))
                .with_match(LayerMatch::new("language", "en"))
                .with_match(LayerMatch::layer("frequency").with_range(Some(1.0), None)),
        )
        .with_column(
            Column::new()
                .with_match(LayerMatch::new("word", "b").negated())
                .with_match(LayerMatch::new("segment", "p")),
        )
        .with_transcript_query("/^x/.test(id)");
    let options = SearchOptions {
        participant_ids: vec!["ada".to_string()],
        ..SearchOptions::default()
    };
    let query = MatrixCompiler::new(Arc::new(testing::schema()))
        .compile(&matrix, &options, &NoRestriction)
        .unwrap();

    assert_eq!(placeholder_count(&query.sql), query.parameters.len());
    assert_eq!(
        query.parameters,
        vec![
            json!("^(a)$"),
            json!("^(en)$"),
            json!("^(b)$"),
            json!("^(p)$"),
            json!(1.0),
            json!("ada"),
        ]
    );
}

#[test]
fn test_caller_restrictions() {
    let query = MatrixCompiler::new(Arc::new(testing::schema()))
        .compile(
            &single("word", "x"),
            &SearchOptions::default(),
            &AccessControl,
        )
        .unwrap();
    assert!(query
        .sql
        .contains("REGEXP ? INNER JOIN transcript access ON access.ag_id = turn.ag_id WHERE 1=1"));
    assert!(query.sql.contains(
        "AND turn.ag_id IN (SELECT ag_id FROM transcript WHERE corpus_name = 'public') \
         AND access.type_id <> 3 ORDER BY"
    ));
    assert!(query.is_aligned());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_every_bad_layer_is_reported() {
    let matrix = Matrix::new()
        .with_column(
            Column::new()
                .with_match(LayerMatch::new("w1", "a"))
                .with_match(LayerMatch::new("w2", "b")),
        )
        .with_column(
            Column::new()
                .with_match(LayerMatch::new("w3", "c"))
                .with_match(LayerMatch::new("w4", "d")),
        );
    let errors = MatrixCompiler::new(Arc::new(testing::schema()))
        .compile(&matrix, &SearchOptions::default(), &NoRestriction)
        .unwrap_err();
    assert_eq!(errors.len(), 4);
    assert!(errors
        .errors()
        .iter()
        .all(|e| matches!(e, CompileError::UnknownLayer(_))));
}

#[test]
fn test_matrix_from_json() {
    let matrix: Matrix = serde_json::from_value(json!({
        "columns": [
            { "layers": [{ "layer_id": "word", "pattern": "the" }], "adjacency": 2 },
            { "layers": [{ "layer_id": "word", "pattern": "cat", "target": true }] }
        ]
    }))
    .unwrap();
    let sql = compile(&matrix).sql;
    assert!(sql.contains(
        "search_1_0.ordinal_in_turn BETWEEN search_0_0.ordinal_in_turn + 1 AND search_0_0.ordinal_in_turn + 2"
    ));
    assert!(sql.contains("search_1_0.annotation_id, NULL"));
}
