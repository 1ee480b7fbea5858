//! Translator integration tests
//!
//! End-to-end behaviour of the transcript and annotation translators through
//! the public API only.

use corpusql_query::testing;
use corpusql_query::{
    AnnotationTranslator, CompileError, QueryRequest, SqlTranslator, TranscriptTranslator,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn transcripts() -> TranscriptTranslator {
    TranscriptTranslator::new(Arc::new(testing::schema()))
}

fn annotations() -> AnnotationTranslator {
    AnnotationTranslator::new(Arc::new(testing::schema()))
}

/// The top-level conditions of a WHERE clause
fn conditions(sql: &str) -> BTreeSet<String> {
    let start = sql.find(" WHERE ").map(|i| i + 7).unwrap_or(sql.len());
    let end = sql.find(" ORDER BY ").unwrap_or(sql.len());
    sql[start..end]
        .split(" AND ")
        .map(str::to_string)
        .collect()
}

fn from_clause(sql: &str) -> &str {
    &sql[..sql.find(" WHERE ").unwrap_or(sql.len())]
}

// ============================================================================
// End-to-end examples
// ============================================================================

#[test]
fn test_annotation_id_on_legacy_word_layer() {
    let translator = AnnotationTranslator::new(Arc::new(testing::legacy_schema()));
    let query = translator.translate_text("id == 'ew_0_456'").unwrap();
    assert_eq!(
        query.sql,
        "SELECT DISTINCT annotation.*, 'transcript' AS layer FROM annotation_layer_0 annotation \
         WHERE CONCAT('ew_0_', annotation.annotation_id) = 'ew_0_456' \
         ORDER BY ag_id, parent_id, annotation_id"
    );
    assert!(query.parameters.is_empty());
}

#[test]
fn test_corpus_labels_are_a_column() {
    let query = transcripts()
        .translate_text("labels('corpus').includes('CC')")
        .unwrap();
    insta::assert_snapshot!(
        query.sql,
        @"SELECT transcript.* FROM transcript WHERE 'CC' IN (SELECT transcript.corpus_name) ORDER BY transcript.transcript_id"
    );
}

#[test]
fn test_full_transcript_request() {
    let request = QueryRequest::parse("/^a/.test(id)")
        .unwrap()
        .with_columns("transcript.transcript_id")
        .with_where("transcript.type_id = 1")
        .with_order("id DESC")
        .with_limit("10");
    let query = transcripts().translate(&request).unwrap();
    insta::assert_snapshot!(
        query.sql,
        @"SELECT transcript.transcript_id FROM transcript WHERE transcript.transcript_id REGEXP '^a' AND transcript.type_id = 1 ORDER BY transcript.transcript_id DESC LIMIT 10"
    );
}

// ============================================================================
// Regex negation
// ============================================================================

#[test]
fn test_regex_negation_transcript() {
    let sql = transcripts().translate_text("!/^a.*/.test(id)").unwrap().sql;
    assert!(sql.contains("WHERE transcript.transcript_id NOT REGEXP '^a.*'"), "{}", sql);
}

#[test]
fn test_regex_negation_annotation() {
    let positive = annotations()
        .translate_text("layer.id == 'word' && /^th/.test(label)")
        .unwrap()
        .sql;
    let negative = annotations()
        .translate_text("layer.id == 'word' && !/^th/.test(label)")
        .unwrap()
        .sql;
    assert!(positive.contains("WHERE annotation.label REGEXP '^th'"));
    assert!(negative.contains("WHERE annotation.label NOT REGEXP '^th'"));
}

#[test]
fn test_invalid_regex_is_collected() {
    let errors = transcripts()
        .translate_text("/(/.test(id) && my('nope').label == 'x'")
        .unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(matches!(
        errors.errors()[0],
        CompileError::InvalidRegex { .. }
    ));
    assert_eq!(
        errors.errors()[1],
        CompileError::UnknownLayer("nope".to_string())
    );
}

// ============================================================================
// Error aggregation
// ============================================================================

#[test]
fn test_four_unknown_layers_give_four_errors() {
    let errors = transcripts()
        .translate_text(
            "my('a').label == 'x' && labels('b').includes('y') \
             && list('c').length > 0 && annotators('d').includes('z') \
             && my('a').label == 'again'",
        )
        .unwrap_err();
    assert_eq!(
        errors.into_inner(),
        vec![
            CompileError::UnknownLayer("a".to_string()),
            CompileError::UnknownLayer("b".to_string()),
            CompileError::UnknownLayer("c".to_string()),
            CompileError::UnknownLayer("d".to_string()),
        ]
    );
}

#[test]
fn test_missing_expression_asymmetry() {
    assert!(transcripts().translate_text("").is_ok());
    let errors = annotations().translate_text("").unwrap_err();
    assert_eq!(errors.into_inner(), vec![CompileError::NoExpression]);
}

#[test]
fn test_errors_render_one_message_per_line() {
    let errors = transcripts()
        .translate_text("my('x').label == 'a' && my('y').label == 'b'")
        .unwrap_err();
    assert_eq!(errors.to_string(), "Invalid layer: x\nInvalid layer: y");
}

// ============================================================================
// Determinism and order invariance
// ============================================================================

#[test]
fn test_repeated_layer_reference_reuses_join() {
    let sql = annotations()
        .translate_text(
            "layer.id == 'word' && my('who').label != 'a' && my('who').label != 'b'",
        )
        .unwrap()
        .sql;
    assert_eq!(sql.matches("INNER JOIN annotation_layer_11 turn").count(), 1);
    assert_eq!(sql.matches("INNER JOIN speaker").count(), 1);
}

#[test]
fn test_transcript_conjunct_order() {
    let a = transcripts()
        .translate_text("my('corpus').label == 'CC' && /^a/.test(id)")
        .unwrap()
        .sql;
    let b = transcripts()
        .translate_text("/^a/.test(id) && my('corpus').label == 'CC'")
        .unwrap()
        .sql;
    assert_eq!(conditions(&a), conditions(&b));
}

#[test]
fn test_annotation_conjunct_order() {
    let a = annotations()
        .translate_text("layer.id == 'word' && my('who').label == 'x' && start.offset > 1")
        .unwrap()
        .sql;
    let b = annotations()
        .translate_text("start.offset > 1 && my('who').label == 'x' && layer.id == 'word'")
        .unwrap()
        .sql;
    assert_eq!(from_clause(&a), from_clause(&b));
    assert_eq!(conditions(&a), conditions(&b));
}

// ============================================================================
// Placeholder alignment
// ============================================================================

#[test]
fn test_translators_inline_literals() {
    let query = annotations()
        .translate_text("layer.id == 'word' && label == 'why?' && ['a?', 'b'].includes(label)")
        .unwrap();
    assert!(query.parameters.is_empty());
    assert_eq!(query.placeholder_count(), 0);
    assert!(query.is_aligned());
}

#[test]
fn test_quotes_are_escaped() {
    let sql = transcripts().translate_text(r"id == 'o\'brien'").unwrap().sql;
    assert!(sql.contains(r"transcript.transcript_id = 'o\'brien'"), "{}", sql);
}
