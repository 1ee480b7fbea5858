//! Schema fixtures for tests.
//!
//! Unit tests, integration tests and the CLI tests all compile against the
//! same store layout, defined here.

use crate::schema::{
    Alignment, AttributeClass, Layer, LayerType, PseudoLayer, Schema, SchemaDefinition, Scope,
};

/// Standard layers plus a typical set of word, segment, span and
/// attribute layers:
///
/// | layer                 | storage                    | scope |
/// |-----------------------|----------------------------|-------|
/// | `segment`             | table 1, IPA               | S     |
/// | `orthography`         | table 2                    | W     |
/// | `pos`                 | table 3                    | W     |
/// | `phonemes`            | table 4, IPA               | W     |
/// | `frequency`           | table 5, number            | W     |
/// | `language`            | table 20                   | M     |
/// | `topic`               | table 31                   | F     |
/// | `noise`               | table 32                   | F     |
/// | `transcript_language` | transcript attr `language` |       |
/// | `transcript_scribe`   | transcript attr `scribe`   |       |
/// | `participant_gender`  | speaker attr `gender`      |       |
/// | `participant_age`     | speaker attr `age`, number |       |
pub fn definition() -> SchemaDefinition {
    SchemaDefinition::standard()
        .with_layer(
            Layer::table("segment", 1)
                .with_parent("word")
                .with_scope(Scope::Segment)
                .with_alignment(Alignment::Interval)
                .with_type(LayerType::Ipa)
                .with_peers(true),
        )
        .with_layer(
            Layer::table("orthography", 2)
                .with_parent("word")
                .with_scope(Scope::Word),
        )
        .with_layer(
            Layer::table("pos", 3)
                .with_parent("word")
                .with_scope(Scope::Word)
                .with_peers(true),
        )
        .with_layer(
            Layer::table("phonemes", 4)
                .with_parent("word")
                .with_scope(Scope::Word)
                .with_type(LayerType::Ipa),
        )
        .with_layer(
            Layer::table("frequency", 5)
                .with_parent("word")
                .with_scope(Scope::Word)
                .with_type(LayerType::Number),
        )
        .with_layer(
            Layer::table("language", 20)
                .with_parent("turn")
                .with_scope(Scope::Meta)
                .with_alignment(Alignment::Interval),
        )
        .with_layer(
            Layer::table("topic", 31)
                .with_parent("transcript")
                .with_scope(Scope::Freeform)
                .with_alignment(Alignment::Interval)
                .with_peers(true),
        )
        .with_layer(
            Layer::table("noise", 32)
                .with_parent("transcript")
                .with_scope(Scope::Freeform)
                .with_alignment(Alignment::Interval)
                .with_peers(true),
        )
        .with_layer(
            Layer::attribute("transcript_language", AttributeClass::Transcript, "language")
                .with_parent("transcript"),
        )
        .with_layer(
            Layer::attribute("transcript_scribe", AttributeClass::Transcript, "scribe")
                .with_parent("transcript"),
        )
        .with_layer(
            Layer::attribute("participant_gender", AttributeClass::Speaker, "gender")
                .with_parent("participant"),
        )
        .with_layer(
            Layer::attribute("participant_age", AttributeClass::Speaker, "age")
                .with_parent("participant")
                .with_type(LayerType::Number),
        )
}

/// The fixture schema, validated
pub fn schema() -> Schema {
    Schema::new(definition()).expect("fixture schema is valid")
}

/// An older layout whose root layer is `graph` and whose word layer
/// (table 0) is called `transcript`.
pub fn legacy_schema() -> Schema {
    let definition = SchemaDefinition {
        root_layer_id: "graph".to_string(),
        participant_layer_id: "who".to_string(),
        turn_layer_id: "turn".to_string(),
        utterance_layer_id: Some("utterance".to_string()),
        word_layer_id: "transcript".to_string(),
        episode_layer_id: "episode".to_string(),
        corpus_layer_id: "corpus".to_string(),
        layers: vec![
            Layer::pseudo("graph", PseudoLayer::Transcript),
            Layer::pseudo("who", PseudoLayer::Participant).with_parent("graph"),
            Layer::pseudo("main_participant", PseudoLayer::MainParticipant).with_parent("who"),
            Layer::pseudo("corpus", PseudoLayer::Corpus).with_parent("graph"),
            Layer::pseudo("episode", PseudoLayer::Episode).with_parent("graph"),
            Layer::table("turn", 11)
                .with_parent("who")
                .with_scope(Scope::Meta)
                .with_alignment(Alignment::Interval),
            Layer::table("utterance", 12)
                .with_parent("turn")
                .with_scope(Scope::Meta)
                .with_alignment(Alignment::Interval),
            Layer::table("transcript", 0)
                .with_parent("turn")
                .with_scope(Scope::Word)
                .with_alignment(Alignment::Interval),
        ],
    };
    Schema::new(definition).expect("fixture schema is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_validate() {
        assert!(Schema::new(definition()).is_ok());
        assert!(legacy_schema().layer("graph").is_some());
        assert_eq!(legacy_schema().word_layer_id(), "transcript");
    }

    #[test]
    fn test_fixtures_are_not_the_standard_schema() {
        let schema = schema();
        assert!(schema.layer("phonemes").is_some());
        assert!(schema.len() > Schema::standard().len());
        assert_eq!(legacy_schema().root_layer_id(), "graph");
    }
}
