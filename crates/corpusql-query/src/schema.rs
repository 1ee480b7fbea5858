//! Schema model.
//!
//! An immutable description of every layer in an annotation store: how each
//! layer is stored, how layers nest, and which layers play the fixed roles
//! (transcript root, participant, turn, utterance, word, ...).
//!
//! A layer is stored in exactly one of three ways:
//! - its own table, `annotation_layer_<layer_id>`
//! - as an attribute row of a transcript or speaker
//!   (`annotation_transcript` / `annotation_speaker`)
//! - as a pseudo-layer computed from a fixed SQL fragment
//!
//! Schemas are loaded once and shared read-only across compilations, so
//! every method here takes `&self`.

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Layer attributes
// ============================================================================

/// Hierarchy scope of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// One or more annotations per word token
    #[serde(rename = "W")]
    Word,
    /// Phonological segments within a word
    #[serde(rename = "S")]
    Segment,
    /// Turn-level (meta) spans
    #[serde(rename = "M")]
    Meta,
    /// Freeform spans over the whole transcript
    #[serde(rename = "F")]
    Freeform,
}

impl Scope {
    /// Lower-case letter used in annotation id prefixes
    pub fn code(self) -> char {
        match self {
            Scope::Word => 'w',
            Scope::Segment => 's',
            Scope::Meta => 'm',
            Scope::Freeform => 'f',
        }
    }
}

/// Temporal alignment of a layer's annotations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    None,
    Point,
    Interval,
}

/// Declared content type of a layer's labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    #[default]
    String,
    Number,
    /// Phonemic transcription; matched case-sensitively
    Ipa,
    Date,
    Boolean,
}

/// Entity class that owns attribute layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeClass {
    Transcript,
    Speaker,
}

impl AttributeClass {
    /// Table holding this class's attribute rows
    pub fn table(self) -> &'static str {
        match self {
            AttributeClass::Transcript => "annotation_transcript",
            AttributeClass::Speaker => "annotation_speaker",
        }
    }
}

/// Layers with no table of their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PseudoLayer {
    /// The transcript (graph) itself
    Transcript,
    Participant,
    MainParticipant,
    Corpus,
    Episode,
    TranscriptType,
    RecordingDate,
}

impl PseudoLayer {
    /// Reserved (negative) id standing in for a table id
    pub fn reserved_id(self) -> i64 {
        match self {
            PseudoLayer::Transcript => -1,
            PseudoLayer::Participant => -2,
            PseudoLayer::MainParticipant => -3,
            PseudoLayer::Episode => -50,
            PseudoLayer::RecordingDate => -60,
            PseudoLayer::Corpus => -100,
            PseudoLayer::TranscriptType => -200,
        }
    }
}

/// How a layer's annotations are stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerStorage {
    /// Dedicated table `annotation_layer_<layer_id>`
    Table { layer_id: i64 },
    /// Attribute rows of a transcript or speaker
    Attribute {
        class_id: AttributeClass,
        attribute: String,
    },
    /// Fixed SQL fragment
    Pseudo { pseudo: PseudoLayer },
}

// ============================================================================
// Layer
// ============================================================================

/// Definition of a single layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,

    #[serde(default)]
    pub description: String,

    pub storage: LayerStorage,

    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub scope: Option<Scope>,

    #[serde(default)]
    pub alignment: Alignment,

    #[serde(default, rename = "type")]
    pub layer_type: LayerType,

    /// Whether a parent may have several annotations on this layer
    #[serde(default)]
    pub peers: bool,

    /// Whether peer annotations may overlap in time
    #[serde(default)]
    pub peers_overlap: bool,

    /// Whether children always fall within the parent's span
    #[serde(default)]
    pub parent_includes: bool,

    /// Whether annotations tile their parent with no gaps
    #[serde(default)]
    pub saturated: bool,
}

impl Layer {
    fn with_storage(id: impl Into<String>, storage: LayerStorage) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            storage,
            parent_id: None,
            scope: None,
            alignment: Alignment::None,
            layer_type: LayerType::String,
            peers: false,
            peers_overlap: false,
            parent_includes: true,
            saturated: false,
        }
    }

    /// A layer stored in `annotation_layer_<layer_id>`
    pub fn table(id: impl Into<String>, layer_id: i64) -> Self {
        Self::with_storage(id, LayerStorage::Table { layer_id })
    }

    /// A layer stored as an attribute of a transcript or speaker
    pub fn attribute(
        id: impl Into<String>,
        class_id: AttributeClass,
        attribute: impl Into<String>,
    ) -> Self {
        Self::with_storage(
            id,
            LayerStorage::Attribute {
                class_id,
                attribute: attribute.into(),
            },
        )
    }

    /// A pseudo-layer
    pub fn pseudo(id: impl Into<String>, pseudo: PseudoLayer) -> Self {
        Self::with_storage(id, LayerStorage::Pseudo { pseudo })
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_type(mut self, layer_type: LayerType) -> Self {
        self.layer_type = layer_type;
        self
    }

    pub fn with_peers(mut self, peers: bool) -> Self {
        self.peers = peers;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Numeric table id, for own-table layers
    pub fn table_id(&self) -> Option<i64> {
        match self.storage {
            LayerStorage::Table { layer_id } => Some(layer_id),
            _ => None,
        }
    }

    /// Numeric id: the table id, or the reserved id of a pseudo-layer
    pub fn numeric_id(&self) -> Option<i64> {
        match &self.storage {
            LayerStorage::Table { layer_id } => Some(*layer_id),
            LayerStorage::Pseudo { pseudo } => Some(pseudo.reserved_id()),
            LayerStorage::Attribute { .. } => None,
        }
    }

    /// `annotation_layer_<layer_id>`, for own-table layers
    pub fn table_name(&self) -> Option<String> {
        self.table_id().map(|id| format!("annotation_layer_{}", id))
    }

    pub fn pseudo_kind(&self) -> Option<PseudoLayer> {
        match self.storage {
            LayerStorage::Pseudo { pseudo } => Some(pseudo),
            _ => None,
        }
    }

    /// Labels on IPA layers are compared case-sensitively
    pub fn is_case_sensitive(&self) -> bool {
        self.layer_type == LayerType::Ipa
    }

    /// Prefix of this layer's annotation ids, e.g. `ew_0_`
    pub fn annotation_id_prefix(&self) -> Option<String> {
        let layer_id = self.table_id()?;
        Some(match self.scope {
            Some(scope) => format!("e{}_{}_", scope.code(), layer_id),
            None => format!("e_{}_", layer_id),
        })
    }

    /// Rows carry `word_annotation_id`/`ordinal_in_turn`
    pub fn is_word_scoped(&self) -> bool {
        self.table_id().is_some() && self.scope == Some(Scope::Word)
    }

    /// Rows carry `segment_annotation_id` within a word
    pub fn is_segment_scoped(&self) -> bool {
        self.table_id().is_some() && self.scope == Some(Scope::Segment)
    }
}

// ============================================================================
// Schema
// ============================================================================

fn default_root() -> String {
    "transcript".to_string()
}
fn default_participant() -> String {
    "participant".to_string()
}
fn default_turn() -> String {
    "turn".to_string()
}
fn default_utterance() -> Option<String> {
    Some("utterance".to_string())
}
fn default_word() -> String {
    "word".to_string()
}
fn default_episode() -> String {
    "episode".to_string()
}
fn default_corpus() -> String {
    "corpus".to_string()
}

/// Serializable schema definition, validated into a [`Schema`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default = "default_root")]
    pub root_layer_id: String,
    #[serde(default = "default_participant")]
    pub participant_layer_id: String,
    #[serde(default = "default_turn")]
    pub turn_layer_id: String,
    #[serde(default = "default_utterance")]
    pub utterance_layer_id: Option<String>,
    #[serde(default = "default_word")]
    pub word_layer_id: String,
    #[serde(default = "default_episode")]
    pub episode_layer_id: String,
    #[serde(default = "default_corpus")]
    pub corpus_layer_id: String,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl SchemaDefinition {
    /// The fixed layers every store has.
    pub fn standard() -> Self {
        Self {
            root_layer_id: default_root(),
            participant_layer_id: default_participant(),
            turn_layer_id: default_turn(),
            utterance_layer_id: default_utterance(),
            word_layer_id: default_word(),
            episode_layer_id: default_episode(),
            corpus_layer_id: default_corpus(),
            layers: vec![
                Layer::pseudo("transcript", PseudoLayer::Transcript)
                    .with_description("Transcript"),
                Layer::pseudo("participant", PseudoLayer::Participant)
                    .with_parent("transcript")
                    .with_peers(true)
                    .with_description("Speakers"),
                Layer::pseudo("main_participant", PseudoLayer::MainParticipant)
                    .with_parent("participant")
                    .with_description("Main speakers"),
                Layer::pseudo("corpus", PseudoLayer::Corpus)
                    .with_parent("transcript")
                    .with_description("Corpus"),
                Layer::pseudo("episode", PseudoLayer::Episode)
                    .with_parent("transcript")
                    .with_description("Series the transcript belongs to"),
                Layer::pseudo("transcript_type", PseudoLayer::TranscriptType)
                    .with_parent("transcript")
                    .with_description("Type of transcript"),
                Layer::pseudo("recording_date", PseudoLayer::RecordingDate)
                    .with_parent("transcript")
                    .with_type(LayerType::Date)
                    .with_description("Date of recording"),
                Layer::table("turn", 11)
                    .with_parent("participant")
                    .with_scope(Scope::Meta)
                    .with_alignment(Alignment::Interval)
                    .with_peers(true)
                    .with_description("Speaker turns"),
                Layer::table("utterance", 12)
                    .with_parent("turn")
                    .with_scope(Scope::Meta)
                    .with_alignment(Alignment::Interval)
                    .with_peers(true)
                    .with_description("Speaker utterances"),
                Layer::table("word", 0)
                    .with_parent("turn")
                    .with_scope(Scope::Word)
                    .with_alignment(Alignment::Interval)
                    .with_peers(true)
                    .with_description("Word tokens"),
            ],
        }
    }

    /// Add or replace a layer definition
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.retain(|l| l.id != layer.id);
        self.layers.push(layer);
        self
    }

    /// Remove a layer definition
    pub fn without_layer(mut self, id: &str) -> Self {
        self.layers.retain(|l| l.id != id);
        self
    }

    fn validate(&self) -> Result<(), SchemaError> {
        let mut seen: HashMap<&str, &Layer> = HashMap::new();
        let mut tables: HashMap<i64, &str> = HashMap::new();
        for layer in &self.layers {
            if seen.insert(layer.id.as_str(), layer).is_some() {
                return Err(SchemaError::DuplicateLayer(layer.id.clone()));
            }
            if let Some(layer_id) = layer.table_id() {
                if let Some(first) = tables.insert(layer_id, layer.id.as_str()) {
                    return Err(SchemaError::DuplicateTable {
                        layer_id,
                        first: first.to_string(),
                        second: layer.id.clone(),
                    });
                }
            }
        }

        for layer in &self.layers {
            if let Some(parent) = &layer.parent_id {
                if !seen.contains_key(parent.as_str()) {
                    return Err(SchemaError::UnknownParent {
                        layer: layer.id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        let designated = [
            ("root", Some(&self.root_layer_id), false),
            ("participant", Some(&self.participant_layer_id), false),
            ("turn", Some(&self.turn_layer_id), true),
            ("utterance", self.utterance_layer_id.as_ref(), true),
            ("word", Some(&self.word_layer_id), true),
            ("episode", Some(&self.episode_layer_id), false),
            ("corpus", Some(&self.corpus_layer_id), false),
        ];
        for (role, id, needs_table) in designated {
            let Some(id) = id else { continue };
            match seen.get(id.as_str()) {
                None => {
                    return Err(SchemaError::MissingDesignatedLayer {
                        role,
                        id: id.clone(),
                    })
                }
                Some(layer) if needs_table && layer.table_id().is_none() => {
                    return Err(SchemaError::DesignatedLayerNotTable {
                        role,
                        id: id.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Immutable, indexed description of every layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SchemaDefinition", into = "SchemaDefinition")]
pub struct Schema {
    definition: SchemaDefinition,
    by_id: HashMap<String, usize>,
    by_table: HashMap<i64, usize>,
}

impl TryFrom<SchemaDefinition> for Schema {
    type Error = SchemaError;

    fn try_from(definition: SchemaDefinition) -> Result<Self, Self::Error> {
        definition.validate()?;
        Ok(Self::index(definition))
    }
}

impl From<Schema> for SchemaDefinition {
    fn from(schema: Schema) -> Self {
        schema.definition
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::standard()
    }
}

/// Synonym accepted for the participant layer
pub const WHO: &str = "who";

impl Schema {
    fn index(definition: SchemaDefinition) -> Self {
        let mut by_id = HashMap::new();
        let mut by_table = HashMap::new();
        for (i, layer) in definition.layers.iter().enumerate() {
            by_id.insert(layer.id.clone(), i);
            if let Some(layer_id) = layer.table_id() {
                by_table.insert(layer_id, i);
            }
        }
        Self {
            definition,
            by_id,
            by_table,
        }
    }

    /// Schema with only the fixed core layers
    pub fn standard() -> Self {
        Self::index(SchemaDefinition::standard())
    }

    /// Validate and index a definition
    pub fn new(definition: SchemaDefinition) -> Result<Self, SchemaError> {
        Self::try_from(definition)
    }

    /// Look up a layer by id. `who` names the participant layer.
    pub fn layer(&self, id: &str) -> Option<&Layer> {
        let id = if id == WHO {
            self.definition.participant_layer_id.as_str()
        } else {
            id
        };
        self.by_id.get(id).map(|&i| &self.definition.layers[i])
    }

    /// Look up an own-table layer by its numeric table id
    pub fn layer_by_table_id(&self, layer_id: i64) -> Option<&Layer> {
        self.by_table
            .get(&layer_id)
            .map(|&i| &self.definition.layers[i])
    }

    /// Look up a layer by table id or, for pseudo-layers, by reserved id
    pub fn layer_by_numeric_id(&self, id: i64) -> Option<&Layer> {
        self.layer_by_table_id(id)
            .or_else(|| self.layers().find(|layer| layer.numeric_id() == Some(id)))
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.definition.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.definition.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definition.layers.is_empty()
    }

    pub fn definition(&self) -> &SchemaDefinition {
        &self.definition
    }

    pub fn root_layer_id(&self) -> &str {
        &self.definition.root_layer_id
    }

    pub fn participant_layer_id(&self) -> &str {
        &self.definition.participant_layer_id
    }

    pub fn turn_layer_id(&self) -> &str {
        &self.definition.turn_layer_id
    }

    pub fn utterance_layer_id(&self) -> Option<&str> {
        self.definition.utterance_layer_id.as_deref()
    }

    pub fn word_layer_id(&self) -> &str {
        &self.definition.word_layer_id
    }

    pub fn episode_layer_id(&self) -> &str {
        &self.definition.episode_layer_id
    }

    pub fn corpus_layer_id(&self) -> &str {
        &self.definition.corpus_layer_id
    }

    /// Table id of the turn layer
    pub fn turn_table_id(&self) -> i64 {
        self.layer(self.turn_layer_id())
            .and_then(Layer::table_id)
            .unwrap_or(11)
    }

    /// Table id of the word layer
    pub fn word_table_id(&self) -> i64 {
        self.layer(self.word_layer_id())
            .and_then(Layer::table_id)
            .unwrap_or(0)
    }

    pub fn is_turn_layer(&self, layer: &Layer) -> bool {
        layer.id == self.definition.turn_layer_id
    }

    pub fn is_word_layer(&self, layer: &Layer) -> bool {
        layer.id == self.definition.word_layer_id
    }

    /// Rows of this layer's table can be tied to a turn: either the turn
    /// layer itself or a table carrying `turn_annotation_id`.
    pub fn has_turn_key(&self, layer: &Layer) -> bool {
        layer.table_id().is_some()
            && (self.is_turn_layer(layer)
                || matches!(
                    layer.scope,
                    Some(Scope::Word) | Some(Scope::Segment) | Some(Scope::Meta)
                ))
    }

    /// Column of `alias` holding the owning turn's annotation id
    pub fn turn_key(&self, layer: &Layer, alias: &str) -> String {
        if self.is_turn_layer(layer) {
            format!("{}.annotation_id", alias)
        } else {
            format!("{}.turn_annotation_id", alias)
        }
    }

    /// Rows carry `word_annotation_id` (the word layer and word/segment scopes)
    pub fn has_word_key(&self, layer: &Layer) -> bool {
        self.is_word_layer(layer) || layer.is_word_scoped() || layer.is_segment_scoped()
    }

    /// Rows carry `ordinal_in_turn` (the word layer and word scope)
    pub fn has_word_position(&self, layer: &Layer) -> bool {
        self.is_word_layer(layer) || layer.is_word_scoped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_schema_is_valid() {
        let schema = Schema::new(SchemaDefinition::standard()).unwrap();
        assert_eq!(schema.word_table_id(), 0);
        assert_eq!(schema.turn_table_id(), 11);
        assert!(schema.layer("main_participant").is_some());
    }

    #[test]
    fn test_who_is_participant() {
        let schema = Schema::standard();
        assert_eq!(schema.layer("who").unwrap().id, "participant");
    }

    #[test]
    fn test_layer_by_table_id() {
        let schema = Schema::standard();
        assert_eq!(schema.layer_by_table_id(12).unwrap().id, "utterance");
        assert!(schema.layer_by_table_id(99).is_none());
    }

    #[test]
    fn test_annotation_id_prefix() {
        let schema = Schema::standard();
        assert_eq!(
            schema.layer("word").unwrap().annotation_id_prefix(),
            Some("ew_0_".to_string())
        );
        assert_eq!(
            schema.layer("turn").unwrap().annotation_id_prefix(),
            Some("em_11_".to_string())
        );
        assert_eq!(schema.layer("corpus").unwrap().annotation_id_prefix(), None);
    }

    #[test]
    fn test_reserved_ids_are_negative() {
        let schema = Schema::standard();
        for layer in schema.layers() {
            if let Some(pseudo) = layer.pseudo_kind() {
                assert!(pseudo.reserved_id() < 0, "{}", layer.id);
            }
        }
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let definition = SchemaDefinition::standard().with_layer(Layer::table("clash", 0));
        let result = Schema::new(definition);
        assert!(matches!(
            result,
            Err(SchemaError::DuplicateTable { layer_id: 0, .. })
        ));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let definition = SchemaDefinition::standard()
            .with_layer(Layer::table("pos", 3).with_parent("nowhere"));
        assert!(matches!(
            Schema::new(definition),
            Err(SchemaError::UnknownParent { .. })
        ));
    }

    #[test]
    fn test_missing_designated_layer_rejected() {
        let definition = SchemaDefinition::standard().without_layer("utterance");
        assert!(matches!(
            Schema::new(definition),
            Err(SchemaError::MissingDesignatedLayer {
                role: "utterance",
                ..
            })
        ));
    }

    #[test]
    fn test_word_layer_must_have_table() {
        let mut definition = SchemaDefinition::standard();
        definition.word_layer_id = "corpus".to_string();
        assert!(matches!(
            Schema::new(definition),
            Err(SchemaError::DesignatedLayerNotTable { role: "word", .. })
        ));
    }

    #[test]
    fn test_turn_key() {
        let schema = Schema::standard();
        let turn = schema.layer("turn").unwrap();
        let word = schema.layer("word").unwrap();
        assert_eq!(schema.turn_key(turn, "annotation"), "annotation.annotation_id");
        assert_eq!(
            schema.turn_key(word, "annotation"),
            "annotation.turn_annotation_id"
        );
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = serde_json::json!({
            "layers": [
                { "id": "transcript", "storage": { "kind": "pseudo", "pseudo": "transcript" } },
                { "id": "participant", "storage": { "kind": "pseudo", "pseudo": "participant" }, "parent_id": "transcript" },
                { "id": "corpus", "storage": { "kind": "pseudo", "pseudo": "corpus" } },
                { "id": "episode", "storage": { "kind": "pseudo", "pseudo": "episode" } },
                { "id": "turn", "storage": { "kind": "table", "layer_id": 11 }, "scope": "M" },
                { "id": "word", "storage": { "kind": "table", "layer_id": 0 }, "scope": "W" },
                { "id": "phonemes", "storage": { "kind": "table", "layer_id": 4 }, "scope": "W", "type": "ipa" }
            ],
            "utterance_layer_id": null
        });

        let schema: Schema = serde_json::from_value(json).unwrap();
        assert!(schema.layer("phonemes").unwrap().is_case_sensitive());
        assert!(schema.utterance_layer_id().is_none());
    }
}
