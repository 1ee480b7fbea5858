//! Layer resolution.
//!
//! [`LayerResolver::resolve`] turns a layer name into a [`LayerBinding`]
//! that says how the layer's data is stored. The helpers below build the
//! SQL that reads a layer's labels from a transcript or annotation row;
//! the translators decide which correlation to plug in.

use crate::error::CompileError;
use crate::render::literal::{alias_safe, quote};
use crate::schema::{AttributeClass, Layer, LayerStorage, PseudoLayer, Schema};

/// How a resolved layer is stored
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerBinding<'s> {
    /// Own table `annotation_layer_<layer_id>`
    Table { layer: &'s Layer, layer_id: i64 },
    /// Attribute rows of a transcript or speaker
    Attribute {
        layer: &'s Layer,
        class: AttributeClass,
        attribute: &'s str,
    },
    /// Fixed fragment
    Pseudo { layer: &'s Layer, pseudo: PseudoLayer },
}

impl<'s> LayerBinding<'s> {
    pub fn layer(&self) -> &'s Layer {
        match *self {
            LayerBinding::Table { layer, .. }
            | LayerBinding::Attribute { layer, .. }
            | LayerBinding::Pseudo { layer, .. } => layer,
        }
    }

    /// Table name for own-table layers
    pub fn table(&self) -> Option<String> {
        match self {
            LayerBinding::Table { layer_id, .. } => Some(format!("annotation_layer_{}", layer_id)),
            _ => None,
        }
    }

    /// Join alias; the same layer always gets the same alias
    pub fn alias(&self) -> String {
        alias_safe(&self.layer().id)
    }
}

/// Resolves layer names against a schema.
#[derive(Debug, Clone, Copy)]
pub struct LayerResolver<'s> {
    schema: &'s Schema,
}

impl<'s> LayerResolver<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Resolve a layer id (or `who`)
    pub fn resolve(&self, id: &str) -> Result<LayerBinding<'s>, CompileError> {
        let layer = self
            .schema
            .layer(id)
            .ok_or_else(|| CompileError::UnknownLayer(id.to_string()))?;
        Ok(match &layer.storage {
            LayerStorage::Table { layer_id } => LayerBinding::Table {
                layer,
                layer_id: *layer_id,
            },
            LayerStorage::Attribute {
                class_id,
                attribute,
            } => LayerBinding::Attribute {
                layer,
                class: *class_id,
                attribute: attribute.as_str(),
            },
            LayerStorage::Pseudo { pseudo } => LayerBinding::Pseudo {
                layer,
                pseudo: *pseudo,
            },
        })
    }
}

// ============================================================================
// Label sets
// ============================================================================

/// Which layer function is reading the set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    /// `list(layer)`: every annotation
    List,
    /// `labels(layer)`: distinct labels
    Labels,
    /// `annotators(layer)`: distinct annotators
    Annotators,
}

/// A (possibly correlated) query over one layer's values.
///
/// `tail` is the `FROM ... WHERE ...` part. An empty tail marks a
/// single-valued fragment such as `transcript.corpus_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetQuery {
    column: String,
    tail: String,
    order: Option<String>,
    distinct: bool,
}

impl SetQuery {
    /// A single value read straight off the current row
    pub fn single(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            tail: String::new(),
            order: None,
            distinct: false,
        }
    }

    /// Rows of a subquery. `label` and `annotator` are the columns read
    /// for label sets and annotator sets respectively.
    pub fn rows(kind: SetKind, label: &str, annotator: &str, tail: impl Into<String>) -> Self {
        let column = match kind {
            SetKind::Annotators => annotator,
            _ => label,
        };
        Self {
            column: column.to_string(),
            tail: tail.into(),
            order: None,
            distinct: kind != SetKind::List,
        }
    }

    /// Ordering used when a single row is picked
    pub fn ordered_by(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn is_single(&self) -> bool {
        self.tail.is_empty()
    }

    /// `SELECT ...` listing the values
    pub fn select(&self) -> String {
        if self.distinct && !self.is_single() {
            format!("SELECT DISTINCT {}{}", self.column, self.tail)
        } else {
            format!("SELECT {}{}", self.column, self.tail)
        }
    }

    /// `SELECT COUNT(...) ...` counting the values
    pub fn count(&self) -> String {
        if self.is_single() {
            format!("SELECT COUNT({})", self.column)
        } else if self.distinct {
            format!("SELECT COUNT(DISTINCT {}){}", self.column, self.tail)
        } else {
            format!("SELECT COUNT(*){}", self.tail)
        }
    }

    /// Scalar expression for the first value
    pub fn first(&self) -> String {
        if self.is_single() {
            return self.column.clone();
        }
        match &self.order {
            Some(order) => format!(
                "(SELECT {}{} ORDER BY {} LIMIT 1)",
                self.column, self.tail, order
            ),
            None => format!("(SELECT {}{} LIMIT 1)", self.column, self.tail),
        }
    }
}

/// Speakers of the transcript whose `ag_id` is `ag_id`
pub fn participant_query(ag_id: &str, main_only: bool, kind: SetKind) -> Option<SetQuery> {
    if kind == SetKind::Annotators {
        return None;
    }
    let mut tail = format!(
        " FROM transcript_speaker INNER JOIN speaker \
         ON transcript_speaker.speaker_number = speaker.speaker_number \
         WHERE transcript_speaker.ag_id = {}",
        ag_id
    );
    if main_only {
        tail.push_str(" AND transcript_speaker.main_speaker <> 0");
    }
    Some(SetQuery::rows(kind, "speaker.name", "speaker.name", tail).ordered_by("speaker.name"))
}

/// Transcript attribute rows
pub fn transcript_attribute_query(attribute: &str, ag_id: &str, kind: SetKind) -> SetQuery {
    let tail = format!(
        " FROM annotation_transcript WHERE annotation_transcript.layer = {} \
         AND annotation_transcript.ag_id = {}",
        quote(attribute),
        ag_id
    );
    SetQuery::rows(kind, "label", "annotated_by", tail).ordered_by("annotation_id")
}

/// How speaker attribute rows are tied to the current row
#[derive(Debug, Clone, Copy)]
pub enum SpeakerKey<'a> {
    /// Every speaker of the transcript with this `ag_id`
    Transcript(&'a str),
    /// The speaker whose number is this expression
    Number(&'a str),
}

/// Speaker attribute rows
pub fn speaker_attribute_query(attribute: &str, key: SpeakerKey<'_>, kind: SetKind) -> SetQuery {
    let tail = match key {
        SpeakerKey::Transcript(ag_id) => format!(
            " FROM annotation_speaker INNER JOIN transcript_speaker \
             ON transcript_speaker.speaker_number = annotation_speaker.speaker_number \
             WHERE annotation_speaker.layer = {} AND transcript_speaker.ag_id = {}",
            quote(attribute),
            ag_id
        ),
        SpeakerKey::Number(number) => format!(
            " FROM annotation_speaker WHERE annotation_speaker.layer = {} \
             AND annotation_speaker.speaker_number = {}",
            quote(attribute),
            number
        ),
    };
    SetQuery::rows(
        kind,
        "annotation_speaker.label",
        "annotation_speaker.annotated_by",
        tail,
    )
    .ordered_by("annotation_speaker.annotation_id")
}

/// Single-valued transcript fragments. `column` maps a `transcript` column
/// name to SQL in the caller's scope.
pub fn transcript_fragment(
    pseudo: PseudoLayer,
    mut column: impl FnMut(&str) -> String,
) -> Option<String> {
    Some(match pseudo {
        PseudoLayer::Transcript => column("transcript_id"),
        PseudoLayer::Corpus => column("corpus_name"),
        PseudoLayer::RecordingDate => column("recording_date"),
        PseudoLayer::Episode => format!(
            "(SELECT name FROM transcript_family WHERE transcript_family.family_id = {})",
            column("family_id")
        ),
        PseudoLayer::TranscriptType => format!(
            "(SELECT transcript_type FROM transcript_type WHERE transcript_type.type_id = {})",
            column("type_id")
        ),
        PseudoLayer::Participant | PseudoLayer::MainParticipant => return None,
    })
}
