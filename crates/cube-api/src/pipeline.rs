//! Pipeline and stage types exchanged with the aggregation engine.
//!
//! A pipeline is a JSON array of single-key objects, each mapping a stage
//! kind (`$group`, `$project`, ...) to its body. Only the kinds this system
//! produces or inspects are typed; everything else is kept as an opaque
//! `Stage::Other` and serialized back unchanged.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{PipelineError, GROUP_STAGE, ID_FIELD, OUT_STAGE, PROJECT_STAGE, SET_STAGE};

/// Stage body with stable key order.
pub type Document = IndexMap<String, Value>;

/// Convert an ordered document into a JSON object, keeping key order.
pub fn document_to_value(document: Document) -> Value {
    Value::Object(document.into_iter().collect())
}

/// Body of a `$group` stage: the `_id` key followed by accumulators.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStage {
    body: Document,
}

impl GroupStage {
    /// Create a group stage with `id` as its grouping key, placed first.
    pub fn new(id: Value, accumulators: Document) -> Self {
        let mut body = Document::with_capacity(accumulators.len() + 1);
        body.insert(ID_FIELD.to_string(), id);
        for (field, accumulator) in accumulators {
            if field != ID_FIELD {
                body.insert(field, accumulator);
            }
        }
        Self { body }
    }

    fn from_body(body: Document) -> Result<Self, PipelineError> {
        if !body.contains_key(ID_FIELD) {
            return Err(PipelineError::MalformedStage {
                kind: GROUP_STAGE.to_string(),
                reason: format!("missing {} field", ID_FIELD),
            });
        }
        Ok(Self { body })
    }

    /// The grouping key expression.
    pub fn id(&self) -> &Value {
        self.body.get(ID_FIELD).unwrap_or(&Value::Null)
    }

    /// Accumulators in authored order, without `_id`.
    pub fn accumulators(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.body.iter().filter(|(field, _)| field.as_str() != ID_FIELD)
    }

    /// Full body including `_id`.
    pub fn body(&self) -> &Document {
        &self.body
    }

    pub fn into_body(self) -> Document {
        self.body
    }
}

/// One pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Stage {
    Group(GroupStage),
    Project(Document),
    Set(Document),
    /// Materialize the stream into the named collection.
    Out { target: String },
    /// Any stage this system does not interpret (`$sort`, `$limit`, `$match`, ...).
    Other { kind: String, body: Value },
}

impl Stage {
    /// Marked stage kind, e.g. `"$group"`.
    pub fn kind(&self) -> &str {
        match self {
            Stage::Group(_) => GROUP_STAGE,
            Stage::Project(_) => PROJECT_STAGE,
            Stage::Set(_) => SET_STAGE,
            Stage::Out { .. } => OUT_STAGE,
            Stage::Other { kind, .. } => kind,
        }
    }

    pub fn as_group(&self) -> Option<&GroupStage> {
        match self {
            Stage::Group(group) => Some(group),
            _ => None,
        }
    }
}

fn into_document(kind: &str, body: Value) -> Result<Document, PipelineError> {
    match body {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(PipelineError::MalformedStage {
            kind: kind.to_string(),
            reason: format!("body must be an object, got {}", other),
        }),
    }
}

impl TryFrom<Value> for Stage {
    type Error = PipelineError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(PipelineError::MalformedStage {
                    kind: "unknown".to_string(),
                    reason: format!("stage must be an object, got {}", other),
                })
            }
        };

        let key_count = map.len();
        let mut entries = map.into_iter();
        let (kind, body) = match (entries.next(), key_count) {
            (Some(entry), 1) => entry,
            _ => {
                return Err(PipelineError::MalformedStage {
                    kind: "unknown".to_string(),
                    reason: format!("stage must have exactly one key, found {}", key_count),
                })
            }
        };

        match kind.as_str() {
            GROUP_STAGE => Ok(Stage::Group(GroupStage::from_body(into_document(
                &kind, body,
            )?)?)),
            PROJECT_STAGE => Ok(Stage::Project(into_document(&kind, body)?)),
            SET_STAGE => Ok(Stage::Set(into_document(&kind, body)?)),
            // Only the plain collection-name form is typed; `{db, coll}` passes through.
            OUT_STAGE => match body {
                Value::String(target) => Ok(Stage::Out { target }),
                body => Ok(Stage::Other { kind, body }),
            },
            _ => Ok(Stage::Other { kind, body }),
        }
    }
}

impl From<Stage> for Value {
    fn from(stage: Stage) -> Self {
        let (kind, body) = match stage {
            Stage::Group(group) => (GROUP_STAGE.to_string(), document_to_value(group.body)),
            Stage::Project(body) => (PROJECT_STAGE.to_string(), document_to_value(body)),
            Stage::Set(body) => (SET_STAGE.to_string(), document_to_value(body)),
            Stage::Out { target } => (OUT_STAGE.to_string(), Value::String(target)),
            Stage::Other { kind, body } => (kind, body),
        };
        let mut map = serde_json::Map::new();
        map.insert(kind, body);
        Value::Object(map)
    }
}

/// Ordered sequence of stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Parse a JSON array of stages.
    pub fn from_json(value: &Value) -> Result<Self, PipelineError> {
        let items = value.as_array().ok_or_else(|| PipelineError::MalformedStage {
            kind: "pipeline".to_string(),
            reason: format!("expected an array of stages, got {}", value),
        })?;
        let stages = items
            .iter()
            .cloned()
            .map(Stage::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { stages })
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.stages.iter().cloned().map(Value::from).collect())
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn first(&self) -> Option<&Stage> {
        self.stages.first()
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stage> {
        self.stages.iter()
    }
}

impl From<Vec<Stage>> for Pipeline {
    fn from(stages: Vec<Stage>) -> Self {
        Self::new(stages)
    }
}

impl IntoIterator for Pipeline {
    type Item = Stage;
    type IntoIter = std::vec::IntoIter<Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.into_iter()
    }
}

impl<'a> IntoIterator for &'a Pipeline {
    type Item = &'a Stage;
    type IntoIter = std::slice::Iter<'a, Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}
