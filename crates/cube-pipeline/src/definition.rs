use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cube_api::{DefinitionError, Pipeline, COUNT_FIELD, ID_FIELD};
use serde::{Deserialize, Serialize};

use crate::cube::{build_cube_pipeline, encode_dimension};

/// Whether two cube row fields would write to the same or a nested path.
fn paths_overlap(a: &str, b: &str) -> bool {
    let nested = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.starts_with('.'))
    };
    a == b || nested(a, b) || nested(b, a)
}

/// Declarative description of a cube.
///
/// ```yaml
/// target: cars_cube
/// dimensions: [State, Color, "Model Year"]
/// measures: ["Unladen Weight"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CubeDefinition {
    /// Collection the cube is materialized into.
    pub target: String,
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub measures: Vec<String>,
}

impl CubeDefinition {
    pub fn new(
        target: impl Into<String>,
        dimensions: Vec<String>,
        measures: Vec<String>,
    ) -> Self {
        Self {
            target: target.into(),
            dimensions,
            measures,
        }
    }

    /// Load a cube definition from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read cube definition {}", path.display()))?;

        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse cube definition {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let definition: CubeDefinition = serde_yaml::from_str(content)?;
        Ok(definition)
    }

    /// Check the invariants the pipeline builder relies on.
    pub fn validate(&self) -> std::result::Result<(), DefinitionError> {
        if self.dimensions.is_empty() {
            return Err(DefinitionError::NoDimensions {
                target: self.target.clone(),
            });
        }

        let mut seen = HashSet::new();
        for dimension in &self.dimensions {
            if !seen.insert(dimension.as_str()) {
                return Err(DefinitionError::DuplicateDimension {
                    name: dimension.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for measure in &self.measures {
            if !seen.insert(measure.as_str()) {
                return Err(DefinitionError::DuplicateMeasure {
                    name: measure.clone(),
                });
            }
        }

        let mut keys: HashMap<String, &str> = HashMap::new();
        keys.insert(COUNT_FIELD.to_string(), COUNT_FIELD);
        for dimension in &self.dimensions {
            let key = encode_dimension(dimension);
            if let Some(other) = keys.get(&key) {
                return Err(DefinitionError::GroupKeyCollision {
                    name: dimension.clone(),
                    key,
                    other: other.to_string(),
                });
            }
            keys.insert(key, dimension.as_str());
        }

        // Measures and dimensions share the cube row with `_id` and `count`.
        let mut fields: Vec<&str> = Vec::new();
        for name in self.measures.iter().chain(&self.dimensions) {
            if let Some(reserved) = [ID_FIELD, COUNT_FIELD]
                .into_iter()
                .find(|reserved| paths_overlap(name, reserved))
            {
                return Err(DefinitionError::ReservedField {
                    name: name.clone(),
                    field: reserved.to_string(),
                });
            }
            if let Some(other) = fields.iter().find(|other| paths_overlap(name, other)) {
                return Err(DefinitionError::FieldPathCollision {
                    name: name.clone(),
                    other: other.to_string(),
                });
            }
            fields.push(name.as_str());
        }

        Ok(())
    }

    /// Cube construction pipeline for this definition. Does not validate.
    pub fn build_pipeline(&self) -> Pipeline {
        build_cube_pipeline(&self.dimensions, &self.measures, &self.target)
    }
}
