//! Attribute schema: ordered layers with weighted candidate values, plus
//! declared incompatibility rules between value pairings.
//!
//! The schema is loaded once at process start and is immutable afterwards.
//! All structural validation happens at load time so the sampler and filter
//! can assume a well-formed schema.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// One categorical attribute dimension of a token.
///
/// `values` and `weights` are parallel: `weights[i]` is the relative
/// selection weight of `values[i]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub values: Vec<String>,
    pub weights: Vec<f64>,
}

/// Forbids pairing `value` in `layer` with any of the listed values in any
/// other attribute of the token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncompatibilityRule {
    pub layer: String,
    pub value: String,
    pub incompatible_with: Vec<String>,
}

/// Declarative attribute schema: the full layered value space plus the
/// incompatibility rules constraining it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schema {
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub incompatibilities: Vec<IncompatibilityRule>,
}

/// Errors detected while loading or validating a schema document.
///
/// All of these are fatal at startup; a process never runs with a schema
/// that failed validation.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_json::Error),
    /// The schema declares no layers at all.
    NoLayers,
    /// A layer has an empty candidate value list.
    EmptyLayer { layer: String },
    /// `values` and `weights` have different lengths.
    WeightCountMismatch {
        layer: String,
        values: usize,
        weights: usize,
    },
    /// A weight is negative or not a finite number.
    InvalidWeight { layer: String, weight: f64 },
    /// All weights in a layer are zero; no value could ever be drawn.
    ZeroWeightSum { layer: String },
    /// Two layers share the same name.
    DuplicateLayer { layer: String },
    /// An incompatibility rule names a layer the schema does not declare.
    UnknownRuleLayer { layer: String },
    /// An incompatibility rule names a value its layer does not declare.
    UnknownRuleValue { layer: String, value: String },
    /// The product of layer cardinalities exceeds u128.
    CapacityOverflow,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "schema I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "schema parse error: {}", e),
            ConfigError::NoLayers => write!(f, "schema declares no layers"),
            ConfigError::EmptyLayer { layer } => {
                write!(f, "layer '{}' has no candidate values", layer)
            }
            ConfigError::WeightCountMismatch {
                layer,
                values,
                weights,
            } => write!(
                f,
                "layer '{}' has {} values but {} weights",
                layer, values, weights
            ),
            ConfigError::InvalidWeight { layer, weight } => {
                write!(f, "layer '{}' has invalid weight {}", layer, weight)
            }
            ConfigError::ZeroWeightSum { layer } => {
                write!(f, "layer '{}' has weights summing to zero", layer)
            }
            ConfigError::DuplicateLayer { layer } => {
                write!(f, "duplicate layer name '{}'", layer)
            }
            ConfigError::UnknownRuleLayer { layer } => {
                write!(f, "incompatibility rule references undeclared layer '{}'", layer)
            }
            ConfigError::UnknownRuleValue { layer, value } => write!(
                f,
                "incompatibility rule references value '{}' not declared in layer '{}'",
                value, layer
            ),
            ConfigError::CapacityOverflow => {
                write!(f, "combination capacity exceeds u128")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl std::str::FromStr for Schema {
    type Err = ConfigError;

    /// Parse and validate a schema from a JSON string.
    fn from_str(s: &str) -> Result<Schema, ConfigError> {
        let schema: Schema = serde_json::from_str(s)?;
        schema.validate()?;
        Ok(schema)
    }
}

impl Schema {
    /// Parse and validate a schema from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Schema, ConfigError> {
        let schema: Schema = serde_json::from_reader(reader)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load and validate a schema document from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Schema, ConfigError> {
        let file = File::open(path)?;
        Schema::from_reader(file)
    }

    /// Look up a layer by name.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Maximum number of distinct attribute combinations: the product of
    /// layer cardinalities. Pure; fails only if the product does not fit
    /// in a u128.
    pub fn capacity(&self) -> Result<u128, ConfigError> {
        let mut capacity: u128 = 1;
        for layer in &self.layers {
            capacity = capacity
                .checked_mul(layer.values.len() as u128)
                .ok_or(ConfigError::CapacityOverflow)?;
        }
        Ok(capacity)
    }

    /// Structural validation. Every invariant the sampler and filter rely
    /// on is checked here, once, at load time.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.layers.is_empty() {
            return Err(ConfigError::NoLayers);
        }

        for (i, layer) in self.layers.iter().enumerate() {
            if layer.values.is_empty() {
                return Err(ConfigError::EmptyLayer {
                    layer: layer.name.clone(),
                });
            }
            if layer.values.len() != layer.weights.len() {
                return Err(ConfigError::WeightCountMismatch {
                    layer: layer.name.clone(),
                    values: layer.values.len(),
                    weights: layer.weights.len(),
                });
            }
            for &w in &layer.weights {
                if !w.is_finite() || w < 0.0 {
                    return Err(ConfigError::InvalidWeight {
                        layer: layer.name.clone(),
                        weight: w,
                    });
                }
            }
            if layer.weights.iter().sum::<f64>() <= 0.0 {
                return Err(ConfigError::ZeroWeightSum {
                    layer: layer.name.clone(),
                });
            }
            if self.layers[..i].iter().any(|l| l.name == layer.name) {
                return Err(ConfigError::DuplicateLayer {
                    layer: layer.name.clone(),
                });
            }
        }

        for rule in &self.incompatibilities {
            let layer = self
                .layer(&rule.layer)
                .ok_or_else(|| ConfigError::UnknownRuleLayer {
                    layer: rule.layer.clone(),
                })?;
            if !layer.values.contains(&rule.value) {
                return Err(ConfigError::UnknownRuleValue {
                    layer: rule.layer.clone(),
                    value: rule.value.clone(),
                });
            }
        }

        Ok(())
    }
}
