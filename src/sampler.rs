//! Weighted-random token sampling.
//!
//! Each draw selects one value per layer independently, with selection
//! probability weight(v) / sum(weights in layer), then attaches a fresh
//! nonce. The sampler never looks at incompatibility rules or the ledger;
//! rejection of bad candidates is the generation engine's job.

use crate::schema::{ConfigError, Schema};
use crate::token::Token;
use rand::distributions::{Distribution, WeightedError, WeightedIndex};
use rand::Rng;
use std::collections::BTreeMap;

/// Per-layer weighted distributions, built once from a validated schema.
///
/// Construction precomputes a `WeightedIndex` alias table per layer so the
/// hot sampling path allocates nothing but the token itself.
pub struct TokenSampler {
    layers: Vec<SamplerLayer>,
}

struct SamplerLayer {
    name: String,
    values: Vec<String>,
    dist: WeightedIndex<f64>,
}

impl TokenSampler {
    pub fn new(schema: &Schema) -> Result<TokenSampler, ConfigError> {
        let mut layers = Vec::with_capacity(schema.layers.len());
        for layer in &schema.layers {
            let dist = WeightedIndex::new(layer.weights.iter().copied())
                .map_err(|e| weighted_error_to_config(&layer.name, layer.weights.first(), e))?;
            layers.push(SamplerLayer {
                name: layer.name.clone(),
                values: layer.values.clone(),
                dist,
            });
        }
        Ok(TokenSampler { layers })
    }

    /// Draw one candidate token. Side-effect-free except for consuming
    /// randomness from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Token {
        let mut attributes = BTreeMap::new();
        for layer in &self.layers {
            let pick = layer.dist.sample(rng);
            attributes.insert(layer.name.clone(), layer.values[pick].clone());
        }
        Token::new(attributes, rng.gen::<f64>())
    }
}

fn weighted_error_to_config(
    layer: &str,
    first_weight: Option<&f64>,
    err: WeightedError,
) -> ConfigError {
    match err {
        WeightedError::NoItem => ConfigError::EmptyLayer {
            layer: layer.to_string(),
        },
        WeightedError::AllWeightsZero => ConfigError::ZeroWeightSum {
            layer: layer.to_string(),
        },
        WeightedError::InvalidWeight | WeightedError::TooMany => ConfigError::InvalidWeight {
            layer: layer.to_string(),
            weight: first_weight.copied().unwrap_or(f64::NAN),
        },
    }
}
