//! mintgen - Constrained-random combinatorial token generator
//!
//! Draws unique attribute-set tokens from a layered, weighted schema,
//! rejects combinations that violate declared incompatibility rules, and
//! records every accepted token with its SHA-512 content hash in an
//! append-only ledger so generation resumes safely after interruption.

pub mod cli;
pub mod engine;
pub mod filter;
pub mod ledger;
pub mod publish;
pub mod sampler;
pub mod schema;
pub mod token;

// Re-export main types for convenience
pub use engine::{GenerateError, Generator, DEFAULT_MAX_ATTEMPTS};
pub use filter::is_compatible;
pub use ledger::{LedgerError, TokenLedger};
pub use publish::{FsPublisher, PublishError, Publisher};
pub use sampler::TokenSampler;
pub use schema::{ConfigError, IncompatibilityRule, Layer, Schema};
pub use token::Token;
