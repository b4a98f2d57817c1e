//! Command-line interface for mintgen.
//!
//! Provides the trigger-side surface of the generator:
//! - validating a schema and reporting its capacity
//! - generating and committing new tokens
//! - probing committed progress against capacity
//! - auditing the ledger by re-hashing committed payloads

use crate::engine::{GenerateError, Generator};
use crate::ledger::TokenLedger;
use crate::publish::FsPublisher;
use crate::schema::Schema;
use crate::token::Token;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "mintgen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Constrained-random combinatorial token generator")]
#[command(
    long_about = "mintgen draws unique attribute-set tokens from a layered, weighted schema,\n\
    rejects combinations that violate declared incompatibility rules, and records\n\
    every accepted token with its SHA-512 content hash in an append-only ledger.\n\n\
    Generation resumes safely after interruption: the committed count is rebuilt\n\
    from the ledger log alone, so no index is ever reproduced or lost.\n\n\
    Examples:\n\
      mintgen validate -s schema.json\n\
      mintgen generate -s schema.json -l ./ledger -n 10\n\
      mintgen status -s schema.json -l ./ledger\n\
      mintgen verify -l ./ledger"
)]
pub struct Cli {
    /// Also append log events to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a schema document and report its capacity
    Validate {
        /// Schema document (JSON)
        #[arg(short, long, value_name = "FILE")]
        schema: PathBuf,
    },

    /// Generate and commit new tokens
    #[command(
        long_about = "Generate and commit new tokens\n\n\
        Each token is drawn by independent weighted selection per layer, checked\n\
        against the schema's incompatibility rules, deduplicated against the\n\
        ledger by content hash, and committed at the next sequential index.\n\n\
        With --outbox set, each committed token is also published to a filesystem\n\
        outbox and the returned locator is recorded alongside the ledger."
    )]
    Generate {
        /// Schema document (JSON)
        #[arg(short, long, value_name = "FILE")]
        schema: PathBuf,

        /// Ledger directory (created if missing)
        #[arg(short, long, value_name = "DIR")]
        ledger_dir: PathBuf,

        /// Number of tokens to generate
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u64,

        /// Retry budget per token before reporting possible exhaustion
        #[arg(long, value_name = "N")]
        max_attempts: Option<u32>,

        /// Publish committed tokens to this outbox directory
        #[arg(long, value_name = "DIR")]
        outbox: Option<PathBuf>,
    },

    /// Report committed count against schema capacity
    Status {
        /// Schema document (JSON)
        #[arg(short, long, value_name = "FILE")]
        schema: PathBuf,

        /// Ledger directory
        #[arg(short, long, value_name = "DIR")]
        ledger_dir: PathBuf,
    },

    /// Re-hash every committed payload against the ledger log
    Verify {
        /// Ledger directory
        #[arg(short, long, value_name = "DIR")]
        ledger_dir: PathBuf,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Validate { schema } => {
            let schema = Schema::from_path(&schema)
                .with_context(|| format!("loading schema {}", schema.display()))?;
            let capacity = schema.capacity()?;

            println!("Schema OK: {} layers", schema.layers.len());
            for layer in &schema.layers {
                println!("  {}: {} values", layer.name, layer.values.len());
            }
            println!("Rules: {}", schema.incompatibilities.len());
            println!("Capacity: {} combinations", capacity);
            Ok(())
        }

        Commands::Generate {
            schema,
            ledger_dir,
            count,
            max_attempts,
            outbox,
        } => {
            let schema = Schema::from_path(&schema)
                .with_context(|| format!("loading schema {}", schema.display()))?;
            let ledger = TokenLedger::open(&ledger_dir)
                .with_context(|| format!("opening ledger {}", ledger_dir.display()))?;

            let mut generator = Generator::new(schema, ledger)?;
            if let Some(n) = max_attempts {
                generator = generator.with_max_attempts(n);
            }
            if let Some(outbox) = outbox {
                generator = generator.with_publisher(Box::new(FsPublisher::new(&outbox)?));
            }

            info!(
                committed = generator.generated_tokens_count(),
                capacity = %generator.capacity(),
                requested = count,
                "starting generation"
            );

            for _ in 0..count {
                match generator.generate_new_token() {
                    Ok(index) => println!("committed token {}", index),
                    Err(GenerateError::Exhausted { capacity }) => {
                        // Expected terminal condition, not a fault.
                        println!("exhausted: all {} combinations committed", capacity);
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        }

        Commands::Status { schema, ledger_dir } => {
            let schema = Schema::from_path(&schema)
                .with_context(|| format!("loading schema {}", schema.display()))?;
            let ledger = TokenLedger::open(&ledger_dir)
                .with_context(|| format!("opening ledger {}", ledger_dir.display()))?;

            let capacity = schema.capacity()?;
            let committed = ledger.count() as u128;
            println!("committed: {}", committed);
            println!("capacity:  {}", capacity);
            if committed > capacity {
                bail!(
                    "ledger holds {} entries but the schema only admits {}; \
                     schema and ledger directory do not match",
                    committed,
                    capacity
                );
            }
            println!("remaining: {}", capacity - committed);
            Ok(())
        }

        Commands::Verify { ledger_dir } => {
            let ledger = TokenLedger::open(&ledger_dir)
                .with_context(|| format!("opening ledger {}", ledger_dir.display()))?;

            let mut bad = 0u64;
            for (index, expected) in ledger.entries().iter().enumerate() {
                let payload = ledger
                    .read_payload(index as u64)
                    .with_context(|| format!("reading payload {}", index))?;
                let token: Token = serde_json::from_str(&payload)
                    .with_context(|| format!("parsing payload {}", index))?;
                if token.content_hash() != *expected {
                    eprintln!("index {}: payload hash does not match log", index);
                    bad += 1;
                }
            }

            if bad > 0 {
                bail!("{} of {} entries failed verification", bad, ledger.count());
            }
            println!("verified {} entries", ledger.count());
            Ok(())
        }
    }
}
