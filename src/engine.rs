//! Generation engine: sample → filter → dedup → commit, under a
//! single-writer lock.
//!
//! Rejection sampling over the full combination space. Sampling and
//! compatibility filtering are pure and run outside the lock; the capacity
//! check, dedup check, and commit run inside it so index assignment is
//! atomic. Publishing happens after the lock is released and can never
//! invalidate a commit.

use crate::filter::is_compatible;
use crate::ledger::{LedgerError, TokenLedger};
use crate::publish::Publisher;
use crate::sampler::TokenSampler;
use crate::schema::{ConfigError, Schema};
use crate::token::Token;
use rand::Rng;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Retry budget per generation call before giving up. Incompatibility rules
/// can make regions of the combination space unreachable; without a bound
/// the rejection loop would spin forever on an over-constrained schema.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100_000;

/// Terminal failures of a single generation call.
#[derive(Debug)]
pub enum GenerateError {
    /// Every combination has been committed; callers must stop asking.
    Exhausted { capacity: u128 },
    /// The retry budget ran out with capacity still unreached. The schema's
    /// compatible region may be unreachable, or the budget is too small.
    PossiblyExhausted { attempts: u32 },
    /// Durable storage failed; the in-memory count was not advanced.
    Ledger(LedgerError),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Exhausted { capacity } => {
                write!(f, "all {} combinations committed", capacity)
            }
            GenerateError::PossiblyExhausted { attempts } => write!(
                f,
                "no acceptable token after {} attempts; schema may be over-constrained",
                attempts
            ),
            GenerateError::Ledger(e) => write!(f, "ledger failure: {}", e),
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerateError::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerError> for GenerateError {
    fn from(e: LedgerError) -> Self {
        GenerateError::Ledger(e)
    }
}

/// Outcome of the locked commit section for one candidate.
enum CommitOutcome {
    Committed(u64),
    Duplicate,
}

/// Orchestrates sampling, filtering, dedup, and durable commit.
///
/// The schema is immutable for the generator's lifetime; capacity and the
/// per-layer distributions are computed once at construction.
pub struct Generator {
    schema: Schema,
    sampler: TokenSampler,
    capacity: u128,
    max_attempts: u32,
    ledger: Mutex<TokenLedger>,
    publisher: Option<Box<dyn Publisher>>,
}

impl Generator {
    pub fn new(schema: Schema, ledger: TokenLedger) -> Result<Generator, ConfigError> {
        let capacity = schema.capacity()?;
        let sampler = TokenSampler::new(&schema)?;
        Ok(Generator {
            schema,
            sampler,
            capacity,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            ledger: Mutex::new(ledger),
            publisher: None,
        })
    }

    /// Override the per-call retry budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Generator {
        self.max_attempts = max_attempts;
        self
    }

    /// Attach a publishing collaborator, invoked after each commit.
    pub fn with_publisher(mut self, publisher: Box<dyn Publisher>) -> Generator {
        self.publisher = Some(publisher);
        self
    }

    /// Theoretical maximum number of distinct tokens for the schema.
    pub fn capacity(&self) -> u128 {
        self.capacity
    }

    /// Committed token count; stable across restarts because it is derived
    /// from the ledger log alone.
    pub fn generated_tokens_count(&self) -> u64 {
        self.lock_ledger().count()
    }

    /// Generate, validate, and durably commit one new token, returning its
    /// assigned index. Uses thread-local randomness.
    pub fn generate_new_token(&self) -> Result<u64, GenerateError> {
        self.generate_with_rng(&mut rand::thread_rng())
    }

    /// Same as [`generate_new_token`](Self::generate_new_token) with an
    /// injected randomness source.
    pub fn generate_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<u64, GenerateError> {
        let mut attempts: u32 = 0;

        loop {
            // Capacity gate before burning randomness on a doomed draw.
            let committed = self.generated_tokens_count();
            if committed as u128 >= self.capacity {
                return Err(GenerateError::Exhausted {
                    capacity: self.capacity,
                });
            }

            if attempts >= self.max_attempts {
                return Err(GenerateError::PossiblyExhausted { attempts });
            }
            attempts += 1;

            // Pure work outside the lock: draw and filter speculatively.
            let token = self.sampler.sample(rng);
            if !is_compatible(&self.schema, &token) {
                debug!(attempt = attempts, "candidate rejected: incompatible");
                continue;
            }

            let hash = token.content_hash();
            match self.try_commit(&hash, &token)? {
                CommitOutcome::Committed(index) => {
                    info!(index, hash = %&hash[..16], "token committed");
                    self.publish_committed(&token, index);
                    return Ok(index);
                }
                CommitOutcome::Duplicate => {
                    debug!(attempt = attempts, "candidate rejected: duplicate hash");
                }
            }
        }
    }

    /// Critical section: re-check capacity and dedup, then append. Held
    /// only for local file I/O, never across a publish call.
    fn try_commit(&self, hash: &str, token: &Token) -> Result<CommitOutcome, GenerateError> {
        let mut ledger = self.lock_ledger();

        if ledger.count() as u128 >= self.capacity {
            return Err(GenerateError::Exhausted {
                capacity: self.capacity,
            });
        }
        if ledger.contains_hash(hash) {
            return Ok(CommitOutcome::Duplicate);
        }

        let index = ledger.append(hash, &token.canonical_json(), None)?;
        Ok(CommitOutcome::Committed(index))
    }

    /// Post-commit hand-off. Publish failures are deferred: the commit
    /// stands and the reference can be recorded by a later retry.
    fn publish_committed(&self, token: &Token, index: u64) {
        let publisher = match &self.publisher {
            Some(p) => p,
            None => return,
        };
        match publisher.publish(token, index) {
            Ok(external_ref) => {
                if let Err(e) = self.lock_ledger().record_external_ref(index, &external_ref) {
                    warn!(index, error = %e, "external reference not recorded");
                } else {
                    debug!(index, external_ref = %external_ref, "token published");
                }
            }
            Err(e) => warn!(index, error = %e, "publish deferred"),
        }
    }

    fn lock_ledger(&self) -> std::sync::MutexGuard<'_, TokenLedger> {
        // Poisoning only follows a panic in another committer; propagate it.
        self.ledger.lock().expect("ledger mutex poisoned")
    }
}
