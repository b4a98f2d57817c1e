//! Publishing collaborator seam.
//!
//! The real publishing target (a remote pinning service or similar
//! content-addressed store) lives outside this crate. The engine only needs
//! a synchronous `publish(token, index) -> external_ref` call whose failure
//! is retryable and never invalidates an already-committed ledger entry.

use crate::token::Token;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Recoverable failure while handing a committed token to a publisher.
/// Deferred by the engine; never rolls back a commit.
#[derive(Debug)]
pub enum PublishError {
    Io(io::Error),
    /// The publishing backend refused or is unreachable.
    Unavailable { reason: String },
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Io(e) => write!(f, "publish I/O error: {}", e),
            PublishError::Unavailable { reason } => {
                write!(f, "publisher unavailable: {}", reason)
            }
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::Io(e) => Some(e),
            PublishError::Unavailable { .. } => None,
        }
    }
}

impl From<io::Error> for PublishError {
    fn from(e: io::Error) -> Self {
        PublishError::Io(e)
    }
}

/// Hands a committed token to an external store and returns a locator for
/// it. Called by the engine after the commit lock is released.
pub trait Publisher: Send + Sync {
    fn publish(&self, token: &Token, index: u64) -> Result<String, PublishError>;
}

/// Filesystem outbox publisher: drops the canonical payload into a
/// directory and returns a `file://` locator. Stands in for a remote
/// pinning service at the same interface.
pub struct FsPublisher {
    outbox: PathBuf,
}

impl FsPublisher {
    pub fn new<P: AsRef<Path>>(outbox: P) -> io::Result<FsPublisher> {
        let outbox = outbox.as_ref().to_path_buf();
        fs::create_dir_all(&outbox)?;
        Ok(FsPublisher { outbox })
    }
}

impl Publisher for FsPublisher {
    fn publish(&self, token: &Token, index: u64) -> Result<String, PublishError> {
        let path = self.outbox.join(format!("{}.json", index));
        fs::write(&path, token.canonical_json())?;
        Ok(format!("file://{}", path.display()))
    }
}
