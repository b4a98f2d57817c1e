//! Uniqueness ledger: durable, append-only record of committed tokens.
//!
//! Two decoupled persisted structures live under one directory:
//! - `tokens.log` — one line per commit, `<sha512-hex>` optionally followed
//!   by an external reference. The line count is the committed entry count
//!   and the single source of truth for resume-after-restart.
//! - `<index>.json` — the canonical token payload for each committed index.
//!
//! A payload file is written and synced before its log line, so the commit
//! record can never become durable ahead of the data it commits. If the
//! process dies in between, the orphaned payload is not counted and the
//! next append at that index simply overwrites it. External references obtained after commit
//! (e.g. from a pinning service) go to an append-only `refs.log` sidecar so
//! committed log lines are never rewritten.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const LOG_FILE: &str = "tokens.log";
const REFS_FILE: &str = "refs.log";

/// Durable-storage failure during ledger reads or appends.
#[derive(Debug)]
pub enum LedgerError {
    Io(io::Error),
    /// A log line's hash column is not a SHA-512 hex digest. Blank lines
    /// are tolerated and skipped.
    MalformedLine { line: usize },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Io(e) => write!(f, "ledger I/O error: {}", e),
            LedgerError::MalformedLine { line } => {
                write!(f, "malformed ledger log line {}", line)
            }
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::Io(e) => Some(e),
            LedgerError::MalformedLine { .. } => None,
        }
    }
}

impl From<io::Error> for LedgerError {
    fn from(e: io::Error) -> Self {
        LedgerError::Io(e)
    }
}

/// Append-only token ledger rooted at a directory.
///
/// Committed state is rebuilt from `tokens.log` alone on open, so a process
/// restart resumes at exactly the committed count.
#[derive(Debug)]
pub struct TokenLedger {
    dir: PathBuf,
    /// Committed content hashes in commit order; index = position.
    entries: Vec<String>,
    /// Mirror of `entries` for O(1) membership tests.
    hashes: HashSet<String>,
}

impl TokenLedger {
    /// Open (creating if needed) a ledger directory and rebuild committed
    /// state from the log.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<TokenLedger, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut entries = Vec::new();
        let mut hashes = HashSet::new();

        let log_path = dir.join(LOG_FILE);
        if log_path.exists() {
            let reader = BufReader::new(File::open(&log_path)?);
            for (i, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let hash = line
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_string();
                if hash.len() != 128 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(LedgerError::MalformedLine { line: i + 1 });
                }
                hashes.insert(hash.clone());
                entries.push(hash);
            }
        }

        Ok(TokenLedger {
            dir,
            entries,
            hashes,
        })
    }

    /// Number of committed entries; also the next index to assign and the
    /// resume point after restart.
    pub fn count(&self) -> u64 {
        self.entries.len() as u64
    }

    /// True if `hash` already appears among committed entries. Membership
    /// is checked against the hash column only, never the reference column.
    pub fn contains_hash(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    /// Committed hashes in commit order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Path of the payload artifact for a committed index.
    pub fn payload_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{}.json", index))
    }

    /// Read back the payload committed at `index`.
    pub fn read_payload(&self, index: u64) -> Result<String, LedgerError> {
        Ok(fs::read_to_string(self.payload_path(index))?)
    }

    /// Commit one token: write the payload under the next index, then
    /// append and sync the log line. The log append is the commit point;
    /// nothing before it counts.
    pub fn append(
        &mut self,
        hash: &str,
        payload: &str,
        external_ref: Option<&str>,
    ) -> Result<u64, LedgerError> {
        let index = self.count();

        // Payload first, synced to disk before the log line: the log
        // append is the commit point and must never hit disk ahead of the
        // payload it commits. An orphan left by a crash here is invisible
        // to count() and gets overwritten on the next append at this index.
        let mut payload_file = File::create(self.payload_path(index))?;
        payload_file.write_all(payload.as_bytes())?;
        payload_file.sync_all()?;

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(LOG_FILE))?;
        match external_ref {
            Some(r) => writeln!(log, "{} {}", hash, r)?,
            None => writeln!(log, "{}", hash)?,
        }
        log.sync_all()?;

        self.hashes.insert(hash.to_string());
        self.entries.push(hash.to_string());
        Ok(index)
    }

    /// Record an external reference obtained after commit. Appends to the
    /// `refs.log` sidecar; the hash log is never rewritten.
    pub fn record_external_ref(&self, index: u64, external_ref: &str) -> Result<(), LedgerError> {
        let mut refs = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(REFS_FILE))?;
        writeln!(refs, "{} {}", index, external_ref)?;
        refs.sync_all()?;
        Ok(())
    }

    /// External reference recorded for `index`, if any. The last recorded
    /// entry wins, allowing a deferred publish to be retried.
    pub fn external_ref(&self, index: u64) -> Result<Option<String>, LedgerError> {
        let refs_path = self.dir.join(REFS_FILE);
        if !refs_path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(refs_path)?);
        let mut found = None;
        for line in reader.lines() {
            let line = line?;
            let mut parts = line.split_whitespace();
            if let (Some(idx), Some(r)) = (parts.next(), parts.next()) {
                if idx.parse::<u64>() == Ok(index) {
                    found = Some(r.to_string());
                }
            }
        }
        Ok(found)
    }
}
