use crate::entry::AuditEntry;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use warden_policy::Category;

const GENESIS_HASH: &str = "genesis";

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Chain integrity violation: {0}")]
    IntegrityViolation(String),
}

#[derive(Serialize, Deserialize, Clone)]
struct ChainedRecord {
    entry_hash: String,
    prev_hash: String,
    #[serde(flatten)]
    entry: AuditEntry,
}

/// Filter for reading the audit trail back.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub category: Option<Category>,
}

/// Append-only, durable audit log.
///
/// Every entry is hash-chained to its predecessor and fsynced before the
/// append returns; the gateway relies on that ordering to guarantee no
/// action executes before its authorization decision is on disk. An
/// in-memory mirror of the chain serves queries.
pub struct AuditLog {
    log_path: PathBuf,
    file: Mutex<File>,
    last_hash: Mutex<String>,
    entries: RwLock<Vec<AuditEntry>>,
}

impl AuditLog {
    /// Open (or create) the log at `path`, re-reading any existing chain.
    ///
    /// A corrupt or broken tail does not prevent startup: the valid prefix is
    /// kept, appends continue from its last hash, and the returned flag tells
    /// the caller to record a warning entry. Only a filesystem-level failure
    /// to create the file is an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<(Self, bool), AuditError> {
        let log_path = path.as_ref().to_path_buf();

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (entries, last_hash, recovered) = Self::read_chain_tolerant(&log_path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok((
            Self {
                log_path,
                file: Mutex::new(file),
                last_hash: Mutex::new(last_hash),
                entries: RwLock::new(entries),
            },
            recovered,
        ))
    }

    /// Append an entry, durable on return.
    pub fn append(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut last_hash = self.last_hash.lock();

        let entry_json = serde_json::to_string(entry)?;
        let entry_hash = chain_hash(&last_hash, &entry_json);

        let record = ChainedRecord {
            entry_hash: entry_hash.clone(),
            prev_hash: last_hash.clone(),
            entry: entry.clone(),
        };
        let json = serde_json::to_string(&record)?;

        {
            let mut file = self.file.lock();
            writeln!(file, "{}", json)?;
            file.sync_all()?;
        }

        *last_hash = entry_hash;
        self.entries.write().push(entry.clone());
        Ok(())
    }

    /// Entries within the (inclusive) time range, optionally restricted to a
    /// category.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|entry| {
                if let Some(from) = query.from {
                    if entry.timestamp < from {
                        return false;
                    }
                }
                if let Some(to) = query.to {
                    if entry.timestamp > to {
                        return false;
                    }
                }
                if let Some(category) = query.category {
                    if entry.category != Some(category) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Strict full-chain verification of the on-disk log.
    pub fn verify_integrity(&self) -> Result<(), AuditError> {
        let file = File::open(&self.log_path)?;
        let reader = BufReader::new(file);
        let mut prev_hash = GENESIS_HASH.to_string();
        let mut line_num = 0;

        for line in reader.lines() {
            line_num += 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let record: ChainedRecord = serde_json::from_str(&line).map_err(|e| {
                AuditError::IntegrityViolation(format!("Line {}: invalid JSON: {}", line_num, e))
            })?;

            if record.prev_hash != prev_hash {
                return Err(AuditError::IntegrityViolation(format!(
                    "Line {}: hash chain broken. Expected prev_hash '{}', got '{}'",
                    line_num, prev_hash, record.prev_hash
                )));
            }

            let entry_json = serde_json::to_string(&record.entry)?;
            let computed = chain_hash(&prev_hash, &entry_json);
            if computed != record.entry_hash {
                return Err(AuditError::IntegrityViolation(format!(
                    "Line {}: hash mismatch. Expected '{}', got '{}'",
                    line_num, computed, record.entry_hash
                )));
            }

            prev_hash = record.entry_hash;
        }

        Ok(())
    }

    fn read_chain_tolerant(
        log_path: &Path,
    ) -> Result<(Vec<AuditEntry>, String, bool), AuditError> {
        if !log_path.exists() {
            return Ok((Vec::new(), GENESIS_HASH.to_string(), false));
        }

        let file = match File::open(log_path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Audit log unreadable, starting a fresh chain: {}", e);
                return Ok((Vec::new(), GENESIS_HASH.to_string(), true));
            }
        };

        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut prev_hash = GENESIS_HASH.to_string();
        let mut line_num = 0;

        for line in reader.lines() {
            line_num += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Audit log read failed at line {}: {}", line_num, e);
                    return Ok((entries, prev_hash, true));
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let record: ChainedRecord = match serde_json::from_str(&line) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Audit log corrupt at line {}: {}", line_num, e);
                    return Ok((entries, prev_hash, true));
                }
            };

            let entry_json = serde_json::to_string(&record.entry)?;
            let computed = chain_hash(&prev_hash, &entry_json);
            if record.prev_hash != prev_hash || record.entry_hash != computed {
                warn!("Audit chain broken at line {}; keeping valid prefix", line_num);
                return Ok((entries, prev_hash, true));
            }

            prev_hash = record.entry_hash;
            entries.push(record.entry);
        }

        Ok((entries, prev_hash, false))
    }
}

fn chain_hash(prev_hash: &str, entry_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash);
    hasher.update(entry_json);
    format!("{:x}", hasher.finalize())
}
