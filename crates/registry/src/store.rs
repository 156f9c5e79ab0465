use crate::grant::PermissionGrant;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk grant persistence: one JSON record per line.
///
/// Rewrites go through a temp file and an atomic rename so a crash mid-save
/// leaves the previous state intact.
pub struct GrantStore {
    path: PathBuf,
}

impl GrantStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted grants, degrading to an empty set on any unreadable or
    /// corrupt state. The returned flag reports whether recovery happened so
    /// the caller can record a warning audit entry. Startup never fails here.
    pub fn load_or_recover(&self) -> (Vec<PermissionGrant>, bool) {
        if !self.path.exists() {
            return (Vec::new(), false);
        }

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Grant store unreadable, starting empty: {}", e);
                return (Vec::new(), true);
            }
        };

        let reader = BufReader::new(file);
        let mut grants = Vec::new();

        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Grant store read failed, starting empty: {}", e);
                    return (Vec::new(), true);
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let grant: PermissionGrant = match serde_json::from_str(&line) {
                Ok(grant) => grant,
                Err(e) => {
                    warn!("Grant store corrupt, starting empty: {}", e);
                    return (Vec::new(), true);
                }
            };
            if let Err(e) = grant.validate_version() {
                warn!("Grant store corrupt, starting empty: {}", e);
                return (Vec::new(), true);
            }
            grants.push(grant);
        }

        (grants, false)
    }

    /// Persist the full grant set atomically.
    pub fn save(&self, grants: &[PermissionGrant]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("tmp");

        {
            let mut file = File::create(&temp_path)?;
            for grant in grants {
                let json = serde_json::to_string(grant)?;
                writeln!(file, "{}", json)?;
            }
            file.sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

}
