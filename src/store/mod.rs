//! JSON state file persistence for the CLI and other collaborators.
//!
//! The store only ever sees committed ledger state: callers apply a
//! transition in memory first and persist the resulting snapshot afterwards.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::ledger::{LedgerSnapshot, TokenLedger};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("state file {0} already exists")]
    AlreadyExists(PathBuf),
    #[error("no state file at {0}; run `galai init` first")]
    Missing(PathBuf),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Read and validate a ledger configuration file.
pub fn load_config(path: &Path) -> Result<LedgerConfig, StoreError> {
    let raw = read(path)?;
    let config: LedgerConfig = serde_json::from_str(&raw).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Ledger snapshot persisted as a single JSON document.
#[derive(Clone, Debug)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create a fresh ledger from `config` and persist it.
    pub fn init(&self, config: LedgerConfig, force: bool) -> Result<TokenLedger, StoreError> {
        if self.exists() && !force {
            return Err(StoreError::AlreadyExists(self.path.clone()));
        }
        let ledger = TokenLedger::create(config)?;
        self.save(&ledger)?;
        info!(
            path = %self.path.display(),
            name = ledger.name(),
            symbol = ledger.symbol(),
            cap = %ledger.cap(),
            "ledger initialised"
        );
        Ok(ledger)
    }

    pub fn load(&self) -> Result<TokenLedger, StoreError> {
        if !self.exists() {
            return Err(StoreError::Missing(self.path.clone()));
        }
        let raw = read(&self.path)?;
        let snapshot: LedgerSnapshot =
            serde_json::from_str(&raw).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        let ledger = TokenLedger::restore(snapshot)?;
        debug!(
            path = %self.path.display(),
            height = ledger.height(),
            supply = %ledger.total_supply(),
            "ledger loaded"
        );
        Ok(ledger)
    }

    /// Write the snapshot to a sibling temp file, then rename it over the
    /// target so readers never observe a partial document.
    pub fn save(&self, ledger: &TokenLedger) -> Result<(), StoreError> {
        let snapshot = ledger.snapshot();
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| self.io(source))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        if let Err(source) = replace_with(&tmp, &self.path, &bytes) {
            // a failed write must not leave the sibling behind
            let _ = fs::remove_file(&tmp);
            return Err(self.io(source));
        }
        debug!(
            path = %self.path.display(),
            root = %snapshot.state_root_hex(),
            "ledger saved"
        );
        Ok(())
    }

    fn io(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn replace_with(tmp: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(tmp, target)
}

fn read(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}
