use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use divwatch_core::PersistedState;
use tracing::{debug, info};

use crate::{LedgerError, LedgerResult, StateStore};

/// JSON file snapshot store used by the command-line runtime.
#[derive(Clone, Debug)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt(&self, reason: impl ToString) -> LedgerError {
        LedgerError::Corrupt {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> LedgerResult<PersistedState> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no snapshot found; starting with empty state");
                return Ok(PersistedState::new());
            }
            Err(err) => return Err(self.corrupt(err)),
        };
        let state: PersistedState = serde_json::from_slice(&bytes).map_err(|err| self.corrupt(err))?;
        debug!(
            path = %self.path.display(),
            tickers = state.len(),
            events = state.total_events(),
            "loaded snapshot"
        );
        Ok(state)
    }

    fn save(&self, state: &PersistedState) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_vec_pretty(state)?;
        let temp_path = self.temp_path();
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&payload)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        if let Err(err) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(err.into());
        }
        info!(
            path = %self.path.display(),
            tickers = state.len(),
            events = state.total_events(),
            "snapshot saved"
        );
        Ok(())
    }
}
