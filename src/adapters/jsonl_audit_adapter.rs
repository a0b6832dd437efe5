//! Append-only JSON Lines audit trail of gate decisions.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::domain::decision::DecisionRecord;
use crate::domain::error::GatetraderError;
use crate::ports::audit_port::AuditPort;

pub struct JsonlAuditAdapter {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in file order. Malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<DecisionRecord>, GatetraderError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DecisionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = number + 1, error = %e, "skipping malformed audit line"),
            }
        }
        Ok(records)
    }
}

impl AuditPort for JsonlAuditAdapter {
    fn record(&self, record: &DecisionRecord) -> Result<(), GatetraderError> {
        let json = serde_json::to_string(record)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| GatetraderError::CollaboratorUnavailable {
                collaborator: "audit".to_string(),
                reason: "audit lock poisoned".to_string(),
            })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()?;
        Ok(())
    }
}
