//! Profit target persisted as a JSON document.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::info;

use crate::domain::error::GatetraderError;
use crate::domain::target::Target;
use crate::ports::target_port::TargetPort;

pub struct JsonTargetAdapter {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonTargetAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, reason: impl ToString) -> GatetraderError {
        GatetraderError::CollaboratorUnavailable {
            collaborator: "target store".to_string(),
            reason: reason.to_string(),
        }
    }
}

impl TargetPort for JsonTargetAdapter {
    fn get_target(&self) -> Result<Target, GatetraderError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(self.unavailable(format!("{} not found", self.path.display())));
            }
            Err(e) => return Err(e.into()),
        };
        let stored: Target = serde_json::from_str(&content)?;
        // Re-check goals that were edited by hand.
        Target::new(
            stored.monthly(),
            stored.weekly(),
            stored.daily(),
            stored.updated_at(),
        )
    }

    fn update_target(&self, target: &Target) -> Result<(), GatetraderError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| self.unavailable("target store lock poisoned"))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(target)?)?;
        fs::rename(&staging, &self.path)?;
        info!(
            monthly = target.monthly(),
            weekly = target.weekly(),
            daily = target.daily(),
            "target updated"
        );
        Ok(())
    }
}
