//! Per-session working directories
//!
//! Uploads and outputs live under `<data_dir>/sessions/<digest>/`, where the
//! digest is derived from the token so the token itself never touches disk.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionWorkspace {
    root: PathBuf,
}

impl SessionWorkspace {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("sessions"),
        }
    }

    /// Directory owned by a session
    pub fn session_dir(&self, token: &str) -> PathBuf {
        let digest = Sha256::digest(token.as_bytes());
        self.root.join(&hex::encode(digest)[..32])
    }

    /// Directory holding one task's input and output
    pub fn task_dir(&self, token: &str, task_id: Uuid) -> PathBuf {
        self.session_dir(token).join(task_id.to_string())
    }

    /// Create a task directory
    pub async fn prepare_task_dir(&self, token: &str, task_id: Uuid) -> std::io::Result<PathBuf> {
        let dir = self.task_dir(token, task_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Delete everything a session stored
    pub async fn remove_session(&self, token: &str) -> std::io::Result<()> {
        let dir = self.session_dir(token);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
