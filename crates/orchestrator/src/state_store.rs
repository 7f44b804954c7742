//! Durable storage for step state.
//!
//! A run loads each step's state from the store when the step is activated
//! and writes every activated step back when the run ends. State is keyed by
//! `(run id, step)`, so starting a runner with an existing run id resumes that
//! run's history while a fresh run id always starts from zeroed state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use docflow_core::StepState;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::core::StepId;
use crate::error::{OrchestratorError, Result};

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, run_id: Uuid, step: &StepId) -> Result<Option<StepState>>;

    async fn save(&self, run_id: Uuid, step: &StepId, state: &StepState) -> Result<()>;
}

/// Process-local store, mainly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<(Uuid, StepId), StepState>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, run_id: Uuid, step: &StepId) -> Result<Option<StepState>> {
        let states = self
            .states
            .read()
            .map_err(|_| OrchestratorError::StateStore("state lock poisoned".to_string()))?;
        Ok(states.get(&(run_id, step.clone())).cloned())
    }

    async fn save(&self, run_id: Uuid, step: &StepId, state: &StepState) -> Result<()> {
        let mut states = self
            .states
            .write()
            .map_err(|_| OrchestratorError::StateStore("state lock poisoned".to_string()))?;
        states.insert((run_id, step.clone()), state.clone());
        Ok(())
    }
}

/// Stores each step's state as `<root>/<run id>/<step>.json`.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.root.join(run_id.to_string())
    }

    pub fn state_path(&self, run_id: Uuid, step: &StepId) -> PathBuf {
        self.run_dir(run_id).join(format!("{}.json", step))
    }

    fn temp_path(&self, run_id: Uuid, step: &StepId) -> PathBuf {
        self.run_dir(run_id).join(format!(".{}.json.tmp", step))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, run_id: Uuid, step: &StepId) -> Result<Option<StepState>> {
        let path = self.state_path(run_id, step);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| OrchestratorError::StateStore(format!("{}: {}", path.display(), e)))?;
        let state = serde_json::from_str(&content)
            .map_err(|e| OrchestratorError::StateStore(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "Step state loaded");
        Ok(Some(state))
    }

    async fn save(&self, run_id: Uuid, step: &StepId, state: &StepState) -> Result<()> {
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| OrchestratorError::StateStore(format!("{}: {}", dir.display(), e)))?;

        // The target is only ever replaced whole, by rename.
        let path = self.state_path(run_id, step);
        let temp_path = self.temp_path(run_id, step);
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&temp_path, content).await.map_err(|e| {
            OrchestratorError::StateStore(format!("{}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, &path).await.map_err(|e| {
            OrchestratorError::StateStore(format!(
                "{} -> {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        debug!(path = %path.display(), "Step state saved");
        Ok(())
    }
}
