//! Agent identity persistence.
//!
//! Persists the registered identity to a JSON state file so the agent can
//! reuse its API key between runs instead of re-registering under a new
//! name. A missing or unreadable file degrades to a fresh registration with
//! a warning, never a failure.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::marketplace::AgentIdentity;

/// On-disk shape of the state file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedState {
    #[serde(flatten)]
    identity: AgentIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
}

/// File-backed store for the registered identity.
#[derive(Debug)]
pub struct StateStore {
    identity: RwLock<Option<AgentIdentity>>,
    storage_path: PathBuf,
}

impl StateStore {
    /// Create a store, loading any previously saved identity from disk.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let storage_path = path.into();

        let identity = if storage_path.exists() {
            match Self::load_from_path(&storage_path) {
                Ok(state) => {
                    tracing::info!(
                        "Loaded existing agent identity '{}' from {}",
                        state.identity.name,
                        storage_path.display()
                    );
                    Some(state.identity)
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load agent state from {}: {}, will register fresh",
                        storage_path.display(),
                        e
                    );
                    None
                }
            }
        } else {
            tracing::debug!(
                "No agent state file at {}, will register fresh",
                storage_path.display()
            );
            None
        };

        Self {
            identity: RwLock::new(identity),
            storage_path,
        }
    }

    fn load_from_path(path: &Path) -> Result<PersistedState, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Get a clone of the stored identity, if any.
    pub async fn identity(&self) -> Option<AgentIdentity> {
        self.identity.read().await.clone()
    }

    /// Store a freshly registered identity and persist it to disk.
    pub async fn save_identity(&self, identity: &AgentIdentity) -> Result<(), std::io::Error> {
        {
            let mut guard = self.identity.write().await;
            *guard = Some(identity.clone());
        }

        if let Some(parent) = self.storage_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let state = PersistedState {
            identity: identity.clone(),
            saved_at: Some(Utc::now()),
        };
        let contents = serde_json::to_string_pretty(&state)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.storage_path, contents)?;
        tracing::debug!("Saved agent state to {}", self.storage_path.display());
        Ok(())
    }
}
