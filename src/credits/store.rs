//! Credit State Persistence
//!
//! The `CreditStore` port and its two implementations: a JSON file under
//! the XDG state directory (the default) and an in-memory store for tests
//! and embedded use.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::SearchError;
use crate::types::CreditState;

/// Persistence port for the credit manager.
#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Load the persisted state; an absent document is an empty state.
    async fn load(&self) -> Result<CreditState, SearchError>;

    /// Persist the full state document.
    async fn save(&self, state: &CreditState) -> Result<(), SearchError>;

    /// Whether a persisted document exists.
    async fn exists(&self) -> bool;
}

/// Stores the credit state as one JSON document on disk, creating parent
/// directories as needed.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `$XDG_STATE_HOME/omnisearch/credits.json`.
    pub fn at_default_path() -> Self {
        Self::new(crate::config::app_state_dir().join("credits.json"))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl CreditStore for JsonFileStore {
    async fn load(&self) -> Result<CreditState, SearchError> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                SearchError::Internal(format!(
                    "corrupt credit state at {}: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no persisted credit state");
                Ok(CreditState::new())
            }
            Err(e) => Err(SearchError::Internal(format!(
                "cannot read credit state at {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn save(&self, state: &CreditState) -> Result<(), SearchError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, text).await?;
        Ok(())
    }

    async fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// In-memory store, optionally seeded.
#[derive(Default)]
pub struct MemoryStore {
    state: tokio::sync::Mutex<Option<CreditState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(state: CreditState) -> Self {
        Self {
            state: tokio::sync::Mutex::new(Some(state)),
        }
    }
}

#[async_trait]
impl CreditStore for MemoryStore {
    async fn load(&self) -> Result<CreditState, SearchError> {
        Ok(self.state.lock().await.clone().unwrap_or_default())
    }

    async fn save(&self, state: &CreditState) -> Result<(), SearchError> {
        *self.state.lock().await = Some(state.clone());
        Ok(())
    }

    async fn exists(&self) -> bool {
        self.state.lock().await.is_some()
    }
}
