//! Provider Registry
//!
//! Identity-keyed live set of providers. Populated once during bootstrap
//! and read-only afterwards; duplicate registration is a configuration
//! error so engine ids stay globally unique.

pub mod plugins;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SearchError;
use crate::provider::SearchProvider;

#[derive(Default)]
pub struct ProviderRegistry {
    by_id: HashMap<String, Arc<dyn SearchProvider>>,
    order: Vec<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own id.
    pub fn register(&mut self, provider: Arc<dyn SearchProvider>) -> Result<(), SearchError> {
        let id = provider.id().to_string();
        if id.is_empty() {
            return Err(SearchError::Configuration(
                "provider with an empty id".to_string(),
            ));
        }
        if self.by_id.contains_key(&id) {
            return Err(SearchError::Configuration(format!(
                "provider '{id}' is already registered"
            )));
        }
        self.order.push(id.clone());
        self.by_id.insert(id, provider);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn SearchProvider>> {
        self.by_id.get(id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Providers in registration order.
    pub fn list(&self) -> Vec<Arc<dyn SearchProvider>> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
