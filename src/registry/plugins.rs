//! Plugin Registry
//!
//! Maps engine `type` strings to provider factories. The four built-in
//! plugins (`tavily`, `brave`, `linkup`, `searxng`) are pre-registered;
//! library consumers add their own before bootstrap. The registry is
//! normally constructor-injected, with a thin process-wide singleton kept
//! for convenience.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::warn;

use crate::cancel::CancelHandle;
use crate::config::EngineConfig;
use crate::error::SearchError;
use crate::provider::SearchProvider;
use crate::providers::{BraveProvider, LinkupProvider, SearxngProvider, TavilyProvider};

/// Shared collaborators handed to every provider factory.
#[derive(Clone)]
pub struct PluginDeps {
    pub http: reqwest::Client,
    pub cancel: CancelHandle,
    /// Application config directory (`$XDG_CONFIG_HOME/omnisearch`).
    pub config_dir: PathBuf,
    /// Application data directory (`$XDG_DATA_HOME/omnisearch`).
    pub data_dir: PathBuf,
}

impl PluginDeps {
    pub fn from_environment(http: reqwest::Client, cancel: CancelHandle) -> Self {
        Self {
            http,
            cancel,
            config_dir: crate::config::app_config_dir(),
            data_dir: crate::config::app_data_dir(),
        }
    }
}

/// Builds a provider from its engine configuration.
pub type ProviderFactory =
    Arc<dyn Fn(&EngineConfig, &PluginDeps) -> Result<Arc<dyn SearchProvider>, SearchError> + Send + Sync>;

/// Hook run when a plugin is (un)registered.
pub type PluginHook = Arc<dyn Fn() -> Result<(), SearchError> + Send + Sync>;

/// One registered engine type.
#[derive(Clone)]
pub struct PluginDefinition {
    pub type_name: String,
    pub display_name: String,
    pub has_lifecycle: bool,
    pub factory: ProviderFactory,
    pub on_register: Option<PluginHook>,
    pub on_unregister: Option<PluginHook>,
}

impl std::fmt::Debug for PluginDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDefinition")
            .field("type_name", &self.type_name)
            .field("display_name", &self.display_name)
            .field("has_lifecycle", &self.has_lifecycle)
            .finish()
    }
}

impl PluginDefinition {
    pub fn new(
        type_name: impl Into<String>,
        display_name: impl Into<String>,
        has_lifecycle: bool,
        factory: ProviderFactory,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            display_name: display_name.into(),
            has_lifecycle,
            factory,
            on_register: None,
            on_unregister: None,
        }
    }

    pub fn with_on_register(mut self, hook: PluginHook) -> Self {
        self.on_register = Some(hook);
        self
    }

    pub fn with_on_unregister(mut self, hook: PluginHook) -> Self {
        self.on_unregister = Some(hook);
        self
    }
}

/// Type-to-factory mapping for provider construction.
#[derive(Default)]
pub struct PluginRegistry {
    by_type: HashMap<String, PluginDefinition>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the four built-in plugins pre-registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for plugin in builtin_plugins() {
            // Builtins carry no hooks, so registration cannot fail.
            registry
                .register(plugin, false)
                .expect("built-in plugin registration");
        }
        registry
    }

    /// Register a plugin. Duplicates are rejected unless `overwrite`; a
    /// failing `on_register` hook rolls the registration back.
    pub fn register(&mut self, plugin: PluginDefinition, overwrite: bool) -> Result<(), SearchError> {
        let type_name = plugin.type_name.clone();
        if self.by_type.contains_key(&type_name) && !overwrite {
            return Err(SearchError::Configuration(format!(
                "plugin type '{type_name}' is already registered"
            )));
        }

        let hook = plugin.on_register.clone();
        let displaced = self.by_type.insert(type_name.clone(), plugin);

        if let Some(hook) = hook {
            if let Err(error) = hook() {
                match displaced {
                    Some(previous) => {
                        self.by_type.insert(type_name, previous);
                    }
                    None => {
                        self.by_type.remove(&type_name);
                    }
                }
                return Err(error);
            }
        }
        Ok(())
    }

    /// Remove a plugin, running its `on_unregister` hook. Hook failures
    /// are logged; the plugin is removed regardless.
    pub fn unregister(&mut self, type_name: &str) -> Option<PluginDefinition> {
        let plugin = self.by_type.remove(type_name)?;
        if let Some(hook) = &plugin.on_unregister {
            if let Err(error) = hook() {
                warn!(plugin = type_name, "on_unregister hook failed: {error}");
            }
        }
        Some(plugin)
    }

    pub fn get(&self, type_name: &str) -> Option<&PluginDefinition> {
        self.by_type.get(type_name)
    }

    pub fn types(&self) -> Vec<&str> {
        self.by_type.keys().map(String::as_str).collect()
    }

    /// Build a provider for `config` by looking up its type.
    pub fn create_provider(
        &self,
        config: &EngineConfig,
        deps: &PluginDeps,
    ) -> Result<Arc<dyn SearchProvider>, SearchError> {
        let plugin = self.by_type.get(&config.engine_type).ok_or_else(|| {
            SearchError::Configuration(format!(
                "unknown engine type '{}' for engine '{}'",
                config.engine_type, config.id
            ))
        })?;
        (plugin.factory)(config, deps)
    }
}

fn builtin_plugins() -> Vec<PluginDefinition> {
    vec![
        PluginDefinition::new(
            "tavily",
            "Tavily",
            false,
            Arc::new(|config, deps| {
                TavilyProvider::from_config(config, deps)
                    .map(|p| Arc::new(p) as Arc<dyn SearchProvider>)
            }),
        ),
        PluginDefinition::new(
            "brave",
            "Brave Search",
            false,
            Arc::new(|config, deps| {
                BraveProvider::from_config(config, deps)
                    .map(|p| Arc::new(p) as Arc<dyn SearchProvider>)
            }),
        ),
        PluginDefinition::new(
            "linkup",
            "Linkup",
            true,
            Arc::new(|config, deps| {
                LinkupProvider::from_config(config, deps)
                    .map(|p| Arc::new(p) as Arc<dyn SearchProvider>)
            }),
        ),
        PluginDefinition::new(
            "searxng",
            "SearXNG",
            true,
            Arc::new(|config, deps| {
                SearxngProvider::from_config(config, deps)
                    .map(|p| Arc::new(p) as Arc<dyn SearchProvider>)
            }),
        ),
    ]
}

static GLOBAL: OnceLock<Mutex<PluginRegistry>> = OnceLock::new();

/// Process-wide plugin registry, initialized with the builtins.
///
/// Prefer constructing a [`PluginRegistry`] and passing it to bootstrap;
/// this accessor exists for callers that want one shared set of plugins.
pub fn global_plugins() -> &'static Mutex<PluginRegistry> {
    GLOBAL.get_or_init(|| Mutex::new(PluginRegistry::with_builtins()))
}
