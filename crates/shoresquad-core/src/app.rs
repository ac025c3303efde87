use anyhow::{Context, Result};
use std::sync::Arc;

use crate::{Config, ConfigError};

/// Application context and lifecycle manager.
///
/// Holds the configuration every subsystem is built from. There is no
/// module-level state: construct an `App`, `initialize` it, hand out
/// [`App::shared_config`] to whoever needs settings, and `shutdown` when done.
pub struct App {
    config: Arc<Config>,
    initialized: bool,
}

impl App {
    /// Create an application from the on-disk configuration
    pub fn load() -> Result<Self> {
        let config = Config::load()?;
        Ok(Self::new(config))
    }

    /// Create an application around an already loaded configuration
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            initialized: false,
        }
    }

    /// Validate settings and prepare the storage directory
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            tracing::debug!("Application already initialized");
            return Ok(());
        }

        let result = self.config.validate();
        for warning in &result.warnings {
            tracing::warn!("Config warning: {}", warning);
        }
        if !result.is_valid() {
            return Err(ConfigError::Invalid(result.error_summary()).into());
        }

        std::fs::create_dir_all(&self.config.config_dir).with_context(|| {
            format!(
                "Failed to create data directory {}",
                self.config.config_dir.display()
            )
        })?;

        self.initialized = true;
        tracing::info!(
            cache_version = %self.config.offline.cache_version,
            "Application initialized successfully"
        );
        Ok(())
    }

    /// Shutdown the application
    pub fn shutdown(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        tracing::info!("Shutting down application");
        self.initialized = false;
        Ok(())
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the config
    pub fn shared_config(&self) -> Arc<Config> {
        self.config.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
