use std::sync::Arc;

use sizequote_agent::runtime::QuoteRuntime;
use sizequote_core::config::{AppConfig, ConfigError, LoadOptions};
use sizequote_core::errors::ApplicationError;
use sizequote_core::pricing::store::{PriceTableError, PriceTableStore};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<PriceTableStore>,
    pub runtime: Arc<QuoteRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("price table loading failed: {0}")]
    PriceTables(#[from] PriceTableError),
    #[error("runtime initialization failed: {0}")]
    Runtime(#[from] ApplicationError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    bootstrap_with_config(AppConfig::load(options)?)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let store = Arc::new(PriceTableStore::load_dir(&config.price_tables.directory)?);
    info!(
        event_name = "system.bootstrap.price_tables_loaded",
        correlation_id = "bootstrap",
        tables = store.len(),
        directory = %config.price_tables.directory.display(),
        "price tables loaded"
    );

    let runtime = Arc::new(QuoteRuntime::from_config(&config, store.clone())?);
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        origin = %config.distance.origin,
        "quote runtime initialized"
    );

    Ok(Application { config, store, runtime })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use sizequote_core::config::{ConfigOverrides, LoadOptions};
    use tempfile::TempDir;

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn options(tables_dir: &Path) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                price_tables_directory: Some(tables_dir.to_path_buf()),
                llm_api_key: Some("sk-test".to_string()),
                distance_api_key: Some("maps-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn bootstrap_loads_tables_and_builds_runtime() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("screen.csv"), ";3000;4000\n2500;7000;8000\n")
            .expect("write table");

        let app = bootstrap(options(dir.path())).expect("bootstrap should succeed");

        assert_eq!(app.store.len(), 1);
        assert_eq!(app.runtime.store().len(), 1);
    }

    #[test]
    fn bootstrap_fails_fast_without_price_tables() {
        let dir = TempDir::new().expect("temp dir");

        let result = bootstrap(options(&dir.path().join("ceniky")));

        assert!(matches!(result, Err(BootstrapError::PriceTables(_))));
    }

    #[test]
    fn bootstrap_rejects_unknown_config_file() {
        let dir = TempDir::new().expect("temp dir");
        let mut options = options(dir.path());
        options.config_path = Some(dir.path().join("missing.toml"));
        options.require_file = true;

        let result = bootstrap(options);

        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }
}
