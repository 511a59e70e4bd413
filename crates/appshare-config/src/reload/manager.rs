//! Load once, then keep a `watch` channel fed with every valid revision.

use crate::env::apply_env_overrides;
use crate::schema::AppShareConfig;
use crate::toml_loader;
use crate::watcher::ConfigWatcher;
use appshare_common::ConfigError;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

/// Publishes config revisions as the file changes on disk.
///
/// A revision that fails to parse or validate is logged and skipped; the
/// last good config stays current.
pub struct ReloadManager {
    config_path: PathBuf,
}

impl ReloadManager {
    /// Load the initial config from `config_path` and start watching it.
    ///
    /// A missing file is created from the template. If the initial load
    /// fails the built-in defaults (plus environment overrides) are used.
    pub async fn start(config_path: PathBuf) -> (AppShareConfig, watch::Receiver<AppShareConfig>) {
        let initial = match Self::load_initial(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %config_path.display(), "failed to load config: {e}, using defaults");
                let mut config = AppShareConfig::default();
                apply_env_overrides(&mut config, |key| std::env::var(key).ok());
                config
            }
        };

        let (config_tx, config_rx) = watch::channel(initial.clone());
        let manager = ReloadManager { config_path };
        tokio::spawn(async move { manager.run(config_tx).await });

        (initial, config_rx)
    }

    fn load_initial(path: &Path) -> Result<AppShareConfig, ConfigError> {
        match toml_loader::load_from_path(path) {
            Err(ConfigError::FileNotFound(_)) => {
                toml_loader::create_default_config(path)?;
                toml_loader::load_from_path(path)
            }
            other => other,
        }
    }

    async fn run(self, config_tx: watch::Sender<AppShareConfig>) {
        let watcher = match ConfigWatcher::new(self.config_path.clone()) {
            Ok(w) => w,
            Err(e) => {
                error!("failed to create config watcher: {e}");
                return;
            }
        };

        let (change_tx, mut change_rx) = broadcast::channel::<()>(16);
        tokio::spawn(async move {
            if let Err(e) = watcher.watch(change_tx).await {
                error!("config watcher error: {e}");
            }
        });

        loop {
            match change_rx.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                    match toml_loader::load_from_path(&self.config_path) {
                        Ok(config) => {
                            info!(path = %self.config_path.display(), "config reloaded");
                            if config_tx.send(config).is_err() {
                                info!("all config receivers dropped, stopping reload manager");
                                break;
                            }
                        }
                        Err(e) => warn!("config reload rejected, keeping previous: {e}"),
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("config watcher channel closed");
                    break;
                }
            }
        }
    }
}
