//! CLI command implementations

pub mod build;
pub mod check;
pub mod feedback;
pub mod history;
pub mod tokens;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use uiforge_core::provider::ScriptedProvider;
use uiforge_core::{Config, Provider};
use tokio_util::sync::CancellationToken;
use uiforge_runtime::{Pipeline, ProjectState};

use crate::provider::{API_KEY_ENV, AnthropicProvider};

/// Load `uiforge.yaml`, falling back to defaults when the project has none
pub fn load_config(path: &Path) -> Result<Config> {
    let has_file = if path.is_dir() {
        path.join("uiforge.yaml").exists()
    } else {
        path.exists()
    };
    if has_file {
        return Config::load(path).context("Failed to load configuration");
    }

    let base = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(Path::new("."))
    };
    let mut config = Config::defaults(base);
    config
        .project
        .apply_overrides(|key| std::env::var(key).ok())
        .context("Invalid environment override")?;
    tracing::debug!(base = %base.display(), "no uiforge.yaml found, using defaults");
    Ok(config)
}

/// Assemble a pipeline over a replay fixture or the remote API
pub fn pipeline(config: &Config, replay: Option<&Path>) -> Result<Pipeline> {
    let provider: Arc<dyn Provider> = match replay {
        Some(fixture) => Arc::new(
            ScriptedProvider::from_fixture(fixture)
                .with_context(|| format!("Failed to load replay fixture {}", fixture.display()))?,
        ),
        None => {
            let api_key = std::env::var(API_KEY_ENV)
                .with_context(|| format!("{} is not set (or pass --replay)", API_KEY_ENV))?;
            Arc::new(AnthropicProvider::new(
                api_key,
                config.project.provider.model.clone(),
                Duration::from_secs(config.project.provider.timeout_secs),
            )?)
        }
    };
    Pipeline::from_config(config, provider).context("Failed to assemble pipeline")
}

/// Token cancelled on the first Ctrl+C
pub fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling in-flight work");
            trigger.cancel();
        }
    });
    token
}

/// Write every component's source files into `dir`
pub fn emit_units(state: &ProjectState, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for unit in state.units().values() {
        std::fs::write(dir.join(unit.tsx_file()), &unit.tsx)?;
        std::fs::write(dir.join(unit.css_file()), &unit.css)?;
    }
    tracing::info!(components = state.len(), dir = %dir.display(), "wrote component sources");
    Ok(())
}
