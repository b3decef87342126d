//! Configuration parsing and validation
//!
//! # Configuration Files
//!
//! - `uiforge.yaml` - Project root configuration
//! - the design-system file named by `design_system` (YAML or JSON)
//!
//! `UIFORGE_BACKEND` overrides `pipeline.backend` at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::design::DesignSystemContract;
use crate::error::{Error, Result};

/// Environment variable overriding the generator backend
pub const BACKEND_ENV: &str = "UIFORGE_BACKEND";

/// Root project configuration from `uiforge.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Project name
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,

    /// Design-system file, relative to the project root. Absent means the
    /// built-in contract.
    #[serde(default)]
    pub design_system: Option<PathBuf>,

    /// Remote provider settings
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Pipeline settings
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Remote provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Model identifier passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Hard timeout per call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on any retry delay, in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Randomize retry delays
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: true,
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

fn default_true() -> bool {
    true
}

/// Which generator produces source for a ComponentSpec
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Deterministic template emitter
    #[default]
    Template,
    /// Provider-backed generation
    Provider,
}

impl std::str::FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "template" => Ok(Backend::Template),
            "provider" => Ok(Backend::Provider),
            other => Err(Error::ConfigInvalid {
                message: format!("unknown backend '{}' (expected template or provider)", other),
            }),
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Generator backend
    #[serde(default)]
    pub backend: Backend,

    /// Corrective re-generations after a syntax or token defect
    #[serde(default = "default_one")]
    pub corrective_retries: u32,

    /// Corrective re-parses after a schema violation
    #[serde(default = "default_one")]
    pub schema_retries: u32,

    /// Units generated concurrently within one dependency wave
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            corrective_retries: default_one(),
            schema_retries: default_one(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_one() -> u32 {
    1
}

fn default_max_concurrency() -> usize {
    4
}

impl ForgeConfig {
    /// A configuration with every setting at its default
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            design_system: None,
            provider: ProviderSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }

    /// Apply overrides from a variable lookup (normally the process environment)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(backend) = lookup(BACKEND_ENV) {
            self.pipeline.backend = backend.parse()?;
        }
        Ok(())
    }

    /// Reject settings no pipeline can run with
    pub fn validate(&self) -> Result<()> {
        if self.provider.max_attempts == 0 {
            return Err(Error::ConfigInvalid {
                message: "provider.max_attempts must be at least 1".into(),
            });
        }
        if self.provider.timeout_secs == 0 {
            return Err(Error::ConfigInvalid {
                message: "provider.timeout_secs must be at least 1".into(),
            });
        }
        if self.pipeline.max_concurrency == 0 {
            return Err(Error::ConfigInvalid {
                message: "pipeline.max_concurrency must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ForgeConfig,

    /// Base path of the project
    pub base_path: PathBuf,
}

impl Config {
    /// Load configuration from a directory
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the project directory or uiforge.yaml file
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load("./my-app")?;
    /// println!("Project: {}", config.project.name);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (config_path, base_path) = if path.is_dir() {
            (path.join("uiforge.yaml"), path.to_path_buf())
        } else {
            (
                path.to_path_buf(),
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            )
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let mut project: ForgeConfig = serde_yaml::from_str(&contents)?;
        project.apply_overrides(|key| std::env::var(key).ok())?;
        project.validate()?;

        Ok(Self { project, base_path })
    }

    /// Configuration for a directory without a `uiforge.yaml`
    pub fn defaults(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        let name = base_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string());
        Self {
            project: ForgeConfig::named(name),
            base_path,
        }
    }

    /// Build the design-system contract for this project, once per run
    pub fn load_contract(&self) -> Result<Arc<DesignSystemContract>> {
        let contract = match &self.project.design_system {
            Some(relative) => DesignSystemContract::load(self.base_path.join(relative))?,
            None => DesignSystemContract::builtin(),
        };
        tracing::debug!(
            design_system = contract.name(),
            tokens = contract.len(),
            fingerprint = contract.fingerprint().short(),
            "loaded design-system contract"
        );
        Ok(Arc::new(contract))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let config: ForgeConfig = serde_yaml::from_str("name: shop\n").unwrap();
        assert_eq!(config.version, "0.1.0");
        assert_eq!(config.pipeline.backend, Backend::Template);
        assert_eq!(config.pipeline.corrective_retries, 1);
        assert_eq!(config.provider.max_attempts, 3);
        assert_eq!(config.provider.timeout_secs, 60);
        assert!(config.design_system.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
name: shop
version: 2.0.0
design_system: tokens.yaml
provider:
  model: test-model
  timeout_secs: 5
  max_attempts: 2
  jitter: false
pipeline:
  backend: provider
  corrective_retries: 2
  max_concurrency: 8
"#;
        let config: ForgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider.model, "test-model");
        assert_eq!(config.provider.initial_backoff_ms, 500);
        assert!(!config.provider.jitter);
        assert_eq!(config.pipeline.backend, Backend::Provider);
        assert_eq!(config.pipeline.max_concurrency, 8);
        assert_eq!(config.pipeline.schema_retries, 1);
    }

    #[test]
    fn test_backend_override() {
        let mut config = ForgeConfig::named("shop");
        config
            .apply_overrides(|key| (key == BACKEND_ENV).then(|| "Provider".to_string()))
            .unwrap();
        assert_eq!(config.pipeline.backend, Backend::Provider);

        let err = config
            .apply_overrides(|_| Some("handwritten".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = ForgeConfig::named("shop");
        config.provider.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_dir_with_custom_design_system() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("uiforge.yaml"),
            "name: shop\ndesign_system: tokens.yaml\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("tokens.yaml"),
            "name: tiny\ncolors:\n  ink: \"#111111\"\nspacing:\n  sm: 4px\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.project.name, "shop");
        let contract = config.load_contract().unwrap();
        assert_eq!(contract.name(), "tiny");
        assert_eq!(contract.len(), 2);
    }

    #[test]
    fn test_load_missing_config() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_defaults_use_builtin_contract() {
        let config = Config::defaults("/tmp/my-app");
        assert_eq!(config.project.name, "my-app");
        let contract = config.load_contract().unwrap();
        assert!(contract.get("color-danger-default").is_some());
    }
}
