//! Configuration for citeval.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CITEVAL_HOME, CITEVAL_REFERENCE_DB,
//!    CITEVAL_ERROR_DB, CITEVAL_CORPUS)
//! 2. Config file (.citeval/config.yaml)
//! 3. Defaults (~/.citeval)
//!
//! Config file discovery:
//! - Searches current directory and parents for .citeval/config.yaml
//! - `paths.home` is relative to the .citeval/ directory, every other path
//!   is relative to the project root (the parent of .citeval/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::ValidatorConfig;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const CONFIG_DIR: &str = ".citeval";
pub const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub sampling: Option<SamplingConfig>,
    #[serde(default)]
    pub validation: Option<ValidationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .citeval/)
    pub home: Option<String>,
    /// Read-only place reference database
    pub reference_db: Option<String>,
    /// Error record database
    pub error_db: Option<String>,
    /// JSONL corpus root
    pub corpus: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    pub sample_size: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    pub max_concurrency: Option<usize>,
    pub insert_batch_size: Option<usize>,
    pub lock_timeout_seconds: Option<u64>,
    pub check_document_year: Option<bool>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub home: PathBuf,
    pub reference_db: PathBuf,
    pub error_db: PathBuf,
    pub corpus: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub sampling: SamplingSettings,
    pub validation: ValidationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingSettings {
    pub sample_size: usize,
    pub seed: u64,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            sample_size: 1000,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSettings {
    pub max_concurrency: usize,
    pub insert_batch_size: usize,
    pub lock_timeout_seconds: u64,
    pub check_document_year: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            insert_batch_size: 100,
            lock_timeout_seconds: 10,
            check_document_year: true,
        }
    }
}

impl ValidationSettings {
    fn from_file(config: Option<&ValidationConfig>) -> Self {
        let defaults = Self::default();
        let Some(config) = config else {
            return defaults;
        };
        Self {
            max_concurrency: config.max_concurrency.unwrap_or(defaults.max_concurrency),
            insert_batch_size: config
                .insert_batch_size
                .unwrap_or(defaults.insert_batch_size),
            lock_timeout_seconds: config
                .lock_timeout_seconds
                .unwrap_or(defaults.lock_timeout_seconds),
            check_document_year: config
                .check_document_year
                .unwrap_or(defaults.check_document_year),
        }
    }

    /// Validator tunables for these settings
    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            max_concurrency: self.max_concurrency,
            insert_batch_size: self.insert_batch_size,
            lock_timeout: Duration::from_secs(self.lock_timeout_seconds),
            check_document_year: self.check_document_year,
        }
    }
}

impl SamplingSettings {
    fn from_file(config: Option<&SamplingConfig>) -> Self {
        let defaults = Self::default();
        match config {
            Some(config) => Self {
                sample_size: config.sample_size.unwrap_or(defaults.sample_size),
                seed: config.seed.unwrap_or(defaults.seed),
            },
            None => defaults,
        }
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file_from(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

fn find_config_file() -> Option<PathBuf> {
    find_config_file_from(&std::env::current_dir().ok()?)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Environment variable, then config value, then fallback
fn pick_path(env_key: &str, configured: Option<&str>, base: &Path, fallback: PathBuf) -> PathBuf {
    if let Ok(value) = std::env::var(env_key) {
        PathBuf::from(value)
    } else if let Some(path) = configured {
        resolve_path(base, path)
    } else {
        fallback
    }
}

/// Resolve a parsed config file (or none) into absolute settings
fn resolve(config_path: Option<PathBuf>, default_home: PathBuf) -> Result<ResolvedConfig> {
    let file = match &config_path {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };

    // .citeval/ and the project root above it
    let citeval_dir = config_path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let base_dir = citeval_dir.parent().unwrap_or(Path::new("."));

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    let home = pick_path("CITEVAL_HOME", paths.home.as_deref(), citeval_dir, default_home);
    let reference_db = pick_path(
        "CITEVAL_REFERENCE_DB",
        paths.reference_db.as_deref(),
        base_dir,
        home.join("reference.db"),
    );
    let error_db = pick_path(
        "CITEVAL_ERROR_DB",
        paths.error_db.as_deref(),
        base_dir,
        home.join("errors.db"),
    );
    let corpus = pick_path(
        "CITEVAL_CORPUS",
        paths.corpus.as_deref(),
        base_dir,
        home.join("corpus"),
    );

    Ok(ResolvedConfig {
        home,
        reference_db,
        error_db,
        corpus,
        config_file: config_path,
        sampling: SamplingSettings::from_file(file.as_ref().and_then(|f| f.sampling.as_ref())),
        validation: ValidationSettings::from_file(
            file.as_ref().and_then(|f| f.validation.as_ref()),
        ),
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    resolve(find_config_file(), default_home)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(root: &Path, body: &str) -> PathBuf {
        let dir = root.join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let home = PathBuf::from("/tmp/citeval-home");
        let config = resolve(None, home.clone()).unwrap();

        // Env overrides are process-wide; only check what they cannot touch
        if std::env::var("CITEVAL_HOME").is_err() {
            assert_eq!(config.home, home);
        }
        assert!(config.config_file.is_none());
        assert_eq!(config.sampling, SamplingSettings::default());
        assert_eq!(config.validation, ValidationSettings::default());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
version: "1.0"
paths:
  home: ./
  reference_db: data/gnis.db
  corpus: data/corpus
sampling:
  sample_size: 250
  seed: 7
validation:
  max_concurrency: 4
  check_document_year: false
"#,
        );

        let file = load_config_file(&path).unwrap();
        assert_eq!(file.version, "1.0");
        assert_eq!(file.paths.reference_db, Some("data/gnis.db".to_string()));
        assert!(file.paths.error_db.is_none());

        let sampling = SamplingSettings::from_file(file.sampling.as_ref());
        assert_eq!(sampling.sample_size, 250);
        assert_eq!(sampling.seed, 7);

        let validation = ValidationSettings::from_file(file.validation.as_ref());
        assert_eq!(validation.max_concurrency, 4);
        assert_eq!(validation.insert_batch_size, 100);
        assert!(!validation.check_document_year);
    }

    #[test]
    fn test_resolve_relative_to_project_root() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            r#"
version: "1.0"
paths:
  reference_db: data/gnis.db
"#,
        );

        let config = resolve(Some(path.clone()), PathBuf::from("/unused")).unwrap();
        assert_eq!(config.config_file, Some(path));
        if std::env::var("CITEVAL_REFERENCE_DB").is_err() {
            assert_eq!(config.reference_db, temp.path().join("data/gnis.db"));
        }
    }

    #[test]
    fn test_find_config_in_parent() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "version: \"1.0\"");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config_file_from(&nested), Some(path));
    }

    #[test]
    fn test_validator_config_conversion() {
        let settings = ValidationSettings {
            lock_timeout_seconds: 3,
            ..Default::default()
        };
        let validator = settings.validator_config();
        assert_eq!(validator.lock_timeout, Duration::from_secs(3));
        assert_eq!(validator.max_concurrency, 8);
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
