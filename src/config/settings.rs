use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PawError, Result};
use crate::pool::default_max_workers;
use crate::store::RetryPolicy;

/// Project-level configuration, loaded from `.pawkv.toml`.
///
/// Every field has a sensible default so pawkv works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Which vault to open when none is specified.
    #[serde(default = "default_vault")]
    pub default_vault: String,

    /// Directory (relative to project root) holding the local store and
    /// index snapshots.
    #[serde(default = "default_store_dir")]
    pub store_dir: String,

    /// Concurrency ceiling for bulk jobs. Unset means one worker per
    /// available CPU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Timeout for a single remote call, in seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Retries for a transient remote failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on the backoff between retries, in seconds.
    #[serde(default = "default_max_retry_delay_secs")]
    pub max_retry_delay_secs: u64,

    /// Breach corpus (`SHA256-HEX:COUNT` lines) used by `audit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breach_corpus: Option<PathBuf>,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault() -> String {
    "default".to_string()
}

fn default_store_dir() -> String {
    ".pawkv".to_string()
}

fn default_call_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_retry_delay_secs() -> u64 {
    5
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_vault: default_vault(),
            store_dir: default_store_dir(),
            max_workers: None,
            call_timeout_secs: default_call_timeout_secs(),
            max_retries: default_max_retries(),
            max_retry_delay_secs: default_max_retry_delay_secs(),
            breach_corpus: None,
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = ".pawkv.toml";

    /// Load settings from `<project_dir>/.pawkv.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            PawError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        if settings.call_timeout_secs == 0 {
            return Err(PawError::ConfigError(format!(
                "{}: call_timeout_secs must be at least 1",
                config_path.display()
            )));
        }

        Ok(settings)
    }

    /// Directory holding the local store documents and index snapshots.
    ///
    /// Example: `project_dir/.pawkv`
    pub fn store_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.store_dir)
    }

    /// Path of a vault's index snapshot.
    ///
    /// Example: `project_dir/.pawkv/default.index.json`
    pub fn index_path(&self, project_dir: &Path, vault: &str) -> PathBuf {
        self.store_path(project_dir)
            .join(format!("{vault}.index.json"))
    }

    /// Worker ceiling, falling back to available parallelism.
    pub fn workers(&self) -> usize {
        self.max_workers.unwrap_or_else(default_max_workers)
    }

    /// Convert the timeout settings into a store retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            try_timeout: Duration::from_secs(self.call_timeout_secs),
            max_retries: self.max_retries,
            max_retry_delay: Duration::from_secs(self.max_retry_delay_secs),
            ..RetryPolicy::default()
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.default_vault, "default");
        assert_eq!(s.store_dir, ".pawkv");
        assert_eq!(s.max_workers, None);
        assert!(s.workers() >= 1);
        assert_eq!(s.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.default_vault, "default");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
default_vault = "team"
store_dir = "secrets"
max_workers = 3
call_timeout_secs = 4
max_retries = 1
max_retry_delay_secs = 2
breach_corpus = "corpus.txt"
"#;
        fs::write(tmp.path().join(".pawkv.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.default_vault, "team");
        assert_eq!(settings.store_dir, "secrets");
        assert_eq!(settings.workers(), 3);
        assert_eq!(settings.breach_corpus, Some(PathBuf::from("corpus.txt")));

        let policy = settings.retry_policy();
        assert_eq!(policy.try_timeout, Duration::from_secs(4));
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.max_retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".pawkv.toml"), "default_vault = \"prod\"\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.default_vault, "prod");
        // Rest should be defaults
        assert_eq!(settings.store_dir, ".pawkv");
        assert_eq!(settings.call_timeout_secs, 15);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".pawkv.toml"), "not valid {{toml").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn load_rejects_zero_timeout() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".pawkv.toml"), "call_timeout_secs = 0\n").unwrap();
        assert!(matches!(
            Settings::load(tmp.path()),
            Err(PawError::ConfigError(_))
        ));
    }

    #[test]
    fn paths_respect_custom_store_dir() {
        let s = Settings {
            store_dir: "secrets".to_string(),
            ..Settings::default()
        };
        let project = Path::new("/home/user/myproject");
        assert_eq!(
            s.index_path(project, "team"),
            PathBuf::from("/home/user/myproject/secrets/team.index.json")
        );
    }
}
