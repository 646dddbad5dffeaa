use crate::core::{Result, WhisperError};
use crate::safety::SafetyPolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration structure parsed from a TOML file.
///
/// Every section and field is optional; missing values take their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionDefaults,
    pub query: QueryConfig,
    pub safety: SafetyConfig,
    pub translator: TranslatorConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
    pub ui: UiConfig,
}

/// Values pre-filled in the credential prompt. The password is never read
/// from configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConnectionDefaults {
    pub host: String,
    pub database: String,
    pub user: Option<String>,
}

impl Default for ConnectionDefaults {
    fn default() -> Self {
        ConnectionDefaults {
            host: ".".to_string(),
            database: "school.db".to_string(),
            user: None,
        }
    }
}

/// Query execution settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Seconds before a running statement is interrupted; 0 disables the limit.
    pub timeout_secs: u64,
    /// Run translated SQL immediately instead of waiting for `:run`.
    pub auto_run: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            timeout_secs: 30,
            auto_run: false,
        }
    }
}

impl QueryConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub policy: SafetyPolicy,
}

/// Translation rules layered over the built-in table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub rules: Vec<RuleConfig>,
    /// Use only the configured rules.
    pub replace_defaults: bool,
    pub fallback: Option<String>,
}

/// One `[[translator.rules]]` entry.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub all: Vec<String>,
    pub any: Vec<String>,
    pub pattern: Option<String>,
    pub sql: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig { max_entries: 100 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "warn".to_string(),
        }
    }
}

/// UI-related configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Rows printed per result; the rest are summarized.
    pub max_rows: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig { max_rows: 50 }
    }
}

impl Config {
    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| WhisperError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.ui.max_rows == 0 {
            return Err(WhisperError::Config("ui.max_rows must be at least 1".to_string()));
        }
        if self.history.max_entries == 0 {
            return Err(WhisperError::Config(
                "history.max_entries must be at least 1".to_string(),
            ));
        }
        self.logging.level()?;
        // Building the translator checks rules, patterns and the fallback.
        crate::translator::QueryTranslator::from_config(&self.translator)?;
        Ok(())
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<tracing::Level> {
        self.level.parse().map_err(|_| {
            WhisperError::Config(format!("unknown logging level '{}'", self.level))
        })
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = datawhisper::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        WhisperError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    Config::from_toml(&content)
}

/// `<config dir>/datawhisper/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("datawhisper").join("config.toml"))
}

/// Loads the explicit path if given, else the default file if it exists,
/// else the built-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => match default_config_path() {
            Some(path) if path.is_file() => load_config(path),
            _ => Ok(Config::default()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
[connection]
host = "/var/lib/school"
database = "grades.db"
user = "registrar"

[query]
timeout_secs = 5
auto_run = true

[safety]
policy = "keyword"

[translator]
fallback = "SELECT name FROM students;"

[[translator.rules]]
all = ["top", "students"]
sql = "SELECT * FROM students ORDER BY marks DESC LIMIT 3;"

[[translator.rules]]
pattern = "\\byoung(er|est)?\\b"
sql = "SELECT * FROM students ORDER BY age;"

[history]
max_entries = 10

[logging]
level = "debug"

[ui]
max_rows = 20
"#;

    #[test]
    fn test_load_config_from_str() {
        let config = Config::from_toml(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.connection.host, "/var/lib/school");
        assert_eq!(config.connection.database, "grades.db");
        assert_eq!(config.connection.user.as_deref(), Some("registrar"));
        assert_eq!(config.query.timeout(), Some(Duration::from_secs(5)));
        assert!(config.query.auto_run);
        assert_eq!(config.safety.policy, SafetyPolicy::Keyword);
        assert_eq!(config.translator.rules.len(), 2);
        assert_eq!(config.translator.rules[0].all, vec!["top", "students"]);
        assert!(config.translator.rules[1].pattern.is_some());
        assert_eq!(config.history.max_entries, 10);
        assert_eq!(config.logging.level().unwrap(), tracing::Level::DEBUG);
        assert_eq!(config.ui.max_rows, 20);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.connection.host, ".");
        assert_eq!(config.connection.database, "school.db");
        assert_eq!(config.query.timeout(), Some(Duration::from_secs(30)));
        assert!(!config.query.auto_run);
        assert_eq!(config.safety.policy, SafetyPolicy::Parser);
        assert!(config.translator.rules.is_empty());
        assert_eq!(config.logging.level().unwrap(), tracing::Level::WARN);
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let config = Config::from_toml("[query]\ntimeout_secs = 0\n").unwrap();
        assert_eq!(config.query.timeout(), None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for content in [
            "[ui]\nmax_rows = 0\n",
            "[logging]\nlevel = \"chatty\"\n",
            "[safety]\npolicy = \"trusting\"\n",
            "[translator]\nfallback = \"\"\n",
            "[[translator.rules]]\nsql = \"SELECT 1;\"\n",
            "[query]\ntimeout_secs = \"soon\"\n",
        ] {
            match Config::from_toml(content) {
                Err(WhisperError::Config(_)) => {}
                other => panic!("{:?} should be rejected, got {:?}", content, other),
            }
        }
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE_CONFIG).unwrap();

        let config = resolve_config(Some(&path)).unwrap();
        assert_eq!(config.ui.max_rows, 20);

        let missing = load_config(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(WhisperError::Config(_))));
    }
}
