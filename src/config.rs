//! Configuration for the lead relay.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LEADRELAY_*)
//! 2. Config file (.leadrelay/config.yaml)
//! 3. Defaults (~/.leadrelay)
//!
//! Config file discovery:
//! - Searches current directory and parents for .leadrelay/config.yaml
//! - Paths in config file are relative to the .leadrelay/ directory
//!
//! Configuration is resolved once at startup and passed down explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

pub const ENV_HOME: &str = "LEADRELAY_HOME";
pub const ENV_LOG_DIR: &str = "LEADRELAY_LOG_DIR";
pub const ENV_SHEETS_URL: &str = "LEADRELAY_SHEETS_URL";
pub const ENV_PARTNER_FORM_URL: &str = "LEADRELAY_PARTNER_FORM_URL";
pub const ENV_AFFILIATE_ID: &str = "LEADRELAY_AFFILIATE_ID";
pub const ENV_DESTINATION: &str = "LEADRELAY_DESTINATION";
pub const ENV_BIND: &str = "LEADRELAY_BIND";

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_DESTINATION: &str = "Lisboa";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub sheets: Option<SheetsConfig>,
    #[serde(default)]
    pub partner: Option<PartnerConfig>,
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .leadrelay/)
    pub home: Option<String>,
    /// Log directory (relative to .leadrelay/)
    pub log_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartnerConfig {
    pub form_url: Option<String>,
    pub affiliate_id: Option<String>,
    pub destination: Option<String>,
    pub navigation_timeout_seconds: Option<u64>,
    pub success_wait_seconds: Option<u64>,
    pub max_sessions: Option<usize>,
    pub headless: Option<bool>,
    pub chrome_executable: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Directory holding the JSONL log channels
    pub log_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub sheets: SheetsSettings,
    pub partner: PartnerSettings,
    /// Listen address for `serve`
    pub bind: String,
}

#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PartnerSettings {
    pub form_url: Option<String>,
    pub affiliate_id: String,
    pub destination: String,
    pub navigation_timeout: Duration,
    pub success_wait: Duration,
    pub max_sessions: usize,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
}

impl Default for PartnerSettings {
    fn default() -> Self {
        Self {
            form_url: None,
            affiliate_id: String::new(),
            destination: DEFAULT_DESTINATION.to_string(),
            navigation_timeout: Duration::from_secs(30),
            success_wait: Duration::from_secs(5),
            max_sessions: 2,
            headless: true,
            chrome_executable: None,
        }
    }
}

impl ResolvedConfig {
    /// Load from the environment, the discovered config file and defaults
    pub fn load() -> Result<Self> {
        let default_home = dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".leadrelay");

        load_with(find_config_file(), default_home, |key| std::env::var(key).ok())
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".leadrelay").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config directory
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

/// Resolve configuration from an optional config file and an environment
/// lookup
fn load_with<F>(config_file: Option<PathBuf>, default_home: PathBuf, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };
    let config_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();
    let sheets = file.as_ref().and_then(|f| f.sheets.clone());
    let partner = file.as_ref().and_then(|f| f.partner.clone());
    let server = file.as_ref().and_then(|f| f.server.clone());

    let home = if let Some(env_home) = env(ENV_HOME) {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = paths.home {
        resolve_path(&config_dir, home_path)
    } else {
        default_home
    };

    let log_dir = if let Some(env_logs) = env(ENV_LOG_DIR) {
        PathBuf::from(env_logs)
    } else if let Some(ref log_path) = paths.log_dir {
        resolve_path(&config_dir, log_path)
    } else {
        home.join("logs")
    };

    let sheets_defaults = SheetsSettings::default();
    let sheets = SheetsSettings {
        endpoint: env(ENV_SHEETS_URL).or_else(|| sheets.as_ref().and_then(|s| s.endpoint.clone())),
        timeout: sheets
            .as_ref()
            .and_then(|s| s.timeout_seconds)
            .map(Duration::from_secs)
            .unwrap_or(sheets_defaults.timeout),
    };

    let defaults = PartnerSettings::default();
    let partner = PartnerSettings {
        form_url: env(ENV_PARTNER_FORM_URL)
            .or_else(|| partner.as_ref().and_then(|p| p.form_url.clone())),
        affiliate_id: env(ENV_AFFILIATE_ID)
            .or_else(|| partner.as_ref().and_then(|p| p.affiliate_id.clone()))
            .unwrap_or(defaults.affiliate_id),
        destination: env(ENV_DESTINATION)
            .or_else(|| partner.as_ref().and_then(|p| p.destination.clone()))
            .unwrap_or(defaults.destination),
        navigation_timeout: partner
            .as_ref()
            .and_then(|p| p.navigation_timeout_seconds)
            .map(Duration::from_secs)
            .unwrap_or(defaults.navigation_timeout),
        success_wait: partner
            .as_ref()
            .and_then(|p| p.success_wait_seconds)
            .map(Duration::from_secs)
            .unwrap_or(defaults.success_wait),
        max_sessions: partner
            .as_ref()
            .and_then(|p| p.max_sessions)
            .unwrap_or(defaults.max_sessions)
            .max(1),
        headless: partner
            .as_ref()
            .and_then(|p| p.headless)
            .unwrap_or(defaults.headless),
        chrome_executable: partner
            .as_ref()
            .and_then(|p| p.chrome_executable.as_deref())
            .map(|p| resolve_path(&config_dir, p)),
    };

    let bind = env(ENV_BIND)
        .or_else(|| server.and_then(|s| s.bind))
        .unwrap_or_else(|| DEFAULT_BIND.to_string());

    Ok(ResolvedConfig {
        home,
        log_dir,
        config_file,
        sheets,
        partner,
        bind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(temp: &TempDir, body: &str) -> PathBuf {
        let dir = temp.path().join(".leadrelay");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_with(None, PathBuf::from("/srv/.leadrelay"), no_env).unwrap();

        assert_eq!(config.home, PathBuf::from("/srv/.leadrelay"));
        assert_eq!(config.log_dir, PathBuf::from("/srv/.leadrelay/logs"));
        assert!(config.config_file.is_none());
        assert!(config.sheets.endpoint.is_none());
        assert_eq!(config.sheets.timeout, Duration::from_secs(10));
        assert!(config.partner.form_url.is_none());
        assert_eq!(config.partner.destination, "Lisboa");
        assert_eq!(config.partner.max_sessions, 2);
        assert_eq!(config.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
version: "1.0"
paths:
  log_dir: /var/log/leadrelay
sheets:
  endpoint: https://script.example/exec
  timeout_seconds: 4
partner:
  form_url: https://partner.example/book
  affiliate_id: "AFF-42"
  success_wait_seconds: 2
  max_sessions: 0
server:
  bind: 127.0.0.1:9000
"#,
        );

        let config = load_with(Some(path.clone()), PathBuf::from("/unused"), no_env).unwrap();

        assert_eq!(config.config_file, Some(path));
        assert_eq!(config.log_dir, PathBuf::from("/var/log/leadrelay"));
        assert_eq!(config.sheets.endpoint.as_deref(), Some("https://script.example/exec"));
        assert_eq!(config.sheets.timeout, Duration::from_secs(4));
        assert_eq!(config.partner.form_url.as_deref(), Some("https://partner.example/book"));
        assert_eq!(config.partner.affiliate_id, "AFF-42");
        assert_eq!(config.partner.success_wait, Duration::from_secs(2));
        assert_eq!(config.partner.navigation_timeout, Duration::from_secs(30));
        // Zero sessions would stall every replication
        assert_eq!(config.partner.max_sessions, 1);
        assert_eq!(config.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
version: "1.0"
sheets:
  endpoint: https://from-file.example
partner:
  destination: Porto
"#,
        );

        let env: HashMap<&str, &str> = [
            (ENV_SHEETS_URL, "https://from-env.example"),
            (ENV_DESTINATION, "Faro"),
            (ENV_AFFILIATE_ID, "   "),
            (ENV_HOME, "/env/home"),
        ]
        .into_iter()
        .collect();

        let config = load_with(Some(path), PathBuf::from("/unused"), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.sheets.endpoint.as_deref(), Some("https://from-env.example"));
        assert_eq!(config.partner.destination, "Faro");
        // Blank env values are ignored
        assert_eq!(config.partner.affiliate_id, "");
        assert_eq!(config.log_dir, PathBuf::from("/env/home/logs"));
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = write_config(&temp, "version: [unterminated");
        assert!(load_with(Some(path), PathBuf::from("/unused"), no_env).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project/.leadrelay");

        assert_eq!(
            resolve_path(&base, "../logs"),
            PathBuf::from("/home/user/project/.leadrelay/../logs")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
