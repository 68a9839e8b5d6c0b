/// Application configuration
///
/// Loaded from `<config_dir>/notes-app/config.toml` (or the file named by
/// NOTES_APP_CONFIG), then overridden by environment variables. A missing
/// file means "all defaults": the local backend under the user's data dir.
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const CONFIG_PATH: &str = "NOTES_APP_CONFIG";
    pub const BACKEND: &str = "NOTES_APP_BACKEND";
    pub const DATA_DIR: &str = "NOTES_APP_DATA_DIR";
    pub const USERNAME: &str = "NOTES_USERNAME";
    pub const GRAPHQL_URL: &str = "NOTES_GRAPHQL_URL";
    pub const API_KEY: &str = "NOTES_API_KEY";
    pub const AUTH_TOKEN: &str = "NOTES_AUTH_TOKEN";
    pub const STORAGE_URL: &str = "NOTES_STORAGE_URL";
    pub const SIGN_OUT_URL: &str = "NOTES_SIGN_OUT_URL";
}

/// Default values
pub mod defaults {
    pub const APP_DIR: &str = "notes-app";
    pub const CONFIG_FILE: &str = "config.toml";
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("unknown backend {0:?} (expected \"local\" or \"remote\")")]
    UnknownBackend(String),
    #[error("remote backend requires {0}")]
    Missing(&'static str),
    #[error("could not determine the user data directory")]
    NoDataDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "remote" => Ok(BackendKind::Remote),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteConfig {
    pub graphql_url: String,
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
    pub storage_url: String,
    pub sign_out_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: BackendKind,
    pub data_dir: PathBuf,
    pub username: Option<String>,
    pub remote: RemoteConfig,
}

/// On-disk shape; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    backend: Option<BackendKind>,
    data_dir: Option<PathBuf>,
    username: Option<String>,
    #[serde(default)]
    remote: RemoteFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoteFile {
    graphql_url: Option<String>,
    api_key: Option<String>,
    auth_token: Option<String>,
    storage_url: Option<String>,
    sign_out_url: Option<String>,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = match env::var_os(env_vars::CONFIG_PATH) {
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::config_dir().map(|dir| dir.join(defaults::APP_DIR).join(defaults::CONFIG_FILE)),
        };

        let file = match path {
            Some(path) if path.exists() => {
                log::info!("⚙️  Loading config from {}", path.display());
                read_file(&path)?
            }
            _ => ConfigFile::default(),
        };

        Self::resolve(file, |name| env::var(name).ok().filter(|v| !v.is_empty()))
    }

    /// Parse a TOML document without consulting the environment.
    #[cfg(test)]
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file = parse(text, Path::new("<inline>"))?;
        Self::resolve(file, |_| None)
    }

    fn resolve(file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = match env(env_vars::BACKEND) {
            Some(value) => value.parse::<BackendKind>()?,
            None => file.backend.unwrap_or_default(),
        };

        let data_dir = match env(env_vars::DATA_DIR).map(PathBuf::from).or(file.data_dir) {
            Some(dir) => dir,
            None => default_data_dir()?,
        };

        let remote = RemoteConfig {
            graphql_url: env(env_vars::GRAPHQL_URL).or(file.remote.graphql_url).unwrap_or_default(),
            api_key: env(env_vars::API_KEY).or(file.remote.api_key),
            auth_token: env(env_vars::AUTH_TOKEN).or(file.remote.auth_token),
            storage_url: env(env_vars::STORAGE_URL).or(file.remote.storage_url).unwrap_or_default(),
            sign_out_url: env(env_vars::SIGN_OUT_URL).or(file.remote.sign_out_url),
        };

        if backend == BackendKind::Remote {
            if remote.graphql_url.is_empty() {
                return Err(ConfigError::Missing("graphql_url"));
            }
            if remote.storage_url.is_empty() {
                return Err(ConfigError::Missing("storage_url"));
            }
        }

        Ok(Config {
            backend,
            data_dir,
            username: env(env_vars::USERNAME).or(file.username),
            remote,
        })
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text, path)
}

fn parse(text: &str, path: &Path) -> Result<ConfigFile, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// ~/.local/share/notes-app on Linux
fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join(defaults::APP_DIR))
        .ok_or(ConfigError::NoDataDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_is_local() {
        let config = Config::from_toml("data_dir = \"/tmp/notes\"").unwrap();
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/notes"));
        assert_eq!(config.username, None);
    }

    #[test]
    fn test_remote_section() {
        let config = Config::from_toml(
            r#"
            backend = "remote"
            username = "ayman"
            data_dir = "/tmp/notes"

            [remote]
            graphql_url = "https://api.example.com/graphql"
            api_key = "da2-xyz"
            storage_url = "https://files.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, BackendKind::Remote);
        assert_eq!(config.username.as_deref(), Some("ayman"));
        assert_eq!(config.remote.api_key.as_deref(), Some("da2-xyz"));
        assert_eq!(config.remote.auth_token, None);
    }

    #[test]
    fn test_remote_requires_endpoints() {
        let result = Config::from_toml("backend = \"remote\"\ndata_dir = \"/tmp\"");
        assert!(matches!(result, Err(ConfigError::Missing("graphql_url"))));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = Config::from_toml("colour = \"red\"");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = parse("backend = \"local\"\ndata_dir = \"/from/file\"", Path::new("t")).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            (env_vars::BACKEND, "Remote"),
            (env_vars::DATA_DIR, "/from/env"),
            (env_vars::GRAPHQL_URL, "https://api.example.com/graphql"),
            (env_vars::STORAGE_URL, "https://files.example.com"),
            (env_vars::AUTH_TOKEN, "token"),
        ]);

        let config = Config::resolve(file, |name| env.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.backend, BackendKind::Remote);
        assert_eq!(config.data_dir, PathBuf::from("/from/env"));
        assert_eq!(config.remote.auth_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_unknown_backend_from_env() {
        let result = Config::resolve(ConfigFile::default(), |name| {
            (name == env_vars::BACKEND).then(|| "cloud".to_string())
        });
        assert!(matches!(result, Err(ConfigError::UnknownBackend(b)) if b == "cloud"));
    }
}
