use std::fs;
use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use streampad_core::FileStore;
use thiserror::Error;
use url::Url;

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "streampad";
const APPLICATION: &str = "streampad";
const CONFIG_FILE_NAME: &str = "server.toml";

pub const DEFAULT_PORT: u16 = 8787;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid public url '{url}': {source}")]
    PublicUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Directory of the file store (default: per-user data directory)
    pub data_dir: Option<PathBuf>,
    pub storage: StorageKind,
    /// Base URL handed to phones joining a relay session
    pub public_url: Option<String>,
    /// Publish changes made to the data directory by other processes
    pub watch: bool,
    /// Log filter used when `RUST_LOG` is not set
    pub log: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            data_dir: None,
            storage: StorageKind::default(),
            public_url: None,
            watch: true,
            log: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load the config file.
    ///
    /// An explicitly named file must exist. The default file is optional and
    /// its absence yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) => match Self::read(&path) {
                    Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                        Ok(Self::default())
                    }
                    other => other,
                },
                None => Ok(Self::default()),
            },
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(FileStore::default_dir)
            .unwrap_or_else(|| PathBuf::from(".streampad"))
    }

    /// Public base URL, falling back to the listen address.
    pub fn public_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}/", self.listen));
        Url::parse(&raw).map_err(|source| ConfigError::PublicUrl { url: raw, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(ServerConfig::parse("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = ServerConfig::parse(
            r#"
            listen = "0.0.0.0:9000"
            data_dir = "/srv/streampad"
            storage = "memory"
            public_url = "https://pad.example.com/"
            watch = false
            log = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.data_dir(), PathBuf::from("/srv/streampad"));
        assert_eq!(config.storage, StorageKind::Memory);
        assert!(!config.watch);
        assert_eq!(config.public_url().unwrap().as_str(), "https://pad.example.com/");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(ServerConfig::parse("listen_addr = \"x\"").is_err());
    }

    #[test]
    fn test_public_url_defaults_to_listen_address() {
        let config = ServerConfig::default();
        assert_eq!(config.public_url().unwrap().as_str(), "http://127.0.0.1:8787/");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
