//! Client configuration
//!
//! Configuration is explicit: callers build a [`ClientConfig`] and
//! [`Credentials`] and pass them into constructors. Nothing here is
//! process-wide state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::dial::TcpDialer;
use crate::error::{Error, Result};

/// Default attribute-store endpoint
pub const DEFAULT_ENDPOINT: &str = "http://sdb.amazonaws.com/";

/// Access-key / secret-key pair
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Source credentials from the conventional environment variables
    pub fn from_env() -> Result<Self> {
        let access_key = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| Error::Config("AWS_ACCESS_KEY_ID is not set".into()))?;
        let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| Error::Config("AWS_SECRET_ACCESS_KEY is not set".into()))?;
        Ok(Self {
            access_key,
            secret_key,
        })
    }
}

/// Connection configuration for one service endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint URL, e.g. `http://sdb.amazonaws.com/`
    pub endpoint: String,

    /// Bound on connection establishment, in milliseconds
    pub connect_timeout_ms: u64,

    /// Per-read time budget; `None` means unbounded
    pub read_timeout_ms: Option<u64>,

    /// Per-write time budget; `None` means unbounded
    pub write_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout_ms: 10_000,
            read_timeout_ms: None,
            write_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Default configuration file location (`<config dir>/sdc/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sdc").join("config.toml"))
    }

    /// The endpoint as a parsed URL
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint {:?}: {e}", self.endpoint)))
    }

    /// Build a TCP dialer for the configured endpoint
    pub fn dialer(&self) -> Result<TcpDialer> {
        let url = self.endpoint_url()?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::Config(format!("endpoint {:?} has no host", self.endpoint)))?;
        let port = url.port_or_known_default().unwrap_or(80);
        Ok(TcpDialer::new(
            host,
            port,
            Duration::from_millis(self.connect_timeout_ms),
        ))
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.connect_timeout_ms, 10_000);
        assert!(config.read_timeout().is_none());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "endpoint = \"http://localhost:8080/\"\nread_timeout_ms = 30000"
        )
        .unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.endpoint, "http://localhost:8080/");
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(30)));
        // Unset fields fall back to defaults
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_credentials_from_env() {
        // One test owns both cases so nothing races on the process-global
        // environment
        unsafe {
            std::env::set_var("AWS_ACCESS_KEY_ID", "AKID");
            std::env::set_var("AWS_SECRET_ACCESS_KEY", "sekrit");
        }
        let creds = Credentials::from_env().unwrap();
        assert_eq!(creds.access_key, "AKID");
        assert_eq!(creds.secret_key, "sekrit");

        unsafe {
            std::env::remove_var("AWS_SECRET_ACCESS_KEY");
        }
        let err = Credentials::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        unsafe {
            std::env::remove_var("AWS_ACCESS_KEY_ID");
        }
        assert!(Credentials::from_env().is_err());
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = ClientConfig::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_dialer_rejects_hostless_endpoint() {
        let config = ClientConfig {
            endpoint: "data:text/plain,hello".into(),
            ..Default::default()
        };
        assert!(config.dialer().is_err());
    }

    #[test]
    fn test_endpoint_port_defaults() {
        let config = ClientConfig {
            endpoint: "http://sdb.example.com/".into(),
            ..Default::default()
        };
        // Should not error; port 80 is implied by the scheme
        config.dialer().unwrap();
    }
}
