// SPDX-License-Identifier: AGPL-3.0-or-later
//! Connection parameters shared by remote backends

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::credentials::{Credential, CredentialProvider, NoCredentials};
use crate::error::{OneFsError, OneFsResult};

/// Connect timeout used when none is configured
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens the TCP connection a remote session runs over.
///
/// Replace the default to go through a proxy or a pre-established tunnel.
#[async_trait]
pub trait SocketFactory: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream>;
}

/// Plain outbound TCP
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectConnect;

#[async_trait]
impl SocketFactory for DirectConnect {
    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        // bracketed IPv6 literals come straight from the path host
        let host = host.trim_start_matches('[').trim_end_matches(']');
        TcpStream::connect((host, port)).await
    }
}

/// Parameters handed to every remote backend
#[derive(Clone)]
pub struct FilesystemParameters {
    pub connect_timeout: Duration,
    pub socket_factory: Arc<dyn SocketFactory>,
    pub credentials: Arc<dyn CredentialProvider>,
}

impl FilesystemParameters {
    pub fn with_credentials(mut self, credentials: impl CredentialProvider + 'static) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    pub fn with_socket_factory(mut self, factory: impl SocketFactory + 'static) -> Self {
        self.socket_factory = Arc::new(factory);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for FilesystemParameters {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            socket_factory: Arc::new(DirectConnect),
            credentials: Arc::new(NoCredentials),
        }
    }
}

impl fmt::Debug for FilesystemParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilesystemParameters")
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

/// On-disk settings, read from TOML
///
/// ```toml
/// connect_timeout_secs = 10
///
/// [credentials."ftp.example.org"]
/// username = "alice"
/// password = "secret"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connect_timeout_secs: Option<u64>,
    /// Credentials keyed by host
    pub credentials: HashMap<String, Credential>,
}

impl Settings {
    pub fn from_toml(text: &str) -> OneFsResult<Self> {
        toml::from_str(text).map_err(|e| OneFsError::Config(e.to_string()))
    }

    /// Loads settings from `path`; a missing file yields the defaults.
    pub async fn load(path: &Path) -> OneFsResult<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parameters(&self) -> FilesystemParameters {
        let params = FilesystemParameters::default().with_credentials(self.credentials.clone());
        match self.connect_timeout_secs {
            Some(secs) => params.with_connect_timeout(Duration::from_secs(secs)),
            None => params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let params = FilesystemParameters::default();
        assert_eq!(params.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(params.credentials.credential("any", 21, "ftp").is_none());
    }

    #[test]
    fn test_settings_from_toml() {
        let settings = Settings::from_toml(
            r#"
            connect_timeout_secs = 5

            [credentials."ftp.example.org"]
            username = "alice"
            password = "secret"
            "#,
        )
        .unwrap();

        let params = settings.parameters();
        assert_eq!(params.connect_timeout, Duration::from_secs(5));
        let cred = params.credentials.credential("ftp.example.org", 21, "ftp").unwrap();
        assert_eq!(cred.username, "alice");
    }

    #[test]
    fn test_empty_settings() {
        let settings = Settings::from_toml("").unwrap();
        assert!(settings.credentials.is_empty());
        assert_eq!(settings.parameters().connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_invalid_settings() {
        let err = Settings::from_toml("connect_timeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, OneFsError::Config(_)));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).await.unwrap();
        assert!(settings.connect_timeout_secs.is_none());
    }
}
