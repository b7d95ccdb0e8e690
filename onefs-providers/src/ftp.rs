// SPDX-License-Identifier: AGPL-3.0-or-later
//! FTP-family storage backend
//!
//! One backend covers plain FTP, implicit FTPS and explicit FTPS (FTPES); the
//! variants only differ in protocol tag, default port and how the connector
//! secures the control channel.

use async_trait::async_trait;
use std::sync::Arc;

use onefs_core::{
    backend::{ProtocolBackend, ReadStream, WriteStream},
    entry::{Entry, EntryKind, Location},
    error::OneFsResult,
    params::FilesystemParameters,
    OnePath,
};

use crate::remote::{RemoteBackend, RemoteConnector, RemoteEntry, RemoteKind, RemoteProfile, TransportMode};

/// FTP transport variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpMode {
    /// `ftp://`, port 21
    Plain,
    /// `ftps://`, TLS from connect, port 990
    Implicit,
    /// `ftpes://`, `AUTH TLS` after connect, port 21
    Explicit,
}

impl FtpMode {
    pub const ALL: [FtpMode; 3] = [FtpMode::Plain, FtpMode::Implicit, FtpMode::Explicit];

    pub fn protocol(self) -> &'static str {
        match self {
            FtpMode::Plain => "ftp",
            FtpMode::Implicit => "ftps",
            FtpMode::Explicit => "ftpes",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            FtpMode::Implicit => 990,
            FtpMode::Plain | FtpMode::Explicit => 21,
        }
    }

    pub fn transport(self) -> TransportMode {
        match self {
            FtpMode::Plain => TransportMode::Plain,
            FtpMode::Implicit => TransportMode::ImplicitTls,
            FtpMode::Explicit => TransportMode::ExplicitTls,
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            FtpMode::Plain => "FTP",
            FtpMode::Implicit => "FTPS (implicit TLS)",
            FtpMode::Explicit => "FTPES (explicit TLS)",
        }
    }
}

// links are not followed over FTP, so they are left out of listings
fn classify(entry: &RemoteEntry) -> Option<EntryKind> {
    match entry.kind {
        RemoteKind::Directory => Some(EntryKind::Directory),
        RemoteKind::File => Some(EntryKind::File),
        RemoteKind::Symlink => None,
    }
}

/// FTP storage backend
pub struct FtpBackend {
    mode: FtpMode,
    remote: RemoteBackend,
}

impl FtpBackend {
    pub fn new(mode: FtpMode, connector: Arc<dyn RemoteConnector>, params: FilesystemParameters) -> Self {
        let profile = RemoteProfile {
            protocol: mode.protocol(),
            display_name: mode.display_name(),
            default_port: mode.default_port(),
            mode: mode.transport(),
            classify,
        };
        Self { mode, remote: RemoteBackend::new(profile, connector, params) }
    }

    /// One backend per mode, all sharing `connector`.
    pub fn all(connector: Arc<dyn RemoteConnector>, params: &FilesystemParameters) -> Vec<Self> {
        FtpMode::ALL
            .iter()
            .map(|mode| Self::new(*mode, Arc::clone(&connector), params.clone()))
            .collect()
    }

    pub fn mode(&self) -> FtpMode {
        self.mode
    }
}

#[async_trait]
impl ProtocolBackend for FtpBackend {
    fn protocol(&self) -> Option<&str> {
        Some(self.mode.protocol())
    }

    fn display_name(&self) -> &str {
        self.remote.display_name()
    }

    async fn list_children(&self, path: &OnePath) -> OneFsResult<Option<Vec<Entry>>> {
        self.remote.list_children(path).await
    }

    async fn get_information(&self, path: &OnePath) -> OneFsResult<Option<Entry>> {
        self.remote.get_information(path).await
    }

    async fn open_read(&self, path: &OnePath) -> OneFsResult<Option<ReadStream>> {
        self.remote.open_read(path).await
    }

    async fn create_file(&self, path: &OnePath) -> OneFsResult<Option<WriteStream>> {
        self.remote.create_file(path).await
    }

    async fn delete(&self, location: &Location) -> OneFsResult<bool> {
        self.remote.delete(location).await
    }

    async fn create_directory(&self, path: &OnePath) -> OneFsResult<bool> {
        self.remote.create_directory(path).await
    }

    fn shutdown(&self) {
        self.remote.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryServer;

    #[test]
    fn test_modes() {
        assert_eq!(FtpMode::Plain.protocol(), "ftp");
        assert_eq!(FtpMode::Implicit.protocol(), "ftps");
        assert_eq!(FtpMode::Explicit.protocol(), "ftpes");

        assert_eq!(FtpMode::Plain.default_port(), 21);
        assert_eq!(FtpMode::Implicit.default_port(), 990);
        assert_eq!(FtpMode::Explicit.default_port(), 21);
    }

    #[tokio::test]
    async fn test_listing_skips_links() {
        let server = MemoryServer::new();
        server.add_file("/a.txt", b"a");
        server.add_link("/latest");
        server.add_dir("/pub");
        let backend = FtpBackend::new(FtpMode::Plain, server.connector(), FilesystemParameters::default());

        let root = OnePath::parse("ftp://ftp.example.org/").unwrap();
        let entries = backend.list_children(&root).await.unwrap().unwrap();
        let names: Vec<_> = entries.iter().filter_map(|e| e.name()).collect();
        assert_eq!(names, ["a.txt", "pub"]);
    }

    #[tokio::test]
    async fn test_mode_selects_port_and_transport() {
        let server = MemoryServer::new();
        let backend = FtpBackend::new(FtpMode::Implicit, server.connector(), FilesystemParameters::default());

        let path = OnePath::parse("ftps://secure.example.org/").unwrap();
        backend.get_information(&path).await.unwrap();

        let request = server.last_request().unwrap();
        assert_eq!(request.port, 990);
        assert_eq!(request.mode, TransportMode::ImplicitTls);
        assert_eq!(request.host, "secure.example.org");
    }

    #[test]
    fn test_all_modes() {
        let server = MemoryServer::new();
        let backends = FtpBackend::all(server.connector(), &FilesystemParameters::default());
        let tags: Vec<_> = backends.iter().filter_map(|b| b.protocol()).collect();
        assert_eq!(tags, ["ftp", "ftps", "ftpes"]);
    }
}
