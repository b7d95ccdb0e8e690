// SPDX-License-Identifier: AGPL-3.0-or-later
//! SFTP storage backend
//!
//! SSH File Transfer Protocol over a pluggable [`RemoteConnector`]; key
//! exchange and authentication happen inside the connector.

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

pub const SFTP_PROTOCOL: &str = "sftp";

pub const SFTP_DEFAULT_PORT: u16 = 22;

fn classify(entry: &RemoteEntry) -> Option<EntryKind> {
    match entry.kind {
        RemoteKind::Directory => Some(EntryKind::Directory),
        RemoteKind::File | RemoteKind::Symlink => Some(EntryKind::File),
    }
}

/// SFTP storage backend
pub struct SftpBackend {
    remote: RemoteBackend,
}

impl SftpBackend {
    pub fn new(connector: Arc<dyn RemoteConnector>, params: FilesystemParameters) -> Self {
        let profile = RemoteProfile {
            protocol: SFTP_PROTOCOL,
            display_name: "SFTP",
            default_port: SFTP_DEFAULT_PORT,
            mode: TransportMode::Ssh,
            classify,
        };
        Self { remote: RemoteBackend::new(profile, connector, params) }
    }
}

#[async_trait]
impl ProtocolBackend for SftpBackend {
    fn protocol(&self) -> Option<&str> {
        Some(SFTP_PROTOCOL)
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
