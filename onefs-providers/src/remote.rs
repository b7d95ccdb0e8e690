// SPDX-License-Identifier: AGPL-3.0-or-later
//! Remote client contract and the backend logic shared by FTP and SFTP
//!
//! The wire protocol lives behind [`RemoteConnector`] and [`RemoteSession`].
//! [`RemoteBackend`] turns those into a [`ProtocolBackend`]: it pools sessions
//! per endpoint and identity, maps remote faults onto [`OneFsError`] and
//! applies the existence conventions of the backend contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use onefs_core::{
    backend::{ProtocolBackend, ReadStream, WriteStream},
    credentials::{resolve_credential, Credential},
    entry::{Entry, EntryKind, Location},
    error::{OneFsError, OneFsResult},
    params::{FilesystemParameters, SocketFactory},
    Metadata, OnePath, TranslateStream,
};
use onefs_session::{EndpointKey, Lease, SessionPool};

/// Readable stream handed out by a remote session
pub type RemoteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Writable stream handed out by a remote session
pub type RemoteWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Fault reported by a remote client.
///
/// Streams report faults the same way, as the inner error of an `io::Error`.
#[derive(Error, Debug)]
pub enum RemoteFault {
    /// Login refused
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Connect failed or the link was lost
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server refused a command (permissions, already exists, ...)
    #[error("command rejected: {0}")]
    Rejected(String),

    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<RemoteFault> for OneFsError {
    fn from(fault: RemoteFault) -> Self {
        match fault {
            RemoteFault::Authentication(msg) => OneFsError::AccessDenied(msg),
            RemoteFault::Connection(msg) => OneFsError::Transport(msg),
            // a missing entry only reaches here where none was expected
            RemoteFault::Rejected(msg) | RemoteFault::NotFound(msg) => OneFsError::Protocol(msg),
            RemoteFault::Other(err) => OneFsError::Backend(err),
        }
    }
}

/// Translates stream errors carrying a [`RemoteFault`]: lost connections
/// become transport errors, rejected commands protocol errors.
pub fn translate_remote_fault(err: io::Error) -> io::Error {
    let translated = match err.get_ref().and_then(|e| e.downcast_ref::<RemoteFault>()) {
        Some(RemoteFault::Connection(msg)) => Some(OneFsError::Transport(msg.clone())),
        Some(RemoteFault::Rejected(msg)) => Some(OneFsError::Protocol(msg.clone())),
        _ => None,
    };
    translated.map_or(err, OneFsError::into_io)
}

/// How the control connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Plain,
    /// TLS from the first byte
    ImplicitTls,
    /// Plain connect upgraded with `AUTH TLS`
    ExplicitTls,
    Ssh,
}

/// Everything a connector needs to open one session
#[derive(Clone)]
pub struct ConnectRequest {
    pub host: String,
    pub port: u16,
    pub credential: Credential,
    pub mode: TransportMode,
    pub socket_factory: Arc<dyn SocketFactory>,
}

impl std::fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("credential", &self.credential)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Opens sessions to remote servers
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, request: ConnectRequest) -> Result<Box<dyn RemoteSession>, RemoteFault>;
}

/// Kind of a remote listing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKind {
    File,
    Directory,
    Symlink,
}

/// One entry as reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: RemoteKind,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: RemoteKind::File,
            size: Some(size),
            modified: None,
            accessed: None,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RemoteKind::Directory,
            size: None,
            modified: None,
            accessed: None,
        }
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            size: self.size,
            created: None,
            modified: self.modified,
            accessed: self.accessed,
        }
    }
}

/// An established, logged-in connection. Paths are absolute and
/// `/`-separated.
#[async_trait]
pub trait RemoteSession: Send {
    /// `None` if the directory does not exist
    async fn list(&mut self, path: &str) -> Result<Option<Vec<RemoteEntry>>, RemoteFault>;

    /// `None` if nothing exists at `path`
    async fn stat(&mut self, path: &str) -> Result<Option<RemoteEntry>, RemoteFault>;

    async fn open_read(&mut self, path: &str) -> Result<RemoteReader, RemoteFault>;

    async fn open_write(&mut self, path: &str) -> Result<RemoteWriter, RemoteFault>;

    async fn delete_file(&mut self, path: &str) -> Result<(), RemoteFault>;

    async fn delete_directory(&mut self, path: &str) -> Result<(), RemoteFault>;

    async fn create_directory(&mut self, path: &str) -> Result<(), RemoteFault>;

    fn is_connected(&self) -> bool;
}

/// Session handle as kept by the pool
pub type Session = Box<dyn RemoteSession>;

/// What distinguishes one remote protocol from another
#[derive(Clone, Copy)]
pub struct RemoteProfile {
    pub protocol: &'static str,
    pub display_name: &'static str,
    pub default_port: u16,
    pub mode: TransportMode,
    /// Kind a listing entry is reported as, `None` to hide it
    pub classify: fn(&RemoteEntry) -> Option<EntryKind>,
}

/// Pooled backend over a [`RemoteConnector`]
pub struct RemoteBackend {
    profile: RemoteProfile,
    connector: Arc<dyn RemoteConnector>,
    params: FilesystemParameters,
    pool: SessionPool<Session>,
}

impl RemoteBackend {
    pub fn new(
        profile: RemoteProfile,
        connector: Arc<dyn RemoteConnector>,
        params: FilesystemParameters,
    ) -> Self {
        Self {
            profile,
            connector,
            params,
            pool: SessionPool::new(|session: &Session| session.is_connected()),
        }
    }

    pub fn profile(&self) -> &RemoteProfile {
        &self.profile
    }

    pub fn pool(&self) -> &SessionPool<Session> {
        &self.pool
    }

    fn remote_path(path: &OnePath) -> String {
        format!("/{}", path.segments().join("/"))
    }

    async fn session(&self, path: &OnePath) -> OneFsResult<Lease<Session>> {
        let host = path.host();
        let port = path.port().unwrap_or(self.profile.default_port);
        let credential =
            resolve_credential(&*self.params.credentials, host, port, self.profile.protocol);
        let key = EndpointKey::new(host, port, credential.username.clone());

        let request = ConnectRequest {
            host: host.to_string(),
            port,
            credential,
            mode: self.profile.mode,
            socket_factory: Arc::clone(&self.params.socket_factory),
        };
        let connector = Arc::clone(&self.connector);
        let timeout = self.params.connect_timeout;
        let endpoint = format!("{host}:{port}");

        self.pool
            .acquire(&key, || async move {
                match tokio::time::timeout(timeout, connector.connect(request)).await {
                    Ok(result) => result.map_err(OneFsError::from),
                    Err(_) => Err(OneFsError::Transport(format!(
                        "connect to {endpoint} timed out after {timeout:?}"
                    ))),
                }
            })
            .await
    }

    fn entry_from(&self, path: OnePath, remote: &RemoteEntry) -> Entry {
        match remote.kind {
            RemoteKind::Directory => Entry::directory(path, remote.metadata()),
            RemoteKind::File | RemoteKind::Symlink => Entry::file(path, remote.metadata()),
        }
    }

    async fn stat_with(
        session: &mut Session,
        remote: &str,
    ) -> OneFsResult<Option<RemoteEntry>> {
        match session.stat(remote).await {
            Ok(found) => Ok(found),
            Err(RemoteFault::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Outcome of a command whose refusal is an ordinary answer
fn refused_is_false(result: Result<(), RemoteFault>, what: &str, path: &str) -> OneFsResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(RemoteFault::Rejected(msg)) | Err(RemoteFault::NotFound(msg)) => {
            debug!(path, reason = %msg, "{} refused", what);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ProtocolBackend for RemoteBackend {
    fn protocol(&self) -> Option<&str> {
        Some(self.profile.protocol)
    }

    fn display_name(&self) -> &str {
        self.profile.display_name
    }

    async fn list_children(&self, path: &OnePath) -> OneFsResult<Option<Vec<Entry>>> {
        // host enumeration is not something a remote protocol offers
        if !path.has_host() {
            return Ok(Some(Vec::new()));
        }

        let remote = Self::remote_path(path);
        let mut session = self.session(path).await?;
        let listing = match session.list(&remote).await {
            Ok(Some(listing)) => listing,
            Ok(None) | Err(RemoteFault::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entries: Vec<Entry> = listing
            .iter()
            .filter(|e| e.name != "." && e.name != "..")
            .filter_map(|e| {
                let kind = (self.profile.classify)(e)?;
                let child = path.child(&e.name);
                Some(match kind {
                    EntryKind::Directory => Entry::directory(child, e.metadata()),
                    EntryKind::File => Entry::file(child, e.metadata()),
                })
            })
            .collect();
        trace!(path = %path, count = entries.len(), "listed remote directory");
        Ok(Some(entries))
    }

    async fn get_information(&self, path: &OnePath) -> OneFsResult<Option<Entry>> {
        if !path.has_host() {
            return Ok(None);
        }
        let mut session = self.session(path).await?;
        let found = Self::stat_with(&mut session, &Self::remote_path(path)).await?;
        Ok(found.map(|remote| self.entry_from(path.clone(), &remote)))
    }

    async fn open_read(&self, path: &OnePath) -> OneFsResult<Option<ReadStream>> {
        if !path.has_host() {
            return Ok(None);
        }
        let remote = Self::remote_path(path);
        let mut session = self.session(path).await?;
        match Self::stat_with(&mut session, &remote).await? {
            Some(found) if found.kind != RemoteKind::Directory => {}
            _ => return Ok(None),
        }

        let reader = session.open_read(&remote).await.map_err(OneFsError::from)?;
        let stream = TranslateStream::new(reader, translate_remote_fault).with_lease(session);
        Ok(Some(Box::pin(stream)))
    }

    async fn create_file(&self, path: &OnePath) -> OneFsResult<Option<WriteStream>> {
        if !path.has_host() || path.is_root() {
            return Ok(None);
        }
        let remote = Self::remote_path(path);
        let mut session = self.session(path).await?;
        if Self::stat_with(&mut session, &remote).await?.is_some() {
            return Ok(None);
        }

        let writer = match session.open_write(&remote).await {
            Ok(writer) => writer,
            Err(RemoteFault::Rejected(msg)) | Err(RemoteFault::NotFound(msg)) => {
                debug!(path = %remote, reason = %msg, "create refused");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let stream = TranslateStream::new(writer, translate_remote_fault).with_lease(session);
        Ok(Some(Box::pin(stream)))
    }

    async fn delete(&self, location: &Location) -> OneFsResult<bool> {
        let path = location.path();
        if !path.has_host() || path.is_root() {
            return Ok(false);
        }
        let remote = Self::remote_path(path);
        let mut session = self.session(path).await?;

        let is_directory = match location.resolved() {
            Some(entry) => entry.is_directory(),
            None => match Self::stat_with(&mut session, &remote).await? {
                Some(found) => found.kind == RemoteKind::Directory,
                None => return Ok(false),
            },
        };

        if is_directory {
            refused_is_false(session.delete_directory(&remote).await, "delete", &remote)
        } else {
            refused_is_false(session.delete_file(&remote).await, "delete", &remote)
        }
    }

    async fn create_directory(&self, path: &OnePath) -> OneFsResult<bool> {
        if !path.has_host() || path.is_root() {
            return Ok(false);
        }
        let remote = Self::remote_path(path);
        let mut session = self.session(path).await?;
        refused_is_false(session.create_directory(&remote).await, "mkdir", &remote)
    }

    fn shutdown(&self) {
        debug!(protocol = self.profile.protocol, "closing session pool");
        self.pool.shutdown();
    }
}
