// SPDX-License-Identifier: AGPL-3.0-or-later
//! Protocol backend trait

use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    entry::{Entry, Location},
    error::OneFsResult,
    OnePath,
};

/// Readable byte stream
pub type ReadStream = Pin<Box<dyn AsyncRead + Send>>;

/// Writable byte stream
pub type WriteStream = Pin<Box<dyn AsyncWrite + Send>>;

/// One protocol family (or a slice of one) behind the facade.
///
/// Existence is reported through return values: `None` or `false` mean the
/// target is missing, already there, or was refused. Errors are reserved for
/// faults the caller has to handle.
#[async_trait]
pub trait ProtocolBackend: Send + Sync {
    /// Protocol tag this backend is registered under. `None` registers it as
    /// a fallback that is asked through [`ProtocolBackend::accepts`] for every
    /// protocol.
    fn protocol(&self) -> Option<&str>;

    fn display_name(&self) -> &str;

    /// Whether this backend handles `path`; consulted when several backends
    /// compete for one protocol.
    fn accepts(&self, _path: &OnePath) -> bool {
        true
    }

    /// `None` if the directory does not exist. A file lists as empty.
    async fn list_children(&self, path: &OnePath) -> OneFsResult<Option<Vec<Entry>>>;

    async fn get_information(&self, path: &OnePath) -> OneFsResult<Option<Entry>>;

    /// `None` if the file is missing or is a directory.
    async fn open_read(&self, path: &OnePath) -> OneFsResult<Option<ReadStream>>;

    /// `None` if the target exists or its parent is missing.
    async fn create_file(&self, path: &OnePath) -> OneFsResult<Option<WriteStream>>;

    /// Removes one file or one empty directory. Never recurses.
    async fn delete(&self, location: &Location) -> OneFsResult<bool>;

    async fn create_directory(&self, path: &OnePath) -> OneFsResult<bool>;

    /// Releases pooled sessions and other held resources.
    fn shutdown(&self) {}
}
