// SPDX-License-Identifier: AGPL-3.0-or-later
//! The `OneFilesystem` facade
//!
//! Routes every operation to the backend registered for the path's protocol.
//! The empty-protocol root is answered here: it lists one directory per
//! registered protocol.

use onefs_core::{
    backend::{ProtocolBackend, ReadStream, WriteStream},
    entry::{Entry, Location},
    error::{OneFsError, OneFsResult},
    Metadata, OnePath,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

#[cfg(feature = "local")]
use crate::LocalBackend;

/// Backends a [`OneFilesystem`] is built from, in lookup order
#[derive(Clone)]
pub struct FilesystemConfig {
    pub backends: Vec<Arc<dyn ProtocolBackend>>,
}

impl FilesystemConfig {
    /// No backends at all
    pub fn empty() -> Self {
        Self { backends: Vec::new() }
    }

    pub fn with_backend(mut self, backend: impl ProtocolBackend + 'static) -> Self {
        self.backends.push(Arc::new(backend));
        self
    }

    pub fn with_shared_backend(mut self, backend: Arc<dyn ProtocolBackend>) -> Self {
        self.backends.push(backend);
        self
    }
}

/// The local filesystem only.
#[cfg(feature = "local")]
impl Default for FilesystemConfig {
    fn default() -> Self {
        Self::empty().with_backend(LocalBackend::new())
    }
}

#[cfg(not(feature = "local"))]
impl Default for FilesystemConfig {
    fn default() -> Self {
        Self::empty()
    }
}

/// One API over every registered protocol
pub struct OneFilesystem {
    backends: Vec<Arc<dyn ProtocolBackend>>,
    by_protocol: HashMap<String, Vec<Arc<dyn ProtocolBackend>>>,
    untagged: Vec<Arc<dyn ProtocolBackend>>,
    protocols: Vec<String>,
    closed: AtomicBool,
}

impl OneFilesystem {
    pub fn new(config: FilesystemConfig) -> Self {
        let mut by_protocol: HashMap<String, Vec<Arc<dyn ProtocolBackend>>> = HashMap::new();
        let mut untagged = Vec::new();
        let mut protocols: Vec<String> = Vec::new();

        for backend in &config.backends {
            match backend.protocol() {
                Some(tag) => {
                    let tag = tag.to_ascii_lowercase();
                    if !protocols.contains(&tag) {
                        protocols.push(tag.clone());
                    }
                    by_protocol.entry(tag).or_default().push(Arc::clone(backend));
                }
                None => untagged.push(Arc::clone(backend)),
            }
        }
        debug!(protocols = ?protocols, untagged = untagged.len(), "filesystem ready");

        Self {
            backends: config.backends,
            by_protocol,
            untagged,
            protocols,
            closed: AtomicBool::new(false),
        }
    }

    /// Registered protocol tags, in registration order
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// First backend of the path's protocol that accepts it, then the first
    /// untagged one.
    pub fn route(&self, path: &OnePath) -> OneFsResult<&Arc<dyn ProtocolBackend>> {
        let backend = self
            .by_protocol
            .get(path.protocol())
            .into_iter()
            .flatten()
            .chain(self.untagged.iter())
            .find(|backend| backend.accepts(path))
            .ok_or_else(|| OneFsError::Unsupported(path.render()))?;
        trace!(path = %path, backend = backend.display_name(), "routed");
        Ok(backend)
    }

    fn protocol_roots(&self) -> Vec<Entry> {
        self.protocols
            .iter()
            .map(|tag| Entry::directory(OnePath::protocol_root(tag.as_str()), Metadata::new()))
            .collect()
    }

    pub async fn list_children(&self, path: &OnePath) -> OneFsResult<Option<Vec<Entry>>> {
        if path.is_protocols_root() {
            return Ok(Some(self.protocol_roots()));
        }
        self.route(path)?.list_children(path).await
    }

    /// Resolved entries are returned as they are, without asking a backend.
    pub async fn get_information(&self, location: impl Into<Location>) -> OneFsResult<Option<Entry>> {
        let path = match location.into() {
            Location::Resolved(entry) => return Ok(Some(entry)),
            Location::Path(path) => path,
        };
        if path.is_protocols_root() {
            return Ok(Some(Entry::directory(path, Metadata::new())));
        }
        self.route(&path)?.get_information(&path).await
    }

    pub async fn open_read(&self, path: &OnePath) -> OneFsResult<Option<ReadStream>> {
        if path.is_protocols_root() {
            return Ok(None);
        }
        self.route(path)?.open_read(path).await
    }

    pub async fn create_file(&self, path: &OnePath) -> OneFsResult<Option<WriteStream>> {
        if path.is_protocols_root() {
            return Ok(None);
        }
        self.route(path)?.create_file(path).await
    }

    pub async fn delete(&self, location: impl Into<Location>) -> OneFsResult<bool> {
        let location = location.into();
        let path = location.path();
        if path.is_protocols_root() {
            return Ok(false);
        }
        self.route(path)?.delete(&location).await
    }

    pub async fn create_directory(&self, path: &OnePath) -> OneFsResult<bool> {
        if path.is_protocols_root() {
            return Ok(false);
        }
        self.route(path)?.create_directory(path).await
    }

    /// Shuts every backend down once; later calls do nothing.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for backend in &self.backends {
            debug!(backend = backend.display_name(), "shutting down");
            backend.shutdown();
        }
    }
}

impl Default for OneFilesystem {
    fn default() -> Self {
        Self::new(FilesystemConfig::default())
    }
}

impl Drop for OneFilesystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}
