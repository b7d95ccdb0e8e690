// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory remote server for backend tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::remote::{
    ConnectRequest, RemoteConnector, RemoteEntry, RemoteFault, RemoteKind, RemoteReader,
    RemoteSession, RemoteWriter,
};

enum Node {
    Dir,
    File(Vec<u8>),
    Link,
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    connects: usize,
    stats: usize,
    refuse_login: bool,
    stall_connects: bool,
    break_reads: bool,
    last_request: Option<ConnectRequest>,
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

impl State {
    fn is_dir(&self, path: &str) -> bool {
        path == "/" || matches!(self.nodes.get(path), Some(Node::Dir))
    }

    fn entry(&self, path: &str) -> Option<RemoteEntry> {
        if path == "/" {
            return Some(RemoteEntry::directory("/"));
        }
        let name = name_of(path);
        Some(match self.nodes.get(path)? {
            Node::Dir => RemoteEntry::directory(name),
            Node::File(data) => RemoteEntry::file(name, data.len() as u64),
            Node::Link => RemoteEntry { kind: RemoteKind::Symlink, ..RemoteEntry::file(name, 0) },
        })
    }
}

/// Shared state of one fake server; clones see the same tree
#[derive(Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<State>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn RemoteConnector> {
        Arc::new(MemoryConnector(self.clone()))
    }

    pub fn add_dir(&self, path: &str) {
        self.state.lock().nodes.insert(path.to_string(), Node::Dir);
    }

    pub fn add_file(&self, path: &str, data: &[u8]) {
        self.state.lock().nodes.insert(path.to_string(), Node::File(data.to_vec()));
    }

    pub fn add_link(&self, path: &str) {
        self.state.lock().nodes.insert(path.to_string(), Node::Link);
    }

    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().nodes.get(path) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn stats(&self) -> usize {
        self.state.lock().stats
    }

    pub fn last_request(&self) -> Option<ConnectRequest> {
        self.state.lock().last_request.clone()
    }

    pub fn refuse_login(&self) {
        self.state.lock().refuse_login = true;
    }

    pub fn stall_connects(&self) {
        self.state.lock().stall_connects = true;
    }

    pub fn break_reads(&self) {
        self.state.lock().break_reads = true;
    }
}

struct MemoryConnector(MemoryServer);

#[async_trait]
impl RemoteConnector for MemoryConnector {
    async fn connect(&self, request: ConnectRequest) -> Result<Box<dyn RemoteSession>, RemoteFault> {
        let (stall, refuse) = {
            let mut state = self.0.state.lock();
            state.last_request = Some(request.clone());
            (state.stall_connects, state.refuse_login)
        };
        if stall {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if refuse {
            return Err(RemoteFault::Authentication(format!(
                "530 login incorrect for {}",
                request.credential.username
            )));
        }

        self.0.state.lock().connects += 1;
        Ok(Box::new(MemorySession {
            server: self.0.clone(),
            alive: Arc::new(AtomicBool::new(true)),
        }))
    }
}

struct MemorySession {
    server: MemoryServer,
    alive: Arc<AtomicBool>,
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn list(&mut self, path: &str) -> Result<Option<Vec<RemoteEntry>>, RemoteFault> {
        let state = self.server.state.lock();
        if !state.is_dir(path) {
            return Ok(state.nodes.get(path).map(|_| Vec::new()));
        }
        let mut entries = vec![RemoteEntry::directory("."), RemoteEntry::directory("..")];
        entries.extend(
            state
                .nodes
                .keys()
                .filter(|p| p.as_str() != "/" && parent_of(p) == path)
                .filter_map(|p| state.entry(p)),
        );
        Ok(Some(entries))
    }

    async fn stat(&mut self, path: &str) -> Result<Option<RemoteEntry>, RemoteFault> {
        let mut state = self.server.state.lock();
        state.stats += 1;
        Ok(state.entry(path))
    }

    async fn open_read(&mut self, path: &str) -> Result<RemoteReader, RemoteFault> {
        let state = self.server.state.lock();
        match state.nodes.get(path) {
            Some(Node::File(_)) if state.break_reads => {
                Ok(Box::pin(BrokenReader { alive: self.alive.clone() }))
            }
            Some(Node::File(data)) => Ok(Box::pin(Cursor::new(data.clone()))),
            Some(_) => Err(RemoteFault::Rejected(format!("550 {path}: not a plain file"))),
            None => Err(RemoteFault::NotFound(path.to_string())),
        }
    }

    async fn open_write(&mut self, path: &str) -> Result<RemoteWriter, RemoteFault> {
        let mut state = self.server.state.lock();
        if !state.is_dir(parent_of(path)) {
            return Err(RemoteFault::NotFound(parent_of(path).to_string()));
        }
        if state.nodes.contains_key(path) {
            return Err(RemoteFault::Rejected(format!("553 {path}: exists")));
        }
        state.nodes.insert(path.to_string(), Node::File(Vec::new()));
        Ok(Box::pin(MemoryWriter { server: self.server.clone(), path: path.to_string() }))
    }

    async fn delete_file(&mut self, path: &str) -> Result<(), RemoteFault> {
        let mut state = self.server.state.lock();
        match state.nodes.get(path) {
            Some(Node::Dir) => Err(RemoteFault::Rejected(format!("550 {path}: is a directory"))),
            Some(_) => {
                state.nodes.remove(path);
                Ok(())
            }
            None => Err(RemoteFault::NotFound(path.to_string())),
        }
    }

    async fn delete_directory(&mut self, path: &str) -> Result<(), RemoteFault> {
        let mut state = self.server.state.lock();
        if !matches!(state.nodes.get(path), Some(Node::Dir)) {
            return Err(RemoteFault::NotFound(path.to_string()));
        }
        if state.nodes.keys().any(|p| parent_of(p) == path) {
            return Err(RemoteFault::Rejected(format!("550 {path}: directory not empty")));
        }
        state.nodes.remove(path);
        Ok(())
    }

    async fn create_directory(&mut self, path: &str) -> Result<(), RemoteFault> {
        let mut state = self.server.state.lock();
        if path == "/" || state.nodes.contains_key(path) {
            return Err(RemoteFault::Rejected(format!("550 {path}: exists")));
        }
        if !state.is_dir(parent_of(path)) {
            return Err(RemoteFault::NotFound(parent_of(path).to_string()));
        }
        state.nodes.insert(path.to_string(), Node::Dir);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Fails every read as a dropped link and marks its session dead
struct BrokenReader {
    alive: Arc<AtomicBool>,
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.alive.store(false, Ordering::SeqCst);
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            RemoteFault::Connection("426 connection closed; transfer aborted".into()),
        )))
    }
}

/// Appends straight into the server's file node
struct MemoryWriter {
    server: MemoryServer,
    path: String,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.server.state.lock();
        match state.nodes.get_mut(&self.path) {
            Some(Node::File(data)) => {
                data.extend_from_slice(buf);
                Poll::Ready(Ok(buf.len()))
            }
            _ => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::Other,
                RemoteFault::Rejected(format!("451 {} vanished", self.path)),
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
