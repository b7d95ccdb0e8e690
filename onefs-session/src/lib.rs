// SPDX-License-Identifier: AGPL-3.0-or-later
//! Session pooling for OneFS
//!
//! Remote backends keep their connections here between operations. Idle
//! sessions are grouped per endpoint and identity, so two users of the same
//! server never share a login:
//!
//! - [`SessionPool`] maps an [`EndpointKey`] to its [`EndpointPool`], created
//!   on first use and kept until [`SessionPool::shutdown`].
//! - [`EndpointPool`] queues idle sessions and hands them out as [`Lease`]s,
//!   revalidating each one before reuse.
//! - A [`Lease`] owns its session exclusively and returns it to the pool when
//!   dropped, at most once.
//!
//! The pool never retries: a failing connect is reported to the caller as-is.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Decides whether an idle session can still be used
pub type Validator<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

/// Identifies the sessions that are interchangeable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub host: String,
    pub port: u16,
    /// Username the sessions are logged in as
    pub principal: String,
}

impl EndpointKey {
    pub fn new(host: impl Into<String>, port: u16, principal: impl Into<String>) -> Self {
        Self { host: host.into(), port, principal: principal.into() }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.principal, self.host, self.port)
    }
}

/// Idle sessions of one endpoint
pub struct EndpointPool<S> {
    key: EndpointKey,
    idle: Mutex<VecDeque<S>>,
    validator: Validator<S>,
    closed: AtomicBool,
}

impl<S: Send + 'static> EndpointPool<S> {
    pub fn new(key: EndpointKey, validator: Validator<S>) -> Self {
        Self {
            key,
            idle: Mutex::new(VecDeque::new()),
            validator,
            closed: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    /// Lends out an idle session that still validates, or one freshly
    /// established by `connect`. Stale sessions met on the way are dropped.
    pub async fn acquire<F, Fut, E>(self: &Arc<Self>, connect: F) -> Result<Lease<S>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, E>>,
    {
        while let Some(session) = self.pop_idle() {
            if (self.validator)(&session) {
                trace!(endpoint = %self.key, "reusing idle session");
                return Ok(Lease::new(session, Arc::clone(self)));
            }
            debug!(endpoint = %self.key, "discarding stale session");
        }

        debug!(endpoint = %self.key, "establishing new session");
        let session = connect().await?;
        Ok(Lease::new(session, Arc::clone(self)))
    }

    /// Queues `session` for reuse if it still validates, drops it otherwise.
    pub fn release(&self, session: S) {
        if self.closed.load(Ordering::Acquire) {
            trace!(endpoint = %self.key, "pool closed, dropping returned session");
            return;
        }
        if !(self.validator)(&session) {
            debug!(endpoint = %self.key, "dropping unusable session on release");
            return;
        }
        self.idle.lock().push_back(session);
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Drops every idle session and refuses later returns.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let drained: Vec<S> = self.idle.lock().drain(..).collect();
        if !drained.is_empty() {
            debug!(endpoint = %self.key, count = drained.len(), "closing idle sessions");
        }
    }

    fn pop_idle(&self) -> Option<S> {
        self.idle.lock().pop_front()
    }
}

/// A session on loan from an [`EndpointPool`]
pub struct Lease<S: Send + 'static> {
    session: Option<S>,
    pool: Arc<EndpointPool<S>>,
}

impl<S: Send + 'static> Lease<S> {
    fn new(session: S, pool: Arc<EndpointPool<S>>) -> Self {
        Self { session: Some(session), pool }
    }

    pub fn endpoint(&self) -> &EndpointKey {
        self.pool.key()
    }

    /// Returns the session to its pool now instead of at drop.
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session);
        }
    }
}

impl<S: Send + 'static> Deref for Lease<S> {
    type Target = S;

    fn deref(&self) -> &S {
        // only emptied by give_back, which consumes or drops the lease
        self.session.as_ref().expect("lease holds its session until returned")
    }
}

impl<S: Send + 'static> DerefMut for Lease<S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session.as_mut().expect("lease holds its session until returned")
    }
}

impl<S: Send + 'static> Drop for Lease<S> {
    fn drop(&mut self) {
        self.give_back();
    }
}

/// All endpoint pools of one backend
pub struct SessionPool<S> {
    endpoints: DashMap<EndpointKey, Arc<EndpointPool<S>>>,
    validator: Validator<S>,
}

impl<S: Send + 'static> SessionPool<S> {
    pub fn new(validator: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        Self { endpoints: DashMap::new(), validator: Arc::new(validator) }
    }

    /// Pool for `key`, created on first access.
    pub fn endpoint(&self, key: &EndpointKey) -> Arc<EndpointPool<S>> {
        if let Some(pool) = self.endpoints.get(key) {
            return Arc::clone(pool.value());
        }
        self.endpoints
            .entry(key.clone())
            .or_insert_with(|| Arc::new(EndpointPool::new(key.clone(), Arc::clone(&self.validator))))
            .value()
            .clone()
    }

    pub async fn acquire<F, Fut, E>(&self, key: &EndpointKey, connect: F) -> Result<Lease<S>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, E>>,
    {
        self.endpoint(key).acquire(connect).await
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Closes every endpoint pool. Sessions still on loan are dropped when
    /// their lease ends.
    pub fn shutdown(&self) {
        for pool in self.endpoints.iter() {
            pool.value().close();
        }
        self.endpoints.clear();
    }
}

impl<S> fmt::Debug for SessionPool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPool")
            .field("endpoints", &self.endpoints.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FakeSession {
        id: usize,
        alive: Arc<AtomicBool>,
    }

    struct Connector {
        connects: AtomicUsize,
    }

    impl Connector {
        fn new() -> Self {
            Self { connects: AtomicUsize::new(0) }
        }

        async fn connect(&self) -> Result<FakeSession, String> {
            let id = self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession { id, alive: Arc::new(AtomicBool::new(true)) })
        }

        fn count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    fn pool() -> SessionPool<FakeSession> {
        SessionPool::new(|s: &FakeSession| s.alive.load(Ordering::SeqCst))
    }

    fn key() -> EndpointKey {
        EndpointKey::new("ftp.example.org", 21, "anonymous")
    }

    #[tokio::test]
    async fn test_sequential_acquire_reuses_session() {
        let pool = pool();
        let connector = Connector::new();

        let first = pool.acquire(&key(), || connector.connect()).await.unwrap();
        let first_id = first.id;
        drop(first);

        let second = pool.acquire(&key(), || connector.connect()).await.unwrap();
        assert_eq!(second.id, first_id);
        assert_eq!(connector.count(), 1);
    }

    #[tokio::test]
    async fn test_stale_session_is_replaced() {
        let pool = pool();
        let connector = Connector::new();

        let first = pool.acquire(&key(), || connector.connect()).await.unwrap();
        let alive = first.alive.clone();
        drop(first);
        assert_eq!(pool.endpoint(&key()).idle_count(), 1);

        alive.store(false, Ordering::SeqCst);
        let second = pool.acquire(&key(), || connector.connect()).await.unwrap();
        assert_eq!(second.id, 1);
        assert_eq!(connector.count(), 2);
        assert_eq!(pool.endpoint(&key()).idle_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_session_not_requeued() {
        let pool = pool();
        let connector = Connector::new();

        let lease = pool.acquire(&key(), || connector.connect()).await.unwrap();
        lease.alive.store(false, Ordering::SeqCst);
        lease.release();

        assert_eq!(pool.endpoint(&key()).idle_count(), 0);
    }

    #[tokio::test]
    async fn test_explicit_release_then_drop_returns_once() {
        let pool = pool();
        let connector = Connector::new();

        let lease = pool.acquire(&key(), || connector.connect()).await.unwrap();
        lease.release();
        assert_eq!(pool.endpoint(&key()).idle_count(), 1);
    }

    #[tokio::test]
    async fn test_endpoints_are_isolated() {
        let pool = pool();
        let connector = Connector::new();

        let alice = EndpointKey::new("box", 22, "alice");
        let bob = EndpointKey::new("box", 22, "bob");

        drop(pool.acquire(&alice, || connector.connect()).await.unwrap());
        let lease = pool.acquire(&bob, || connector.connect()).await.unwrap();

        assert_eq!(lease.id, 1);
        assert_eq!(lease.endpoint(), &bob);
        assert_eq!(pool.endpoint_count(), 2);
    }

    #[tokio::test]
    async fn test_connect_failure_propagates() {
        let pool = pool();
        let result = pool
            .acquire(&key(), || async { Err::<FakeSession, _>("auth failed".to_string()) })
            .await;
        assert_eq!(result.err().as_deref(), Some("auth failed"));
        assert_eq!(pool.endpoint(&key()).idle_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_leases_are_distinct() {
        let pool = Arc::new(pool());
        let connector = Arc::new(Connector::new());

        let leases = futures::future::join_all((0..4).map(|_| {
            let pool = pool.clone();
            let connector = connector.clone();
            async move { pool.acquire(&key(), || connector.connect()).await.unwrap() }
        }))
        .await;

        let mut ids: Vec<usize> = leases.iter().map(|l| l.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);

        drop(leases);
        assert_eq!(pool.endpoint(&key()).idle_count(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_tasks_share_pool() {
        let pool = Arc::new(pool());
        let connector = Arc::new(Connector::new());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let connector = connector.clone();
                tokio::spawn(async move {
                    for _ in 0..10 {
                        let lease = pool.acquire(&key(), || connector.connect()).await.unwrap();
                        tokio::task::yield_now().await;
                        drop(lease);
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert!(connector.count() <= 8);
        assert_eq!(pool.endpoint(&key()).idle_count(), connector.count());
    }

    #[tokio::test]
    async fn test_shutdown_drops_idle_and_late_returns() {
        let pool = pool();
        let connector = Connector::new();

        drop(pool.acquire(&key(), || connector.connect()).await.unwrap());
        let held = pool.acquire(&key(), || connector.connect()).await.unwrap();
        let endpoint = pool.endpoint(&key());

        pool.shutdown();
        assert_eq!(pool.endpoint_count(), 0);

        drop(held);
        assert_eq!(endpoint.idle_count(), 0);
    }
}
