// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stream adapter
//!
//! [`TranslateStream`] funnels every read, write and seek error of a backend
//! stream through one translation function, and optionally holds a lease
//! (typically a pooled session) that is dropped together with the stream.

use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite, ReadBuf};

/// Maps a backend error onto the crate's taxonomy
pub type Translator = fn(io::Error) -> io::Error;

/// Leaves errors untouched.
pub fn passthrough(err: io::Error) -> io::Error {
    err
}

pub struct TranslateStream<S> {
    // dropped before the lease, so the session is returned only once the
    // stream no longer uses it
    inner: S,
    translate: Translator,
    _lease: Option<Box<dyn Send>>,
}

impl<S> TranslateStream<S> {
    pub fn new(inner: S, translate: Translator) -> Self {
        Self { inner, translate, _lease: None }
    }

    /// Keeps `lease` alive until the stream is dropped.
    pub fn with_lease(mut self, lease: impl Send + 'static) -> Self {
        self._lease = Some(Box::new(lease));
        self
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TranslateStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let translate = self.translate;
        Pin::new(&mut self.inner).poll_read(cx, buf).map_err(translate)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TranslateStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let translate = self.translate;
        Pin::new(&mut self.inner).poll_write(cx, buf).map_err(translate)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let translate = self.translate;
        Pin::new(&mut self.inner).poll_flush(cx).map_err(translate)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let translate = self.translate;
        Pin::new(&mut self.inner).poll_shutdown(cx).map_err(translate)
    }
}

impl<S: AsyncSeek + Unpin> AsyncSeek for TranslateStream<S> {
    fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        let translate = self.translate;
        Pin::new(&mut self.inner).start_seek(position).map_err(translate)
    }

    fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        let translate = self.translate;
        Pin::new(&mut self.inner).poll_complete(cx).map_err(translate)
    }
}
