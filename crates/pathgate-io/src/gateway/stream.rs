//! Byte streams returned by gateways.
//!
//! A stream may own a guard (usually a [`Lease`](crate::Lease) on a privileged
//! session). The guard is dropped together with the stream, never earlier.

use std::any::Any;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

type Guard = Box<dyn Any + Send>;

/// Readable side of a file.
pub struct GatewayReader {
    inner: Box<dyn AsyncRead + Send + Unpin>,
    _guard: Option<Guard>,
}

impl GatewayReader {
    pub fn new(inner: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            _guard: None,
        }
    }

    /// Wrap `inner` and keep `guard` alive until the reader is dropped.
    pub fn with_guard(inner: impl AsyncRead + Send + Unpin + 'static, guard: impl Any + Send) -> Self {
        Self {
            inner: Box::new(inner),
            _guard: Some(Box::new(guard)),
        }
    }
}

impl std::fmt::Debug for GatewayReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayReader")
            .field("guarded", &self._guard.is_some())
            .finish()
    }
}

impl AsyncRead for GatewayReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.inner).poll_read(cx, buf)
    }
}

/// Writable side of a file.
pub struct GatewayWriter {
    inner: Box<dyn AsyncWrite + Send + Unpin>,
    _guard: Option<Guard>,
}

impl GatewayWriter {
    pub fn new(inner: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            _guard: None,
        }
    }

    /// Wrap `inner` and keep `guard` alive until the writer is dropped.
    pub fn with_guard(
        inner: impl AsyncWrite + Send + Unpin + 'static,
        guard: impl Any + Send,
    ) -> Self {
        Self {
            inner: Box::new(inner),
            _guard: Some(Box::new(guard)),
        }
    }
}

impl std::fmt::Debug for GatewayWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayWriter")
            .field("guarded", &self._guard.is_some())
            .finish()
    }
}

impl AsyncWrite for GatewayWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut *self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.inner).poll_shutdown(cx)
    }
}
