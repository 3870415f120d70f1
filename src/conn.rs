//! # Instrumented Connection Wrappers
//!
//! Pass-through `AsyncRead`/`AsyncWrite` wrappers that observe the timing of
//! an underlying byte stream without altering the bytes that flow through it.
//!
//! - `FirstByteStream` records when the first data-bearing read completes.
//! - `InFlightStream` accumulates, for every write, the time until the next
//!   data-bearing read. That sum approximates the portion of an exchange
//!   spent waiting on the network rather than on local CPU.
//!
//! The runner stacks them as `InFlightStream<FirstByteStream<TcpStream>>` so
//! a single connection yields the time-to-server-hello and in-flight samples
//! while the caller measures the overall handshake duration itself.
//!
//! All timestamps are `tokio::time::Instant`, which honours tokio's paused
//! test clock.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

/// Object-safe byte stream, used to hand streams across the `Handshaker` seam
pub trait IoStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IoStream for T {}

pub struct BoxedIoStream(pub Box<dyn IoStream>);

impl BoxedIoStream {
    pub fn new<S: IoStream + 'static>(stream: S) -> Self {
        Self(Box::new(stream))
    }
}

impl AsyncRead for BoxedIoStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut *self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for BoxedIoStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut *self.0).poll_write(cx, buf)
    }
    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut *self.0).poll_flush(cx)
    }
    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut *self.0).poll_shutdown(cx)
    }
}

/// Timestamp slot written at most once
pub type FirstByteSlot = Arc<OnceLock<Instant>>;

/// Records the time of the first read that returns at least one byte.
pub struct FirstByteStream<S> {
    inner: S,
    first_read: FirstByteSlot,
}

impl<S> FirstByteStream<S> {
    pub fn new(inner: S, first_read: FirstByteSlot) -> Self {
        Self { inner, first_read }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for FirstByteStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            if buf.filled().len() > before {
                // Later reads must not move the timestamp.
                let _ = self.first_read.set(Instant::now());
            }
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for FirstByteStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }
    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }
    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Shared state of an `InFlightStream`.
///
/// `pending_write` holds the completion time of the most recent unconsumed
/// write as nanoseconds since `origin`, biased by one so that zero always
/// means "no pending write".
#[derive(Debug)]
pub struct InFlightTimer {
    origin: Instant,
    pending_write: AtomicU64,
    in_flight_ns: AtomicU64,
}

impl InFlightTimer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            pending_write: AtomicU64::new(0),
            in_flight_ns: AtomicU64::new(0),
        })
    }

    /// Total time accumulated between writes and their following reads
    pub fn in_flight(&self) -> Duration {
        Duration::from_nanos(self.in_flight_ns.load(Ordering::Acquire))
    }

    /// Whether a write is waiting for a read to consume it
    pub fn has_pending_write(&self) -> bool {
        self.pending_write.load(Ordering::Acquire) != 0
    }

    fn marker(&self, now: Instant) -> u64 {
        let since = now.saturating_duration_since(self.origin).as_nanos();
        u64::try_from(since).unwrap_or(u64::MAX - 1) + 1
    }

    fn record_write(&self) {
        // Only the most recent write matters.
        self.pending_write
            .store(self.marker(Instant::now()), Ordering::Release);
    }

    fn record_read(&self) {
        let written = self.pending_write.swap(0, Ordering::AcqRel);
        if written != 0 {
            let gap = self.marker(Instant::now()).saturating_sub(written);
            self.in_flight_ns.fetch_add(gap, Ordering::AcqRel);
        }
    }
}

/// Accumulates the gap between each successful write and the next read
/// that returns data. Reads that return no data leave the pending write
/// untouched.
pub struct InFlightStream<S> {
    inner: S,
    timer: Arc<InFlightTimer>,
}

impl<S> InFlightStream<S> {
    pub fn new(inner: S, timer: Arc<InFlightTimer>) -> Self {
        Self { inner, timer }
    }

    pub fn timer(&self) -> &Arc<InFlightTimer> {
        &self.timer
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for InFlightStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            if buf.filled().len() > before {
                self.timer.record_read();
            }
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for InFlightStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let poll = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(_)) = poll {
            self.timer.record_write();
        }
        poll
    }
    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }
    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
