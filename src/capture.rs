//! # Connection Capture and Replay
//!
//! `RecordingStream` buffers every byte read from a live connection and, on
//! end-of-stream or shutdown, prints the capture as a Rust byte-slice
//! literal. Pasting that literal into a `ReplayStream` reproduces the server
//! side of the exchange offline.
//!
//! Capture mode is separate from benchmarking: it runs a single handshake
//! per target and never touches the histograms.

use crate::config::Target;
use crate::conn::BoxedIoStream;
use crate::error::JobError;
use crate::runner::dial;
use crate::tls::{target_host, Handshaker};
use rand::Rng;
use std::io::{Cursor, Write};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tracing::{debug, warn};

/// Pass-through stream that captures everything read from `inner`.
pub struct RecordingStream<S> {
    inner: S,
    captured: Vec<u8>,
    output: Box<dyn Write + Send>,
    emitted: bool,
}

impl<S> RecordingStream<S> {
    pub fn new(inner: S, output: Box<dyn Write + Send>) -> Self {
        Self {
            inner,
            captured: Vec::new(),
            output,
            emitted: false,
        }
    }

    pub fn captured(&self) -> &[u8] {
        &self.captured
    }

    fn emit(&mut self) {
        if self.emitted {
            return;
        }
        self.emitted = true;

        let id = rand::thread_rng().gen_range(0..9999);
        let literal = format_recording(id, &self.captured);
        if let Err(e) = self
            .output
            .write_all(literal.as_bytes())
            .and_then(|_| self.output.flush())
        {
            warn!("Failed to write recording: {}", e);
        }
    }
}

impl<S> Drop for RecordingStream<S> {
    fn drop(&mut self) {
        self.emit();
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for RecordingStream<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let wanted = buf.remaining() > 0;
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            let fresh = &buf.filled()[before..];
            if fresh.is_empty() && wanted {
                self.emit();
            } else {
                self.captured.extend_from_slice(fresh);
            }
        }
        poll
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for RecordingStream<S> {
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
        self.emit();
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Format captured bytes as a pasteable `&[u8]` constant, 16 bytes per line
pub fn format_recording(id: u32, bytes: &[u8]) -> String {
    let mut out = format!("\nconst RECORDING_{}: &[u8] = &[", id);
    for (i, b) in bytes.iter().enumerate() {
        if i % 16 == 0 {
            out.push_str("\n    ");
        } else {
            out.push(' ');
        }
        out.push_str(&format!("0x{:02x},", b));
    }
    out.push_str("\n];\n\n");
    out
}

/// Serves a recorded byte sequence as the read side; writes are discarded.
pub struct ReplayStream {
    recording: Cursor<Vec<u8>>,
}

impl ReplayStream {
    pub fn new(recording: impl Into<Vec<u8>>) -> Self {
        Self {
            recording: Cursor::new(recording.into()),
        }
    }

    /// Bytes not yet read
    pub fn remaining(&self) -> usize {
        let len = self.recording.get_ref().len() as u64;
        len.saturating_sub(self.recording.position()) as usize
    }
}

impl AsyncRead for ReplayStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.recording).poll_read(cx, buf)
    }
}

impl AsyncWrite for ReplayStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }
    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Run one handshake against `target` through a `RecordingStream`, writing
/// the capture to `output` when the connection closes.
pub async fn record_handshake<H: Handshaker + ?Sized>(
    handshaker: &H,
    target: &Target,
    timeout: Duration,
    output: Box<dyn Write + Send>,
) -> Result<(), JobError> {
    let deadline = tokio::time::Instant::now() + timeout;
    let conn = dial(&target.address, timeout).await?;
    let recording = BoxedIoStream::new(RecordingStream::new(conn, output));

    let host = target_host(&target.address);
    let mut session = tokio::time::timeout_at(deadline, handshaker.handshake(host, recording))
        .await
        .map_err(|_| JobError::DeadlineExceeded)?
        .map_err(JobError::Handshake)?;

    debug!("Recorded handshake with {}", target.name);
    if let Err(e) = session.shutdown().await {
        debug!("Shutdown after recording {} failed: {}", target.name, e);
    }
    Ok(())
}
