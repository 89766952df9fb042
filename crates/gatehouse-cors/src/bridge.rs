//! Debug log bridge.
//!
//! Relays the engine's diagnostic lines to the gateway [`Logger`]. The engine
//! writes into an in-memory pipe; a relay task reads it in chunks of up to
//! [`RELAY_CHUNK_SIZE`] bytes and forwards each chunk to
//! [`Logger::debug`].
//!
//! The relay belongs to the engine. Dropping the engine closes the pipe and
//! the relay exits once every buffered line has been forwarded. A read
//! failure or [`LogBridge::shutdown`] stops it early.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use gatehouse_core::Logger;
use gatehouse_server::ShutdownSignal;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::engine::CorsEngine;

/// Maximum bytes forwarded per logger call.
pub const RELAY_CHUNK_SIZE: usize = 1024;

/// Creates an unbounded in-memory byte pipe.
pub fn pipe() -> (PipeReader, PipeWriter) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        PipeReader {
            receiver,
            pending: Bytes::new(),
        },
        PipeWriter { sender },
    )
}

/// The write end of a [`pipe`]. Writes never block.
#[derive(Debug, Clone)]
pub struct PipeWriter {
    sender: mpsc::UnboundedSender<Bytes>,
}

impl io::Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.sender
            .send(Bytes::copy_from_slice(buf))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "log pipe reader closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The read end of a [`pipe`].
///
/// Reads return `0` once every writer has been dropped and all written bytes
/// have been consumed.
#[derive(Debug)]
pub struct PipeReader {
    receiver: mpsc::UnboundedReceiver<Bytes>,
    pending: Bytes,
}

impl AsyncRead for PipeReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pending.is_empty() {
            match this.receiver.poll_recv(cx) {
                Poll::Ready(Some(chunk)) => this.pending = chunk,
                // Closed: leave `buf` untouched to signal EOF.
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }

        let n = buf.remaining().min(this.pending.len());
        buf.put_slice(&this.pending[..n]);
        this.pending.advance(n);
        Poll::Ready(Ok(()))
    }
}

/// A running relay task.
///
/// Dropping the bridge detaches the relay; it keeps draining until the pipe
/// closes.
#[derive(Debug)]
pub struct LogBridge {
    shutdown: ShutdownSignal,
    handle: JoinHandle<()>,
}

impl LogBridge {
    /// Starts relaying `reader` to `logger` on `runtime`.
    pub fn spawn(runtime: &Handle, reader: PipeReader, logger: Arc<dyn Logger>) -> Self {
        let shutdown = ShutdownSignal::new();
        let handle = runtime.spawn(relay(reader, logger, shutdown.clone()));
        Self { shutdown, handle }
    }

    /// Stops the relay once the lines already in the pipe are forwarded.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Returns `true` once the relay task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Routes `engine` diagnostics to `logger.debug`.
///
/// Needs a Tokio runtime for the relay task. Without one the bridge is not
/// attached and a warning is logged.
pub fn attach_debug_bridge(engine: &mut CorsEngine, logger: Arc<dyn Logger>) {
    let runtime = match Handle::try_current() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::warn!(error = %e, "No Tokio runtime, CORS debug output will not be relayed");
            return;
        }
    };

    let (reader, writer) = pipe();
    engine.set_log_writer(writer);
    engine.set_bridge(LogBridge::spawn(&runtime, reader, logger));
    tracing::debug!("CORS debug bridge attached");
}

async fn relay(mut reader: PipeReader, logger: Arc<dyn Logger>, shutdown: ShutdownSignal) {
    let mut buf = [0u8; RELAY_CHUNK_SIZE];

    loop {
        tokio::select! {
            // Pending lines win over cancellation.
            biased;
            result = reader.read(&mut buf) => match result {
                Ok(0) => {
                    tracing::debug!("CORS log pipe closed, relay stopped");
                    break;
                }
                Ok(n) => {
                    let text = String::from_utf8_lossy(&buf[..n]);
                    logger.debug(text.trim_end_matches('\n'));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "CORS log relay read failed, relay stopped");
                    break;
                }
            },
            () = shutdown.recv() => {
                tracing::debug!("CORS log relay cancelled");
                break;
            }
        }
    }
}
