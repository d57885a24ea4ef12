//! Per-client connection state.

use crate::daemon::dispatch::Dispatcher;
use crate::daemon::protocol::FrameBuffer;
use nix::poll::PollFlags;
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use tracing::{debug, warn};

const READ_CHUNK_SIZE: usize = 4096;

/// An accepted client socket with its partial-read and pending-write
/// buffers.
pub(super) struct Connection {
    pub(super) id: u64,
    pub(super) stream: UnixStream,
    inbound: FrameBuffer,
    outbound: Vec<u8>,
    closed: bool,
}

impl Connection {
    pub(super) fn new(id: u64, stream: UnixStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            id,
            stream,
            inbound: FrameBuffer::new(),
            outbound: Vec::new(),
            closed: false,
        })
    }

    /// Events this connection wants to be woken up for.
    pub(super) fn interest(&self) -> PollFlags {
        if self.outbound.is_empty() {
            PollFlags::POLLIN
        } else {
            PollFlags::POLLIN | PollFlags::POLLOUT
        }
    }

    pub(super) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drain the socket, dispatch every complete frame in arrival order and
    /// queue the responses.
    pub(super) fn on_readable(&mut self, dispatcher: &mut Dispatcher) {
        self.read_available();

        while let Some(request) = self.inbound.next_frame() {
            let response = dispatcher.dispatch(&request);
            match response.encode() {
                Ok(bytes) => self.outbound.extend_from_slice(&bytes),
                Err(e) => warn!(connection = self.id, "Dropping unencodable response: {e}"),
            }
        }

        self.flush();
    }

    /// Write as much pending output as the socket accepts.
    pub(super) fn flush(&mut self) {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => {
                    self.close("write returned zero bytes");
                    break;
                }
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.close(&format!("write failed: {e}"));
                    break;
                }
            }
        }
    }

    fn read_available(&mut self) {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.close("peer closed connection");
                    break;
                }
                Ok(n) => self.inbound.extend(&chunk[..n]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.close(&format!("read failed: {e}"));
                    break;
                }
            }
        }
    }

    fn close(&mut self, reason: &str) {
        if !self.closed {
            debug!(connection = self.id, "Closing connection: {reason}");
            self.closed = true;
        }
    }
}
