//! The event loop.

use super::connection::Connection;
use super::core::{TrackerServer, POLL_TIMEOUT_MS};
use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::io;
use std::os::fd::AsFd;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

impl TrackerServer {
    /// Serve requests until [`TrackerServer::shutdown`] is called.
    ///
    /// # Returns
    /// `Ok(())` once the shutdown flag is observed, or the error that made
    /// polling the socket set fail
    pub fn run(&mut self) -> Result<()> {
        info!(socket = %self.config.socket_path.display(), "Tracker server listening");

        while !self.shutdown_flag.load(Ordering::Relaxed) {
            self.poll_once(POLL_TIMEOUT_MS)?;
        }

        info!("Tracker server stopped");
        self.connections.clear();
        Ok(())
    }

    /// One reactor iteration: wait up to `timeout_ms` for readiness, then
    /// serve every ready connection and accept pending clients.
    ///
    /// # Arguments
    /// * `timeout_ms` - How long to wait for readiness before returning
    ///
    /// # Returns
    /// `Ok(())` after serving whatever became ready, including nothing
    pub fn poll_once(&mut self, timeout_ms: u16) -> Result<()> {
        let Some(readiness) = self.wait(timeout_ms)? else {
            return Ok(());
        };
        let (listener_events, connection_events) = readiness
            .split_first()
            .context("poll returned no listener entry")?;

        for (index, events) in connection_events.iter().enumerate() {
            let connection = &mut self.connections[index];
            if events.intersects(
                PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL,
            ) {
                connection.on_readable(&mut self.dispatcher);
            }
            if events.contains(PollFlags::POLLOUT) {
                connection.flush();
            }
        }

        self.connections.retain(|connection| {
            if connection.is_closed() {
                debug!(connection = connection.id, "Connection released");
            }
            !connection.is_closed()
        });

        if listener_events.contains(PollFlags::POLLIN) {
            self.accept_pending();
        }
        Ok(())
    }

    /// Returned events for the listener followed by every connection, or
    /// `None` when nothing became ready.
    fn wait(&self, timeout_ms: u16) -> Result<Option<Vec<PollFlags>>> {
        let mut fds = Vec::with_capacity(self.connections.len() + 1);
        fds.push(PollFd::new(self.listener.as_fd(), PollFlags::POLLIN));
        for connection in &self.connections {
            fds.push(PollFd::new(connection.stream.as_fd(), connection.interest()));
        }

        match poll(&mut fds, PollTimeout::from(timeout_ms)) {
            Ok(0) | Err(Errno::EINTR) => Ok(None),
            Ok(_) => Ok(Some(
                fds.iter()
                    .map(|fd| fd.revents().unwrap_or(PollFlags::empty()))
                    .collect(),
            )),
            Err(e) => Err(e).context("poll failed"),
        }
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    let id = self.next_connection_id;
                    self.next_connection_id += 1;
                    match Connection::new(id, stream) {
                        Ok(connection) => {
                            debug!(connection = id, "Incoming connection");
                            self.connections.push(connection);
                        }
                        Err(e) => warn!("Failed to set up connection: {e}"),
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Accept error: {e}");
                    break;
                }
            }
        }
    }
}
