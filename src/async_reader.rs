// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Event-loop-driven reader integration. Registers the channel's reader fd
// with tokio's reactor and dispatches one user callback per readable
// message; `SM_RESTORE` control frames never reach the callback, they're
// absorbed by `ProtocolEngine::recv_for_async` the same way the synchronous
// path absorbs them.
//
// While an `AsyncReader` owns a channel, the channel's synchronous `recv()`
// is disabled (`Channel::set_async_owned`) — mixing the two would race two
// readers on the same fd.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use tokio::io::unix::AsyncFd;

use crate::channel::Channel;
use crate::error::{Result, SmipcError};

struct RawFdSource(RawFd);

impl AsRawFd for RawFdSource {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// Drives a channel's reader side from a tokio event loop.
pub struct AsyncReader<'a> {
    channel: &'a mut Channel,
    async_fd: AsyncFd<RawFdSource>,
}

impl<'a> AsyncReader<'a> {
    /// Take async ownership of `channel`'s reader side. Disables
    /// synchronous `recv()` for the lifetime of this `AsyncReader`.
    pub fn new(channel: &'a mut Channel) -> io::Result<Self> {
        channel.set_reader_nonblocking()?;
        let fd = channel.reader_raw_fd();
        let async_fd = AsyncFd::new(RawFdSource(fd))?;
        channel.set_async_owned(true);
        Ok(Self { channel, async_fd })
    }

    /// Wait for the next user-visible message. Internally loops over any
    /// number of readable-fd wakeups and `SM_RESTORE` control frames with
    /// no user-visible callback for either.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let mut guard = self.async_fd.readable_mut().await.map_err(SmipcError::Io)?;
            match self.channel.engine_mut().recv_for_async() {
                Ok(msg) => return Ok(msg),
                Err(SmipcError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    guard.clear_ready();
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Drop for AsyncReader<'_> {
    fn drop(&mut self) {
        self.channel.set_async_owned(false);
    }
}
