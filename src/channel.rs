// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// One bidirectional message channel: two FIFO nodes under `root/{key}{suffix}`
// and a protocol engine driving them. The server side creates and owns the
// FIFO nodes (it unlinks them on close); the client side only opens the
// existing nodes with the read/write roles flipped and never unlinks them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ChannelOptions;
use crate::error::{Result, SmipcError};
use crate::fifo::{DuplexPipe, TemporaryPipe};
use crate::pool::ZombieSegment;
use crate::protocol::ProtocolEngine;

fn join_path(root: &Path, key: &str, suffix: &str) -> PathBuf {
    root.join(format!("{key}{suffix}"))
}

/// Owns the lifetime of the two FIFO nodes for one channel key. Only the
/// server side constructs this; the client side talks to the same nodes
/// without ever creating or unlinking them.
struct OwnedNodes {
    s2c: TemporaryPipe,
    c2s: TemporaryPipe,
}

/// A bound, bidirectional message channel.
pub struct Channel {
    key: String,
    engine: ProtocolEngine,
    nodes: Option<OwnedNodes>,
}

impl Channel {
    /// Server-side constructor: creates both FIFO nodes under `root` for
    /// `key`, then opens them (server writes to the s2c node, reads from
    /// the c2s node).
    pub fn bind_server(
        root: &Path,
        key: &str,
        mode: u32,
        s2c_suffix: &str,
        c2s_suffix: &str,
        options: ChannelOptions,
    ) -> Result<Self> {
        let s2c_path = join_path(root, key, s2c_suffix);
        let c2s_path = join_path(root, key, c2s_suffix);

        let s2c = TemporaryPipe::create(s2c_path.to_string_lossy().as_ref(), mode)?;
        let c2s = TemporaryPipe::create(c2s_path.to_string_lossy().as_ref(), mode)?;

        let timeout = options.open_timeout.unwrap_or(Duration::from_secs(5));
        let duplex = DuplexPipe::open(s2c.path(), c2s.path(), timeout)?;

        let pool_prefix = format!("{key}.s2c");
        let engine = ProtocolEngine::new(duplex, pool_prefix, options);

        Ok(Self {
            key: key.to_string(),
            engine,
            nodes: Some(OwnedNodes { s2c, c2s }),
        })
    }

    /// Client-side constructor: opens the already-existing FIFO nodes under
    /// `root` for `key` with the read/write roles flipped (client writes to
    /// the c2s node, reads from the s2c node). Does not own node lifecycle.
    pub fn connect_client(
        root: &Path,
        key: &str,
        s2c_suffix: &str,
        c2s_suffix: &str,
        options: ChannelOptions,
    ) -> Result<Self> {
        let s2c_path = join_path(root, key, s2c_suffix);
        let c2s_path = join_path(root, key, c2s_suffix);

        if !s2c_path.exists() || !c2s_path.exists() {
            return Err(SmipcError::Config(format!(
                "channel nodes for key '{key}' do not exist under {}",
                root.display()
            )));
        }

        let timeout = options.open_timeout.unwrap_or(Duration::from_secs(5));
        let duplex = DuplexPipe::open(
            c2s_path.to_string_lossy().as_ref(),
            s2c_path.to_string_lossy().as_ref(),
            timeout,
        )?;

        let pool_prefix = format!("{key}.c2s");
        let engine = ProtocolEngine::new(duplex, pool_prefix, options);

        Ok(Self {
            key: key.to_string(),
            engine,
            nodes: None,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.engine.send(data)
    }

    pub fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        self.engine.recv()
    }

    pub(crate) fn engine_mut(&mut self) -> &mut ProtocolEngine {
        &mut self.engine
    }

    /// Raw fd of this channel's reader side, for registering with an
    /// external event loop. See [`crate::async_reader`].
    pub fn reader_raw_fd(&self) -> std::os::unix::io::RawFd {
        self.engine.reader_raw_fd()
    }

    /// Disable (or re-enable) synchronous `recv()` on this channel. An
    /// async reader sets this to `true` for the duration of its ownership.
    pub fn set_async_owned(&mut self, owned: bool) {
        self.engine.set_async_owned(owned);
    }

    /// Put the reader fd into non-blocking mode for use with an external
    /// event loop. See [`crate::async_reader`].
    pub fn set_reader_nonblocking(&mut self) -> std::io::Result<()> {
        crate::platform::posix::set_nonblocking(self.reader_raw_fd())
    }

    pub fn zombies(&self) -> &[ZombieSegment] {
        self.engine.zombies()
    }

    /// Whether this side owns (and will unlink) the underlying FIFO nodes.
    pub fn owns_nodes(&self) -> bool {
        self.nodes.is_some()
    }

    /// Explicitly unlink the FIFO nodes. A no-op on the client side, and
    /// idempotent on the server side.
    pub fn unlink(&mut self) {
        if let Some(nodes) = self.nodes.as_mut() {
            nodes.s2c.cleanup();
            nodes.c2s.cleanup();
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.unlink();
    }
}
