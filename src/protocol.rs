// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Opcode dispatch sitting directly on top of one duplex pipe: decides
// whether an outgoing payload fits as a direct inline write or needs to be
// routed through a pooled shared-memory segment, and on the receiving side
// transparently absorbs `SM_RESTORE` control frames before handing a real
// payload back to the caller.

use crate::config::ChannelOptions;
use crate::error::{Result, SmipcError};
use crate::fifo::DuplexPipe;
use crate::header::{Header, Opcode, HEADER_SIZE};
use crate::pool::{SegmentPool, ZombieSegment};
use crate::shm::{ShmHandle, ShmOpenMode};

/// Drives the wire protocol over one already-opened duplex pipe.
pub struct ProtocolEngine {
    duplex: DuplexPipe,
    pool: SegmentPool,
    writer_threshold: usize,
    options: ChannelOptions,
    async_owned: bool,
}

impl ProtocolEngine {
    pub fn new(duplex: DuplexPipe, pool_prefix: impl Into<String>, options: ChannelOptions) -> Self {
        let writer_threshold = duplex.writer.pipe_buf().saturating_sub(HEADER_SIZE);
        let pool = SegmentPool::new(pool_prefix, options.max_queue);
        Self {
            duplex,
            pool,
            writer_threshold,
            options,
            async_owned: false,
        }
    }

    /// Mark this engine as owned by an async reader; subsequent calls to
    /// [`ProtocolEngine::recv`] will fail with
    /// [`SmipcError::AsyncRecvDisabled`].
    pub fn set_async_owned(&mut self, owned: bool) {
        self.async_owned = owned;
    }

    pub fn zombies(&self) -> &[ZombieSegment] {
        self.pool.zombies()
    }

    /// Send one message. Payloads at or under the writer's `PIPE_BUF - 8`
    /// threshold go inline; larger payloads are copied into a pooled
    /// shared-memory segment and only the segment name crosses the pipe.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.options.force_sm_over_pipe && data.len() <= self.writer_threshold {
            self.send_direct(data)
        } else {
            self.send_over_sm(data)
        }
    }

    fn send_direct(&mut self, data: &[u8]) -> Result<()> {
        let header = Header::pipe_direct(data.len() as u16);
        self.duplex.writer.write_all(&header.encode())?;
        self.duplex.writer.write_all(data)?;
        Ok(())
    }

    fn send_over_sm(&mut self, data: &[u8]) -> Result<()> {
        let name = {
            let segment = self.pool.acquire(data.len())?;
            segment.write(data);
            segment.name().to_string()
        };
        let header = Header::sm_over_pipe(name.len() as u16, data.len() as u32);
        self.duplex.writer.write_all(&header.encode())?;
        self.duplex.writer.write_all(name.as_bytes())?;
        Ok(())
    }

    /// Send a restore notification for a segment this engine previously
    /// received over shared memory. Failures are reported to the caller but
    /// do not corrupt engine state; the caller (the channel) is responsible
    /// for surfacing zombie accounting on the *sending* side, not here.
    fn send_restore(&mut self, name: &str) -> Result<()> {
        if self.options.disable_restore_sm {
            return Ok(());
        }
        let header = Header::sm_restore(name.len() as u16);
        self.duplex.writer.write_all(&header.encode())?;
        self.duplex.writer.write_all(name.as_bytes())?;
        Ok(())
    }

    /// Receive the next user-visible message, transparently absorbing any
    /// number of `SM_RESTORE` control frames first. Returns `Ok(None)` once
    /// the peer has closed its write end (EOF).
    pub fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        if self.async_owned {
            return Err(SmipcError::AsyncRecvDisabled);
        }
        self.recv_inner()
    }

    /// Entry point used by the async reader integration, which bypasses the
    /// `async_owned` guard because it *is* the owner.
    pub(crate) fn recv_for_async(&mut self) -> Result<Option<Vec<u8>>> {
        self.recv_inner()
    }

    /// Raw fd of the reader side, for registering with an external event
    /// loop. See [`crate::async_reader`].
    pub fn reader_raw_fd(&self) -> std::os::unix::io::RawFd {
        self.duplex.reader.as_raw_fd()
    }

    fn recv_inner(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let mut header_buf = [0u8; HEADER_SIZE];
            let n = self.read_fill(&mut header_buf)?;
            if n == 0 {
                return Ok(None);
            }
            let header = Header::decode(&header_buf)?;
            match header.opcode {
                Opcode::PipeDirect => {
                    let mut data = vec![0u8; header.pipe_data_size as usize];
                    self.duplex.reader.read_exact(&mut data)?;
                    return Ok(Some(data));
                }
                Opcode::SmOverPipe => {
                    let mut name_buf = vec![0u8; header.pipe_data_size as usize];
                    self.duplex.reader.read_exact(&mut name_buf)?;
                    let name = String::from_utf8(name_buf)
                        .map_err(|e| SmipcError::Protocol(format!("invalid segment name: {e}")))?;
                    let handle =
                        ShmHandle::acquire(&name, header.sm_data_size as usize, ShmOpenMode::Open)?;
                    let data = handle.read(header.sm_data_size as usize);
                    drop(handle);
                    if let Err(e) = self.send_restore(&name) {
                        tracing::warn!(segment = %name, error = %e, "failed to notify peer of segment restore");
                        self.pool.mark_zombie(&name, header.sm_data_size as usize);
                    }
                    return Ok(Some(data));
                }
                Opcode::SmRestore => {
                    let mut name_buf = vec![0u8; header.pipe_data_size as usize];
                    self.duplex.reader.read_exact(&mut name_buf)?;
                    let name = String::from_utf8(name_buf)
                        .map_err(|e| SmipcError::Protocol(format!("invalid segment name: {e}")))?;
                    if let Err(e) = self.pool.restore(&name) {
                        tracing::warn!(segment = %name, error = %e, "restore for unknown segment");
                    }
                    tracing::debug!(segment = %name, "segment restored to pool");
                    // Control frame only; loop for the next real message.
                }
            }
        }
    }

    fn read_fill(&self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.duplex.reader.read(&mut buf[filled..])?;
            if n == 0 {
                return Ok(0);
            }
            filled += n;
        }
        Ok(filled)
    }
}
