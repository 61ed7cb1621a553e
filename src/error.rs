// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

use std::io;

use thiserror::Error;

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SmipcError>;

/// All ways a channel, server, or protocol operation can fail.
#[derive(Debug, Error)]
pub enum SmipcError {
    /// A raw OS failure (open/read/write/mmap/etc).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Invalid server/channel configuration: suffix collision, non-directory
    /// root, duplicate channel key, or a FIFO node missing when expected.
    #[error("configuration error: {0}")]
    Config(String),

    /// The duplex pipe failed to finish opening both ends before its deadline.
    #[error("timed out opening duplex pipe after {0:?}")]
    OpenTimeout(std::time::Duration),

    /// The segment pool could not satisfy an allocation under its `max_queue` bound.
    #[error("segment pool exhausted (max_queue={0})")]
    QueueExhausted(i64),

    /// A restore or read referenced a segment name the pool does not know about.
    #[error("unknown segment: {0}")]
    SegmentNotFound(String),

    /// A framing or opcode-level violation of the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A send was attempted on a channel opened for the receiver role.
    #[error("channel is not the sender side")]
    NotSender,

    /// A recv was attempted on a channel opened for the sender role.
    #[error("channel is not the receiver side")]
    NotReceiver,

    /// A synchronous `recv()` was called while an async reader owns the channel.
    #[error("recv() is disabled while an async reader is registered; use the callback interface")]
    AsyncRecvDisabled,
}
