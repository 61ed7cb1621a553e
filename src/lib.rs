// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Bidirectional, message-oriented local IPC transport over a pair of named
// pipes, with large payloads routed out-of-band through pooled POSIX
// shared-memory segments advertised over the pipe.

pub mod error;
pub use error::{Result, SmipcError};

pub mod config;

pub mod shm_name;

mod platform;

mod shm;
pub use shm::{ShmHandle, ShmOpenMode};

pub mod header;

pub mod fifo;

pub mod pool;
pub use pool::{SegmentPool, ZombieSegment};

pub mod protocol;
pub use protocol::ProtocolEngine;

pub mod channel;
pub use channel::Channel;

pub mod server;
pub use server::Server;

#[cfg(feature = "tokio-reactor")]
pub mod async_reader;
#[cfg(feature = "tokio-reactor")]
pub use async_reader::AsyncReader;

pub mod cuda;
pub use cuda::CudaIpcPacket;
