// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Plain option structs. No CLI parsing lives in this crate; a host
// application fills these in from flags, a config file, or defaults.

use std::time::Duration;

/// Default permission bits for FIFO nodes and shared-memory segments.
pub const DEFAULT_MODE: u32 = 0o600;

/// Default suffix for the server-to-client FIFO.
pub const DEFAULT_S2C_SUFFIX: &str = ".p2s.smipc";

/// Default suffix for the client-to-server FIFO.
pub const DEFAULT_C2S_SUFFIX: &str = ".s2p.smipc";

/// Options governing a [`crate::server::Server`]'s directory and FIFO naming.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Permission bits applied to every FIFO node the server creates.
    pub mode: u32,
    /// Suffix appended to a channel key for the server-to-client FIFO.
    pub s2c_suffix: String,
    /// Suffix appended to a channel key for the client-to-server FIFO.
    pub c2s_suffix: String,
    /// Create the root directory if it does not already exist.
    pub make_root: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            mode: DEFAULT_MODE,
            s2c_suffix: DEFAULT_S2C_SUFFIX.to_string(),
            c2s_suffix: DEFAULT_C2S_SUFFIX.to_string(),
            make_root: true,
        }
    }
}

/// Options governing one [`crate::channel::Channel`]'s protocol behavior.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Upper bound on the number of shared-memory segments held by the pool.
    /// `-1` means unbounded.
    pub max_queue: i64,
    /// Force every send through SM-over-pipe, even payloads that would fit
    /// in a single direct pipe write. Useful for testing the SM path.
    pub force_sm_over_pipe: bool,
    /// Disable in-band `SM_RESTORE` messages; segments are never returned to
    /// the free list and every send allocates fresh.
    pub disable_restore_sm: bool,
    /// Deadline for opening both ends of the duplex pipe.
    pub open_timeout: Option<Duration>,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            max_queue: -1,
            force_sm_over_pipe: false,
            disable_restore_sm: false,
            open_timeout: Some(Duration::from_secs(5)),
        }
    }
}
