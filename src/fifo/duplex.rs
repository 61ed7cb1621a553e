// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Opens both ends of a bidirectional pair of FIFOs without either process
// blocking on the other. The writer side opens via the fake-reader trick
// (see `Writer::open_with_fake_reader`) so it never waits on a peer; the
// reader side uses a real blocking open, run on its own thread and joined
// with a deadline, so a peer that never shows up surfaces as a timeout
// instead of hanging the caller forever.

use std::thread;
use std::time::Duration;

use crate::error::{Result, SmipcError};

use super::{Reader, Writer};

/// One fully-opened bidirectional pipe: a writer to the peer and a reader
/// from the peer.
pub struct DuplexPipe {
    pub reader: Reader,
    pub writer: Writer,
}

impl DuplexPipe {
    /// Open `write_path` (this side's outbound FIFO) and `read_path` (this
    /// side's inbound FIFO) in parallel, failing with
    /// [`SmipcError::OpenTimeout`] if the peer hasn't opened its end of
    /// `read_path` within `timeout`.
    pub fn open(write_path: &str, read_path: &str, timeout: Duration) -> Result<Self> {
        let read_path_owned = read_path.to_string();
        let reader_handle =
            thread::spawn(move || Reader::open_blocking(&read_path_owned).map_err(SmipcError::from));

        let writer = Writer::open_with_fake_reader(write_path)?;

        let reader = join_with_timeout(reader_handle, timeout)?;
        Ok(Self { reader, writer })
    }
}

fn join_with_timeout<T: Send + 'static>(
    handle: thread::JoinHandle<Result<T>>,
    timeout: Duration,
) -> Result<T> {
    let start = std::time::Instant::now();
    loop {
        if handle.is_finished() {
            return match handle.join() {
                Ok(result) => result,
                Err(_) => Err(SmipcError::Protocol("reader thread panicked".to_string())),
            };
        }
        if start.elapsed() >= timeout {
            return Err(SmipcError::OpenTimeout(timeout));
        }
        thread::sleep(Duration::from_millis(5));
    }
}
