// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Reader/Writer wrap one end of an already-created FIFO node. Both open
// non-blocking first, then flip back to blocking once the fd is in hand —
// the same two-step dance `pipe.rs` in the retrieved ipckit crate uses to
// sidestep the open-blocks-until-peer-shows-up behavior FIFOs have by
// default while still getting blocking semantics for read/write.

use std::io;
use std::os::unix::io::RawFd;

use crate::platform::posix;

/// The read end of a named pipe.
pub struct Reader {
    fd: RawFd,
}

impl Reader {
    /// Open `path` for reading. Opens non-blocking, then clears
    /// `O_NONBLOCK` so [`Reader::read`] blocks until data or EOF.
    pub fn open(path: &str) -> io::Result<Self> {
        let fd = posix::open_read_nonblock(path)?;
        posix::clear_nonblocking(fd)?;
        Ok(Self { fd })
    }

    /// Open `path` for reading without clearing `O_NONBLOCK`. Used by
    /// [`super::DuplexPipe`]'s "fake reader" trick, where the fd is closed
    /// again immediately and never read from.
    pub(crate) fn open_nonblocking(path: &str) -> io::Result<Self> {
        let fd = posix::open_read_nonblock(path)?;
        Ok(Self { fd })
    }

    /// Open `path` for reading with a real blocking `open(2)` — this call
    /// does not return until a peer opens the same path for writing. Used
    /// by [`super::DuplexPipe`] as the synchronization point that proves
    /// the peer process is actually present.
    pub(crate) fn open_blocking(path: &str) -> io::Result<Self> {
        let fd = posix::open_read_blocking(path)?;
        Ok(Self { fd })
    }

    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        posix::read(self.fd, buf)
    }

    /// Read exactly `buf.len()` bytes, looping over short reads.
    pub fn read_exact(&self, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the pipe mid-frame",
                ));
            }
            filled += n;
        }
        Ok(())
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        posix::close(self.fd);
    }
}

/// The write end of a named pipe.
pub struct Writer {
    fd: RawFd,
}

impl Writer {
    /// Open `path` for writing. Opens non-blocking, then clears
    /// `O_NONBLOCK` so [`Writer::write_all`] blocks if the peer is slow to
    /// drain the pipe.
    pub fn open(path: &str) -> io::Result<Self> {
        let fd = posix::open_write_nonblock(path)?;
        posix::clear_nonblocking(fd)?;
        Ok(Self { fd })
    }

    /// Open `path` for writing without requiring a real reader to already
    /// be present. Briefly opens `path` as a non-blocking reader of our own
    /// (satisfying the kernel's "a reader exists" check for `O_WRONLY |
    /// O_NONBLOCK`), completes the real writer open, then drops the fake
    /// reader. This is what lets both ends of a duplex pipe open their
    /// writer side without waiting on the other process.
    pub fn open_with_fake_reader(path: &str) -> io::Result<Self> {
        let fake_reader = Reader::open_nonblocking(path)?;
        let fd = posix::open_write_nonblock(path);
        drop(fake_reader);
        let fd = fd?;
        posix::clear_nonblocking(fd)?;
        Ok(Self { fd })
    }

    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        posix::write(self.fd, buf)
    }

    pub fn write_all(&self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            buf = &buf[n..];
        }
        Ok(())
    }

    /// The OS's atomic-write size for this pipe (`PIPE_BUF`), used to decide
    /// whether a payload fits as a single direct write.
    pub fn pipe_buf(&self) -> usize {
        posix::get_pipe_buf(self.fd)
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        posix::close(self.fd);
    }
}
