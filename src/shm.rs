// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Named POSIX shared memory handle. Delegates to platform::PlatformShm.

use std::io;

use crate::platform::posix::ShmMode;
use crate::platform::PlatformShm;

/// Open mode for shared memory segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmOpenMode {
    /// Create exclusively — fail if already exists.
    Create,
    /// Open existing — fail if it does not exist.
    Open,
    /// Create if missing, open if it already exists.
    CreateOrOpen,
}

/// A named, inter-process shared memory region backing one pool segment.
///
/// The mapped region includes a trailing `atomic<i32>` reference counter
/// shared between every process that maps the same segment; the segment's
/// backing file is unlinked automatically when the last handle drops.
pub struct ShmHandle {
    inner: PlatformShm,
}

impl ShmHandle {
    /// Acquire a named shared memory region of `size` bytes (user-visible).
    pub fn acquire(name: &str, size: usize, mode: ShmOpenMode) -> io::Result<Self> {
        let platform_mode = match mode {
            ShmOpenMode::Create => ShmMode::Create,
            ShmOpenMode::Open => ShmMode::Open,
            ShmOpenMode::CreateOrOpen => ShmMode::CreateOrOpen,
        };
        let inner = PlatformShm::acquire(name, size, platform_mode)?;
        Ok(Self { inner })
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.inner.as_ptr()
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.inner.as_mut_ptr()
    }

    pub fn mapped_size(&self) -> usize {
        self.inner.mapped_size()
    }

    pub fn user_size(&self) -> usize {
        self.inner.user_size()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn ref_count(&self) -> i32 {
        self.inner.ref_count()
    }

    pub fn unlink(&self) {
        self.inner.unlink();
    }

    /// Copy `data` into the segment. Caller ensures `data.len() <= user_size()`.
    pub fn write(&self, data: &[u8]) {
        debug_assert!(data.len() <= self.user_size());
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.as_mut_ptr(), data.len());
        }
    }

    /// Read `len` bytes out of the segment into an owned buffer.
    pub fn read(&self, len: usize) -> Vec<u8> {
        debug_assert!(len <= self.user_size());
        let mut out = vec![0u8; len];
        unsafe {
            std::ptr::copy_nonoverlapping(self.as_ptr(), out.as_mut_ptr(), len);
        }
        out
    }

    /// Remove a named shm segment by name without needing an open handle.
    pub fn unlink_by_name(name: &str) {
        PlatformShm::unlink_by_name(name);
    }

    pub fn clear_storage(name: &str) {
        PlatformShm::unlink_by_name(name);
    }
}
