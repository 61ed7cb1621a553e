// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A FIFO node whose filesystem lifetime is tied to this handle: created on
// construction, removed on drop. Cleanup is idempotent and always safe to
// call more than once — both `Drop` and an explicit `cleanup()` route
// through the same unlink, which itself tolerates an already-missing node.

use std::io;

use crate::platform::posix;

/// Default permission bits for a temporary FIFO node.
pub const DEFAULT_MODE: u32 = 0o600;

/// Owns the lifetime of a FIFO node on disk.
pub struct TemporaryPipe {
    path: String,
    cleaned_up: bool,
}

impl TemporaryPipe {
    /// Create a FIFO node at `path` with `mode` permission bits.
    pub fn create(path: &str, mode: u32) -> io::Result<Self> {
        posix::mkfifo(path, mode)?;
        Ok(Self {
            path: path.to_string(),
            cleaned_up: false,
        })
    }

    /// Create with the default `0o600` permission bits.
    pub fn create_default(path: &str) -> io::Result<Self> {
        Self::create(path, DEFAULT_MODE)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Remove the FIFO node. Safe to call more than once, and safe to call
    /// whether or not the node still exists on disk.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        let _ = posix::unlink(&self.path);
        self.cleaned_up = true;
    }
}

impl Drop for TemporaryPipe {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn unique_path() -> String {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{}/smipc-temp-pipe-{}-{}", std::env::temp_dir().display(), std::process::id(), n)
    }

    #[test]
    fn create_then_cleanup_removes_node() {
        let path = unique_path();
        let mut pipe = TemporaryPipe::create_default(&path).unwrap();
        assert!(std::path::Path::new(&path).exists());
        pipe.cleanup();
        assert!(!std::path::Path::new(&path).exists());
    }

    #[test]
    fn double_cleanup_is_a_no_op() {
        let path = unique_path();
        let mut pipe = TemporaryPipe::create_default(&path).unwrap();
        pipe.cleanup();
        pipe.cleanup();
    }

    #[test]
    fn drop_cleans_up_without_explicit_call() {
        let path = unique_path();
        {
            let _pipe = TemporaryPipe::create_default(&path).unwrap();
            assert!(std::path::Path::new(&path).exists());
        }
        assert!(!std::path::Path::new(&path).exists());
    }

    #[test]
    fn cleanup_after_external_removal_does_not_error() {
        let path = unique_path();
        let mut pipe = TemporaryPipe::create_default(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        pipe.cleanup();
    }

    #[test]
    fn create_fails_when_path_is_a_regular_file() {
        let path = unique_path();
        std::fs::write(&path, b"not a fifo").unwrap();
        let result = TemporaryPipe::create_default(&path);
        assert!(result.is_err());
        std::fs::remove_file(&path).unwrap();
    }
}
