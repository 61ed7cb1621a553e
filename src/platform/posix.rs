// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Raw POSIX syscall wrappers: named pipes (FIFOs) for the channel transport,
// and shared memory segments for the segment pool.

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::shm_name;

// ---------------------------------------------------------------------------
// FIFO nodes and endpoints
// ---------------------------------------------------------------------------

/// Create a FIFO node at `path` with the given permission bits.
///
/// Treats `EEXIST` as success as long as the existing node is itself a
/// FIFO: multiple processes racing to create the same node is the common
/// case for a channel whose key both sides already agree on. A path that
/// exists as something other than a FIFO (a regular file left over from a
/// previous run, say) is a hard error.
pub fn mkfifo(path: &str, mode: u32) -> io::Result<()> {
    let c_path = CString::new(path).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let ret = unsafe { libc::mkfifo(c_path.as_ptr(), mode as libc::mode_t) };
    if ret != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EEXIST) {
            return Err(err);
        }
        if !is_fifo(&c_path)? {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{path} exists and is not a FIFO"),
            ));
        }
    }
    Ok(())
}

fn is_fifo(c_path: &CString) -> io::Result<bool> {
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::stat(c_path.as_ptr(), &mut stat) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(stat.st_mode & libc::S_IFMT == libc::S_IFIFO)
}

/// Remove a FIFO node. Idempotent: a missing node is not an error.
pub fn unlink(path: &str) -> io::Result<()> {
    let c_path = CString::new(path).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let ret = unsafe { libc::unlink(c_path.as_ptr()) };
    if ret != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ENOENT) {
            return Err(err);
        }
    }
    Ok(())
}

/// Open `path` non-blocking, read-only.
pub fn open_read_nonblock(path: &str) -> io::Result<RawFd> {
    open_raw(path, libc::O_RDONLY | libc::O_NONBLOCK)
}

/// Open `path` with a real blocking `open(2)` read-only. Does not return
/// until a peer opens the same path for writing.
pub fn open_read_blocking(path: &str) -> io::Result<RawFd> {
    open_raw(path, libc::O_RDONLY)
}

/// Open `path` non-blocking, write-only.
pub fn open_write_nonblock(path: &str) -> io::Result<RawFd> {
    ignore_sigpipe();
    open_raw(path, libc::O_WRONLY | libc::O_NONBLOCK)
}

/// The kernel's default disposition for `SIGPIPE` terminates the process on
/// a write to a pipe with no remaining readers — e.g. a peer that crashed
/// mid-restore. That would turn a zombie-segment bookkeeping entry into a
/// process kill, which the pool's restore-failure policy explicitly rules
/// out (`SegmentPool::mark_zombie`; spec's zombie accounting is "a visible
/// list, not a panic"). Ignoring `SIGPIPE` once per process lets `write(2)`
/// return `EPIPE` instead, which the protocol engine already treats as an
/// ordinary I/O error.
fn ignore_sigpipe() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    });
}

/// Open `path` non-blocking, read-write. Used for the "fake reader" trick:
/// a writer can open read-write on its own FIFO non-blockingly without
/// ENXIO even before a real reader exists.
pub fn open_read_write_nonblock(path: &str) -> io::Result<RawFd> {
    open_raw(path, libc::O_RDWR | libc::O_NONBLOCK)
}

fn open_raw(path: &str, flags: libc::c_int) -> io::Result<RawFd> {
    let c_path = CString::new(path).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let fd = unsafe { libc::open(c_path.as_ptr(), flags) };
    if fd == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

/// Clear `O_NONBLOCK` on an already-open fd so subsequent reads/writes block.
pub fn clear_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
    if ret == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Set `O_NONBLOCK` on an already-open fd. Used when handing a reader fd to
/// an external event loop, which needs `EAGAIN` rather than a blocking read.
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if ret == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Query the OS's atomic-write size for a pipe/FIFO fd (`PIPE_BUF`).
/// Falls back to 4096 if the query fails, matching common Linux/BSD defaults.
pub fn get_pipe_buf(fd: RawFd) -> usize {
    let ret = unsafe { libc::fpathconf(fd, libc::_PC_PIPE_BUF) };
    if ret <= 0 {
        4096
    } else {
        ret as usize
    }
}

pub fn close(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

pub fn read(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

pub fn write(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

// ---------------------------------------------------------------------------
// PlatformShm — POSIX shared memory, backing the segment pool
// ---------------------------------------------------------------------------

/// # Safety
/// `mem` must point to a valid mapped region of at least `total_size` bytes.
unsafe fn acc_of(mem: *mut u8, total_size: usize) -> &'static AtomicI32 {
    let offset = total_size - std::mem::size_of::<AtomicI32>();
    &*(mem.add(offset) as *const AtomicI32)
}

/// Mirrors the teacher's `calc_size()`: rounds `user_size` up to
/// `align_of::<AtomicI32>()` before appending the trailing ref-counter, so
/// the counter `acc_of()` reads back out is never misaligned regardless of
/// the caller's payload size.
const ALIGN: usize = std::mem::align_of::<AtomicI32>();

fn calc_size(user_size: usize) -> usize {
    let aligned = ((user_size.wrapping_sub(1) / ALIGN) + 1) * ALIGN;
    aligned + std::mem::size_of::<AtomicI32>()
}

pub struct PlatformShm {
    mem: *mut u8,
    size: usize,
    user_size: usize,
    name: String,
    prev_ref: i32,
}

// Safety: the shared memory region is process-shared by design.
unsafe impl Send for PlatformShm {}
unsafe impl Sync for PlatformShm {}

/// Open mode flags for [`PlatformShm::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmMode {
    Create,
    Open,
    CreateOrOpen,
}

impl PlatformShm {
    pub fn acquire(name: &str, user_size: usize, mode: ShmMode) -> io::Result<Self> {
        if name.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "name is empty"));
        }
        if user_size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "size is 0"));
        }

        let posix_name = shm_name::make_shm_name(name);
        let c_name = CString::new(posix_name.as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let perms: libc::mode_t = 0o600;
        let create_total_size = calc_size(user_size);

        let (fd, need_truncate) = match mode {
            ShmMode::Create => {
                let f = unsafe {
                    libc::shm_open(
                        c_name.as_ptr(),
                        libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                        perms as libc::c_uint,
                    )
                };
                if f == -1 {
                    return Err(io::Error::last_os_error());
                }
                (f, true)
            }
            ShmMode::Open => {
                let f =
                    unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, perms as libc::c_uint) };
                if f == -1 {
                    return Err(io::Error::last_os_error());
                }
                (f, false)
            }
            ShmMode::CreateOrOpen => {
                let f = unsafe {
                    libc::shm_open(
                        c_name.as_ptr(),
                        libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
                        perms as libc::c_uint,
                    )
                };
                if f != -1 {
                    (f, true)
                } else {
                    let e = io::Error::last_os_error();
                    if e.raw_os_error() != Some(libc::EEXIST) {
                        return Err(e);
                    }
                    let f2 = unsafe {
                        libc::shm_open(c_name.as_ptr(), libc::O_RDWR, perms as libc::c_uint)
                    };
                    if f2 == -1 {
                        return Err(io::Error::last_os_error());
                    }
                    (f2, false)
                }
            }
        };

        unsafe { libc::fchmod(fd, perms) };

        // For a freshly created object the size is whatever the caller asked
        // for. For one we merely opened, the object may have been created by
        // the pool with a larger capacity than this call's `user_size` (a
        // reused segment). The trailing ref-counter lives at a fixed offset
        // from the *real* end of the object, so opening must read that real
        // size back with `fstat` rather than trust the caller's `user_size` —
        // otherwise the two sides of the mapping disagree on where the
        // counter is.
        let total_size = if need_truncate {
            let ret = unsafe { libc::ftruncate(fd, create_total_size as libc::off_t) };
            if ret != 0 {
                let err = io::Error::last_os_error();
                unsafe { libc::close(fd) };
                return Err(err);
            }
            create_total_size
        } else {
            let mut stat: libc::stat = unsafe { std::mem::zeroed() };
            if unsafe { libc::fstat(fd, &mut stat) } != 0 {
                let err = io::Error::last_os_error();
                unsafe { libc::close(fd) };
                return Err(err);
            }
            stat.st_size as usize
        };
        let real_user_size = total_size.saturating_sub(std::mem::size_of::<AtomicI32>());

        Self::mmap_and_finish(fd, total_size, real_user_size, posix_name)
    }

    fn mmap_and_finish(
        fd: i32,
        total_size: usize,
        user_size: usize,
        posix_name: String,
    ) -> io::Result<Self> {
        let mem = unsafe {
            libc::mmap(
                ptr::null_mut(),
                total_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };

        if mem == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let prev = unsafe { acc_of(mem as *mut u8, total_size).fetch_add(1, Ordering::AcqRel) };

        Ok(Self {
            mem: mem as *mut u8,
            size: total_size,
            user_size,
            name: posix_name,
            prev_ref: prev,
        })
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.mem
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mem
    }

    pub fn mapped_size(&self) -> usize {
        self.size
    }

    pub fn user_size(&self) -> usize {
        self.user_size
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prev_ref_count(&self) -> i32 {
        self.prev_ref
    }

    pub fn ref_count(&self) -> i32 {
        if self.mem.is_null() || self.size == 0 {
            return 0;
        }
        unsafe { acc_of(self.mem, self.size).load(Ordering::Acquire) }
    }

    /// Force-remove the backing file (`shm_unlink`). Does not release the mapping.
    pub fn unlink(&self) {
        if let Ok(c_name) = CString::new(self.name.as_bytes()) {
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
        }
    }

    pub fn unlink_by_name(name: &str) {
        let posix_name = shm_name::make_shm_name(name);
        if let Ok(c_name) = CString::new(posix_name.as_bytes()) {
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
        }
    }
}

impl Drop for PlatformShm {
    fn drop(&mut self) {
        if self.mem.is_null() {
            return;
        }
        let prev = unsafe { acc_of(self.mem, self.size).fetch_sub(1, Ordering::AcqRel) };
        unsafe { libc::munmap(self.mem as *mut libc::c_void, self.size) };
        if prev <= 1 {
            self.unlink();
        }
    }
}
