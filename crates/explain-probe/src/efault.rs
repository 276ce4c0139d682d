//! Fault probe and caller-argument wrappers.
//!
//! ## Design
//!
//! Whether a user pointer is readable is asked of the kernel, not the MMU:
//! one byte from every page the region touches is written into a private
//! non-blocking pipe. `write(2)` copies from user space and reports
//! `EFAULT` instead of delivering `SIGSEGV`, so the probe cannot crash the
//! process. The pipe is drained and closed before returning; nothing
//! outside it is touched.
//!
//! ```text
//! ptr ─┐            len
//!      ▼◄──────────────────────────►
//! ─────┬────────┬────────┬────────┬─────
//!      │ page 0 │ page 1 │ page 2 │        one probe byte per page
//! ─────┴────────┴────────┴────────┴─────
//! ```
//!
//! [`UserStr`] and [`UserBuf`] carry the arguments a caller passed to the
//! failed call: absent (NULL), borrowed Rust data, or a raw pointer that
//! is probed before it is ever dereferenced.

use std::borrow::Cow;
use std::ffi::{c_char, CStr};
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use explain_core::{ktrace, StringBuffer};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd::pipe2;

/// Longest C string [`is_efault_cstr`] will walk.
const MAX_CSTR: usize = 1 << 20;

fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if n > 0 {
        n as usize
    } else {
        4096
    }
}

struct ProbePipe {
    rd: OwnedFd,
    wr: OwnedFd,
}

impl ProbePipe {
    fn new() -> Option<Self> {
        match pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC) {
            Ok((rd, wr)) => Some(Self { rd, wr }),
            Err(e) => {
                ktrace!("efault probe: pipe2 failed: {}", e);
                None
            }
        }
    }

    /// True when the byte at `addr` cannot be read.
    fn faults(&self, addr: *const u8) -> bool {
        // SAFETY: the kernel validates `addr`; a bad address yields EFAULT.
        let n = unsafe { libc::write(self.wr.as_raw_fd(), addr as *const libc::c_void, 1) };
        if n < 0 {
            return Errno::last() == Errno::EFAULT;
        }
        let mut b = [0u8; 1];
        let _ = nix::unistd::read(self.rd.as_raw_fd(), &mut b);
        false
    }
}

/// True when any byte of `[ptr, ptr + len)` is inaccessible.
///
/// A null pointer always faults. If the probe pipe cannot be created the
/// region is assumed accessible.
pub fn is_efault(ptr: *const u8, len: usize) -> bool {
    if ptr.is_null() {
        return true;
    }
    if len == 0 {
        return false;
    }
    let Some(pipe) = ProbePipe::new() else {
        return false;
    };
    let page = page_size();
    let start = ptr as usize;
    let Some(end) = start.checked_add(len) else {
        return true;
    };
    if pipe.faults(ptr) {
        return true;
    }
    let mut addr = (start / page + 1) * page;
    while addr < end {
        if pipe.faults(addr as *const u8) {
            return true;
        }
        addr += page;
    }
    false
}

/// Length of the NUL-terminated string at `ptr`, or `None` if any byte up
/// to and including the terminator is inaccessible.
pub fn is_efault_cstr(ptr: *const c_char) -> Option<usize> {
    if ptr.is_null() {
        return None;
    }
    let pipe = ProbePipe::new()?;
    let page = page_size();
    let start = ptr as usize;
    let mut addr = start;
    while addr - start < MAX_CSTR {
        if pipe.faults(addr as *const u8) {
            return None;
        }
        let page_end = (addr / page + 1) * page;
        while addr < page_end {
            // SAFETY: the page containing addr was just shown readable.
            if unsafe { *(addr as *const u8) } == 0 {
                return Some(addr - start);
            }
            addr += 1;
        }
    }
    None
}

// ── Caller arguments ──────────────────────────────────────────────

/// What a pointer argument turned out to hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probed<'a> {
    Null,
    Fault,
    Bytes(Cow<'a, [u8]>),
}

impl Probed<'_> {
    /// Detach from the caller's memory.
    pub fn into_owned(self) -> Probed<'static> {
        match self {
            Probed::Null => Probed::Null,
            Probed::Fault => Probed::Fault,
            Probed::Bytes(b) => Probed::Bytes(Cow::Owned(b.into_owned())),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Probed::Bytes(b) => Some(&b[..]),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Probed::Null)
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Probed::Fault)
    }

    /// Print as a quoted string, `NULL`, or `<efault>`.
    pub fn print(&self, sb: &mut StringBuffer) {
        match self {
            Probed::Null => sb.push_quoted(None),
            Probed::Fault => sb.push_efault(),
            Probed::Bytes(b) => sb.push_quoted(Some(&b[..])),
        }
    }

    pub fn print_path(&self, sb: &mut StringBuffer) {
        match self {
            Probed::Null => sb.push_quoted(None),
            Probed::Fault => sb.push_efault(),
            Probed::Bytes(b) => sb.push_quoted_path(b),
        }
    }
}

/// A string argument (pathname, hostname) as passed to the failed call.
#[derive(Debug, Clone, Copy)]
pub enum UserStr<'a> {
    Null,
    Bytes(&'a [u8]),
    Raw(*const c_char),
}

impl<'a> UserStr<'a> {
    /// Wrap a raw C pointer.
    ///
    /// # Safety
    ///
    /// `ptr` is only dereferenced after the fault probe has shown the
    /// bytes readable, but the caller must ensure the memory is not
    /// unmapped concurrently while the explanation is built.
    pub unsafe fn from_ptr(ptr: *const c_char) -> Self {
        if ptr.is_null() {
            UserStr::Null
        } else {
            UserStr::Raw(ptr)
        }
    }

    pub fn probe(&self) -> Probed<'a> {
        match *self {
            UserStr::Null => Probed::Null,
            UserStr::Bytes(b) => Probed::Bytes(Cow::Borrowed(b)),
            UserStr::Raw(p) => match is_efault_cstr(p) {
                None => Probed::Fault,
                Some(n) => {
                    // SAFETY: n + 1 bytes starting at p were probed readable.
                    let bytes = unsafe { std::slice::from_raw_parts(p as *const u8, n) };
                    Probed::Bytes(Cow::Owned(bytes.to_vec()))
                }
            },
        }
    }

    /// Readable bytes, if any.
    pub fn bytes(&self) -> Option<Cow<'a, [u8]>> {
        match self.probe() {
            Probed::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, UserStr::Null)
    }

    /// Print as a quoted string, `NULL`, or `<efault>`.
    pub fn print(&self, sb: &mut StringBuffer) {
        self.probe().print(sb)
    }

    /// Print as a quoted pathname.
    pub fn print_path(&self, sb: &mut StringBuffer) {
        self.probe().print_path(sb)
    }
}

impl<'a> From<&'a str> for UserStr<'a> {
    fn from(s: &'a str) -> Self {
        UserStr::Bytes(s.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for UserStr<'a> {
    fn from(s: &'a [u8]) -> Self {
        UserStr::Bytes(s)
    }
}

impl<'a> From<&'a Path> for UserStr<'a> {
    fn from(p: &'a Path) -> Self {
        UserStr::Bytes(p.as_os_str().as_bytes())
    }
}

impl<'a> From<&'a CStr> for UserStr<'a> {
    fn from(s: &'a CStr) -> Self {
        UserStr::Bytes(s.to_bytes())
    }
}

impl<'a, T: Into<UserStr<'a>>> From<Option<T>> for UserStr<'a> {
    fn from(o: Option<T>) -> Self {
        match o {
            Some(t) => t.into(),
            None => UserStr::Null,
        }
    }
}

/// A data buffer argument (`write`'s `buf`, an ioctl payload).
#[derive(Debug, Clone, Copy)]
pub enum UserBuf<'a> {
    Null,
    Slice(&'a [u8]),
    Raw(*const u8, usize),
}

impl<'a> UserBuf<'a> {
    /// Wrap a raw pointer and length.
    ///
    /// # Safety
    ///
    /// As for [`UserStr::from_ptr`].
    pub unsafe fn from_raw(ptr: *const u8, len: usize) -> Self {
        if ptr.is_null() {
            UserBuf::Null
        } else {
            UserBuf::Raw(ptr, len)
        }
    }

    pub fn len(&self) -> usize {
        match *self {
            UserBuf::Null => 0,
            UserBuf::Slice(s) => s.len(),
            UserBuf::Raw(_, n) => n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self) -> bool {
        matches!(self, UserBuf::Null)
    }

    pub fn as_ptr(&self) -> *const u8 {
        match *self {
            UserBuf::Null => std::ptr::null(),
            UserBuf::Slice(s) => s.as_ptr(),
            UserBuf::Raw(p, _) => p,
        }
    }

    /// Does any byte of the buffer fault?
    pub fn is_efault(&self) -> bool {
        match *self {
            UserBuf::Null => true,
            UserBuf::Slice(_) => false,
            UserBuf::Raw(p, n) => is_efault(p, n),
        }
    }

    /// First `n` readable bytes.
    pub fn probe(&self, n: usize) -> Probed<'a> {
        match *self {
            UserBuf::Null => Probed::Null,
            UserBuf::Slice(s) => Probed::Bytes(Cow::Borrowed(&s[..s.len().min(n)])),
            UserBuf::Raw(p, len) => {
                let n = len.min(n);
                if is_efault(p, n.max(1)) {
                    return Probed::Fault;
                }
                // SAFETY: the first n bytes were probed readable.
                let bytes = unsafe { std::slice::from_raw_parts(p, n) };
                Probed::Bytes(Cow::Owned(bytes.to_vec()))
            }
        }
    }

    /// Print up to `limit` bytes as a quoted string, eliding the rest.
    pub fn print(&self, sb: &mut StringBuffer, limit: usize) {
        match self.probe(limit) {
            Probed::Null => sb.push_quoted(None),
            Probed::Fault => sb.push_efault(),
            Probed::Bytes(b) => {
                if b.len() < self.len() {
                    sb.push_quoted_n(&b, b.len());
                    sb.push_str("...");
                } else {
                    sb.push_quoted(Some(&b[..]));
                }
            }
        }
    }
}

impl<'a> From<&'a [u8]> for UserBuf<'a> {
    fn from(s: &'a [u8]) -> Self {
        UserBuf::Slice(s)
    }
}

impl<'a> From<&'a str> for UserBuf<'a> {
    fn from(s: &'a str) -> Self {
        UserBuf::Slice(s.as_bytes())
    }
}
