//! File descriptor probe.
//!
//! Everything here is read-only: `fcntl(F_GETFL/F_GETFD)`, `fstat`,
//! `getsockopt` and a `readlink` of `/proc/self/fd/N`.

use std::path::PathBuf;

use crate::stat::{self, FileKind, Stat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    /// `O_PATH` and anything else the kernel invents
    Other(i32),
}

impl AccessMode {
    pub fn from_flags(flags: i32) -> Self {
        match flags & libc::O_ACCMODE {
            libc::O_RDONLY => AccessMode::ReadOnly,
            libc::O_WRONLY => AccessMode::WriteOnly,
            libc::O_RDWR => AccessMode::ReadWrite,
            other => AccessMode::Other(other),
        }
    }

    pub fn readable(&self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn writable(&self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "O_RDONLY",
            AccessMode::WriteOnly => "O_WRONLY",
            AccessMode::ReadWrite => "O_RDWR",
            AccessMode::Other(_) => "O_ACCMODE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdInfo {
    pub fd: i32,
    /// Status flags from `F_GETFL`
    pub flags: i32,
    pub access: AccessMode,
    pub cloexec: bool,
    pub stat: Option<Stat>,
    /// Where `/proc/self/fd/N` points, when available
    pub path: Option<PathBuf>,
}

impl FdInfo {
    pub fn kind(&self) -> FileKind {
        self.stat.map(|s| s.kind).unwrap_or(FileKind::Unknown)
    }

    pub fn is_nonblocking(&self) -> bool {
        self.flags & libc::O_NONBLOCK != 0
    }

    pub fn is_append(&self) -> bool {
        self.flags & libc::O_APPEND != 0
    }

    pub fn is_direct(&self) -> bool {
        cfg_if::cfg_if! {
            if #[cfg(any(target_os = "linux", target_os = "android"))] {
                self.flags & libc::O_DIRECT != 0
            } else {
                false
            }
        }
    }
}

/// Is `fd` an open descriptor?
pub fn is_open(fd: i32) -> bool {
    if fd < 0 {
        return false;
    }
    // SAFETY: F_GETFD on any integer is harmless; EBADF reports closure.
    unsafe { libc::fcntl(fd, libc::F_GETFD) >= 0 }
}

/// Snapshot of an open descriptor, `None` if it is not open.
pub fn inspect(fd: i32) -> Option<FdInfo> {
    if fd < 0 {
        return None;
    }
    // SAFETY: as for is_open.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return None;
    }
    // SAFETY: as above.
    let fdflags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    Some(FdInfo {
        fd,
        flags,
        access: AccessMode::from_flags(flags),
        cloexec: fdflags >= 0 && fdflags & libc::FD_CLOEXEC != 0,
        stat: stat::fstat(fd).ok(),
        path: fd_path(fd),
    })
}

/// Path the descriptor was opened with, via `/proc/self/fd`.
pub fn fd_path(fd: i32) -> Option<PathBuf> {
    nix::fcntl::readlink(format!("/proc/self/fd/{}", fd).as_str())
        .ok()
        .map(PathBuf::from)
}

pub fn is_socket(fd: i32) -> bool {
    stat::fstat(fd).map(|s| s.kind == FileKind::Socket).unwrap_or(false)
}

pub fn is_block_device(fd: i32) -> bool {
    stat::fstat(fd).map(|s| s.kind == FileKind::BlockDevice).unwrap_or(false)
}

pub fn is_tty(fd: i32) -> bool {
    // SAFETY: isatty has no memory-safety preconditions.
    unsafe { libc::isatty(fd) == 1 }
}

/// Address family of a socket descriptor.
pub fn socket_domain(fd: i32) -> Option<i32> {
    if !is_open(fd) {
        return None;
    }
    cfg_if::cfg_if! {
        if #[cfg(any(target_os = "linux", target_os = "android"))] {
            let mut v: libc::c_int = 0;
            let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
            // SAFETY: v and len are valid out-pointers of the right size.
            let rc = unsafe {
                libc::getsockopt(
                    fd,
                    libc::SOL_SOCKET,
                    libc::SO_DOMAIN,
                    &mut v as *mut libc::c_int as *mut libc::c_void,
                    &mut len,
                )
            };
            if rc == 0 { Some(v) } else { None }
        } else {
            None
        }
    }
}

pub fn domain_name(domain: i32) -> &'static str {
    match domain {
        libc::AF_UNIX => "AF_UNIX",
        libc::AF_INET => "AF_INET",
        libc::AF_INET6 => "AF_INET6",
        #[cfg(any(target_os = "linux", target_os = "android"))]
        libc::AF_NETLINK => "AF_NETLINK",
        #[cfg(any(target_os = "linux", target_os = "android"))]
        libc::AF_PACKET => "AF_PACKET",
        _ => "unknown",
    }
}

/// Is the descriptor an open `/dev/ppp` channel?
pub fn is_ppp_channel(fd: i32) -> bool {
    fd_path(fd).map(|p| p == PathBuf::from("/dev/ppp")).unwrap_or(false)
}

/// Is `fd` at or above the process's descriptor limit?
pub fn beyond_limit(fd: i32) -> bool {
    crate::rlimit::get(crate::rlimit::Resource::OpenFiles)
        .and_then(|l| l.soft)
        .map(|soft| fd >= 0 && fd as u64 >= soft)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    #[test]
    fn test_closed_descriptor() {
        assert!(!is_open(-1));
        assert!(inspect(-1).is_none());
        assert!(inspect(1_000_000).is_none());
    }

    #[test]
    fn test_read_only_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let ro = std::fs::File::open(f.path()).unwrap();
        let info = inspect(ro.as_raw_fd()).unwrap();
        assert_eq!(info.access, AccessMode::ReadOnly);
        assert!(!info.access.writable());
        assert_eq!(info.kind(), FileKind::Regular);
        assert!(info.cloexec);
        if let Some(p) = info.path {
            assert_eq!(p, f.path().canonicalize().unwrap());
        }
    }

    #[test]
    fn test_socket_domain() {
        let s = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        assert!(is_socket(s.as_raw_fd()));
        assert!(!is_tty(s.as_raw_fd()));
        assert!(!is_ppp_channel(s.as_raw_fd()));
        if cfg!(target_os = "linux") {
            assert_eq!(socket_domain(s.as_raw_fd()), Some(libc::AF_INET));
            assert_eq!(domain_name(libc::AF_INET), "AF_INET");
        }
    }

    #[test]
    fn test_access_mode_names() {
        assert_eq!(AccessMode::from_flags(libc::O_WRONLY).name(), "O_WRONLY");
        assert!(AccessMode::from_flags(libc::O_RDWR).readable());
    }
}
