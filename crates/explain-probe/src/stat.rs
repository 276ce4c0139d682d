//! File status snapshot.
//!
//! A plain copy of the fields the explainers care about, taken from
//! `stat(2)`/`lstat(2)`/`fstat(2)`.

use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use explain_core::ktrace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
    Unknown,
}

impl FileKind {
    pub fn from_mode(mode: u32) -> Self {
        match mode & libc::S_IFMT as u32 {
            m if m == libc::S_IFREG as u32 => FileKind::Regular,
            m if m == libc::S_IFDIR as u32 => FileKind::Directory,
            m if m == libc::S_IFLNK as u32 => FileKind::Symlink,
            m if m == libc::S_IFCHR as u32 => FileKind::CharDevice,
            m if m == libc::S_IFBLK as u32 => FileKind::BlockDevice,
            m if m == libc::S_IFIFO as u32 => FileKind::Fifo,
            m if m == libc::S_IFSOCK as u32 => FileKind::Socket,
            _ => FileKind::Unknown,
        }
    }

    /// Noun used in explanations: `the "x" <describe()>`.
    pub fn describe(&self) -> &'static str {
        match self {
            FileKind::Regular => "regular file",
            FileKind::Directory => "directory",
            FileKind::Symlink => "symbolic link",
            FileKind::CharDevice => "character special device",
            FileKind::BlockDevice => "block special device",
            FileKind::Fifo => "named pipe",
            FileKind::Socket => "socket",
            FileKind::Unknown => "file",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub kind: FileKind,
    /// Permission bits including set-id and sticky (`mode & 07777`)
    pub perm: u32,
    pub uid: u32,
    pub gid: u32,
    pub dev: u64,
    pub ino: u64,
    pub nlink: u64,
    pub size: i64,
}

impl Stat {
    pub fn from_raw(st: &libc::stat) -> Self {
        let mode = st.st_mode as u32;
        Self {
            kind: FileKind::from_mode(mode),
            perm: mode & 0o7777,
            uid: st.st_uid,
            gid: st.st_gid,
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
            nlink: st.st_nlink as u64,
            size: st.st_size as i64,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    #[inline]
    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }

    /// Any execute bit set.
    #[inline]
    pub fn any_exec(&self) -> bool {
        self.perm & 0o111 != 0
    }
}

/// `lstat(2)`, errno on failure.
pub fn lstat(path: &Path) -> Result<Stat, i32> {
    match nix::sys::stat::lstat(path) {
        Ok(st) => Ok(Stat::from_raw(&st)),
        Err(e) => {
            ktrace!("lstat {:?}: {}", path, e);
            Err(e as i32)
        }
    }
}

/// `stat(2)`, errno on failure.
pub fn stat(path: &Path) -> Result<Stat, i32> {
    match nix::sys::stat::stat(path) {
        Ok(st) => Ok(Stat::from_raw(&st)),
        Err(e) => {
            ktrace!("stat {:?}: {}", path, e);
            Err(e as i32)
        }
    }
}

/// `fstat(2)`, errno on failure.
pub fn fstat(fd: i32) -> Result<Stat, i32> {
    let mut st = std::mem::MaybeUninit::<libc::stat>::uninit();
    // SAFETY: st is a valid out-pointer; fstat fills it on success.
    let rc = unsafe { libc::fstat(fd, st.as_mut_ptr()) };
    if rc < 0 {
        return Err(nix::errno::Errno::last() as i32);
    }
    // SAFETY: fstat returned 0, so the struct is initialised.
    Ok(Stat::from_raw(unsafe { &st.assume_init() }))
}

/// Last path component as bytes, or the whole path for `/`.
pub fn basename(path: &Path) -> &[u8] {
    match path.file_name() {
        Some(n) => n.as_bytes(),
        None => path.as_os_str().as_bytes(),
    }
}
