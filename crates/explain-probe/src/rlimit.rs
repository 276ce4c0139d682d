//! Resource limits and usage counts.

use nix::sys::resource::{getrlimit, Resource as NixResource, RLIM_INFINITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    OpenFiles,
    FileSize,
    Processes,
    LockedMemory,
    AddressSpace,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::OpenFiles,
        Resource::FileSize,
        Resource::Processes,
        Resource::LockedMemory,
        Resource::AddressSpace,
    ];

    fn to_nix(self) -> NixResource {
        match self {
            Resource::OpenFiles => NixResource::RLIMIT_NOFILE,
            Resource::FileSize => NixResource::RLIMIT_FSIZE,
            Resource::Processes => NixResource::RLIMIT_NPROC,
            Resource::LockedMemory => NixResource::RLIMIT_MEMLOCK,
            Resource::AddressSpace => NixResource::RLIMIT_AS,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resource::OpenFiles => "RLIMIT_NOFILE",
            Resource::FileSize => "RLIMIT_FSIZE",
            Resource::Processes => "RLIMIT_NPROC",
            Resource::LockedMemory => "RLIMIT_MEMLOCK",
            Resource::AddressSpace => "RLIMIT_AS",
        }
    }
}

/// Soft and hard limit; `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub soft: Option<u64>,
    pub hard: Option<u64>,
}

fn finite(v: u64) -> Option<u64> {
    if v == RLIM_INFINITY as u64 {
        None
    } else {
        Some(v)
    }
}

pub fn get(res: Resource) -> Option<Limit> {
    let (soft, hard) = getrlimit(res.to_nix()).ok()?;
    Some(Limit {
        soft: finite(soft as u64),
        hard: finite(hard as u64),
    })
}

/// Every limit this probe knows about.
pub fn all() -> Vec<(Resource, Limit)> {
    Resource::ALL
        .iter()
        .filter_map(|&r| get(r).map(|l| (r, l)))
        .collect()
}

/// Number of descriptors this process has open.
pub fn open_fd_count() -> Option<usize> {
    let dir = std::fs::read_dir("/proc/self/fd").ok()?;
    // read_dir holds one descriptor of its own
    Some(dir.count().saturating_sub(1))
}

/// System-wide open-file count and maximum, from `/proc/sys/fs/file-nr`.
pub fn system_file_count() -> Option<(u64, u64)> {
    let text = std::fs::read_to_string("/proc/sys/fs/file-nr").ok()?;
    let f: Vec<u64> = text.split_whitespace().filter_map(|t| t.parse().ok()).collect();
    match f.as_slice() {
        [used, _, max] => Some((*used, *max)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nofile_limit_present() {
        let l = get(Resource::OpenFiles).unwrap();
        if let (Some(s), Some(h)) = (l.soft, l.hard) {
            assert!(s <= h);
        }
        assert_eq!(Resource::OpenFiles.name(), "RLIMIT_NOFILE");
        assert!(all().iter().any(|(r, _)| *r == Resource::OpenFiles));
    }

    #[test]
    fn test_open_fd_count_sees_held_fd() {
        let _f = tempfile::tempfile().unwrap();
        if let Some(n) = open_fd_count() {
            assert!(n >= 1);
        }
    }
}
