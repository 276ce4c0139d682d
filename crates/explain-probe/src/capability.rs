//! Capability probe.
//!
//! Reads the effective set from the `CapEff:` line of `/proc/self/status`.
//! Where that facility is absent the process is treated as fully capable
//! when its effective UID is 0 and incapable otherwise.

use std::fmt;

use explain_core::ktrace;

/// Linux capability numbers relevant to file and device permission checks.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Chown = 0,
    DacOverride = 1,
    DacReadSearch = 2,
    Fowner = 3,
    Fsetid = 4,
    Kill = 5,
    Setgid = 6,
    Setuid = 7,
    LinuxImmutable = 9,
    NetBindService = 10,
    NetAdmin = 12,
    NetRaw = 13,
    IpcLock = 14,
    SysModule = 16,
    SysRawio = 17,
    SysChroot = 18,
    SysPtrace = 19,
    SysAdmin = 21,
    SysBoot = 22,
    SysNice = 23,
    SysResource = 24,
    SysTime = 25,
    SysTtyConfig = 26,
    Mknod = 27,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Chown => "CAP_CHOWN",
            Capability::DacOverride => "CAP_DAC_OVERRIDE",
            Capability::DacReadSearch => "CAP_DAC_READ_SEARCH",
            Capability::Fowner => "CAP_FOWNER",
            Capability::Fsetid => "CAP_FSETID",
            Capability::Kill => "CAP_KILL",
            Capability::Setgid => "CAP_SETGID",
            Capability::Setuid => "CAP_SETUID",
            Capability::LinuxImmutable => "CAP_LINUX_IMMUTABLE",
            Capability::NetBindService => "CAP_NET_BIND_SERVICE",
            Capability::NetAdmin => "CAP_NET_ADMIN",
            Capability::NetRaw => "CAP_NET_RAW",
            Capability::IpcLock => "CAP_IPC_LOCK",
            Capability::SysModule => "CAP_SYS_MODULE",
            Capability::SysRawio => "CAP_SYS_RAWIO",
            Capability::SysChroot => "CAP_SYS_CHROOT",
            Capability::SysPtrace => "CAP_SYS_PTRACE",
            Capability::SysAdmin => "CAP_SYS_ADMIN",
            Capability::SysBoot => "CAP_SYS_BOOT",
            Capability::SysNice => "CAP_SYS_NICE",
            Capability::SysResource => "CAP_SYS_RESOURCE",
            Capability::SysTime => "CAP_SYS_TIME",
            Capability::SysTtyConfig => "CAP_SYS_TTY_CONFIG",
            Capability::Mknod => "CAP_MKNOD",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet(pub u64);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(u64::MAX)
    }

    pub fn with(mut self, cap: Capability) -> Self {
        self.0 |= 1u64 << cap as u8;
        self
    }

    pub fn without(mut self, cap: Capability) -> Self {
        self.0 &= !(1u64 << cap as u8);
        self
    }

    #[inline]
    pub fn has(&self, cap: Capability) -> bool {
        self.0 & (1u64 << cap as u8) != 0
    }

    /// Parse the body of `/proc/<pid>/status`.
    pub fn from_status(text: &str) -> Option<Self> {
        text.lines()
            .find_map(|l| l.strip_prefix("CapEff:"))
            .and_then(|hex| u64::from_str_radix(hex.trim(), 16).ok())
            .map(Self)
    }
}

/// Effective capabilities of this process.
pub fn effective() -> CapabilitySet {
    match std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|s| CapabilitySet::from_status(&s))
    {
        Some(set) => set,
        None => {
            ktrace!("capability probe: no CapEff, falling back to euid");
            if nix::unistd::geteuid().is_root() {
                CapabilitySet::all()
            } else {
                CapabilitySet::empty()
            }
        }
    }
}

/// Does this process hold `cap` right now?
pub fn has_capability(cap: Capability) -> bool {
    effective().has(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        let text = "Name:\tcat\nCapInh:\t0000000000000000\nCapEff:\t0000000000000006\n";
        let set = CapabilitySet::from_status(text).unwrap();
        assert!(set.has(Capability::DacOverride));
        assert!(set.has(Capability::DacReadSearch));
        assert!(!set.has(Capability::Chown));
        assert_eq!(CapabilitySet::from_status("Name:\tcat\n"), None);
    }

    #[test]
    fn test_with_without() {
        let set = CapabilitySet::empty().with(Capability::Fowner);
        assert!(set.has(Capability::Fowner));
        assert!(!set.without(Capability::Fowner).has(Capability::Fowner));
        assert!(CapabilitySet::all().has(Capability::SysAdmin));
    }

    #[test]
    fn test_effective_is_stable() {
        assert_eq!(effective(), effective());
    }
}
