//! Process identity.
//!
//! Captured once per explanation. Most calls are checked against the
//! effective IDs; `access(2)` is checked against the real ones, so the
//! identity records which pair it holds and says so in explanations.

use crate::capability::{self, Capability, CapabilitySet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Effective,
    Real,
}

impl IdKind {
    pub fn describe(&self) -> &'static str {
        match self {
            IdKind::Effective => "effective",
            IdKind::Real => "real",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
    /// Supplementary groups, in kernel order
    pub groups: Vec<u32>,
    pub caps: CapabilitySet,
    pub kind: IdKind,
}

impl Identity {
    /// Effective IDs and capabilities of this process.
    pub fn effective() -> Self {
        Self {
            uid: nix::unistd::geteuid().as_raw(),
            gid: nix::unistd::getegid().as_raw(),
            groups: supplementary_groups(),
            caps: capability::effective(),
            kind: IdKind::Effective,
        }
    }

    /// Real IDs; capabilities only apply when the real UID is 0.
    pub fn real() -> Self {
        let uid = nix::unistd::getuid().as_raw();
        Self {
            uid,
            gid: nix::unistd::getgid().as_raw(),
            groups: supplementary_groups(),
            caps: if uid == 0 {
                capability::effective()
            } else {
                CapabilitySet::empty()
            },
            kind: IdKind::Real,
        }
    }

    /// A synthetic identity with no capabilities.
    pub fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid,
            gid,
            groups: Vec::new(),
            caps: CapabilitySet::empty(),
            kind: IdKind::Effective,
        }
    }

    pub fn groups(mut self, groups: Vec<u32>) -> Self {
        self.groups = groups;
        self
    }

    pub fn caps(mut self, caps: CapabilitySet) -> Self {
        self.caps = caps;
        self
    }

    pub fn kind(mut self, kind: IdKind) -> Self {
        self.kind = kind;
        self
    }

    #[inline]
    pub fn has(&self, cap: Capability) -> bool {
        self.caps.has(cap)
    }
}

fn supplementary_groups() -> Vec<u32> {
    cfg_if::cfg_if! {
        if #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))] {
            nix::unistd::getgroups()
                .map(|v| v.into_iter().map(|g| g.as_raw()).collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_matches_process() {
        let id = Identity::effective();
        assert_eq!(id.uid, nix::unistd::geteuid().as_raw());
        assert_eq!(id.kind, IdKind::Effective);
    }

    #[test]
    fn test_real_kind() {
        let id = Identity::real();
        assert_eq!(id.kind.describe(), "real");
        if id.uid != 0 {
            assert_eq!(id.caps, CapabilitySet::empty());
        }
    }

    #[test]
    fn test_synthetic_builder() {
        let id = Identity::new(1000, 1000)
            .groups(vec![4, 24])
            .caps(CapabilitySet::empty().with(Capability::DacReadSearch));
        assert!(id.has(Capability::DacReadSearch));
        assert!(!id.has(Capability::DacOverride));
        assert_eq!(id.groups, vec![4, 24]);
    }
}
