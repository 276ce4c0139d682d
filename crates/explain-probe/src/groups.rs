//! Group-membership probe.
//!
//! NFS (AUTH_SYS) carries at most 16 supplementary groups. A group that
//! is only granted through a later slot works locally but not on such a
//! mount, which is worth pointing out when an explanation hinges on it.

use crate::identity::Identity;

/// Supplementary groups an AUTH_SYS credential can carry.
pub const NFS_GROUP_LIMIT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// The identity's own group
    Effective,
    /// Granted through the supplementary list at `index`
    Supplementary { index: usize },
    NotMember,
}

impl Membership {
    pub fn is_member(&self) -> bool {
        !matches!(self, Membership::NotMember)
    }

    /// Membership would be lost on an NFS mount.
    pub fn beyond_nfs_limit(&self) -> bool {
        matches!(self, Membership::Supplementary { index } if *index >= NFS_GROUP_LIMIT)
    }
}

pub fn membership(gid: u32, id: &Identity) -> Membership {
    if gid == id.gid {
        return Membership::Effective;
    }
    match id.groups.iter().position(|&g| g == gid) {
        Some(index) => Membership::Supplementary { index },
        None => Membership::NotMember,
    }
}
