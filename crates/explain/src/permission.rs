//! Permission evaluator.
//!
//! Replays the kernel's discretionary access check for one file against
//! the identity captured in the [`ProbeContext`]:
//!
//! ```text
//!   uid == owner ?  ── yes ──> owner triad
//!        │ no
//!   member of group ? ─ yes ─> group triad
//!        │ no
//!   others triad
//!        │ denied
//!   capability override (DAC_READ_SEARCH / DAC_OVERRIDE)
//! ```
//!
//! Only one triad is ever consulted. An owner locked out by `0070` stays
//! locked out even though the group could read; `dialect_specific` output
//! points that out.

use std::fmt::Write;

use explain_core::StringBuffer;
use explain_probe::groups::{self, Membership};
use explain_probe::{fs, Capability, FileKind, Identity, ProbeContext, Stat};

use crate::printers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Execute,
    /// Execute permission on a directory
    Search,
    /// Lookup only, as `access(F_OK)`
    Exist,
}

impl Access {
    fn bit(self) -> u32 {
        match self {
            Access::Read => 4,
            Access::Write => 2,
            Access::Execute | Access::Search => 1,
            Access::Exist => 0,
        }
    }

    pub fn word(self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
            Access::Execute => "execute",
            Access::Search => "search",
            Access::Exist => "lookup",
        }
    }
}

/// The permission class the kernel picked for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Triad {
    Owner,
    Group(Membership),
    Others,
}

impl Triad {
    fn shift(self) -> u32 {
        match self {
            Triad::Owner => 6,
            Triad::Group(_) => 3,
            Triad::Others => 0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Triad::Owner => "owner",
            Triad::Group(_) => "group",
            Triad::Others => "others",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Mode(Triad),
    Capability(Capability),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Only regular files can be executed
    NotRegular,
    /// The selected triad lacks the bit and no capability overrides it
    Mode(Triad),
}

pub fn triad_for(st: &Stat, id: &Identity) -> Triad {
    if st.uid == id.uid {
        return Triad::Owner;
    }
    match groups::membership(st.gid, id) {
        Membership::NotMember => Triad::Others,
        m => Triad::Group(m),
    }
}

fn triad_allows(st: &Stat, triad: Triad, access: Access) -> bool {
    (st.perm >> triad.shift()) & access.bit() != 0
}

fn capability_override(st: &Stat, access: Access, id: &Identity) -> Option<Capability> {
    match access {
        Access::Read | Access::Search if id.has(Capability::DacReadSearch) => {
            Some(Capability::DacReadSearch)
        }
        Access::Read | Access::Search | Access::Write if id.has(Capability::DacOverride) => {
            Some(Capability::DacOverride)
        }
        Access::Execute if id.has(Capability::DacOverride) && st.any_exec() => {
            Some(Capability::DacOverride)
        }
        _ => None,
    }
}

/// Would `id` be granted `access` to a file with status `st`?
pub fn check(st: &Stat, access: Access, id: &Identity) -> Result<Grant, Denial> {
    if access == Access::Execute && st.kind != FileKind::Regular {
        return Err(Denial::NotRegular);
    }
    let triad = triad_for(st, id);
    if access == Access::Exist || triad_allows(st, triad, access) {
        return Ok(Grant::Mode(triad));
    }
    match capability_override(st, access, id) {
        Some(cap) => Ok(Grant::Capability(cap)),
        None => Err(Denial::Mode(triad)),
    }
}

/// The capability that would have overridden a denial.
fn wanted_capability(access: Access) -> Capability {
    match access {
        Access::Read | Access::Search | Access::Exist => Capability::DacReadSearch,
        Access::Write | Access::Execute => Capability::DacOverride,
    }
}

/// Explain why `access` to the file `name` (status `st`) is denied.
///
/// Returns false, writing nothing, when the check grants access.
pub fn explain_denied(
    sb: &mut StringBuffer,
    ctx: &ProbeContext,
    st: &Stat,
    name: &[u8],
    access: Access,
) -> bool {
    let id = ctx.identity();
    let kind = st.kind.describe();
    let triad = match check(st, access, id) {
        Ok(_) => return false,
        Err(Denial::NotRegular) => {
            sb.push_str("it is not possible to execute the ");
            sb.push_quoted_path(name);
            let _ = write!(sb, " {}, only regular files can be executed", kind);
            return true;
        }
        Err(Denial::Mode(t)) => t,
    };

    let _ = write!(sb, "the process does not have {} permission to the ", access.word());
    sb.push_quoted_path(name);
    let _ = write!(sb, " {}", kind);

    if id.uid == 0 {
        // root is only ever refused by the capability layer
        if access == Access::Execute && !st.any_exec() {
            let _ = write!(sb, ", the {} has no execute permission bits set", kind);
        } else {
            let _ = write!(
                sb,
                ", the process does not have the {} capability",
                wanted_capability(access)
            );
        }
    } else {
        owner_clause(sb, id, st, triad);
    }
    let _ = write!(sb, ", and the {}'s permission mode is ", kind);
    printers::print_mode_explained(sb, st.perm, &ctx.options);

    if ctx.options.dialect_specific {
        footnote_ignored_triads(sb, st, triad, access);
    }
    true
}

/// Which permission class the process fell into, and why.
fn owner_clause(sb: &mut StringBuffer, id: &Identity, st: &Stat, triad: Triad) {
    let kind = st.kind.describe();
    let who = id.kind.describe();
    match triad {
        Triad::Owner => {
            let _ = write!(
                sb,
                ", the {} UID of the process ({}) is the owner of the {}",
                who, id.uid, kind
            );
        }
        Triad::Group(_) => {
            let _ = write!(
                sb,
                ", the {} UID of the process ({}) is not the owner ({}) of the {}, \
                 the process is a member of the {}'s group ({})",
                who, id.uid, st.uid, kind, kind, st.gid
            );
        }
        Triad::Others => {
            let _ = write!(
                sb,
                ", the {} UID of the process ({}) is not the owner ({}) of the {}",
                who, id.uid, st.uid, kind
            );
        }
    }
}

/// Point out classes that would have granted access but were not used.
fn footnote_ignored_triads(sb: &mut StringBuffer, st: &Stat, used: Triad, access: Access) {
    let others: Vec<&str> = [Triad::Owner, Triad::Group(Membership::NotMember), Triad::Others]
        .into_iter()
        .filter(|t| t.shift() < used.shift() && triad_allows(st, *t, access))
        .map(Triad::name)
        .collect();
    if others.is_empty() {
        return;
    }
    sb.add_footnote(format_args!(
        "the {} permission bits would grant {} access, but only the {} bits are used because they \
         are the first class matching the process",
        others.join(" and "),
        access.word(),
        used.name()
    ));
}

/// Access granted through a supplementary group that NFS cannot carry.
///
/// Writes an explanation and returns true when `st` lives on an NFS mount,
/// access hinges on such a group, and the file system would therefore deny
/// what a local check allows.
pub fn explain_nfs_groups(
    sb: &mut StringBuffer,
    ctx: &ProbeContext,
    st: &Stat,
    path: &std::path::Path,
    access: Access,
) -> bool {
    let id = ctx.identity();
    let Triad::Group(m @ Membership::Supplementary { index }) = triad_for(st, id) else {
        return false;
    };
    if !m.beyond_nfs_limit() || !triad_allows(st, Triad::Group(m), access) {
        return false;
    }
    let on_nfs = fs::mount_of(path)
        .map(|mi| mi.fs_type.starts_with("nfs"))
        .unwrap_or(false);
    if !on_nfs {
        return false;
    }
    let _ = write!(
        sb,
        "the process is a member of the {}'s group ({}) only through supplementary group {}, \
         but NFS only transmits the first {} supplementary groups",
        st.kind.describe(),
        st.gid,
        index + 1,
        groups::NFS_GROUP_LIMIT
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use explain_core::Options;
    use explain_probe::CapabilitySet;

    fn dir(perm: u32, uid: u32, gid: u32) -> Stat {
        Stat {
            kind: FileKind::Directory,
            perm,
            uid,
            gid,
            dev: 1,
            ino: 2,
            nlink: 2,
            size: 4096,
        }
    }

    fn file(perm: u32) -> Stat {
        Stat { kind: FileKind::Regular, ..dir(perm, 0, 0) }
    }

    #[test]
    fn test_only_one_triad_consulted() {
        let id = Identity::new(1000, 100);
        // owner locked out even though others may read
        let st = dir(0o075, 1000, 100);
        assert_eq!(check(&st, Access::Read, &id), Err(Denial::Mode(Triad::Owner)));
        let st = dir(0o705, 0, 100);
        assert_eq!(
            check(&st, Access::Read, &id),
            Err(Denial::Mode(Triad::Group(Membership::Effective)))
        );
        let st = dir(0o704, 0, 0);
        assert_eq!(check(&st, Access::Read, &id), Ok(Grant::Mode(Triad::Others)));
    }

    #[test]
    fn test_capability_tie_breaks() {
        let st = dir(0o700, 0, 0);
        let reader = Identity::new(1000, 1000)
            .caps(CapabilitySet::empty().with(Capability::DacReadSearch));
        assert_eq!(
            check(&st, Access::Search, &reader),
            Ok(Grant::Capability(Capability::DacReadSearch))
        );
        assert_eq!(check(&st, Access::Write, &reader), Err(Denial::Mode(Triad::Others)));

        let root = Identity::new(0, 0).caps(CapabilitySet::all());
        let st = Stat { uid: 5, gid: 5, ..file(0o644) };
        assert_eq!(check(&st, Access::Execute, &root), Err(Denial::Mode(Triad::Others)));
        let st = Stat { uid: 5, gid: 5, ..file(0o744) };
        assert_eq!(
            check(&st, Access::Execute, &root),
            Ok(Grant::Capability(Capability::DacOverride))
        );
        assert_eq!(check(&dir(0o777, 0, 0), Access::Execute, &root), Err(Denial::NotRegular));
    }

    #[test]
    fn test_search_denied_text() {
        let ctx = ProbeContext::with_identity(Options::new(), Identity::new(1000, 1000));
        let mut sb = StringBuffer::new(512);
        assert!(explain_denied(&mut sb, &ctx, &dir(0o700, 0, 0), b"root", Access::Search));
        assert_eq!(
            sb.as_str(),
            "the process does not have search permission to the \"root\" directory, the effective \
             UID of the process (1000) is not the owner (0) of the directory, and the directory's \
             permission mode is 0700 (rwx------)"
        );
    }

    #[test]
    fn test_group_and_owner_texts() {
        let ctx = ProbeContext::with_identity(Options::new(), Identity::new(1000, 50));
        let mut sb = StringBuffer::new(512);
        let st = Stat { gid: 50, ..file(0o640) };
        assert!(explain_denied(&mut sb, &ctx, &st, b"f", Access::Write));
        assert!(sb
            .as_str()
            .contains("the process is a member of the regular file's group (50)"));
        sb.rewind();
        let st = Stat { uid: 1000, ..file(0o444) };
        assert!(explain_denied(&mut sb, &ctx, &st, b"f", Access::Write));
        assert!(sb
            .as_str()
            .contains("the effective UID of the process (1000) is the owner of the regular file"));
        assert!(sb.as_str().ends_with("0444 (r--r--r--)"));
    }

    #[test]
    fn test_root_without_capability_text() {
        let ctx = ProbeContext::with_identity(Options::new(), Identity::new(0, 0));
        let mut sb = StringBuffer::new(512);
        assert!(explain_denied(&mut sb, &ctx, &dir(0o700, 5, 5), b"d", Access::Search));
        assert_eq!(
            sb.as_str(),
            "the process does not have search permission to the \"d\" directory, the process \
             does not have the CAP_DAC_READ_SEARCH capability, and the directory's permission \
             mode is 0700 (rwx------)"
        );
        assert!(!sb.as_str().contains("is not the owner"));

        sb.rewind();
        let st = Stat { uid: 5, gid: 5, ..file(0o644) };
        assert!(explain_denied(&mut sb, &ctx, &st, b"f", Access::Write));
        assert!(sb.as_str().contains(", the process does not have the CAP_DAC_OVERRIDE capability, and"));
    }

    #[test]
    fn test_granted_writes_nothing() {
        let ctx = ProbeContext::with_identity(Options::new(), Identity::new(1000, 1000));
        let mut sb = StringBuffer::new(64);
        assert!(!explain_denied(&mut sb, &ctx, &file(0o644), b"f", Access::Read));
        assert!(sb.is_empty());
    }

    #[test]
    fn test_dialect_footnote() {
        let opts = Options::new().dialect_specific(true);
        let ctx = ProbeContext::with_identity(opts, Identity::new(1000, 1000));
        let mut sb = StringBuffer::with_footnotes(512);
        let st = Stat { uid: 1000, ..file(0o044) };
        assert!(explain_denied(&mut sb, &ctx, &st, b"f", Access::Read));
        let notes = sb.footnotes().unwrap().as_str();
        assert!(notes.contains("the group and others permission bits would grant read access"));
    }

    #[test]
    fn test_exec_not_regular_text() {
        let ctx = ProbeContext::with_identity(Options::new(), Identity::new(1000, 1000));
        let mut sb = StringBuffer::new(256);
        assert!(explain_denied(&mut sb, &ctx, &dir(0o755, 0, 0), b"bin", Access::Execute));
        assert_eq!(
            sb.as_str(),
            "it is not possible to execute the \"bin\" directory, only regular files can be executed"
        );
    }
}
