//! # explain-probe
//!
//! Read-only questions asked of the running system after a call failed:
//! does this pointer fault, where does this path stop resolving, what is
//! this descriptor, which capabilities does the process hold.
//!
//! ## Default stack
//!
//! | Probe            | Module       | Source of truth                        |
//! |------------------|--------------|----------------------------------------|
//! | Fault            | `efault`     | `write(2)` into a private pipe          |
//! | Path resolver    | `resolve`    | `lstat`, `readlink`, `pathconf`         |
//! | FD inspector     | `fildes`     | `fcntl`, `fstat`, `/proc/self/fd`       |
//! | FD-to-pid        | `pids`       | `/proc/<pid>/{exe,cwd,root,fd}`         |
//! | Capability       | `capability` | `CapEff:` in `/proc/self/status`        |
//! | Resource limit   | `rlimit`     | `getrlimit(2)`                          |
//! | Filesystem       | `fs`         | `pathconf`, `statvfs`, mountinfo        |
//! | Directory count  | `dir`        | `readdir(3)`                            |
//! | Same device      | `device`     | `st_dev` of the containing directories  |
//! | Group membership | `groups`     | the captured [`Identity`]               |
//!
//! Every probe answers `None` (or an empty list) when the system will not
//! tell; callers fall back to a less specific explanation.

pub mod efault;
pub mod resolve;
pub mod fildes;
pub mod pids;
pub mod capability;
pub mod identity;
pub mod rlimit;
pub mod fs;
pub mod dir;
pub mod device;
pub mod groups;
pub mod stat;

pub use capability::{Capability, CapabilitySet};
pub use efault::{is_efault, Probed, UserBuf, UserStr};
pub use identity::{IdKind, Identity};
pub use resolve::{Failure, Resolution, ResolveOptions};
pub use stat::{FileKind, Stat};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use explain_core::Options;

/// State shared by every probe during one explanation.
///
/// Holds the identity captured at the start and memoizes path
/// resolutions, so a cause's predicate and its renderer see the same walk.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    pub options: Options,
    /// The error being explained
    pub errnum: i32,
    identity: Identity,
    resolutions: HashMap<(PathBuf, bool), Resolution>,
}

impl ProbeContext {
    /// Context for the calling process's effective identity.
    pub fn new(options: Options) -> Self {
        Self::with_identity(options, Identity::effective())
    }

    pub fn with_identity(options: Options, identity: Identity) -> Self {
        Self {
            options,
            errnum: 0,
            identity,
            resolutions: HashMap::new(),
        }
    }

    pub fn errnum(mut self, errnum: i32) -> Self {
        self.errnum = errnum;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Check against the real IDs from now on, as `access(2)` does.
    pub fn use_real_ids(&mut self) {
        if self.identity.kind != IdKind::Real {
            self.identity = Identity::real();
        }
    }

    /// Resolve `path`, reusing an earlier walk of the same path.
    pub fn resolve(&mut self, path: &Path, follow_final: bool) -> &Resolution {
        self.resolutions
            .entry((path.to_path_buf(), follow_final))
            .or_insert_with(|| {
                resolve::resolve(path, ResolveOptions::default().follow_final(follow_final))
            })
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.identity.has(cap)
    }
}
