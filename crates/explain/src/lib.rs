//! # explain - why did that system call fail?
//!
//! Turns a failed call and its errno into one line of English, the way a
//! colleague who looked at the machine would describe it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use explain::explain_errno_open;
//!
//! let text = explain_errno_open(libc::ENOENT, "/nonexistent/file", libc::O_RDONLY, 0);
//! // open("/nonexistent/file", O_RDONLY) failed, No such file or directory
//! // (ENOENT) because there is no "nonexistent" directory in the pathname, /
//! ```
//!
//! Every supported call comes in six forms: `explain_X`,
//! `explain_errno_X`, `explain_message_X`, `explain_message_errno_X`
//! return text, `X_on_error` performs the call and reports failures
//! through the [`output`] sink, and `X_or_die` exits on failure.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Entry points (syscall::*, ioctl)            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        assemble                              │
//! │     signature + strerror + cause + footnotes, bounded        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌─────────────┐     ┌────────────┐
//!    │   cause   │      │    path_    │     │ permission │
//!    │  tables   │      │ resolution  │     │            │
//!    └───────────┘      └─────────────┘     └────────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │                    explain-probe                         │
//!    │   fault probe, fd inspector, resolver, /proc, limits     │
//!    └─────────────────────────────────────────────────────────┘
//! ```

pub mod assemble;
pub mod cause;
pub mod common;
pub mod output;
pub mod path_resolution;
pub mod permission;
pub mod printers;
#[macro_use]
pub mod syscall;
pub mod ioctl;

#[cfg(test)]
mod scenarios;

// Re-export core types
pub use explain_core::{
    bits,
    errno,
    gai,
    options,
    ErrnoInfo,
    ExplainError,
    Options,
    Result,
    StringBuffer,
    DEFAULT_CAPACITY,
};

// Re-export kprint macros for the library's own diagnostics
pub use explain_core::{kdebug, kerror, kinfo, ktrace, kwarn};

pub use output::{set_output, Output, StderrOutput, TeeOutput, WriterOutput};
pub use syscall::Syscall;

pub use syscall::access::{
    access_on_error, access_or_die, explain_access, explain_errno_access, explain_message_access,
    explain_message_errno_access,
};
pub use syscall::chdir::{
    chdir_on_error, chdir_or_die, explain_chdir, explain_errno_chdir, explain_message_chdir,
    explain_message_errno_chdir,
};
pub use syscall::close::{
    close_on_error, close_or_die, explain_close, explain_errno_close, explain_message_close,
    explain_message_errno_close,
};
pub use syscall::dup2::{
    dup2_on_error, dup2_or_die, explain_dup2, explain_errno_dup2, explain_message_dup2,
    explain_message_errno_dup2,
};
pub use syscall::getaddrinfo::{
    explain_errno_getaddrinfo, explain_getaddrinfo, explain_message_errno_getaddrinfo,
    explain_message_getaddrinfo, getaddrinfo_on_error, getaddrinfo_or_die, Hints,
};
pub use syscall::link::{
    explain_errno_link, explain_link, explain_message_errno_link, explain_message_link,
    link_on_error, link_or_die,
};
pub use syscall::mkdir::{
    explain_errno_mkdir, explain_message_errno_mkdir, explain_message_mkdir, explain_mkdir,
    mkdir_on_error, mkdir_or_die,
};
pub use syscall::open::{
    explain_errno_open, explain_message_errno_open, explain_message_open, explain_open,
    open_on_error, open_or_die,
};
pub use syscall::read::{
    explain_errno_read, explain_message_errno_read, explain_message_read, explain_read,
    read_on_error, read_or_die,
};
pub use syscall::rename::{
    explain_errno_rename, explain_message_errno_rename, explain_message_rename, explain_rename,
    rename_on_error, rename_or_die,
};
pub use syscall::rmdir::{
    explain_errno_rmdir, explain_message_errno_rmdir, explain_message_rmdir, explain_rmdir,
    rmdir_on_error, rmdir_or_die,
};
pub use syscall::stat::{
    explain_errno_stat, explain_message_errno_stat, explain_message_stat, explain_stat,
    stat_on_error, stat_or_die,
};
pub use syscall::unlink::{
    explain_errno_unlink, explain_message_errno_unlink, explain_message_unlink, explain_unlink,
    unlink_on_error, unlink_or_die,
};
pub use syscall::write::{
    explain_errno_write, explain_message_errno_write, explain_message_write, explain_write,
    write_on_error, write_or_die,
};
pub use ioctl::{
    explain_errno_ioctl, explain_ioctl, explain_message_errno_ioctl, explain_message_ioctl,
    ioctl_on_error, ioctl_or_die,
};

/// Names of the calls this library can explain.
pub const SYSCALLS: &[&str] = &[
    "access",
    "chdir",
    "close",
    "dup2",
    "getaddrinfo",
    "ioctl",
    "link",
    "mkdir",
    "open",
    "read",
    "rename",
    "rmdir",
    "stat",
    "unlink",
    "write",
];
