//! Per-call explainers.
//!
//! Every supported call is a struct holding its arguments (owned, so the
//! cause tables can be `static`) and an implementation of [`Syscall`].
//! The `entry_points!` macro then generates the four explain functions:
//!
//! | Function                      | errno from     | Output                    |
//! |-------------------------------|----------------|---------------------------|
//! | `explain_X(args)`             | thread errno   | `String`                  |
//! | `explain_errno_X(e, args)`    | `e`            | `String`                  |
//! | `explain_message_X(buf, ..)`  | thread errno   | NUL-terminated in `buf`   |
//! | `explain_message_errno_X(..)` | `e`            | NUL-terminated in `buf`   |
//!
//! `X_on_error` and `X_or_die` perform the real call and are written out
//! per module, since each wraps a different system interface.

use std::ffi::OsStr;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use explain_core::{errno, Options, StringBuffer};
use explain_probe::{Probed, ProbeContext, UserStr};

use crate::cause::{self, CauseTemplate};
use crate::output;
use crate::path_resolution::{self, FinalSpec};

/// Generate `explain_X`, `explain_errno_X`, `explain_message_X` and
/// `explain_message_errno_X` for a call struct.
///
/// ```ignore
/// entry_points! {
///     Close => explain_close, explain_errno_close,
///              explain_message_close, explain_message_errno_close;
///     <> (fildes: i32) => Close { fildes }
/// }
/// ```
macro_rules! entry_points {
    (
        $call:ident => $explain:ident, $explain_errno:ident,
                       $message:ident, $message_errno:ident;
        <$($lt:lifetime),*> ( $($arg:ident : $ty:ty),* $(,)? ) => $ctor:expr
    ) => {
        /// Explain the call's failure using the thread's current errno.
        pub fn $explain<$($lt),*>($($arg: $ty),*) -> String {
            $explain_errno($crate::assemble::last_errno(), $($arg),*)
        }

        /// Explain the call failing with `errnum`.
        pub fn $explain_errno<$($lt),*>(errnum: i32, $($arg: $ty),*) -> String {
            let call: $call = $ctor;
            $crate::assemble::to_string(&call, errnum)
        }

        /// Thread-errno explanation written NUL-terminated into `buf`.
        pub fn $message<'buf, $($lt),*>(buf: &'buf mut [u8], $($arg: $ty),*) -> &'buf str {
            $message_errno(buf, $crate::assemble::last_errno(), $($arg),*)
        }

        /// Explanation of `errnum` written NUL-terminated into `buf`.
        pub fn $message_errno<'buf, $($lt),*>(
            buf: &'buf mut [u8],
            errnum: i32,
            $($arg: $ty),*
        ) -> &'buf str {
            let call: $call = $ctor;
            $crate::assemble::to_message(buf, &call, errnum)
        }
    };
}

pub mod access;
pub mod chdir;
pub mod close;
pub mod dup2;
pub mod getaddrinfo;
pub mod link;
pub mod mkdir;
pub mod open;
pub mod read;
pub mod rename;
pub mod rmdir;
pub mod stat;
pub mod unlink;
pub mod write;

/// One explainable call.
pub trait Syscall: Sized + 'static {
    const NAME: &'static str;

    /// Errors come back as return codes outside the errno space.
    const IN_BAND: bool = false;

    /// Write `name(arg, ...)`.
    fn print_signature(&self, sb: &mut StringBuffer, opts: &Options);

    fn causes() -> &'static [CauseTemplate<Self>];

    /// Adjust the probe context before any cause runs.
    fn prepare(&self, _ctx: &mut ProbeContext) {}

    fn explain_cause(&self, sb: &mut StringBuffer, ctx: &mut ProbeContext) {
        cause::select_or_generic(Self::causes(), sb, ctx, self, Self::NAME);
    }

    /// Notes about the arguments that hold whatever the cause.
    fn footnotes(&self, _sb: &mut StringBuffer, _ctx: &mut ProbeContext) {}

    /// Symbolic name of an error code.
    fn error_label(errnum: i32) -> Option<String> {
        errno::name_of(errnum).map(str::to_string)
    }
}

// ── Argument helpers ─────────────────────────────────────────────

/// A pathname argument, probed and detached from the caller's memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathArg(pub Probed<'static>);

impl PathArg {
    pub fn probe<'a>(s: impl Into<UserStr<'a>>) -> Self {
        PathArg(s.into().probe().into_owned())
    }

    pub fn as_path(&self) -> Option<&Path> {
        self.0.as_bytes().map(|b| Path::new(OsStr::from_bytes(b)))
    }

    pub fn is_fault(&self) -> bool {
        self.0.is_fault()
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn print(&self, sb: &mut StringBuffer) {
        self.0.print_path(sb);
    }
}

/// Errors a path walk can account for.
pub(crate) const PATH_ERRNOS: &[i32] = &[
    libc::ENOENT,
    libc::ENOTDIR,
    libc::ELOOP,
    libc::ENAMETOOLONG,
    libc::EACCES,
    libc::EPERM,
];

/// Does resolving `path` against `spec` account for `ctx.errnum`?
pub(crate) fn path_applies(ctx: &mut ProbeContext, path: &PathArg, spec: &FinalSpec) -> bool {
    match path.as_path() {
        Some(p) => path_resolution::applies(ctx, p, spec),
        None => false,
    }
}

pub(crate) fn path_explain(
    sb: &mut StringBuffer,
    ctx: &mut ProbeContext,
    path: &PathArg,
    spec: &FinalSpec,
) {
    if let Some(p) = path.as_path() {
        path_resolution::explain(sb, ctx, p, spec);
    }
}

/// Write `name(` to start a signature.
pub(crate) fn open_paren(sb: &mut StringBuffer, name: &str) {
    sb.push_str(name);
    sb.push_char('(');
}

pub(crate) fn comma(sb: &mut StringBuffer) {
    sb.push_str(", ");
}

/// Explain through the output sink and hand the error back.
pub(crate) fn report(message: String, errnum: i32) -> io::Error {
    output::message(&message);
    io::Error::from_raw_os_error(errnum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_arg() {
        let p = PathArg::probe("/tmp/x");
        assert_eq!(p.as_path(), Some(Path::new("/tmp/x")));
        let mut sb = StringBuffer::new(64);
        p.print(&mut sb);
        assert_eq!(sb.as_str(), "\"/tmp/x\"");

        let null = PathArg::probe(None::<&str>);
        assert!(null.is_null());
        assert!(null.as_path().is_none());
    }

    fn table_of<S: Syscall>() -> &'static [CauseTemplate<S>] {
        S::causes()
    }

    #[test]
    fn test_every_call_has_a_static_cause_table() {
        let sizes = [
            table_of::<access::Access>().len(),
            table_of::<chdir::Chdir>().len(),
            table_of::<close::Close>().len(),
            table_of::<dup2::Dup2>().len(),
            table_of::<getaddrinfo::Getaddrinfo>().len(),
            table_of::<link::Link>().len(),
            table_of::<mkdir::Mkdir>().len(),
            table_of::<open::Open>().len(),
            table_of::<read::Read>().len(),
            table_of::<rename::Rename>().len(),
            table_of::<rmdir::Rmdir>().len(),
            table_of::<stat::Stat>().len(),
            table_of::<unlink::Unlink>().len(),
            table_of::<write::Write>().len(),
            table_of::<crate::ioctl::Ioctl>().len(),
        ];
        assert!(sizes.iter().all(|&n| n > 0), "{:?}", sizes);
    }
}
