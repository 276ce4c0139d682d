//! Cause selector.
//!
//! Each syscall owns a static, ordered table of [`CauseTemplate`]s. For an
//! observed errno the selector walks the table top to bottom, skips rows
//! that do not list the errno, and lets the first row whose predicate holds
//! write the explanation.
//!
//! ```text
//! OPEN_CAUSES
//!   [0] ENOENT|ENOTDIR|ELOOP|...  path resolution fails      -> render
//!   [1] EACCES                    O_NOATIME without ownership
//!   [2] EISDIR                    write access to a directory
//!   ...
//!   (none)                        common::generic()
//! ```
//!
//! Rows are most specific first. The order is the behavior: it is never
//! sorted or reshuffled.

use explain_core::StringBuffer;
use explain_probe::ProbeContext;

use crate::common;

pub type Predicate<A> = fn(&mut ProbeContext, &A) -> bool;
pub type Render<A> = fn(&mut StringBuffer, &mut ProbeContext, &A);

pub struct CauseTemplate<A> {
    /// Errors this row can explain
    pub errnos: &'static [i32],
    pub predicate: Predicate<A>,
    pub render: Render<A>,
}

impl<A> CauseTemplate<A> {
    pub const fn new(errnos: &'static [i32], predicate: Predicate<A>, render: Render<A>) -> Self {
        Self { errnos, predicate, render }
    }

    #[inline]
    pub fn applies_to(&self, errnum: i32) -> bool {
        self.errnos.contains(&errnum)
    }
}

/// Predicate for rows that always hold once the errno matches.
pub fn always<A>(_: &mut ProbeContext, _: &A) -> bool {
    true
}

/// Run `table` for `ctx.errnum`, writing the first matching cause.
///
/// Returns false when no row matched; nothing has been written then.
pub fn select<A>(
    table: &[CauseTemplate<A>],
    sb: &mut StringBuffer,
    ctx: &mut ProbeContext,
    args: &A,
) -> bool {
    let errnum = ctx.errnum;
    for row in table.iter().filter(|r| r.applies_to(errnum)) {
        if (row.predicate)(ctx, args) {
            (row.render)(sb, ctx, args);
            return true;
        }
    }
    false
}

/// [`select`], falling back to the generic explanation of the errno.
pub fn select_or_generic<A>(
    table: &[CauseTemplate<A>],
    sb: &mut StringBuffer,
    ctx: &mut ProbeContext,
    args: &A,
    syscall: &str,
) {
    if !select(table, sb, ctx, args) {
        common::generic(sb, ctx, syscall);
    }
}
