//! Argument printers.
//!
//! Every printer has the shape `fn(&mut StringBuffer, value)`, writes a
//! C-like rendering of the value and never fails. Flag tables that users
//! may type by hand also have parsers; `parse_or_die` variants explain
//! bad text through the output sink and exit.

pub mod flags;
pub mod mode;

use std::fmt::Write;

use explain_core::StringBuffer;

pub use flags::{
    parse_access_mode, parse_access_mode_or_die, parse_ai_family, parse_ai_flags,
    parse_ai_flags_or_die, parse_ai_socktype, parse_open_flags, parse_open_flags_or_die,
    print_access_mode, print_ai_family, print_ai_flags, print_ai_socktype, print_open_flags,
};
pub use mode::{print_mode_explained, print_permission_mode, rwx};

/// Print an address, `NULL` for zero.
pub fn print_pointer(sb: &mut StringBuffer, addr: usize) {
    if addr == 0 {
        sb.push_str(explain_core::NULL_TOKEN);
    } else {
        let _ = write!(sb, "{:#x}", addr);
    }
}

/// Print a file descriptor number.
pub fn print_fildes(sb: &mut StringBuffer, fd: i32) {
    let _ = write!(sb, "{}", fd);
}

pub fn print_size(sb: &mut StringBuffer, n: usize) {
    let _ = write!(sb, "{}", n);
}
