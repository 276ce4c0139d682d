//! Address-lookup error codes.
//!
//! `getaddrinfo` reports failure in-band with its own `EAI_*` codes, which
//! overlap numerically with nothing in the errno registry and must never be
//! confused with it. Negative on glibc, positive elsewhere.

use std::borrow::Cow;
use std::ffi::CStr;

use crate::errno::ErrnoInfo;
use crate::fuzzy::{self, FUZZY_THRESHOLD};

static TABLE: &[ErrnoInfo] = &[
    ErrnoInfo::new(libc::EAI_AGAIN,    "EAI_AGAIN",    "Temporary failure in name resolution"),
    ErrnoInfo::new(libc::EAI_BADFLAGS, "EAI_BADFLAGS", "Bad value for ai_flags"),
    ErrnoInfo::new(libc::EAI_FAIL,     "EAI_FAIL",     "Non-recoverable failure in name resolution"),
    ErrnoInfo::new(libc::EAI_FAMILY,   "EAI_FAMILY",   "ai_family not supported"),
    ErrnoInfo::new(libc::EAI_MEMORY,   "EAI_MEMORY",   "Memory allocation failure"),
    ErrnoInfo::new(libc::EAI_NONAME,   "EAI_NONAME",   "Name or service not known"),
    ErrnoInfo::new(libc::EAI_SERVICE,  "EAI_SERVICE",  "Servname not supported for ai_socktype"),
    ErrnoInfo::new(libc::EAI_SOCKTYPE, "EAI_SOCKTYPE", "ai_socktype not supported"),
    ErrnoInfo::new(libc::EAI_SYSTEM,   "EAI_SYSTEM",   "System error"),
    ErrnoInfo::new(libc::EAI_OVERFLOW, "EAI_OVERFLOW", "Argument buffer overflow"),
];

pub fn iter() -> impl Iterator<Item = &'static ErrnoInfo> {
    TABLE.iter()
}

pub fn by_number(code: i32) -> Option<&'static ErrnoInfo> {
    TABLE.iter().find(|e| e.number == code)
}

pub fn by_name(name: &str) -> Option<&'static ErrnoInfo> {
    let name = name.trim();
    TABLE.iter().find(|e| e.name.eq_ignore_ascii_case(name))
}

pub fn by_name_fuzzy(name: &str) -> Option<&'static ErrnoInfo> {
    by_name(name).or_else(|| fuzzy::best_match(name.trim(), TABLE.iter(), |e| e.name, FUZZY_THRESHOLD))
}

/// Host `gai_strerror` text, falling back to the table.
pub fn strerror(code: i32) -> Cow<'static, str> {
    // SAFETY: gai_strerror returns a pointer to a static string or NULL.
    let p = unsafe { libc::gai_strerror(code) };
    if !p.is_null() {
        // SAFETY: non-null, NUL terminated, static lifetime.
        let s = unsafe { CStr::from_ptr(p) };
        if let Ok(s) = s.to_str() {
            return Cow::Owned(s.to_string());
        }
    }
    match by_number(code) {
        Some(e) => Cow::Borrowed(e.description),
        None => Cow::Owned(format!("Error {}", code)),
    }
}
