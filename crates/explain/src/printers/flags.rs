//! Flag and enum tables for call arguments.

use explain_core::bits::{self, BitName};
use explain_core::{Result, StringBuffer};

use crate::output;

macro_rules! bit {
    ($name:ident) => {
        BitName::new(stringify!($name), libc::$name as i64)
    };
}

const ACCESS_MODES: &[BitName] = &[bit!(O_RDONLY), bit!(O_WRONLY), bit!(O_RDWR)];

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        /// Open flags other than the access mode. Multi-bit flags come
        /// before the flags they contain.
        const OPEN_FLAGS: &[BitName] = &[
            bit!(O_CREAT),
            bit!(O_EXCL),
            bit!(O_NOCTTY),
            bit!(O_TRUNC),
            bit!(O_APPEND),
            bit!(O_NONBLOCK),
            bit!(O_SYNC),
            bit!(O_DSYNC),
            bit!(O_ASYNC),
            bit!(O_DIRECT),
            bit!(O_LARGEFILE),
            bit!(O_TMPFILE),
            bit!(O_DIRECTORY),
            bit!(O_NOFOLLOW),
            bit!(O_NOATIME),
            bit!(O_CLOEXEC),
            bit!(O_PATH),
        ];
    } else {
        const OPEN_FLAGS: &[BitName] = &[
            bit!(O_CREAT),
            bit!(O_EXCL),
            bit!(O_NOCTTY),
            bit!(O_TRUNC),
            bit!(O_APPEND),
            bit!(O_NONBLOCK),
            bit!(O_SYNC),
            bit!(O_ASYNC),
            bit!(O_DIRECTORY),
            bit!(O_NOFOLLOW),
            bit!(O_CLOEXEC),
        ];
    }
}

/// `open(2)` flags: access mode first, then the rest.
pub fn print_open_flags(sb: &mut StringBuffer, flags: i32) {
    let acc = flags & libc::O_ACCMODE;
    bits::print_enum(sb, acc as i64, ACCESS_MODES);
    let rest = (flags & !libc::O_ACCMODE) as i64;
    if rest != 0 {
        sb.push_str(" | ");
        bits::print_bits(sb, rest, OPEN_FLAGS);
    }
}

pub fn parse_open_flags(text: &str) -> Result<i32> {
    let all: Vec<BitName> = ACCESS_MODES.iter().chain(OPEN_FLAGS).copied().collect();
    bits::parse(text, &all, "open flags").map(|v| v as i32)
}

pub fn parse_open_flags_or_die(text: &str) -> i32 {
    parse_open_flags(text).unwrap_or_else(|e| output::die_with(&e.to_string()))
}

const ACCESS_CHECKS: &[BitName] = &[bit!(R_OK), bit!(W_OK), bit!(X_OK), bit!(F_OK)];

/// `access(2)` mode.
pub fn print_access_mode(sb: &mut StringBuffer, mode: i32) {
    bits::print_bits(sb, mode as i64, ACCESS_CHECKS);
}

pub fn parse_access_mode(text: &str) -> Result<i32> {
    bits::parse(text, ACCESS_CHECKS, "access mode").map(|v| v as i32)
}

pub fn parse_access_mode_or_die(text: &str) -> i32 {
    parse_access_mode(text).unwrap_or_else(|e| output::die_with(&e.to_string()))
}

// ── getaddrinfo hints ────────────────────────────────────────────

const AI_FLAGS: &[BitName] = &[
    bit!(AI_PASSIVE),
    bit!(AI_CANONNAME),
    bit!(AI_NUMERICHOST),
    bit!(AI_V4MAPPED),
    bit!(AI_ALL),
    bit!(AI_ADDRCONFIG),
    bit!(AI_NUMERICSERV),
];

const AI_FAMILIES: &[BitName] = &[bit!(AF_UNSPEC), bit!(AF_UNIX), bit!(AF_INET), bit!(AF_INET6)];

const AI_SOCKTYPES: &[BitName] = &[
    bit!(SOCK_STREAM),
    bit!(SOCK_DGRAM),
    bit!(SOCK_RAW),
    bit!(SOCK_SEQPACKET),
];

pub fn print_ai_flags(sb: &mut StringBuffer, flags: i32) {
    bits::print_bits(sb, flags as i64, AI_FLAGS);
}

pub fn parse_ai_flags(text: &str) -> Result<i32> {
    bits::parse(text, AI_FLAGS, "getaddrinfo flags").map(|v| v as i32)
}

pub fn parse_ai_flags_or_die(text: &str) -> i32 {
    parse_ai_flags(text).unwrap_or_else(|e| output::die_with(&e.to_string()))
}

pub fn print_ai_family(sb: &mut StringBuffer, family: i32) {
    bits::print_enum(sb, family as i64, AI_FAMILIES);
}

pub fn print_ai_socktype(sb: &mut StringBuffer, socktype: i32) {
    bits::print_enum(sb, socktype as i64, AI_SOCKTYPES);
}

pub fn parse_ai_family(text: &str) -> Result<i32> {
    bits::parse(text, AI_FAMILIES, "address family").map(|v| v as i32)
}

pub fn parse_ai_socktype(text: &str) -> Result<i32> {
    bits::parse(text, AI_SOCKTYPES, "socket type").map(|v| v as i32)
}
