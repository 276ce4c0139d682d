//! `getaddrinfo(3)`
//!
//! Failure is reported in-band as an `EAI_*` code, not through errno, so
//! the explanation replaces the error text instead of following it:
//!
//! ```text
//! getaddrinfo("x.invalid", NULL, NULL, ...) failed, the node or service is not known (EAI_NONAME)
//! ```

use std::ffi::{CStr, CString};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use explain_core::{gai, kdebug, Options, StringBuffer};
use explain_probe::{ProbeContext, Probed, UserStr};

use crate::cause::{self, CauseTemplate};
use crate::output;
use crate::printers;

use super::{comma, open_paren, Syscall};

/// The fields of `struct addrinfo` a caller sets as hints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hints {
    pub flags: i32,
    pub family: i32,
    pub socktype: i32,
    pub protocol: i32,
}

impl From<&libc::addrinfo> for Hints {
    fn from(ai: &libc::addrinfo) -> Self {
        Self {
            flags: ai.ai_flags,
            family: ai.ai_family,
            socktype: ai.ai_socktype,
            protocol: ai.ai_protocol,
        }
    }
}

impl Hints {
    fn print(&self, sb: &mut StringBuffer) {
        sb.push_str("{ ai_flags = ");
        printers::print_ai_flags(sb, self.flags);
        sb.push_str(", ai_family = ");
        printers::print_ai_family(sb, self.family);
        sb.push_str(", ai_socktype = ");
        printers::print_ai_socktype(sb, self.socktype);
        sb.push_str(", ai_protocol = ");
        printers::print_size(sb, self.protocol.max(0) as usize);
        sb.push_str(" }");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Getaddrinfo {
    pub node: Probed<'static>,
    pub service: Probed<'static>,
    pub hints: Option<Hints>,
}

impl Getaddrinfo {
    fn flag(&self, bit: i32) -> bool {
        self.hints.map(|h| h.flags & bit != 0).unwrap_or(false)
    }

    fn node_text(&self) -> Option<&str> {
        self.node.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }
}

const KNOWN_FLAGS: i32 = libc::AI_PASSIVE
    | libc::AI_CANONNAME
    | libc::AI_NUMERICHOST
    | libc::AI_V4MAPPED
    | libc::AI_ALL
    | libc::AI_ADDRCONFIG
    | libc::AI_NUMERICSERV;

// ── Causes ───────────────────────────────────────────────────────

fn both_null(_: &mut ProbeContext, a: &Getaddrinfo) -> bool {
    a.node.is_null() && a.service.is_null()
}

fn render_both_null(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Getaddrinfo) {
    sb.push_str("the node and service arguments are both NULL, at least one must be given");
}

fn numeric_host_not_numeric(_: &mut ProbeContext, a: &Getaddrinfo) -> bool {
    a.flag(libc::AI_NUMERICHOST)
        && a.node_text()
            .map(|n| n.parse::<std::net::IpAddr>().is_err())
            .unwrap_or(false)
}

fn render_numeric_host(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Getaddrinfo) {
    sb.push_str("the AI_NUMERICHOST flag was given but node is not a numeric network address");
}

fn render_not_known(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Getaddrinfo) {
    sb.push_str("the node or service is not known");
}

fn render_again(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Getaddrinfo) {
    sb.push_str("the name server returned a temporary failure indication, try again later");
}

fn canonname_without_node(_: &mut ProbeContext, a: &Getaddrinfo) -> bool {
    a.flag(libc::AI_CANONNAME) && a.node.is_null()
}

fn render_canonname(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Getaddrinfo) {
    sb.push_str("hints.ai_flags contains AI_CANONNAME and node is NULL");
}

fn render_bad_flags(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Getaddrinfo) {
    sb.push_str("hints.ai_flags contains invalid flags");
    if let Some(h) = a.hints {
        let unknown = h.flags & !KNOWN_FLAGS;
        if unknown != 0 {
            sb.push_str(" (");
            printers::print_pointer(sb, unknown as usize);
            sb.push_char(')');
        }
    }
}

fn render_fail(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Getaddrinfo) {
    sb.push_str("the name server returned a permanent failure indication");
}

fn render_family(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Getaddrinfo) {
    sb.push_str("the requested address family is not supported");
    if let Some(h) = a.hints {
        sb.push_str(" (");
        printers::print_ai_family(sb, h.family);
        sb.push_char(')');
    }
}

fn render_memory(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Getaddrinfo) {
    sb.push_str("out of memory");
}

fn render_service(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Getaddrinfo) {
    sb.push_str(
        "the requested service is not available for the requested socket type; it may be \
         available through another socket type",
    );
}

fn render_socktype(sb: &mut StringBuffer, _: &mut ProbeContext, a: &Getaddrinfo) {
    sb.push_str("the requested socket type is not supported");
    if let Some(h) = a.hints {
        sb.push_str(" (");
        printers::print_ai_socktype(sb, h.socktype);
        sb.push_char(')');
    }
}

fn render_system(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Getaddrinfo) {
    sb.push_str("a system error occurred, the error code can be found in errno");
}

fn render_overflow(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Getaddrinfo) {
    sb.push_str("an argument buffer overflowed");
}

static GETADDRINFO_CAUSES: &[CauseTemplate<Getaddrinfo>] = &[
    CauseTemplate::new(&[libc::EAI_NONAME], both_null, render_both_null),
    CauseTemplate::new(&[libc::EAI_NONAME], numeric_host_not_numeric, render_numeric_host),
    CauseTemplate::new(&[libc::EAI_NONAME], cause::always, render_not_known),
    CauseTemplate::new(&[libc::EAI_AGAIN], cause::always, render_again),
    CauseTemplate::new(&[libc::EAI_BADFLAGS], canonname_without_node, render_canonname),
    CauseTemplate::new(&[libc::EAI_BADFLAGS], cause::always, render_bad_flags),
    CauseTemplate::new(&[libc::EAI_FAIL], cause::always, render_fail),
    CauseTemplate::new(&[libc::EAI_FAMILY], cause::always, render_family),
    CauseTemplate::new(&[libc::EAI_MEMORY], cause::always, render_memory),
    CauseTemplate::new(&[libc::EAI_SERVICE], cause::always, render_service),
    CauseTemplate::new(&[libc::EAI_SOCKTYPE], cause::always, render_socktype),
    CauseTemplate::new(&[libc::EAI_SYSTEM], cause::always, render_system),
    CauseTemplate::new(&[libc::EAI_OVERFLOW], cause::always, render_overflow),
];

impl Syscall for Getaddrinfo {
    const NAME: &'static str = "getaddrinfo";
    const IN_BAND: bool = true;

    fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
        open_paren(sb, Self::NAME);
        self.node.print(sb);
        comma(sb);
        self.service.print(sb);
        comma(sb);
        match &self.hints {
            Some(h) => h.print(sb),
            None => sb.push_str(explain_core::NULL_TOKEN),
        }
        sb.push_str(", ...)");
    }

    fn causes() -> &'static [CauseTemplate<Self>] {
        GETADDRINFO_CAUSES
    }

    fn explain_cause(&self, sb: &mut StringBuffer, ctx: &mut ProbeContext) {
        if !cause::select(Self::causes(), sb, ctx, self) {
            sb.push_str(&gai::strerror(ctx.errnum));
        }
    }

    fn error_label(errnum: i32) -> Option<String> {
        gai::by_number(errnum).map(|e| e.name.to_string())
    }
}

entry_points! {
    Getaddrinfo => explain_getaddrinfo, explain_errno_getaddrinfo,
                   explain_message_getaddrinfo, explain_message_errno_getaddrinfo;
    <'a, 'b> (node: impl Into<UserStr<'a>>, service: impl Into<UserStr<'b>>, hints: Option<Hints>) => Getaddrinfo {
        node: node.into().probe().into_owned(),
        service: service.into().probe().into_owned(),
        hints,
    }
}

/// Read one result entry's address.
///
/// # Safety
///
/// `ai` must come from a successful `getaddrinfo` and not yet be freed.
unsafe fn socket_addr(ai: &libc::addrinfo) -> Option<SocketAddr> {
    if ai.ai_addr.is_null() {
        return None;
    }
    match ai.ai_family {
        libc::AF_INET => {
            let sin = &*(ai.ai_addr as *const libc::sockaddr_in);
            Some(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)),
                u16::from_be(sin.sin_port),
            )))
        }
        libc::AF_INET6 => {
            let sin6 = &*(ai.ai_addr as *const libc::sockaddr_in6);
            Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}

/// `getaddrinfo(3)`, explaining any failure through the output sink.
///
/// Returns the resolved socket addresses in the order the resolver gave
/// them.
pub fn getaddrinfo_on_error(
    node: Option<&CStr>,
    service: Option<&CStr>,
    hints: Option<Hints>,
) -> io::Result<Vec<SocketAddr>> {
    // SAFETY: an all-zero addrinfo is the documented empty hints value.
    let mut raw_hints: libc::addrinfo = unsafe { std::mem::zeroed() };
    if let Some(h) = hints {
        raw_hints.ai_flags = h.flags;
        raw_hints.ai_family = h.family;
        raw_hints.ai_socktype = h.socktype;
        raw_hints.ai_protocol = h.protocol;
    }
    let mut res: *mut libc::addrinfo = std::ptr::null_mut();
    // SAFETY: node and service are NUL-terminated or NULL, hints points at
    // a live addrinfo, res receives the list.
    let rc = unsafe {
        libc::getaddrinfo(
            node.map_or(std::ptr::null(), CStr::as_ptr),
            service.map_or(std::ptr::null(), CStr::as_ptr),
            if hints.is_some() { &raw_hints as *const _ } else { std::ptr::null() },
            &mut res,
        )
    };
    if rc != 0 {
        let system = io::Error::last_os_error();
        let message = explain_errno_getaddrinfo(rc, node, service, hints);
        output::message(&message);
        kdebug!("getaddrinfo: rc {}", rc);
        return Err(if rc == libc::EAI_SYSTEM {
            system
        } else {
            io::Error::new(io::ErrorKind::Other, message)
        });
    }
    let mut out = Vec::new();
    let mut cur = res;
    while !cur.is_null() {
        // SAFETY: cur walks the list getaddrinfo returned.
        let ai = unsafe { &*cur };
        // SAFETY: as above.
        if let Some(addr) = unsafe { socket_addr(ai) } {
            out.push(addr);
        }
        cur = ai.ai_next;
    }
    // SAFETY: res came from getaddrinfo and is freed once.
    unsafe { libc::freeaddrinfo(res) };
    Ok(out)
}

/// `getaddrinfo(3)` taking Rust strings, exiting with an explanation on
/// failure.
pub fn getaddrinfo_or_die(node: Option<&str>, service: Option<&str>, hints: Option<Hints>) -> Vec<SocketAddr> {
    let to_c = |s: Option<&str>| match s.map(CString::new).transpose() {
        Ok(c) => c,
        Err(_) => output::die_with("getaddrinfo: argument contains a NUL byte"),
    };
    let node = to_c(node);
    let service = to_c(service);
    getaddrinfo_on_error(node.as_deref(), service.as_deref(), hints)
        .unwrap_or_else(|_| output::exit_failure())
}

#[cfg(test)]
mod tests {
    use super::*;
    use explain_core::options;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_unknown_host() {
        options::set_global(Options::new());
        assert_eq!(
            explain_errno_getaddrinfo(libc::EAI_NONAME, "no.such.host.invalid", None::<&str>, None),
            "getaddrinfo(\"no.such.host.invalid\", NULL, NULL, ...) failed, the node or service \
             is not known (EAI_NONAME)"
        );
    }

    #[test]
    #[serial]
    fn test_both_null() {
        options::set_global(Options::new());
        let text = explain_errno_getaddrinfo(libc::EAI_NONAME, None::<&str>, None::<&str>, None);
        assert!(text.ends_with("failed, the node and service arguments are both NULL, at least one must be given (EAI_NONAME)"));
    }

    #[test]
    #[serial]
    fn test_hints_printed() {
        options::set_global(Options::new());
        let hints = Hints {
            flags: libc::AI_NUMERICHOST,
            family: libc::AF_INET,
            socktype: libc::SOCK_STREAM,
            protocol: 0,
        };
        let text = explain_errno_getaddrinfo(libc::EAI_NONAME, "localhost", "80", Some(hints));
        assert_eq!(
            text,
            "getaddrinfo(\"localhost\", \"80\", { ai_flags = AI_NUMERICHOST, ai_family = AF_INET, \
             ai_socktype = SOCK_STREAM, ai_protocol = 0 }, ...) failed, the AI_NUMERICHOST flag \
             was given but node is not a numeric network address (EAI_NONAME)"
        );
    }

    #[test]
    #[serial]
    fn test_resolves_numeric() {
        options::set_global(Options::new());
        let hints = Hints {
            flags: libc::AI_NUMERICHOST | libc::AI_NUMERICSERV,
            family: libc::AF_INET,
            socktype: libc::SOCK_STREAM,
            protocol: 0,
        };
        let node = CString::new("127.0.0.1").unwrap();
        let service = CString::new("8080").unwrap();
        let addrs = getaddrinfo_on_error(Some(&node), Some(&service), Some(hints)).unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:8080".parse::<SocketAddr>().unwrap()]);
    }
}
