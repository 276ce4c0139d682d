//! Errno registry.
//!
//! One static row per error number: `{ number, name, description }`.
//! The Linux table is the full curated list; other Unix targets get the
//! POSIX subset. Aliases (`EWOULDBLOCK`, `EDEADLOCK`, `ENOTSUP`) follow
//! their canonical row so that [`by_number`] always returns the canonical
//! name, while [`by_name`] still accepts the alias.

use std::borrow::Cow;

use crate::fuzzy::{self, FUZZY_THRESHOLD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrnoInfo {
    pub number: i32,
    pub name: &'static str,
    pub description: &'static str,
}

impl ErrnoInfo {
    pub const fn new(number: i32, name: &'static str, description: &'static str) -> Self {
        Self { number, name, description }
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        static TABLE: &[ErrnoInfo] = &[
            ErrnoInfo::new(libc::EPERM,             "EPERM",            "Operation not permitted"),
            ErrnoInfo::new(libc::ENOENT,            "ENOENT",           "No such file or directory"),
            ErrnoInfo::new(libc::ESRCH,             "ESRCH",            "No such process"),
            ErrnoInfo::new(libc::EINTR,             "EINTR",            "Interrupted system call"),
            ErrnoInfo::new(libc::EIO,               "EIO",              "Input/output error"),
            ErrnoInfo::new(libc::ENXIO,             "ENXIO",            "No such device or address"),
            ErrnoInfo::new(libc::E2BIG,             "E2BIG",            "Argument list too long"),
            ErrnoInfo::new(libc::ENOEXEC,           "ENOEXEC",          "Exec format error"),
            ErrnoInfo::new(libc::EBADF,             "EBADF",            "Bad file descriptor"),
            ErrnoInfo::new(libc::ECHILD,            "ECHILD",           "No child processes"),
            ErrnoInfo::new(libc::EAGAIN,            "EAGAIN",           "Resource temporarily unavailable"),
            ErrnoInfo::new(libc::ENOMEM,            "ENOMEM",           "Cannot allocate memory"),
            ErrnoInfo::new(libc::EACCES,            "EACCES",           "Permission denied"),
            ErrnoInfo::new(libc::EFAULT,            "EFAULT",           "Bad address"),
            ErrnoInfo::new(libc::ENOTBLK,           "ENOTBLK",          "Block device required"),
            ErrnoInfo::new(libc::EBUSY,             "EBUSY",            "Device or resource busy"),
            ErrnoInfo::new(libc::EEXIST,            "EEXIST",           "File exists"),
            ErrnoInfo::new(libc::EXDEV,             "EXDEV",            "Invalid cross-device link"),
            ErrnoInfo::new(libc::ENODEV,            "ENODEV",           "No such device"),
            ErrnoInfo::new(libc::ENOTDIR,           "ENOTDIR",          "Not a directory"),
            ErrnoInfo::new(libc::EISDIR,            "EISDIR",           "Is a directory"),
            ErrnoInfo::new(libc::EINVAL,            "EINVAL",           "Invalid argument"),
            ErrnoInfo::new(libc::ENFILE,            "ENFILE",           "Too many open files in system"),
            ErrnoInfo::new(libc::EMFILE,            "EMFILE",           "Too many open files"),
            ErrnoInfo::new(libc::ENOTTY,            "ENOTTY",           "Inappropriate ioctl for device"),
            ErrnoInfo::new(libc::ETXTBSY,           "ETXTBSY",          "Text file busy"),
            ErrnoInfo::new(libc::EFBIG,             "EFBIG",            "File too large"),
            ErrnoInfo::new(libc::ENOSPC,            "ENOSPC",           "No space left on device"),
            ErrnoInfo::new(libc::ESPIPE,            "ESPIPE",           "Illegal seek"),
            ErrnoInfo::new(libc::EROFS,             "EROFS",            "Read-only file system"),
            ErrnoInfo::new(libc::EMLINK,            "EMLINK",           "Too many links"),
            ErrnoInfo::new(libc::EPIPE,             "EPIPE",            "Broken pipe"),
            ErrnoInfo::new(libc::EDOM,              "EDOM",             "Numerical argument out of domain"),
            ErrnoInfo::new(libc::ERANGE,            "ERANGE",           "Numerical result out of range"),
            ErrnoInfo::new(libc::EDEADLK,           "EDEADLK",          "Resource deadlock avoided"),
            ErrnoInfo::new(libc::EDEADLOCK,         "EDEADLOCK",        "Resource deadlock avoided"),
            ErrnoInfo::new(libc::ENAMETOOLONG,      "ENAMETOOLONG",     "File name too long"),
            ErrnoInfo::new(libc::ENOLCK,            "ENOLCK",           "No locks available"),
            ErrnoInfo::new(libc::ENOSYS,            "ENOSYS",           "Function not implemented"),
            ErrnoInfo::new(libc::ENOTEMPTY,         "ENOTEMPTY",        "Directory not empty"),
            ErrnoInfo::new(libc::ELOOP,             "ELOOP",            "Too many levels of symbolic links"),
            ErrnoInfo::new(libc::EWOULDBLOCK,       "EWOULDBLOCK",      "Resource temporarily unavailable"),
            ErrnoInfo::new(libc::ENOMSG,            "ENOMSG",           "No message of desired type"),
            ErrnoInfo::new(libc::EIDRM,             "EIDRM",            "Identifier removed"),
            ErrnoInfo::new(libc::ECHRNG,            "ECHRNG",           "Channel number out of range"),
            ErrnoInfo::new(libc::EL2NSYNC,          "EL2NSYNC",         "Level 2 not synchronized"),
            ErrnoInfo::new(libc::EL3HLT,            "EL3HLT",           "Level 3 halted"),
            ErrnoInfo::new(libc::EL3RST,            "EL3RST",           "Level 3 reset"),
            ErrnoInfo::new(libc::ELNRNG,            "ELNRNG",           "Link number out of range"),
            ErrnoInfo::new(libc::EUNATCH,           "EUNATCH",          "Protocol driver not attached"),
            ErrnoInfo::new(libc::ENOCSI,            "ENOCSI",           "No CSI structure available"),
            ErrnoInfo::new(libc::EL2HLT,            "EL2HLT",           "Level 2 halted"),
            ErrnoInfo::new(libc::EBADE,             "EBADE",            "Invalid exchange"),
            ErrnoInfo::new(libc::EBADR,             "EBADR",            "Invalid request descriptor"),
            ErrnoInfo::new(libc::EXFULL,            "EXFULL",           "Exchange full"),
            ErrnoInfo::new(libc::ENOANO,            "ENOANO",           "No anode"),
            ErrnoInfo::new(libc::EBADRQC,           "EBADRQC",          "Invalid request code"),
            ErrnoInfo::new(libc::EBADSLT,           "EBADSLT",          "Invalid slot"),
            ErrnoInfo::new(libc::EBFONT,            "EBFONT",           "Bad font file format"),
            ErrnoInfo::new(libc::ENOSTR,            "ENOSTR",           "Device not a stream"),
            ErrnoInfo::new(libc::ENODATA,           "ENODATA",          "No data available"),
            ErrnoInfo::new(libc::ETIME,             "ETIME",            "Timer expired"),
            ErrnoInfo::new(libc::ENOSR,             "ENOSR",            "Out of streams resources"),
            ErrnoInfo::new(libc::ENONET,            "ENONET",           "Machine is not on the network"),
            ErrnoInfo::new(libc::ENOPKG,            "ENOPKG",           "Package not installed"),
            ErrnoInfo::new(libc::EREMOTE,           "EREMOTE",          "Object is remote"),
            ErrnoInfo::new(libc::ENOLINK,           "ENOLINK",          "Link has been severed"),
            ErrnoInfo::new(libc::EADV,              "EADV",             "Advertise error"),
            ErrnoInfo::new(libc::ESRMNT,            "ESRMNT",           "Srmount error"),
            ErrnoInfo::new(libc::ECOMM,             "ECOMM",            "Communication error on send"),
            ErrnoInfo::new(libc::EPROTO,            "EPROTO",           "Protocol error"),
            ErrnoInfo::new(libc::EMULTIHOP,         "EMULTIHOP",        "Multihop attempted"),
            ErrnoInfo::new(libc::EDOTDOT,           "EDOTDOT",          "RFS specific error"),
            ErrnoInfo::new(libc::EBADMSG,           "EBADMSG",          "Bad message"),
            ErrnoInfo::new(libc::EOVERFLOW,         "EOVERFLOW",        "Value too large for defined data type"),
            ErrnoInfo::new(libc::ENOTUNIQ,          "ENOTUNIQ",         "Name not unique on network"),
            ErrnoInfo::new(libc::EBADFD,            "EBADFD",           "File descriptor in bad state"),
            ErrnoInfo::new(libc::EREMCHG,           "EREMCHG",          "Remote address changed"),
            ErrnoInfo::new(libc::ELIBACC,           "ELIBACC",          "Can not access a needed shared library"),
            ErrnoInfo::new(libc::ELIBBAD,           "ELIBBAD",          "Accessing a corrupted shared library"),
            ErrnoInfo::new(libc::ELIBSCN,           "ELIBSCN",          ".lib section in a.out corrupted"),
            ErrnoInfo::new(libc::ELIBMAX,           "ELIBMAX",          "Attempting to link in too many shared libraries"),
            ErrnoInfo::new(libc::ELIBEXEC,          "ELIBEXEC",         "Cannot exec a shared library directly"),
            ErrnoInfo::new(libc::EILSEQ,            "EILSEQ",           "Invalid or incomplete multibyte or wide character"),
            ErrnoInfo::new(libc::ERESTART,          "ERESTART",         "Interrupted system call should be restarted"),
            ErrnoInfo::new(libc::ESTRPIPE,          "ESTRPIPE",         "Streams pipe error"),
            ErrnoInfo::new(libc::EUSERS,            "EUSERS",           "Too many users"),
            ErrnoInfo::new(libc::ENOTSOCK,          "ENOTSOCK",         "Socket operation on non-socket"),
            ErrnoInfo::new(libc::EDESTADDRREQ,      "EDESTADDRREQ",     "Destination address required"),
            ErrnoInfo::new(libc::EMSGSIZE,          "EMSGSIZE",         "Message too long"),
            ErrnoInfo::new(libc::EPROTOTYPE,        "EPROTOTYPE",       "Protocol wrong type for socket"),
            ErrnoInfo::new(libc::ENOPROTOOPT,       "ENOPROTOOPT",      "Protocol not available"),
            ErrnoInfo::new(libc::EPROTONOSUPPORT,   "EPROTONOSUPPORT",  "Protocol not supported"),
            ErrnoInfo::new(libc::ESOCKTNOSUPPORT,   "ESOCKTNOSUPPORT",  "Socket type not supported"),
            ErrnoInfo::new(libc::EOPNOTSUPP,        "EOPNOTSUPP",       "Operation not supported"),
            ErrnoInfo::new(libc::EPFNOSUPPORT,      "EPFNOSUPPORT",     "Protocol family not supported"),
            ErrnoInfo::new(libc::EAFNOSUPPORT,      "EAFNOSUPPORT",     "Address family not supported by protocol"),
            ErrnoInfo::new(libc::EADDRINUSE,        "EADDRINUSE",       "Address already in use"),
            ErrnoInfo::new(libc::EADDRNOTAVAIL,     "EADDRNOTAVAIL",    "Cannot assign requested address"),
            ErrnoInfo::new(libc::ENETDOWN,          "ENETDOWN",         "Network is down"),
            ErrnoInfo::new(libc::ENETUNREACH,       "ENETUNREACH",      "Network is unreachable"),
            ErrnoInfo::new(libc::ENETRESET,         "ENETRESET",        "Network dropped connection on reset"),
            ErrnoInfo::new(libc::ECONNABORTED,      "ECONNABORTED",     "Software caused connection abort"),
            ErrnoInfo::new(libc::ECONNRESET,        "ECONNRESET",       "Connection reset by peer"),
            ErrnoInfo::new(libc::ENOBUFS,           "ENOBUFS",          "No buffer space available"),
            ErrnoInfo::new(libc::EISCONN,           "EISCONN",          "Transport endpoint is already connected"),
            ErrnoInfo::new(libc::ENOTCONN,          "ENOTCONN",         "Transport endpoint is not connected"),
            ErrnoInfo::new(libc::ESHUTDOWN,         "ESHUTDOWN",        "Cannot send after transport endpoint shutdown"),
            ErrnoInfo::new(libc::ETOOMANYREFS,      "ETOOMANYREFS",     "Too many references: cannot splice"),
            ErrnoInfo::new(libc::ETIMEDOUT,         "ETIMEDOUT",        "Connection timed out"),
            ErrnoInfo::new(libc::ECONNREFUSED,      "ECONNREFUSED",     "Connection refused"),
            ErrnoInfo::new(libc::EHOSTDOWN,         "EHOSTDOWN",        "Host is down"),
            ErrnoInfo::new(libc::EHOSTUNREACH,      "EHOSTUNREACH",     "No route to host"),
            ErrnoInfo::new(libc::EALREADY,          "EALREADY",         "Operation already in progress"),
            ErrnoInfo::new(libc::EINPROGRESS,       "EINPROGRESS",      "Operation now in progress"),
            ErrnoInfo::new(libc::ESTALE,            "ESTALE",           "Stale file handle"),
            ErrnoInfo::new(libc::EUCLEAN,           "EUCLEAN",          "Structure needs cleaning"),
            ErrnoInfo::new(libc::ENOTNAM,           "ENOTNAM",          "Not a XENIX named type file"),
            ErrnoInfo::new(libc::ENAVAIL,           "ENAVAIL",          "No XENIX semaphores available"),
            ErrnoInfo::new(libc::EISNAM,            "EISNAM",           "Is a named type file"),
            ErrnoInfo::new(libc::EREMOTEIO,         "EREMOTEIO",        "Remote I/O error"),
            ErrnoInfo::new(libc::EDQUOT,            "EDQUOT",           "Disk quota exceeded"),
            ErrnoInfo::new(libc::ENOMEDIUM,         "ENOMEDIUM",        "No medium found"),
            ErrnoInfo::new(libc::EMEDIUMTYPE,       "EMEDIUMTYPE",      "Wrong medium type"),
            ErrnoInfo::new(libc::ECANCELED,         "ECANCELED",        "Operation canceled"),
            ErrnoInfo::new(libc::ENOKEY,            "ENOKEY",           "Required key not available"),
            ErrnoInfo::new(libc::EKEYEXPIRED,       "EKEYEXPIRED",      "Key has expired"),
            ErrnoInfo::new(libc::EKEYREVOKED,       "EKEYREVOKED",      "Key has been revoked"),
            ErrnoInfo::new(libc::EKEYREJECTED,      "EKEYREJECTED",     "Key was rejected by service"),
            ErrnoInfo::new(libc::EOWNERDEAD,        "EOWNERDEAD",       "Owner died"),
            ErrnoInfo::new(libc::ENOTRECOVERABLE,   "ENOTRECOVERABLE",  "State not recoverable"),
            ErrnoInfo::new(libc::ENOTSUP,           "ENOTSUP",          "Operation not supported"),
        ];
    } else {
        static TABLE: &[ErrnoInfo] = &[
            ErrnoInfo::new(libc::EPERM,             "EPERM",            "Operation not permitted"),
            ErrnoInfo::new(libc::ENOENT,            "ENOENT",           "No such file or directory"),
            ErrnoInfo::new(libc::ESRCH,             "ESRCH",            "No such process"),
            ErrnoInfo::new(libc::EINTR,             "EINTR",            "Interrupted system call"),
            ErrnoInfo::new(libc::EIO,               "EIO",              "Input/output error"),
            ErrnoInfo::new(libc::ENXIO,             "ENXIO",            "No such device or address"),
            ErrnoInfo::new(libc::E2BIG,             "E2BIG",            "Argument list too long"),
            ErrnoInfo::new(libc::ENOEXEC,           "ENOEXEC",          "Exec format error"),
            ErrnoInfo::new(libc::EBADF,             "EBADF",            "Bad file descriptor"),
            ErrnoInfo::new(libc::ECHILD,            "ECHILD",           "No child processes"),
            ErrnoInfo::new(libc::EAGAIN,            "EAGAIN",           "Resource temporarily unavailable"),
            ErrnoInfo::new(libc::ENOMEM,            "ENOMEM",           "Cannot allocate memory"),
            ErrnoInfo::new(libc::EACCES,            "EACCES",           "Permission denied"),
            ErrnoInfo::new(libc::EFAULT,            "EFAULT",           "Bad address"),
            ErrnoInfo::new(libc::ENOTBLK,           "ENOTBLK",          "Block device required"),
            ErrnoInfo::new(libc::EBUSY,             "EBUSY",            "Device or resource busy"),
            ErrnoInfo::new(libc::EEXIST,            "EEXIST",           "File exists"),
            ErrnoInfo::new(libc::EXDEV,             "EXDEV",            "Invalid cross-device link"),
            ErrnoInfo::new(libc::ENODEV,            "ENODEV",           "No such device"),
            ErrnoInfo::new(libc::ENOTDIR,           "ENOTDIR",          "Not a directory"),
            ErrnoInfo::new(libc::EISDIR,            "EISDIR",           "Is a directory"),
            ErrnoInfo::new(libc::EINVAL,            "EINVAL",           "Invalid argument"),
            ErrnoInfo::new(libc::ENFILE,            "ENFILE",           "Too many open files in system"),
            ErrnoInfo::new(libc::EMFILE,            "EMFILE",           "Too many open files"),
            ErrnoInfo::new(libc::ENOTTY,            "ENOTTY",           "Inappropriate ioctl for device"),
            ErrnoInfo::new(libc::ETXTBSY,           "ETXTBSY",          "Text file busy"),
            ErrnoInfo::new(libc::EFBIG,             "EFBIG",            "File too large"),
            ErrnoInfo::new(libc::ENOSPC,            "ENOSPC",           "No space left on device"),
            ErrnoInfo::new(libc::ESPIPE,            "ESPIPE",           "Illegal seek"),
            ErrnoInfo::new(libc::EROFS,             "EROFS",            "Read-only file system"),
            ErrnoInfo::new(libc::EMLINK,            "EMLINK",           "Too many links"),
            ErrnoInfo::new(libc::EPIPE,             "EPIPE",            "Broken pipe"),
            ErrnoInfo::new(libc::EDOM,              "EDOM",             "Numerical argument out of domain"),
            ErrnoInfo::new(libc::ERANGE,            "ERANGE",           "Numerical result out of range"),
            ErrnoInfo::new(libc::EDEADLK,           "EDEADLK",          "Resource deadlock avoided"),
            ErrnoInfo::new(libc::ENAMETOOLONG,      "ENAMETOOLONG",     "File name too long"),
            ErrnoInfo::new(libc::ENOLCK,            "ENOLCK",           "No locks available"),
            ErrnoInfo::new(libc::ENOSYS,            "ENOSYS",           "Function not implemented"),
            ErrnoInfo::new(libc::ENOTEMPTY,         "ENOTEMPTY",        "Directory not empty"),
            ErrnoInfo::new(libc::ELOOP,             "ELOOP",            "Too many levels of symbolic links"),
            ErrnoInfo::new(libc::EWOULDBLOCK,       "EWOULDBLOCK",      "Resource temporarily unavailable"),
            ErrnoInfo::new(libc::ENOMSG,            "ENOMSG",           "No message of desired type"),
            ErrnoInfo::new(libc::EIDRM,             "EIDRM",            "Identifier removed"),
            ErrnoInfo::new(libc::EOVERFLOW,         "EOVERFLOW",        "Value too large for defined data type"),
            ErrnoInfo::new(libc::EILSEQ,            "EILSEQ",           "Invalid or incomplete multibyte or wide character"),
            ErrnoInfo::new(libc::ENOTSOCK,          "ENOTSOCK",         "Socket operation on non-socket"),
            ErrnoInfo::new(libc::EDESTADDRREQ,      "EDESTADDRREQ",     "Destination address required"),
            ErrnoInfo::new(libc::EMSGSIZE,          "EMSGSIZE",         "Message too long"),
            ErrnoInfo::new(libc::EPROTOTYPE,        "EPROTOTYPE",       "Protocol wrong type for socket"),
            ErrnoInfo::new(libc::ENOPROTOOPT,       "ENOPROTOOPT",      "Protocol not available"),
            ErrnoInfo::new(libc::EPROTONOSUPPORT,   "EPROTONOSUPPORT",  "Protocol not supported"),
            ErrnoInfo::new(libc::EOPNOTSUPP,        "EOPNOTSUPP",       "Operation not supported"),
            ErrnoInfo::new(libc::EAFNOSUPPORT,      "EAFNOSUPPORT",     "Address family not supported by protocol"),
            ErrnoInfo::new(libc::EADDRINUSE,        "EADDRINUSE",       "Address already in use"),
            ErrnoInfo::new(libc::EADDRNOTAVAIL,     "EADDRNOTAVAIL",    "Cannot assign requested address"),
            ErrnoInfo::new(libc::ENETDOWN,          "ENETDOWN",         "Network is down"),
            ErrnoInfo::new(libc::ENETUNREACH,       "ENETUNREACH",      "Network is unreachable"),
            ErrnoInfo::new(libc::ENETRESET,         "ENETRESET",        "Network dropped connection on reset"),
            ErrnoInfo::new(libc::ECONNABORTED,      "ECONNABORTED",     "Software caused connection abort"),
            ErrnoInfo::new(libc::ECONNRESET,        "ECONNRESET",       "Connection reset by peer"),
            ErrnoInfo::new(libc::ENOBUFS,           "ENOBUFS",          "No buffer space available"),
            ErrnoInfo::new(libc::EISCONN,           "EISCONN",          "Transport endpoint is already connected"),
            ErrnoInfo::new(libc::ENOTCONN,          "ENOTCONN",         "Transport endpoint is not connected"),
            ErrnoInfo::new(libc::ETIMEDOUT,         "ETIMEDOUT",        "Connection timed out"),
            ErrnoInfo::new(libc::ECONNREFUSED,      "ECONNREFUSED",     "Connection refused"),
            ErrnoInfo::new(libc::EHOSTUNREACH,      "EHOSTUNREACH",     "No route to host"),
            ErrnoInfo::new(libc::EALREADY,          "EALREADY",         "Operation already in progress"),
            ErrnoInfo::new(libc::EINPROGRESS,       "EINPROGRESS",      "Operation now in progress"),
            ErrnoInfo::new(libc::ESTALE,            "ESTALE",           "Stale file handle"),
            ErrnoInfo::new(libc::EDQUOT,            "EDQUOT",           "Disk quota exceeded"),
            ErrnoInfo::new(libc::ECANCELED,         "ECANCELED",        "Operation canceled"),
            ErrnoInfo::new(libc::EOWNERDEAD,        "EOWNERDEAD",       "Owner died"),
            ErrnoInfo::new(libc::ENOTRECOVERABLE,   "ENOTRECOVERABLE",  "State not recoverable"),
            ErrnoInfo::new(libc::ENOTSUP,           "ENOTSUP",          "Operation not supported"),
        ];
    }
}

/// All rows in table order.
pub fn iter() -> impl Iterator<Item = &'static ErrnoInfo> {
    TABLE.iter()
}

/// Canonical row for an error number.
pub fn by_number(number: i32) -> Option<&'static ErrnoInfo> {
    TABLE.iter().find(|e| e.number == number)
}

/// Exact, case-insensitive lookup by symbolic name.
pub fn by_name(name: &str) -> Option<&'static ErrnoInfo> {
    let name = name.trim();
    TABLE.iter().find(|e| e.name.eq_ignore_ascii_case(name))
}

pub fn by_name_fuzzy(name: &str) -> Option<&'static ErrnoInfo> {
    by_name_fuzzy_with(name, FUZZY_THRESHOLD)
}

/// Fuzzy lookup by name with a caller-chosen threshold.
///
/// An exact match always wins, so whenever [`by_name`] finds a row this
/// finds the same row.
pub fn by_name_fuzzy_with(name: &str, threshold: f64) -> Option<&'static ErrnoInfo> {
    by_name(name).or_else(|| fuzzy::best_match(name.trim(), TABLE.iter(), |e| e.name, threshold))
}

/// Exact lookup by description.
///
/// Matches the canonical description and also the text the C library's
/// `strerror` produces on this host, which can differ in wording.
pub fn by_text(text: &str) -> Option<&'static ErrnoInfo> {
    let text = text.trim();
    TABLE
        .iter()
        .find(|e| e.description.eq_ignore_ascii_case(text))
        .or_else(|| {
            TABLE
                .iter()
                .find(|e| os_strerror(e.number).eq_ignore_ascii_case(text))
        })
}

pub fn by_text_fuzzy(text: &str) -> Option<&'static ErrnoInfo> {
    by_text_fuzzy_with(text, FUZZY_THRESHOLD)
}

pub fn by_text_fuzzy_with(text: &str, threshold: f64) -> Option<&'static ErrnoInfo> {
    by_text(text).or_else(|| {
        let text = text.trim();
        let canonical = fuzzy::best_match(text, TABLE.iter(), |e| e.description, threshold);
        let os = TABLE
            .iter()
            .map(|e| (e, fuzzy::similarity(text, os_strerror(e.number))))
            .filter(|(_, s)| *s >= threshold)
            .fold(None::<(&'static ErrnoInfo, f64)>, |best, (e, s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((e, s)),
            });
        match (canonical, os) {
            (Some(c), Some((o, s))) if fuzzy::similarity(text, c.description) < s => Some(o),
            (Some(c), _) => Some(c),
            (None, os) => os.map(|(o, _)| o),
        }
    })
}

/// The host C library's own text for `number`.
pub fn os_strerror(number: i32) -> &'static str {
    nix::errno::Errno::from_raw(number).desc()
}

/// Description used in explanations: canonical text, or `Error <n>`.
pub fn strerror(number: i32) -> Cow<'static, str> {
    match by_number(number) {
        Some(e) => Cow::Borrowed(e.description),
        None => Cow::Owned(format!("Error {}", number)),
    }
}

/// Symbolic name, if the number is known.
pub fn name_of(number: i32) -> Option<&'static str> {
    by_number(number).map(|e| e.name)
}

// ============================================================================
// Tests
// ============================================================================
