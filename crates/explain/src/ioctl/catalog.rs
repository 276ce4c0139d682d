//! Known ioctl requests.
//!
//! Request numbers are only unique per driver, so several entries may share
//! one. Entries sharing a number are tried in table order; every one but the
//! last carries a disambiguator that looks at the descriptor (and the data
//! argument) to decide whether it is the request the caller meant.

use std::fmt;
use std::mem::size_of;

use explain_probe::fildes;
use explain_probe::{Capability, UserBuf};

/// What kind of object a request is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Any,
    Terminal,
    Socket,
    BlockDevice,
    Ppp,
}

impl DeviceClass {
    /// Noun used in "does not refer to a ...".
    pub fn describe(&self) -> &'static str {
        match self {
            DeviceClass::Any => "file",
            DeviceClass::Terminal => "terminal",
            DeviceClass::Socket => "socket",
            DeviceClass::BlockDevice => "block device",
            DeviceClass::Ppp => "PPP interface",
        }
    }

    /// Does the descriptor belong to this class?
    pub fn matches(&self, fd: i32, data: usize) -> bool {
        match self {
            DeviceClass::Any => true,
            DeviceClass::Terminal => fildes::is_tty(fd),
            DeviceClass::Socket => fildes::is_socket(fd),
            DeviceClass::BlockDevice => fildes::is_block_device(fd),
            DeviceClass::Ppp => ppp_interface(fd, 0, data),
        }
    }
}

/// Shape of the third argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// Ignored by the driver.
    None,
    /// Passed by value.
    Int,
    /// Pointer to `n` bytes the driver reads.
    In(usize),
    /// Pointer to `n` bytes the driver fills in.
    Out(usize),
    InOut(usize),
    /// Pointer to a `struct ifreq`, whose name field selects the interface.
    IfReq,
    Unknown,
}

impl DataKind {
    /// Bytes the driver touches through the pointer, if it is one.
    pub fn pointee_size(&self) -> Option<usize> {
        match *self {
            DataKind::In(n) | DataKind::Out(n) | DataKind::InOut(n) => Some(n),
            DataKind::IfReq => Some(IFREQ_SIZE),
            DataKind::None | DataKind::Int | DataKind::Unknown => None,
        }
    }
}

/// Decides whether a shared request number means this entry.
pub type Disambiguator = fn(fd: i32, request: u64, data: usize) -> bool;

#[derive(Clone, Copy)]
pub struct IoctlDescriptor {
    pub name: &'static str,
    pub number: u64,
    pub class: DeviceClass,
    pub disambiguate: Option<Disambiguator>,
    pub data: DataKind,
    /// Needed to perform the request at all.
    pub privilege: Option<Capability>,
}

impl fmt::Debug for IoctlDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoctlDescriptor")
            .field("name", &self.name)
            .field("number", &format_args!("{:#x}", self.number))
            .field("class", &self.class)
            .field("data", &self.data)
            .finish()
    }
}

const fn entry(name: &'static str, number: u64, class: DeviceClass, data: DataKind) -> IoctlDescriptor {
    IoctlDescriptor { name, number, class, disambiguate: None, data, privilege: None }
}

const fn shared(
    name: &'static str,
    number: u64,
    class: DeviceClass,
    data: DataKind,
    disambiguate: Disambiguator,
) -> IoctlDescriptor {
    IoctlDescriptor { name, number, class, disambiguate: Some(disambiguate), data, privilege: None }
}

const fn privileged(
    name: &'static str,
    number: u64,
    class: DeviceClass,
    data: DataKind,
    cap: Capability,
) -> IoctlDescriptor {
    IoctlDescriptor { name, number, class, disambiguate: None, data, privilege: Some(cap) }
}

// ── Request number encoding ──────────────────────────────────────

const NRBITS: u32 = 8;
const TYPEBITS: u32 = 8;
const SIZEBITS: u32 = 14;
const NRSHIFT: u32 = 0;
const TYPESHIFT: u32 = NRSHIFT + NRBITS;
const SIZESHIFT: u32 = TYPESHIFT + TYPEBITS;
const DIRSHIFT: u32 = SIZESHIFT + SIZEBITS;

const IOC_NONE: u64 = 0;
const IOC_WRITE: u64 = 1;
const IOC_READ: u64 = 2;

const fn ioc(dir: u64, ty: u8, nr: u8, size: usize) -> u64 {
    (dir << DIRSHIFT) | ((ty as u64) << TYPESHIFT) | ((nr as u64) << NRSHIFT) | ((size as u64) << SIZESHIFT)
}

const fn io(ty: u8, nr: u8) -> u64 {
    ioc(IOC_NONE, ty, nr, 0)
}

const fn ior(ty: u8, nr: u8, size: usize) -> u64 {
    ioc(IOC_READ, ty, nr, size)
}

const fn iow(ty: u8, nr: u8, size: usize) -> u64 {
    ioc(IOC_WRITE, ty, nr, size)
}

/// Fields of an `_IOC`-encoded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    pub dir: u64,
    pub ty: u8,
    pub nr: u8,
    pub size: usize,
}

impl Encoded {
    pub fn decode(request: u64) -> Self {
        Self {
            dir: (request >> DIRSHIFT) & 0x3,
            ty: ((request >> TYPESHIFT) & 0xff) as u8,
            nr: ((request >> NRSHIFT) & 0xff) as u8,
            size: ((request >> SIZESHIFT) & ((1 << SIZEBITS) - 1)) as usize,
        }
    }
}

impl fmt::Display for Encoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.dir {
            IOC_NONE => "_IOC_NONE",
            IOC_READ => "_IOC_READ",
            IOC_WRITE => "_IOC_WRITE",
            _ => "_IOC_READ | _IOC_WRITE",
        };
        if self.ty.is_ascii_graphic() {
            write!(f, "_IOC({}, '{}', {:#x}, {})", dir, self.ty as char, self.nr, self.size)
        } else {
            write!(f, "_IOC({}, {:#x}, {:#x}, {})", dir, self.ty, self.nr, self.size)
        }
    }
}

// ── Disambiguators ───────────────────────────────────────────────

const IFNAMSIZ: usize = 16;
const IFREQ_SIZE: usize = 40;

/// Interface name at the front of a `struct ifreq`, if readable.
pub fn ifreq_name(data: usize) -> Option<String> {
    if data == 0 {
        return None;
    }
    // SAFETY: probe() checks every byte is readable before copying.
    let buf = unsafe { UserBuf::from_raw(data as *const u8, IFNAMSIZ) };
    let bytes = buf.probe(IFNAMSIZ).into_owned();
    let raw = bytes.as_bytes()?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&raw[..end]).into_owned())
}

fn on_tty(fd: i32, _: u64, _: usize) -> bool {
    fildes::is_tty(fd)
}

fn on_socket(fd: i32, _: u64, _: usize) -> bool {
    fildes::is_socket(fd)
}

/// A `/dev/ppp` channel, or a socket request naming a `ppp` interface.
pub fn ppp_interface(fd: i32, _: u64, data: usize) -> bool {
    if fildes::is_ppp_channel(fd) {
        return true;
    }
    fildes::is_socket(fd) && ifreq_name(data).map(|n| n.starts_with("ppp")).unwrap_or(false)
}

// ── The table ────────────────────────────────────────────────────

use DataKind::{InOut, IfReq, In, Int, Out};
use DeviceClass::{Any, BlockDevice, Ppp, Socket, Terminal};

const INT: usize = size_of::<libc::c_int>();
const TERMIOS: usize = size_of::<libc::termios>();
const WINSIZE: usize = size_of::<libc::winsize>();
const PID: usize = size_of::<libc::pid_t>();
const ULONG: usize = size_of::<libc::c_ulong>();
const IFCONF: usize = size_of::<libc::c_int>() * 2 + size_of::<usize>();

pub static CATALOG: &[IoctlDescriptor] = &[
    // Terminals
    entry("TCGETS", 0x5401, Terminal, Out(TERMIOS)),
    entry("TCSETS", 0x5402, Terminal, In(TERMIOS)),
    entry("TCSETSW", 0x5403, Terminal, In(TERMIOS)),
    entry("TCSETSF", 0x5404, Terminal, In(TERMIOS)),
    entry("TIOCEXCL", 0x540C, Terminal, DataKind::None),
    entry("TIOCNXCL", 0x540D, Terminal, DataKind::None),
    entry("TIOCSCTTY", 0x540E, Terminal, Int),
    entry("TIOCGPGRP", 0x540F, Terminal, Out(PID)),
    entry("TIOCSPGRP", 0x5410, Terminal, In(PID)),
    shared("TIOCOUTQ", 0x5411, Terminal, Out(INT), on_tty),
    entry("SIOCOUTQ", 0x5411, Socket, Out(INT)),
    entry("TIOCGWINSZ", 0x5413, Terminal, Out(WINSIZE)),
    entry("TIOCSWINSZ", 0x5414, Terminal, In(WINSIZE)),
    shared("TIOCINQ", 0x541B, Terminal, Out(INT), on_tty),
    shared("SIOCINQ", 0x541B, Socket, Out(INT), on_socket),
    entry("FIONREAD", 0x541B, Any, Out(INT)),
    privileged("TIOCCONS", 0x541D, Terminal, DataKind::None, Capability::SysAdmin),
    entry("FIONBIO", 0x5421, Any, In(INT)),
    entry("TIOCNOTTY", 0x5422, Terminal, DataKind::None),
    privileged("TIOCVHANGUP", 0x5437, Terminal, DataKind::None, Capability::SysAdmin),
    entry("FIONCLEX", 0x5450, Any, DataKind::None),
    entry("FIOCLEX", 0x5451, Any, DataKind::None),
    entry("FIOASYNC", 0x5452, Any, In(INT)),
    // Network interfaces
    entry("SIOCGIFNAME", 0x8910, Socket, IfReq),
    entry("SIOCGIFCONF", 0x8912, Socket, InOut(IFCONF)),
    entry("SIOCGIFFLAGS", 0x8913, Socket, IfReq),
    privileged("SIOCSIFFLAGS", 0x8914, Socket, IfReq, Capability::NetAdmin),
    entry("SIOCGIFADDR", 0x8915, Socket, IfReq),
    privileged("SIOCSIFADDR", 0x8916, Socket, IfReq, Capability::NetAdmin),
    entry("SIOCGIFMTU", 0x8921, Socket, IfReq),
    privileged("SIOCSIFMTU", 0x8922, Socket, IfReq, Capability::NetAdmin),
    entry("SIOCGIFHWADDR", 0x8927, Socket, IfReq),
    entry("SIOCGIFINDEX", 0x8933, Socket, IfReq),
    shared("SIOCGPPPSTATS", 0x89F0, Ppp, IfReq, ppp_interface),
    shared("SIOCGPPPVER", 0x89F1, Ppp, IfReq, ppp_interface),
    shared("SIOCGPPPCSTATS", 0x89F2, Ppp, IfReq, ppp_interface),
    entry("SIOCDEVPRIVATE", 0x89F0, Socket, DataKind::Unknown),
    // Block devices
    privileged("BLKROSET", io(0x12, 93), BlockDevice, In(INT), Capability::SysAdmin),
    entry("BLKROGET", io(0x12, 94), BlockDevice, Out(INT)),
    entry("BLKGETSIZE", io(0x12, 96), BlockDevice, Out(ULONG)),
    privileged("BLKFLSBUF", io(0x12, 97), BlockDevice, DataKind::None, Capability::SysAdmin),
    entry("BLKSSZGET", io(0x12, 104), BlockDevice, Out(INT)),
    entry("BLKGETSIZE64", ior(0x12, 114, size_of::<usize>()), BlockDevice, Out(8)),
    entry("BLKPBSZGET", io(0x12, 123), BlockDevice, Out(INT)),
    // PPP channels and units
    entry("PPPIOCGCHAN", ior(b't', 55, INT), Ppp, Out(INT)),
    entry("PPPIOCSDEBUG", iow(b't', 64, INT), Ppp, In(INT)),
    entry("PPPIOCGDEBUG", ior(b't', 65, INT), Ppp, Out(INT)),
    entry("PPPIOCSMRU", iow(b't', 82, INT), Ppp, In(INT)),
    entry("PPPIOCGMRU", ior(b't', 83, INT), Ppp, Out(INT)),
    entry("PPPIOCGUNIT", ior(b't', 86, INT), Ppp, Out(INT)),
    entry("PPPIOCSFLAGS", iow(b't', 89, INT), Ppp, In(INT)),
    entry("PPPIOCGFLAGS", ior(b't', 90, INT), Ppp, Out(INT)),
];

/// Device class implied by where an unlisted request number falls.
pub fn class_hint(request: u64) -> Option<DeviceClass> {
    if request <= 0xffff {
        return match request {
            0x5400..=0x54ff => Some(Terminal),
            0x89a0..=0x89af | 0x89f0..=0x89ff => Some(Ppp),
            0x8900..=0x89ff => Some(Socket),
            0x1200..=0x12ff => Some(BlockDevice),
            _ => None,
        };
    }
    match Encoded::decode(request).ty {
        0x12 => Some(BlockDevice),
        b't' => Some(Ppp),
        b'T' => Some(Terminal),
        _ => None,
    }
}
