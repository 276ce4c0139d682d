//! Request lookup.

use std::collections::HashMap;

use explain_core::ktrace;

use super::catalog::{IoctlDescriptor, CATALOG};

/// Result of looking a request up for a particular descriptor.
#[derive(Debug, Clone, Copy)]
pub enum Lookup {
    /// The entry the caller meant.
    Found(&'static IoctlDescriptor),
    /// The number is known, but no entry sharing it accepts the descriptor.
    /// Holds the first entry with that number.
    Rejected(&'static IoctlDescriptor),
    Unknown,
}

impl Lookup {
    pub fn descriptor(&self) -> Option<&'static IoctlDescriptor> {
        match *self {
            Lookup::Found(d) | Lookup::Rejected(d) => Some(d),
            Lookup::Unknown => None,
        }
    }
}

/// Find the catalog entry for `request` as issued on `fd`.
pub fn find(fd: i32, request: u64, data: usize) -> Lookup {
    find_in(CATALOG, fd, request, data)
}

pub(crate) fn find_in(
    table: &'static [IoctlDescriptor],
    fd: i32,
    request: u64,
    data: usize,
) -> Lookup {
    let mut first = None;
    for desc in table.iter().filter(|d| d.number == request) {
        first.get_or_insert(desc);
        match desc.disambiguate {
            None => return Lookup::Found(desc),
            Some(pick) if pick(fd, request, data) => return Lookup::Found(desc),
            Some(_) => ktrace!("ioctl {:#x}: not {} on fd {}", request, desc.name, fd),
        }
    }
    match first {
        Some(desc) => Lookup::Rejected(desc),
        None => Lookup::Unknown,
    }
}

/// Look a request up by name.
pub fn by_name(name: &str) -> Option<&'static IoctlDescriptor> {
    CATALOG.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}

/// Entries that could never be selected: a shared number whose entries
/// before the last lack a disambiguator.
pub fn check_conflicts() -> Vec<(&'static str, &'static str)> {
    conflicts_in(CATALOG)
}

pub(crate) fn conflicts_in(
    table: &'static [IoctlDescriptor],
) -> Vec<(&'static str, &'static str)> {
    let mut groups: HashMap<u64, Vec<&'static IoctlDescriptor>> = HashMap::new();
    for desc in table {
        groups.entry(desc.number).or_default().push(desc);
    }
    let mut out = Vec::new();
    for desc in table {
        let group = &groups[&desc.number];
        let Some(pos) = group.iter().position(|d| std::ptr::eq(*d, desc)) else {
            continue;
        };
        if pos + 1 < group.len() && desc.disambiguate.is_none() {
            out.push((desc.name, group[pos + 1].name));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ioctl::catalog::{DataKind, DeviceClass};
    use std::os::fd::AsRawFd;

    #[test]
    fn test_catalog_has_no_shadowed_entries() {
        assert!(check_conflicts().is_empty(), "{:?}", check_conflicts());
    }

    #[test]
    fn test_conflict_detected() {
        static BAD: &[IoctlDescriptor] = &[
            IoctlDescriptor {
                name: "A",
                number: 1,
                class: DeviceClass::Any,
                disambiguate: None,
                data: DataKind::None,
                privilege: None,
            },
            IoctlDescriptor {
                name: "B",
                number: 1,
                class: DeviceClass::Any,
                disambiguate: None,
                data: DataKind::None,
                privilege: None,
            },
        ];
        assert_eq!(conflicts_in(BAD), vec![("A", "B")]);
    }

    #[test]
    fn test_shared_number_resolves_by_descriptor() {
        let f = tempfile::tempfile().unwrap();
        match find(f.as_raw_fd(), 0x541B, 0) {
            Lookup::Found(d) => assert_eq!(d.name, "FIONREAD"),
            other => panic!("unexpected {:?}", other),
        }

        let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        match find(sock.as_raw_fd(), 0x541B, 0) {
            Lookup::Found(d) => assert_eq!(d.name, "SIOCINQ"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_device_private_and_unknown() {
        let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        // No ifreq naming a ppp interface, so the PPP entry declines and
        // SIOCDEVPRIVATE takes it.
        match find(sock.as_raw_fd(), 0x89F0, 0) {
            Lookup::Found(d) => assert_eq!(d.name, "SIOCDEVPRIVATE"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(find(sock.as_raw_fd(), 0x89a0, 0), Lookup::Unknown));
    }

    #[test]
    fn test_all_entries_decline() {
        fn never(_: i32, _: u64, _: usize) -> bool {
            false
        }
        static PICKY: &[IoctlDescriptor] = &[IoctlDescriptor {
            name: "PICKY",
            number: 7,
            class: DeviceClass::Terminal,
            disambiguate: Some(never),
            data: DataKind::Int,
            privilege: None,
        }];
        match find_in(PICKY, 0, 7, 0) {
            Lookup::Rejected(d) => assert_eq!(d.name, "PICKY"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(find_in(PICKY, 0, 8, 0).descriptor().is_none());
    }

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("tcgets").map(|d| d.number), Some(0x5401));
        assert!(by_name("NOPE").is_none());
    }
}
