//! End-to-end explanations, through the public entry points.

use std::os::fd::AsRawFd;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use explain_core::options;
use explain_probe::Identity;
use serial_test::serial;

use crate::assemble;
use crate::syscall::open::Open;
use crate::syscall::PathArg;
use crate::*;

fn defaults() {
    options::set_global(Options::new());
}

/// `open(path, O_RDONLY)` failing with EACCES, judged as `id`.
fn open_denied_as(path: &Path, id: Identity) -> String {
    let call = Open { pathname: PathArg::probe(path), flags: libc::O_RDONLY, mode: 0 };
    let mut sb = StringBuffer::new(DEFAULT_CAPACITY);
    assemble::assemble_as(&mut sb, &call, libc::EACCES, &Options::new(), id);
    sb.into_string()
}

#[test]
#[serial]
fn test_missing_directory_component() {
    defaults();
    assert_eq!(
        explain_errno_open(libc::ENOENT, "/nonexistent/file", libc::O_RDONLY, 0),
        "open(\"/nonexistent/file\", O_RDONLY) failed, No such file or directory (ENOENT) \
         because there is no \"nonexistent\" directory in the pathname, /"
    );
}

#[test]
#[serial]
fn test_search_permission_denied() {
    let base = tempfile::tempdir().unwrap();
    std::fs::set_permissions(base.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
    let locked = base.path().join("root");
    std::fs::create_dir(&locked).unwrap();
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o700)).unwrap();
    let owner = std::fs::metadata(&locked).unwrap().uid();
    let uid = if owner == 1000 { 1001 } else { 1000 };

    let secret = locked.join("secret");
    assert_eq!(
        open_denied_as(&secret, Identity::new(uid, uid)),
        format!(
            "open(\"{}\", O_RDONLY) failed, Permission denied (EACCES) because the process does \
             not have search permission to the \"root\" directory, the effective UID of the \
             process ({}) is not the owner ({}) of the directory, and the directory's \
             permission mode is 0700 (rwx------)",
            secret.display(),
            uid,
            owner
        )
    );
}

#[test]
#[serial]
fn test_search_permission_denied_under_slash_root() {
    // Only meaningful on hosts where /root is the usual private home.
    let Ok(meta) = std::fs::metadata("/root") else {
        return;
    };
    if !meta.is_dir() || meta.uid() != 0 || meta.mode() & 0o7777 != 0o700 {
        return;
    }
    assert_eq!(
        open_denied_as(Path::new("/root/secret"), Identity::new(1000, 1000)),
        "open(\"/root/secret\", O_RDONLY) failed, Permission denied (EACCES) because the \
         process does not have search permission to the \"root\" directory, the effective UID \
         of the process (1000) is not the owner (0) of the directory, and the directory's \
         permission mode is 0700 (rwx------)"
    );
}

#[test]
#[serial]
fn test_write_on_read_only_descriptor() {
    defaults();
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let f = std::fs::File::open(tmp.path()).unwrap();
    let fd = f.as_raw_fd();
    assert_eq!(
        explain_errno_write(libc::EBADF, fd, "hello", 5),
        format!(
            "write({}, \"hello\", 5) failed, Bad file descriptor (EBADF) because the fildes \
             argument does not refer to an object that is open for writing (O_RDONLY)",
            fd
        )
    );
}

#[test]
#[serial]
fn test_cross_device_rename() {
    defaults();
    assert_eq!(
        explain_errno_rename(libc::EXDEV, "/mnt/a/x", "/mnt/b/x"),
        "rename(\"/mnt/a/x\", \"/mnt/b/x\") failed, Invalid cross-device link (EXDEV) because \
         oldpath and newpath are not on the same mounted filesystem"
    );
}

#[test]
#[serial]
fn test_unknown_ioctl_on_socket() {
    defaults();
    let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let fd = sock.as_raw_fd();
    assert_eq!(
        explain_errno_ioctl(libc::EINVAL, fd, 0x89a0, 0),
        format!(
            "ioctl({}, 0x89a0, \u{2026}) failed, Invalid argument (EINVAL) because the file \
             descriptor does not refer to a PPP interface",
            fd
        )
    );
}

#[test]
#[serial]
fn test_unknown_host() {
    defaults();
    assert_eq!(
        explain_errno_getaddrinfo(libc::EAI_NONAME, "no.such.host.invalid", None::<&str>, None),
        "getaddrinfo(\"no.such.host.invalid\", NULL, NULL, ...) failed, the node or service is \
         not known (EAI_NONAME)"
    );
}

// ── Properties ───────────────────────────────────────────────────

#[test]
#[serial]
fn test_output_is_bounded_at_every_capacity() {
    defaults();
    let full = explain_errno_open(libc::ENOENT, "/nonexistent/file", libc::O_RDONLY, 0);
    for cap in 1..full.len() + 8 {
        let mut buf = vec![0xffu8; cap];
        let n = explain_message_errno_open(&mut buf, libc::ENOENT, "/nonexistent/file", libc::O_RDONLY, 0)
            .len();
        assert!(n < cap, "capacity {} gave {} bytes", cap, n);
        assert_eq!(buf[n], 0, "capacity {} not NUL terminated", cap);
    }
    let mut big = vec![0u8; full.len() + 1];
    assert_eq!(
        explain_message_errno_open(&mut big, libc::ENOENT, "/nonexistent/file", libc::O_RDONLY, 0),
        full
    );
}

#[test]
#[serial]
fn test_truncation_keeps_escapes_whole() {
    defaults();
    let name = "/tmp/a\nb\"c";
    let full = explain_errno_open(libc::ENOENT, name, libc::O_RDONLY, 0);
    for cap in 1..full.len() + 2 {
        let mut buf = vec![0u8; cap];
        let text = explain_message_errno_open(&mut buf, libc::ENOENT, name, libc::O_RDONLY, 0);
        let trailing = text.chars().rev().take_while(|&c| c == '\\').count();
        assert!(trailing % 2 == 0, "capacity {} split an escape: {:?}", cap, text);
    }
}

#[test]
#[serial]
fn test_deterministic() {
    defaults();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing/deeper");
    let a = explain_errno_open(libc::ENOENT, path.as_path(), libc::O_RDONLY, 0);
    let b = explain_errno_open(libc::ENOENT, path.as_path(), libc::O_RDONLY, 0);
    assert_eq!(a, b);
}

#[test]
#[serial]
fn test_first_matching_cause_wins() {
    defaults();
    // Both paths fail to resolve; oldpath is checked first.
    let text = explain_errno_rename(libc::ENOENT, "/nonexistent-old/a", "/nonexistent-new/b");
    assert!(text.contains("because there is no \"nonexistent-old\" directory in the oldpath"));
    assert!(!text.contains("because there is no \"nonexistent-new\""));
}

#[test]
#[serial]
fn test_success_form() {
    defaults();
    assert_eq!(explain_errno_close(0, 3), "close(3): success");
}
