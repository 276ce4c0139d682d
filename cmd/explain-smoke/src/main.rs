//! Explain End-to-End Smoke Test
//!
//! Makes real calls fail against throwaway fixtures and checks what the
//! `_on_error` wrappers report:
//!   Part A (Paths): open, mkdir, rmdir, unlink, rename, link, chdir, stat, access
//!   Part B (Descriptors): read, write, close, dup2
//!   Part C (ioctl): terminal request on a file, unknown request on a socket
//!   Part D (getaddrinfo): an unresolvable host
//!   Part E (Bounded): messages into small caller buffers
//!
//! Run: ./target/release/explain-smoke
//! (Part A's permission check is skipped when running as root)

use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::sync::{Arc, Mutex};

use explain::{Options, Output};

// ── Captured output ──

/// Collects every reported message.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<String>>>);

impl Capture {
    fn take(&self) -> String {
        let mut v = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let last = v.pop().unwrap_or_default();
        v.clear();
        last
    }
}

impl Output for Capture {
    fn message(&mut self, text: &str) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(text.to_string());
    }
}

// ── Test harness ──

struct TestRunner {
    total: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
    capture: Capture,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl TestRunner {
    fn new(capture: Capture) -> Self {
        Self { total: 0, passed: 0, failed: 0, skipped: 0, capture }
    }

    fn section(&self, name: &str) {
        println!("\n{}", LINE);
        println!("  {}", name);
        println!("{}", LINE);
    }

    fn pass(&mut self, name: &str) {
        self.total += 1;
        self.passed += 1;
        println!("  [{:2}] {:<52} PASS", self.total, name);
    }

    fn fail(&mut self, name: &str, reason: &str) {
        self.total += 1;
        self.failed += 1;
        println!("  [{:2}] {:<52} FAIL: {}", self.total, name, reason);
    }

    fn skip(&mut self, name: &str, reason: &str) {
        self.total += 1;
        self.skipped += 1;
        println!("  [{:2}] {:<52} SKIP: {}", self.total, name, reason);
    }

    fn check(&mut self, name: &str, ok: bool, reason: &str) {
        if ok { self.pass(name); } else { self.fail(name, reason); }
    }

    /// The call must fail with `errnum` and its report must contain `needle`.
    fn expect<T>(&mut self, name: &str, r: io::Result<T>, errnum: i32, needle: &str) {
        let text = self.capture.take();
        match r {
            Ok(_) => self.fail(name, "call succeeded"),
            Err(e) if e.raw_os_error() != Some(errnum) => {
                self.fail(name, &format!("errno {:?}, wanted {}", e.raw_os_error(), errnum))
            }
            Err(_) if !text.contains(needle) => self.fail(name, &format!("got: {}", text)),
            Err(_) => self.pass(name),
        }
    }

    fn summary(&self) {
        println!("\n{}", LINE);
        println!(
            "  Total: {}  Passed: {}  Failed: {}  Skipped: {}",
            self.total, self.passed, self.failed, self.skipped
        );
        println!("{}", LINE);
    }
}

// ════════════════════════════════════════════════════════════
// Part A: Paths
// ════════════════════════════════════════════════════════════

fn test_paths(t: &mut TestRunner, root: &Path) {
    t.section("Part A: Paths");

    let missing = root.join("nonexistent/file");
    t.expect(
        "open missing directory",
        explain::open_on_error(&missing, libc::O_RDONLY, 0),
        libc::ENOENT,
        "there is no \"nonexistent\" directory in the pathname",
    );

    let dir = root.join("dir");
    let _ = std::fs::create_dir(&dir);
    t.expect(
        "mkdir existing",
        explain::mkdir_on_error(&dir, 0o755),
        libc::EEXIST,
        "pathname already exists as a directory",
    );

    let _ = std::fs::write(dir.join("child"), b"x");
    let r = explain::rmdir_on_error(&dir);
    let text = t.capture.take();
    let errnum = r.as_ref().err().and_then(|e| e.raw_os_error());
    t.check(
        "rmdir non-empty",
        matches!(errnum, Some(libc::ENOTEMPTY) | Some(libc::EEXIST)) && text.contains("(1 entry)"),
        &text,
    );

    t.expect(
        "unlink directory",
        explain::unlink_on_error(&dir),
        libc::EISDIR,
        "directories may not be unlinked",
    );

    t.expect(
        "rename missing source",
        explain::rename_on_error(&root.join("ghost"), &root.join("other")),
        libc::ENOENT,
        "in the oldpath",
    );

    let file = root.join("file");
    let _ = std::fs::write(&file, b"hello");
    t.expect(
        "link onto existing name",
        explain::link_on_error(&file, &file),
        libc::EEXIST,
        "newpath already exists as a regular file",
    );

    t.expect(
        "chdir into a file",
        explain::chdir_on_error(&file),
        libc::ENOTDIR,
        "is being used as a directory when it is not",
    );

    t.expect(
        "stat missing",
        explain::stat_on_error(&root.join("ghost")),
        libc::ENOENT,
        "there is no \"ghost\"",
    );

    if nix::unistd::geteuid().is_root() {
        t.skip("access denied", "running as root");
    } else {
        use std::os::unix::fs::PermissionsExt;
        let locked = root.join("locked");
        let _ = std::fs::create_dir(&locked);
        let _ = std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000));
        t.expect(
            "access denied",
            explain::access_on_error(&locked.join("x"), libc::R_OK),
            libc::EACCES,
            "does not have search permission to the \"locked\" directory",
        );
        let _ = std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o700));
    }
}

// ════════════════════════════════════════════════════════════
// Part B: Descriptors
// ════════════════════════════════════════════════════════════

fn test_descriptors(t: &mut TestRunner, root: &Path) {
    t.section("Part B: Descriptors");

    let path = root.join("data");
    let _ = std::fs::write(&path, b"hello");
    let Ok(ro) = std::fs::File::open(&path) else {
        t.fail("open fixture", "cannot open data file");
        return;
    };
    t.expect(
        "write to read-only descriptor",
        explain::write_on_error(ro.as_raw_fd(), b"hello"),
        libc::EBADF,
        "does not refer to an object that is open for writing (O_RDONLY)",
    );

    let Ok(wo) = std::fs::OpenOptions::new().write(true).open(&path) else {
        t.fail("open fixture", "cannot reopen data file");
        return;
    };
    let mut buf = [0u8; 8];
    t.expect(
        "read from write-only descriptor",
        explain::read_on_error(wo.as_raw_fd(), &mut buf),
        libc::EBADF,
        "open for reading (O_WRONLY)",
    );

    t.expect("close negative", explain::close_on_error(-3), libc::EBADF, "is negative (-3)");

    t.expect(
        "dup2 closed descriptor",
        explain::dup2_on_error(9999, 10000),
        libc::EBADF,
        "oldfd argument",
    );
}

// ════════════════════════════════════════════════════════════
// Part C: ioctl
// ════════════════════════════════════════════════════════════

fn test_ioctl(t: &mut TestRunner, root: &Path) {
    t.section("Part C: ioctl");

    let path = root.join("plain");
    let _ = std::fs::write(&path, b"");
    let Ok(f) = std::fs::File::open(&path) else {
        t.fail("open fixture", "cannot open plain file");
        return;
    };
    let mut ws = libc::winsize { ws_row: 0, ws_col: 0, ws_xpixel: 0, ws_ypixel: 0 };
    // SAFETY: TIOCGWINSZ writes one winsize.
    let r = unsafe {
        explain::ioctl_on_error(f.as_raw_fd(), libc::TIOCGWINSZ as u64, &mut ws as *mut _ as *mut _)
    };
    t.expect("TIOCGWINSZ on a file", r, libc::ENOTTY, "does not refer to a terminal");

    match std::net::UdpSocket::bind("127.0.0.1:0") {
        Ok(sock) => {
            // SAFETY: the request is unknown to the kernel; nothing is written.
            let r = unsafe { explain::ioctl_on_error(sock.as_raw_fd(), 0x89a0, std::ptr::null_mut()) };
            let text = t.capture.take();
            let errnum = r.err().and_then(|e| e.raw_os_error());
            // Privileged callers may get further into the bridge code and
            // fail some other way.
            let by_class = matches!(errnum, Some(libc::EINVAL) | Some(libc::ENOTTY));
            t.check(
                "unknown request on a socket",
                errnum.is_some() && (!by_class || text.contains("does not refer to a PPP interface")),
                &text,
            );
        }
        Err(e) => t.skip("unknown request on a socket", &e.to_string()),
    }
}

// ════════════════════════════════════════════════════════════
// Part D: getaddrinfo
// ════════════════════════════════════════════════════════════

fn test_getaddrinfo(t: &mut TestRunner) {
    t.section("Part D: getaddrinfo");

    let r = explain::getaddrinfo_on_error(
        Some(c"no.such.host.invalid"),
        None,
        None,
    );
    let text = t.capture.take();
    t.check(
        "unresolvable host",
        r.is_err() && text.starts_with("getaddrinfo(\"no.such.host.invalid\", NULL, NULL, ...) failed, "),
        &text,
    );

    let ok = explain::getaddrinfo_on_error(Some(c"127.0.0.1"), Some(c"80"), None);
    t.check("numeric host resolves", ok.map(|v| !v.is_empty()).unwrap_or(false), "no addresses");
}

// ════════════════════════════════════════════════════════════
// Part E: Bounded messages
// ════════════════════════════════════════════════════════════

fn test_bounded(t: &mut TestRunner) {
    t.section("Part E: Bounded messages");

    let full = explain::explain_errno_open(libc::ENOENT, "/nonexistent/file", libc::O_RDONLY, 0);
    let mut ok = true;
    for cap in [1usize, 2, 16, 40, 64, 100, full.len(), full.len() + 1] {
        let mut buf = vec![0xffu8; cap];
        let n = explain::explain_message_errno_open(
            &mut buf,
            libc::ENOENT,
            "/nonexistent/file",
            libc::O_RDONLY,
            0,
        )
        .len();
        ok &= n < cap && buf[n] == 0;
    }
    t.check("every capacity NUL terminated", ok, "overflowed a buffer");

    let mut exact = vec![0u8; full.len() + 1];
    let text = explain::explain_message_errno_open(
        &mut exact,
        libc::ENOENT,
        "/nonexistent/file",
        libc::O_RDONLY,
        0,
    );
    t.check("room for everything", text == full, text);
}

fn main() {
    println!("Explain smoke test");
    explain::options::set_global(Options::from_env().assemble_program_name(false));

    let capture = Capture::default();
    explain::set_output(Some(Box::new(capture.clone())));
    let mut t = TestRunner::new(capture);

    let root = match tempfile::tempdir() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("cannot create fixture directory: {}", e);
            std::process::exit(1);
        }
    };

    test_paths(&mut t, root.path());
    test_descriptors(&mut t, root.path());
    test_ioctl(&mut t, root.path());
    test_getaddrinfo(&mut t);
    test_bounded(&mut t);

    explain::set_output(None);
    t.summary();
    std::process::exit(if t.failed == 0 { 0 } else { 1 });
}
