//! Explanation assembler.
//!
//! Joins the pieces of one explanation:
//!
//! ```text
//! open("/x", O_RDONLY) failed, No such file or directory (ENOENT) because <cause>; <footnotes>
//! └──── signature ───┘         └────── strerror ───────┘ └ name ┘         └ selector ┘
//! ```
//!
//! Each part is built in its own bounded buffer of the caller's capacity
//! (the call descriptor), then copied into the destination. When space
//! runs out the cause is cut first, never inside an escape; if not even
//! the word "because" fits, the short form without it is used.

use std::borrow::Cow;
use std::sync::Mutex;

use explain_core::options::{self, Options};
use explain_core::{errno, StringBuffer, DEFAULT_CAPACITY};
use explain_probe::{Identity, ProbeContext};

use crate::syscall::Syscall;

const BECAUSE: &str = " because ";

/// Buffers for one explanation.
pub struct CallDescriptor {
    pub signature: StringBuffer,
    /// Cause text, with the footnotes sidecar
    pub explanation: StringBuffer,
    pub errnum: i32,
}

impl CallDescriptor {
    pub fn new(capacity: usize, errnum: i32) -> Self {
        Self {
            signature: StringBuffer::new(capacity),
            explanation: StringBuffer::with_footnotes(capacity),
            errnum,
        }
    }

    /// Render the call's signature and select its cause.
    pub fn fill<S: Syscall>(&mut self, call: &S, opts: &Options) {
        self.fill_with(call, opts, || ProbeContext::new(opts.clone()));
    }

    /// As [`fill`](Self::fill), probing through a context built by `make`.
    pub fn fill_with<S: Syscall>(
        &mut self,
        call: &S,
        opts: &Options,
        make: impl FnOnce() -> ProbeContext,
    ) {
        call.print_signature(&mut self.signature, opts);
        if self.errnum == 0 {
            return;
        }
        let mut ctx = make().errnum(self.errnum);
        call.prepare(&mut ctx);
        call.explain_cause(&mut self.explanation, &mut ctx);
        call.footnotes(&mut self.explanation, &mut ctx);
    }
}

/// The thread's current errno.
pub fn last_errno() -> i32 {
    nix::errno::Errno::last() as i32
}

/// `Name` and the error text for an ordinary errno.
fn errno_label(errnum: i32, opts: &Options) -> (Cow<'static, str>, Option<String>) {
    let text = errno::strerror(errnum);
    let label = errno::name_of(errnum).map(|name| {
        if opts.numeric_errno {
            format!("{}, {}", name, errnum)
        } else {
            name.to_string()
        }
    });
    (text, label)
}

/// Assemble the explanation of `call` failing with `errnum` into `out`.
pub fn assemble_into<S: Syscall>(out: &mut StringBuffer, call: &S, errnum: i32, opts: &Options) {
    let mut desc = CallDescriptor::new(out.capacity(), errnum);
    desc.fill(call, opts);
    join(out, &desc, S::IN_BAND.then(|| S::error_label(errnum)), opts);
}

/// As [`assemble_into`], judging permissions as `identity` rather than
/// the calling process.
pub fn assemble_as<S: Syscall>(
    out: &mut StringBuffer,
    call: &S,
    errnum: i32,
    opts: &Options,
    identity: Identity,
) {
    let mut desc = CallDescriptor::new(out.capacity(), errnum);
    desc.fill_with(call, opts, || ProbeContext::with_identity(opts.clone(), identity));
    join(out, &desc, S::IN_BAND.then(|| S::error_label(errnum)), opts);
}

/// Join a filled descriptor. `in_band` carries the label of an error code
/// that is not an errno (getaddrinfo's `EAI_*`).
fn join(out: &mut StringBuffer, desc: &CallDescriptor, in_band: Option<Option<String>>, opts: &Options) {
    out.push_buffer(&desc.signature);
    if desc.errnum == 0 {
        out.push_str(": success");
        return;
    }
    out.push_str(" failed, ");

    if let Some(label) = in_band {
        out.push_buffer(&desc.explanation);
        if let Some(label) = label {
            out.push_str(" (");
            out.push_str(&label);
            out.push_char(')');
        }
        return;
    }

    let (text, label) = errno_label(desc.errnum, opts);
    let mut head = String::from(text);
    if let Some(label) = label {
        head.push_str(" (");
        head.push_str(&label);
        head.push(')');
    }
    out.push_str(&head);
    if desc.explanation.is_empty() || out.remaining() <= BECAUSE.len() {
        return;
    }
    out.push_str(BECAUSE);
    out.push_buffer(&desc.explanation);
    if let Some(notes) = desc.explanation.footnotes().filter(|f| !f.is_empty()) {
        out.push_str("; ");
        out.push_buffer(notes);
    }
}

/// Explanation as an owned string of at most [`DEFAULT_CAPACITY`] bytes,
/// using the process-wide options.
pub fn to_string<S: Syscall>(call: &S, errnum: i32) -> String {
    with_scratch(|sb| {
        assemble_into(sb, call, errnum, &options::global());
        sb.as_str().to_string()
    })
}

/// Explanation written NUL-terminated into `buf`.
pub fn to_message<'b, S: Syscall>(buf: &'b mut [u8], call: &S, errnum: i32) -> &'b str {
    let mut sb = StringBuffer::new(buf.len());
    assemble_into(&mut sb, call, errnum, &options::global());
    let n = sb.copy_to_c_buffer(buf);
    std::str::from_utf8(&buf[..n]).unwrap_or("")
}

// ── Process-wide scratch ─────────────────────────────────────────

static SCRATCH: Mutex<Option<StringBuffer>> = Mutex::new(None);

/// Run `f` on the shared scratch buffer, emptied first.
///
/// Not for use from signal handlers: the buffer sits behind a mutex.
pub fn with_scratch<R>(f: impl FnOnce(&mut StringBuffer) -> R) -> R {
    let mut slot = SCRATCH.lock().unwrap_or_else(|e| e.into_inner());
    let sb = slot.get_or_insert_with(|| StringBuffer::new(DEFAULT_CAPACITY));
    sb.rewind();
    f(sb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cause::{self, CauseTemplate};

    struct Fake;

    fn render(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Fake) {
        sb.push_str("the fake call always fails");
        sb.add_footnote(format_args!("a footnote"));
    }

    static FAKE_CAUSES: &[CauseTemplate<Fake>] =
        &[CauseTemplate::new(&[libc::EIO], cause::always, render)];

    impl Syscall for Fake {
        const NAME: &'static str = "fake";

        fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
            sb.push_str("fake(1)");
        }

        fn causes() -> &'static [CauseTemplate<Self>] {
            FAKE_CAUSES
        }
    }

    fn assemble(errnum: i32, opts: &Options, cap: usize) -> String {
        let mut sb = StringBuffer::new(cap);
        assemble_into(&mut sb, &Fake, errnum, opts);
        sb.into_string()
    }

    #[test]
    fn test_full_form() {
        assert_eq!(
            assemble(libc::EIO, &Options::new(), 4096),
            "fake(1) failed, Input/output error (EIO) because the fake call always fails; a footnote"
        );
    }

    #[test]
    fn test_numeric_errno() {
        let opts = Options::new().numeric_errno(true);
        assert!(assemble(libc::EIO, &opts, 4096).contains("(EIO, 5) because"));
    }

    #[test]
    fn test_success_and_unknown() {
        assert_eq!(assemble(0, &Options::new(), 4096), "fake(1): success");
        let text = assemble(4000, &Options::new(), 4096);
        assert!(text.starts_with("fake(1) failed, Error 4000 because Error 4000 (no further detail"));
    }

    #[test]
    fn test_truncation_cuts_cause_first() {
        let full = assemble(libc::EIO, &Options::new(), 4096);
        let short_head = "fake(1) failed, Input/output error (EIO)";
        // room for the head only
        let text = assemble(libc::EIO, &Options::new(), short_head.len() + 3);
        assert_eq!(text, short_head);
        for cap in 1..full.len() + 2 {
            let text = assemble(libc::EIO, &Options::new(), cap);
            assert!(text.len() < cap.max(1));
            assert!(full.starts_with(&text));
        }
    }

    struct Quoting;

    fn render_quoted(sb: &mut StringBuffer, _: &mut ProbeContext, _: &Quoting) {
        sb.push_str("there is no ");
        sb.push_quoted(Some(b"a\nb\\c\x01d"));
    }

    static QUOTING_CAUSES: &[CauseTemplate<Quoting>] =
        &[CauseTemplate::new(&[libc::ENOENT], cause::always, render_quoted)];

    impl Syscall for Quoting {
        const NAME: &'static str = "quoting";

        fn print_signature(&self, sb: &mut StringBuffer, _: &Options) {
            sb.push_str("quoting(");
            sb.push_quoted(Some(b"x\ty"));
            sb.push_char(')');
        }

        fn causes() -> &'static [CauseTemplate<Self>] {
            QUOTING_CAUSES
        }
    }

    #[test]
    fn test_truncated_cause_ends_on_whole_escape() {
        let mut sb = StringBuffer::new(4096);
        assemble_into(&mut sb, &Quoting, libc::ENOENT, &Options::new());
        let full = sb.into_string();
        assert!(full.ends_with("there is no \"a\\nb\\\\c\\001d\""));
        for cap in 1..full.len() + 2 {
            let mut sb = StringBuffer::new(cap);
            assemble_into(&mut sb, &Quoting, libc::ENOENT, &Options::new());
            let text = sb.as_str();
            let trailing = text.chars().rev().take_while(|&c| c == '\\').count();
            assert!(trailing % 2 == 0, "capacity {} split an escape: {:?}", cap, text);
            let tail = text.rsplit('\\').next().unwrap_or("");
            let octal_tail = text.len() > tail.len() && !tail.is_empty() && tail.len() < 3
                && tail.bytes().all(|b| b.is_ascii_digit());
            assert!(!octal_tail, "capacity {} split an octal escape: {:?}", cap, text);
        }
    }

    #[test]
    fn test_message_into_caller_buffer() {
        let mut buf = [0xffu8; 32];
        let text = to_message(&mut buf, &Fake, libc::EIO).to_string();
        assert_eq!(text.len(), 31);
        assert!(text.starts_with("fake(1) failed, "));
        assert_eq!(buf[31], 0);
    }
}
