//! Output sink.
//!
//! The `_or_die` and `_on_error` functions report through a process-wide
//! [`Output`]. The default writes to stderr, prefixed with the program
//! name and wrapped to the terminal width:
//!
//! ```text
//! myprog: open("/x", O_RDONLY) failed, No such file or directory
//!     (ENOENT) because there is no "x" in the pathname, /
//! ```
//!
//! Write failures are discarded; there is nowhere left to report them.

use std::io::{self, Write};
use std::sync::Mutex;

use explain_core::options::{self, Options};
use explain_core::{env, kdebug};

/// Width used when neither the terminal nor `COLUMNS` says otherwise.
pub const DEFAULT_WIDTH: usize = 75;

pub trait Output: Send {
    fn message(&mut self, text: &str);

    /// Leave the process. Sinks that buffer should flush first.
    fn exit(&mut self, status: i32) -> ! {
        std::process::exit(status)
    }
}

// ── Terminal width ───────────────────────────────────────────────

nix::ioctl_read_bad!(tiocgwinsz, libc::TIOCGWINSZ, libc::winsize);

/// Columns of the terminal on stderr, else `$COLUMNS`, else
/// [`DEFAULT_WIDTH`].
pub fn terminal_width() -> usize {
    let mut ws = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // SAFETY: ws is a valid winsize for the kernel to fill.
    if unsafe { tiocgwinsz(libc::STDERR_FILENO, &mut ws) }.is_ok() && ws.ws_col > 0 {
        return ws.ws_col as usize;
    }
    match env::env_get_opt::<usize>("COLUMNS") {
        Some(c) if c > 0 => c,
        _ => DEFAULT_WIDTH,
    }
}

/// Greedy word wrap.
///
/// The first line starts with `prefix`; continuation lines are indented
/// by `indent` spaces. A word longer than the line is left whole.
pub fn wrap(text: &str, width: usize, indent: usize, prefix: &str) -> String {
    let width = width.max(indent + 10);
    let mut out = String::with_capacity(text.len() + prefix.len() + 16);
    out.push_str(prefix);
    let mut col = prefix.chars().count();
    // a prefix such as "prog: " already ends in its separator
    let mut line_empty = prefix.is_empty() || prefix.ends_with(char::is_whitespace);
    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let wlen = word.chars().count();
        if !line_empty && col + 1 + wlen > width {
            out.push('\n');
            out.extend(std::iter::repeat(' ').take(indent));
            col = indent;
            line_empty = true;
        }
        if !line_empty {
            out.push(' ');
            col += 1;
        }
        out.push_str(word);
        col += wlen;
        line_empty = false;
    }
    out
}

// ── Sinks ────────────────────────────────────────────────────────

/// Default sink: stderr, program-name prefix, wrapped.
#[derive(Debug, Default)]
pub struct StderrOutput {
    /// Fixed width; `None` asks the terminal on every message
    width: Option<usize>,
}

impl StderrOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_width(width: usize) -> Self {
        Self { width: Some(width) }
    }

    fn format(&self, text: &str, opts: &Options) -> String {
        let prefix = match opts.resolved_program_name() {
            Some(name) if opts.assemble_program_name => format!("{}: ", name),
            _ => String::new(),
        };
        let width = self.width.unwrap_or_else(terminal_width);
        wrap(text, width, opts.hanging_indent, &prefix)
    }
}

impl Output for StderrOutput {
    fn message(&mut self, text: &str) {
        // keep ordering with whatever the program already printed
        let _ = io::stdout().flush();
        let line = self.format(text, &options::global());
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{}", line);
        let _ = err.flush();
    }
}

/// Sink writing one unwrapped line per message to any writer.
#[derive(Debug)]
pub struct WriterOutput<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterOutput<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Output for WriterOutput<W> {
    fn message(&mut self, text: &str) {
        let _ = writeln!(self.writer, "{}", text);
    }

    fn exit(&mut self, status: i32) -> ! {
        let _ = self.writer.flush();
        std::process::exit(status)
    }
}

/// Sends every message to two sinks; exits through the first.
pub struct TeeOutput {
    first: Box<dyn Output>,
    second: Box<dyn Output>,
}

impl TeeOutput {
    pub fn new(first: Box<dyn Output>, second: Box<dyn Output>) -> Self {
        Self { first, second }
    }
}

impl Output for TeeOutput {
    fn message(&mut self, text: &str) {
        self.first.message(text);
        self.second.message(text);
    }

    fn exit(&mut self, status: i32) -> ! {
        self.first.exit(status)
    }
}

// ── Process-wide sink ────────────────────────────────────────────

static SINK: Mutex<Option<Box<dyn Output>>> = Mutex::new(None);

/// Replace the process-wide sink; `None` restores the stderr default.
///
/// The previous sink is dropped here.
pub fn set_output(sink: Option<Box<dyn Output>>) {
    let mut slot = SINK.lock().unwrap_or_else(|e| e.into_inner());
    *slot = sink;
}

fn with_sink<R>(f: impl FnOnce(&mut dyn Output) -> R) -> R {
    let mut slot = SINK.lock().unwrap_or_else(|e| e.into_inner());
    let sink = slot.get_or_insert_with(|| Box::new(StderrOutput::new()));
    f(sink.as_mut())
}

/// Emit `text` through the current sink.
pub fn message(text: &str) {
    kdebug!("output: {} bytes", text.len());
    with_sink(|s| s.message(text));
}

/// Exit through the current sink with `EXIT_FAILURE`.
pub fn exit_failure() -> ! {
    with_sink(|s| s.exit(libc::EXIT_FAILURE))
}

/// Emit `text` and exit with `EXIT_FAILURE`.
pub fn die_with(text: &str) -> ! {
    message(text);
    exit_failure()
}
