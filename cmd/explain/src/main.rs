//! explain - explain a system call failure from the shell
//!
//! Describes why a call with the given arguments would fail with the given
//! error, probing the live system the same way the library does.
//!
//! Run:
//!   explain -e ENOENT open /nonexistent/file O_RDONLY
//!   explain -e EACCES access /root/secret "R_OK|W_OK"
//!   explain -e EAI_NONAME getaddrinfo no.such.host.invalid
//!   explain errno "no such file"

use std::mem::MaybeUninit;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use explain::bits::parse_number;
use explain::ioctl::dispatch;
use explain::output::{terminal_width, wrap};
use explain::printers;
use explain::{errno, gai, options, ErrnoInfo, ExplainError, Hints, Options, Result};

#[derive(Parser)]
#[command(name = "explain", version, about = "Explain why a system call failed")]
struct Cli {
    /// Error to explain: a number, a name such as ENOENT, or its description
    #[arg(short, long, global = true)]
    errno: Option<String>,

    /// Add Linux-specific detail to explanations
    #[arg(long, global = true)]
    dialect: bool,

    /// Show error numbers alongside names
    #[arg(long, global = true)]
    numeric_errno: bool,

    /// Add self-diagnostic notes
    #[arg(long, global = true)]
    debug: bool,

    /// Print on one line instead of wrapping to the terminal
    #[arg(long, global = true)]
    no_wrap: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look an error up by number, name or description
    Errno { text: Vec<String> },
    /// List the calls that can be explained
    List,
    Open {
        pathname: PathBuf,
        #[arg(default_value = "O_RDONLY")]
        flags: String,
        #[arg(default_value = "0666")]
        mode: String,
    },
    Read {
        #[arg(allow_negative_numbers = true)]
        fildes: i32,
        #[arg(default_value_t = 1)]
        size: usize,
    },
    Write {
        #[arg(allow_negative_numbers = true)]
        fildes: i32,
        #[arg(default_value = "")]
        data: String,
    },
    Close {
        #[arg(allow_negative_numbers = true)]
        fildes: i32,
    },
    Dup2 {
        #[arg(allow_negative_numbers = true)]
        oldfd: i32,
        #[arg(allow_negative_numbers = true)]
        newfd: i32,
    },
    Rename { oldpath: PathBuf, newpath: PathBuf },
    Link { oldpath: PathBuf, newpath: PathBuf },
    Unlink { pathname: PathBuf },
    Rmdir { pathname: PathBuf },
    Mkdir {
        pathname: PathBuf,
        #[arg(default_value = "0777")]
        mode: String,
    },
    Access {
        pathname: PathBuf,
        #[arg(default_value = "F_OK")]
        mode: String,
    },
    Chdir { pathname: PathBuf },
    Stat { pathname: PathBuf },
    Ioctl {
        #[arg(allow_negative_numbers = true)]
        fildes: i32,
        /// Request name (TCGETS) or number (0x5401)
        request: String,
        #[arg(default_value = "0")]
        data: String,
    },
    Getaddrinfo {
        node: Option<String>,
        service: Option<String>,
        /// ai_flags, e.g. "AI_PASSIVE|AI_CANONNAME"
        #[arg(long)]
        flags: Option<String>,
        /// ai_family, e.g. AF_INET
        #[arg(long)]
        family: Option<String>,
        /// ai_socktype, e.g. SOCK_STREAM
        #[arg(long)]
        socktype: Option<String>,
    },
}

// ── Argument parsing ─────────────────────────────────────────────

fn number<T: TryFrom<i64>>(text: &str, caption: &str) -> Result<T> {
    parse_number(text)
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| ExplainError::BadArgument(format!("{} \"{}\" is not a number", caption, text)))
}

/// Exact lookup by number, name or description, then fuzzy by name and
/// description.
fn lookup_errno(text: &str) -> Option<&'static ErrnoInfo> {
    if let Some(n) = parse_number(text) {
        return i32::try_from(n).ok().and_then(errno::by_number);
    }
    errno::by_name(text)
        .or_else(|| errno::by_text(text))
        .or_else(|| errno::by_name_fuzzy(text))
        .or_else(|| errno::by_text_fuzzy(text))
}

fn lookup_gai(text: &str) -> Option<&'static ErrnoInfo> {
    match parse_number(text) {
        Some(n) => i32::try_from(n).ok().and_then(gai::by_number),
        None => gai::by_name_fuzzy(text),
    }
}

/// The `-e` value for a call; getaddrinfo codes live in their own space.
fn error_code(text: Option<&str>, in_band: bool) -> Result<i32> {
    let text = text.ok_or_else(|| {
        ExplainError::BadArgument("no error given, use -e ERRNO".to_string())
    })?;
    let found = if in_band { lookup_gai(text) } else { lookup_errno(text) };
    match found {
        Some(info) => Ok(info.number),
        None => parse_number(text)
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| ExplainError::BadArgument(format!("unknown error \"{}\"", text))),
    }
}

fn ioctl_request(text: &str) -> Result<u64> {
    if let Some(desc) = dispatch::by_name(text) {
        return Ok(desc.number);
    }
    number(text, "ioctl request")
}

fn hints(flags: Option<&str>, family: Option<&str>, socktype: Option<&str>) -> Result<Option<Hints>> {
    if flags.is_none() && family.is_none() && socktype.is_none() {
        return Ok(None);
    }
    Ok(Some(Hints {
        flags: flags.map(printers::parse_ai_flags).transpose()?.unwrap_or(0),
        family: family.map(printers::parse_ai_family).transpose()?.unwrap_or(libc::AF_UNSPEC),
        socktype: socktype.map(printers::parse_ai_socktype).transpose()?.unwrap_or(0),
        protocol: 0,
    }))
}

// ── Commands ─────────────────────────────────────────────────────

fn print_errno(words: &[String]) -> Result<String> {
    let text = words.join(" ");
    let info = lookup_errno(&text)
        .or_else(|| gai::by_name(&text))
        .ok_or_else(|| ExplainError::BadArgument(format!("no error matches \"{}\"", text)))?;
    Ok(format!("{} {} {}", info.name, info.number, info.description))
}

fn list() -> String {
    explain::SYSCALLS.join("\n")
}

fn describe(cli: &Cli) -> Result<String> {
    let e = || error_code(cli.errno.as_deref(), false);
    let text = match &cli.command {
        Command::Errno { text } => return print_errno(text),
        Command::List => return Ok(list()),
        Command::Open { pathname, flags, mode } => explain::explain_errno_open(
            e()?,
            pathname.as_path(),
            printers::parse_open_flags(flags)?,
            number(mode, "mode")?,
        ),
        Command::Read { fildes, size } => {
            let buf = vec![0u8; *size];
            explain::explain_errno_read(e()?, *fildes, buf.as_ptr(), *size)
        }
        Command::Write { fildes, data } => {
            explain::explain_errno_write(e()?, *fildes, data.as_str(), data.len())
        }
        Command::Close { fildes } => explain::explain_errno_close(e()?, *fildes),
        Command::Dup2 { oldfd, newfd } => explain::explain_errno_dup2(e()?, *oldfd, *newfd),
        Command::Rename { oldpath, newpath } => {
            explain::explain_errno_rename(e()?, oldpath.as_path(), newpath.as_path())
        }
        Command::Link { oldpath, newpath } => {
            explain::explain_errno_link(e()?, oldpath.as_path(), newpath.as_path())
        }
        Command::Unlink { pathname } => explain::explain_errno_unlink(e()?, pathname.as_path()),
        Command::Rmdir { pathname } => explain::explain_errno_rmdir(e()?, pathname.as_path()),
        Command::Mkdir { pathname, mode } => {
            explain::explain_errno_mkdir(e()?, pathname.as_path(), number(mode, "mode")?)
        }
        Command::Access { pathname, mode } => explain::explain_errno_access(
            e()?,
            pathname.as_path(),
            printers::parse_access_mode(mode)?,
        ),
        Command::Chdir { pathname } => explain::explain_errno_chdir(e()?, pathname.as_path()),
        Command::Stat { pathname } => {
            let slot = MaybeUninit::<libc::stat>::uninit();
            explain::explain_errno_stat(e()?, pathname.as_path(), slot.as_ptr())
        }
        Command::Ioctl { fildes, request, data } => explain::explain_errno_ioctl(
            e()?,
            *fildes,
            ioctl_request(request)?,
            number(data, "data")?,
        ),
        Command::Getaddrinfo { node, service, flags, family, socktype } => {
            explain::explain_errno_getaddrinfo(
                error_code(cli.errno.as_deref(), true)?,
                node.as_deref(),
                service.as_deref(),
                hints(flags.as_deref(), family.as_deref(), socktype.as_deref())?,
            )
        }
    };
    Ok(text)
}

fn configure(cli: &Cli) -> Result<Options> {
    let mut opts = Options::from_env();
    if cli.dialect {
        opts = opts.dialect_specific(true);
    }
    if cli.numeric_errno {
        opts = opts.numeric_errno(true);
    }
    if cli.debug {
        opts = opts.debug(true);
    }
    opts.validate()?;
    Ok(opts)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = configure(&cli).and_then(|opts| {
        let indent = opts.hanging_indent;
        options::set_global(opts);
        describe(&cli).map(|text| (text, indent))
    });
    match result {
        Ok((text, indent)) => {
            if cli.no_wrap {
                println!("{}", text);
            } else {
                println!("{}", wrap(&text, terminal_width(), indent, ""));
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("explain: {}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("explain").chain(args.iter().copied()))
            .map_err(|e| ExplainError::BadArgument(e.to_string()))?;
        options::set_global(Options::new());
        describe(&cli)
    }

    #[test]
    fn test_open_from_arguments() {
        assert_eq!(
            run(&["-e", "ENOENT", "open", "/nonexistent/file", "O_RDONLY"]).unwrap(),
            "open(\"/nonexistent/file\", O_RDONLY) failed, No such file or directory (ENOENT) \
             because there is no \"nonexistent\" directory in the pathname, /"
        );
    }

    #[test]
    fn test_errno_lookup() {
        assert_eq!(run(&["errno", "ENOENT"]).unwrap(), "ENOENT 2 No such file or directory");
        assert!(run(&["errno", "no", "such", "file", "or", "directory"])
            .unwrap()
            .starts_with("ENOENT "));
        assert!(run(&["errno", "EACCESS"]).unwrap().starts_with("EACCES "));
    }

    #[test]
    fn test_missing_errno_is_reported() {
        let err = run(&["close", "3"]).unwrap_err();
        assert!(err.to_string().contains("use -e ERRNO"));
    }

    #[test]
    fn test_gai_codes() {
        let text = run(&["-e", "EAI_NONAME", "getaddrinfo", "no.such.host.invalid"]).unwrap();
        assert!(text.ends_with("(EAI_NONAME)"));
    }

    #[test]
    fn test_ioctl_request_names() {
        assert_eq!(ioctl_request("TIOCGWINSZ").unwrap(), 0x5413);
        assert_eq!(ioctl_request("0x89a0").unwrap(), 0x89a0);
        assert!(ioctl_request("BOGUS").is_err());
    }

    #[test]
    fn test_bad_flags() {
        let err = run(&["-e", "EINVAL", "open", "/tmp", "O_BOGUS"]).unwrap_err();
        assert!(err.to_string().starts_with("unable to interpret open flags"));
    }
}
