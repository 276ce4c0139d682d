//! Error types for the library's own failures.
//!
//! Explaining an error never fails; these cover the surrounding tooling:
//! parsing flag text, option strings, and CLI arguments.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplainError {
    /// Flag or enum text could not be parsed.
    ParseBits {
        caption: String,
        token: String,
        suggestion: Option<&'static str>,
    },
    /// A syscall name with no explanation table.
    UnknownSyscall(String),
    /// A positional argument was missing or malformed.
    BadArgument(String),
    /// A configuration value failed validation.
    InvalidOption(&'static str),
    /// OS error with errno.
    Os(i32),
}

impl fmt::Display for ExplainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseBits { caption, token, suggestion } => {
                write!(f, "unable to interpret {} \"{}\"", caption, token)?;
                if let Some(s) = suggestion {
                    write!(f, " (did you mean \"{}\"?)", s)?;
                }
                Ok(())
            }
            Self::UnknownSyscall(name) => write!(f, "no explanation available for \"{}\"", name),
            Self::BadArgument(msg) => write!(f, "bad argument: {}", msg),
            Self::InvalidOption(msg) => write!(f, "invalid option: {}", msg),
            Self::Os(e) => write!(f, "OS error: errno {}", e),
        }
    }
}

impl std::error::Error for ExplainError {}

impl From<nix::Error> for ExplainError {
    fn from(e: nix::Error) -> Self {
        Self::Os(e as i32)
    }
}

pub type Result<T> = std::result::Result<T, ExplainError>;
