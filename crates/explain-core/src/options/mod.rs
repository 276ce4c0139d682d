//! Explanation options.
//!
//! Library defaults with runtime environment overrides.
//!
//! # Priority (highest wins)
//!
//! 1. Values set through the API ([`set_global`], [`update_global`])
//! 2. `EXPLAIN_OPTIONS`, a comma separated list such as
//!    `"numeric-errno,no-debug,hanging-indent=4"`
//! 3. Individual variables (`EXPLAIN_NUMERIC_ERRNO=1`, ...)
//! 4. [`defaults`]
//!
//! The process-wide copy is built from the environment on first use.
//! Callers that want independence from it pass their own `Options` to the
//! `*_with` assembler functions.
//!
//! ```rust,ignore
//! use explain_core::options::{self, Options};
//!
//! let opts = Options::from_env().numeric_errno(true);
//! options::set_global(opts);
//! ```

pub mod defaults;

use std::sync::RwLock;

use crate::env::{env_get, env_get_bool, env_get_str, parse_bool};
use crate::error::{ExplainError, Result};
use crate::fuzzy::{self, FUZZY_THRESHOLD};
use crate::{kdebug, kprintln, kwarn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Add detail that only makes sense on this OS flavour
    pub dialect_specific: bool,
    /// Append the decimal errno after its name
    pub numeric_errno: bool,
    /// Prefix sink output with the program name
    pub assemble_program_name: bool,
    /// Name used for that prefix; defaults to the basename of argv[0]
    pub program_name: Option<String>,
    /// Indent for continuation lines in the wrapping sink
    pub hanging_indent: usize,
    /// Self-diagnostic footnotes
    pub debug: bool,
    /// Render permission modes as `S_IRUSR | ...` instead of octal
    pub symbolic_mode_bits: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Names accepted in `EXPLAIN_OPTIONS`.
const OPTION_NAMES: &[&str] = &[
    "assemble-program-name",
    "debug",
    "dialect-specific",
    "hanging-indent",
    "numeric-errno",
    "program-name",
    "symbolic-mode-bits",
];

impl Options {
    /// Defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `EXPLAIN_DIALECT_SPECIFIC` - OS flavour detail (0/1)
    /// - `EXPLAIN_NUMERIC_ERRNO` - append errno value (0/1)
    /// - `EXPLAIN_ASSEMBLE_PROGRAM_NAME` - prefix program name (0/1)
    /// - `EXPLAIN_PROGRAM_NAME` - program name to use in the prefix
    /// - `EXPLAIN_HANGING_INDENT` - continuation indent in columns
    /// - `EXPLAIN_DEBUG` - self-diagnostic footnotes (0/1)
    /// - `EXPLAIN_SYMBOLIC_MODE_BITS` - symbolic permission modes (0/1)
    /// - `EXPLAIN_OPTIONS` - comma list, applied last
    pub fn from_env() -> Self {
        let mut opts = Self {
            dialect_specific: env_get_bool("EXPLAIN_DIALECT_SPECIFIC", defaults::DIALECT_SPECIFIC),
            numeric_errno: env_get_bool("EXPLAIN_NUMERIC_ERRNO", defaults::NUMERIC_ERRNO),
            assemble_program_name: env_get_bool(
                "EXPLAIN_ASSEMBLE_PROGRAM_NAME",
                defaults::ASSEMBLE_PROGRAM_NAME,
            ),
            program_name: env_get_str("EXPLAIN_PROGRAM_NAME"),
            hanging_indent: env_get("EXPLAIN_HANGING_INDENT", defaults::HANGING_INDENT)
                .min(defaults::MAX_HANGING_INDENT),
            debug: env_get_bool("EXPLAIN_DEBUG", defaults::DEBUG),
            symbolic_mode_bits: env_get_bool(
                "EXPLAIN_SYMBOLIC_MODE_BITS",
                defaults::SYMBOLIC_MODE_BITS,
            ),
        };
        if let Some(list) = env_get_str("EXPLAIN_OPTIONS") {
            opts.apply_option_string(&list);
        }
        opts
    }

    /// Library defaults only, ignoring the environment.
    pub fn new() -> Self {
        Self {
            dialect_specific: defaults::DIALECT_SPECIFIC,
            numeric_errno: defaults::NUMERIC_ERRNO,
            assemble_program_name: defaults::ASSEMBLE_PROGRAM_NAME,
            program_name: None,
            hanging_indent: defaults::HANGING_INDENT,
            debug: defaults::DEBUG,
            symbolic_mode_bits: defaults::SYMBOLIC_MODE_BITS,
        }
    }

    // Builder methods

    pub fn dialect_specific(mut self, on: bool) -> Self {
        self.dialect_specific = on;
        self
    }

    pub fn numeric_errno(mut self, on: bool) -> Self {
        self.numeric_errno = on;
        self
    }

    pub fn assemble_program_name(mut self, on: bool) -> Self {
        self.assemble_program_name = on;
        self
    }

    pub fn program_name(mut self, name: impl Into<String>) -> Self {
        self.program_name = Some(name.into());
        self
    }

    pub fn hanging_indent(mut self, columns: usize) -> Self {
        self.hanging_indent = columns;
        self
    }

    pub fn debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    pub fn symbolic_mode_bits(mut self, on: bool) -> Self {
        self.symbolic_mode_bits = on;
        self
    }

    /// Apply a comma separated option list.
    ///
    /// Each item is `name`, `no-name`, or `name=value`. Unknown names are
    /// matched against the known ones; a close match is applied with a
    /// warning, anything else is ignored. Returns the number of items
    /// applied.
    pub fn apply_option_string(&mut self, list: &str) -> usize {
        let mut applied = 0;
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (raw_name, value) = match item.split_once('=') {
                Some((n, v)) => (n.trim(), Some(v.trim())),
                None => (item, None),
            };
            let (name, negated) = match raw_name.strip_prefix("no-") {
                Some(rest) => (rest, true),
                None => (raw_name, false),
            };
            let canonical = match OPTION_NAMES.iter().find(|n| n.eq_ignore_ascii_case(name)) {
                Some(n) => *n,
                None => match fuzzy::best_match(name, OPTION_NAMES.iter(), |n| *n, FUZZY_THRESHOLD) {
                    Some(n) => {
                        self.note(format_args!("option \"{}\" unknown, assuming \"{}\"", name, n));
                        *n
                    }
                    None => {
                        self.note(format_args!("option \"{}\" unknown, ignored", name));
                        continue;
                    }
                },
            };
            if self.set_by_name(canonical, negated, value) {
                applied += 1;
            } else {
                self.note(format_args!("option \"{}\" has a bad value, ignored", item));
            }
        }
        applied
    }

    fn set_by_name(&mut self, name: &str, negated: bool, value: Option<&str>) -> bool {
        if name == "hanging-indent" {
            let columns = match (negated, value) {
                (true, _) => 0,
                (false, None) => 2,
                (false, Some(v)) => match v.parse::<usize>() {
                    Ok(n) => n.min(defaults::MAX_HANGING_INDENT),
                    Err(_) => return false,
                },
            };
            self.hanging_indent = columns;
            return true;
        }
        let on = match value {
            None => true,
            Some(v) => match parse_bool(v) {
                Some(b) => b,
                None => return false,
            },
        } != negated;
        match name {
            "assemble-program-name" | "program-name" => self.assemble_program_name = on,
            "debug" => self.debug = on,
            "dialect-specific" => self.dialect_specific = on,
            "numeric-errno" => self.numeric_errno = on,
            "symbolic-mode-bits" => self.symbolic_mode_bits = on,
            _ => return false,
        }
        true
    }

    /// Option-string problems are loud only when `debug` is on.
    fn note(&self, args: std::fmt::Arguments<'_>) {
        if self.debug {
            kwarn!("{}", args);
        } else {
            kdebug!("{}", args);
        }
    }

    /// Name for the sink prefix: explicit name, else basename of argv[0].
    pub fn resolved_program_name(&self) -> Option<String> {
        if let Some(name) = &self.program_name {
            return Some(name.clone());
        }
        let argv0 = std::env::args_os().next()?;
        let path = std::path::Path::new(&argv0);
        path.file_name().map(|n| n.to_string_lossy().into_owned())
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.hanging_indent > defaults::MAX_HANGING_INDENT {
            return Err(ExplainError::InvalidOption("hanging_indent must be <= 40"));
        }
        if let Some(name) = &self.program_name {
            if name.is_empty() {
                return Err(ExplainError::InvalidOption("program_name must not be empty"));
            }
            if name.chars().any(char::is_control) {
                return Err(ExplainError::InvalidOption(
                    "program_name must not contain control characters",
                ));
            }
        }
        Ok(())
    }

    /// Dump the options to stderr (for debugging).
    pub fn print(&self) {
        kprintln!("Explain Options:");
        kprintln!("  dialect_specific:       {}", self.dialect_specific);
        kprintln!("  numeric_errno:          {}", self.numeric_errno);
        kprintln!("  assemble_program_name:  {}", self.assemble_program_name);
        kprintln!("  program_name:           {:?}", self.resolved_program_name());
        kprintln!("  hanging_indent:         {}", self.hanging_indent);
        kprintln!("  debug:                  {}", self.debug);
        kprintln!("  symbolic_mode_bits:     {}", self.symbolic_mode_bits);
    }
}

// ── Process-wide copy ──────────────────────────────────────────────

static GLOBAL: RwLock<Option<Options>> = RwLock::new(None);

/// Snapshot of the process-wide options, reading the environment on
/// first use.
pub fn global() -> Options {
    if let Some(opts) = GLOBAL.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
        return opts.clone();
    }
    let mut slot = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    slot.get_or_insert_with(Options::from_env).clone()
}

/// Replace the process-wide options.
pub fn set_global(opts: Options) {
    *GLOBAL.write().unwrap_or_else(|e| e.into_inner()) = Some(opts);
}

/// Modify the process-wide options in place.
pub fn update_global(f: impl FnOnce(&mut Options)) {
    let mut slot = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    f(slot.get_or_insert_with(Options::from_env));
}

/// Forget API overrides; the environment is read again on next use.
pub fn reset_global() {
    *GLOBAL.write().unwrap_or_else(|e| e.into_inner()) = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for k in [
            "EXPLAIN_DIALECT_SPECIFIC",
            "EXPLAIN_NUMERIC_ERRNO",
            "EXPLAIN_ASSEMBLE_PROGRAM_NAME",
            "EXPLAIN_PROGRAM_NAME",
            "EXPLAIN_HANGING_INDENT",
            "EXPLAIN_DEBUG",
            "EXPLAIN_SYMBOLIC_MODE_BITS",
            "EXPLAIN_OPTIONS",
        ] {
            std::env::remove_var(k);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let opts = Options::from_env();
        assert_eq!(opts, Options::new());
        assert!(opts.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_individual_variables() {
        clear_env();
        std::env::set_var("EXPLAIN_NUMERIC_ERRNO", "yes");
        std::env::set_var("EXPLAIN_HANGING_INDENT", "4");
        std::env::set_var("EXPLAIN_PROGRAM_NAME", "frob");
        let opts = Options::from_env();
        assert!(opts.numeric_errno);
        assert_eq!(opts.hanging_indent, 4);
        assert_eq!(opts.resolved_program_name().as_deref(), Some("frob"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_option_list_overrides_variables() {
        clear_env();
        std::env::set_var("EXPLAIN_DEBUG", "1");
        std::env::set_var("EXPLAIN_OPTIONS", "no-debug, numeric-errno, hanging-indent=3");
        let opts = Options::from_env();
        assert!(!opts.debug);
        assert!(opts.numeric_errno);
        assert_eq!(opts.hanging_indent, 3);
        clear_env();
    }

    #[test]
    fn test_option_list_fuzzy_and_bad_values() {
        let mut opts = Options::new();
        let n = opts.apply_option_string("numeric-erno,dialect-specific=no,debug=perhaps,zzz");
        assert_eq!(n, 2);
        assert!(opts.numeric_errno);
        assert!(!opts.dialect_specific);
        assert!(!opts.debug);
    }

    #[test]
    fn test_builder_and_validate() {
        let opts = Options::new().hanging_indent(100);
        assert!(opts.validate().is_err());
        let opts = Options::new().program_name("");
        assert!(opts.validate().is_err());
        let opts = Options::new().program_name("tool").debug(true);
        assert!(opts.validate().is_ok());
        assert!(opts.debug);
    }

    #[test]
    #[serial]
    fn test_global_api_beats_environment() {
        clear_env();
        std::env::set_var("EXPLAIN_NUMERIC_ERRNO", "1");
        reset_global();
        assert!(global().numeric_errno);
        update_global(|o| o.numeric_errno = false);
        assert!(!global().numeric_errno);
        reset_global();
        clear_env();
        assert!(!global().numeric_errno);
        reset_global();
    }
}
