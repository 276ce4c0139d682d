//! # explain-core
//!
//! Building blocks shared by the probe layer and the explanation engine.
//! Nothing here inspects live OS state beyond asking the C library for its
//! own error text.
//!
//! ## Modules
//!
//! - `buffer` - Bounded string buffer with a footnotes sidecar
//! - `errno` - Errno registry, exact and fuzzy lookup
//! - `gai` - `getaddrinfo` error code registry
//! - `fuzzy` - Longest-common-subsequence similarity
//! - `bits` - Flag-set and enum printers and parsers
//! - `options` - Process-wide explanation knobs
//! - `env` - Environment variable utilities
//! - `kprint` - Leveled stderr diagnostics
//! - `error` - Error types

pub mod buffer;
pub mod errno;
pub mod gai;
pub mod fuzzy;
pub mod bits;
pub mod options;
pub mod env;
pub mod kprint;
pub mod error;

pub use buffer::{StringBuffer, EFAULT_TOKEN, NULL_TOKEN};
pub use errno::ErrnoInfo;
pub use bits::BitName;
pub use options::Options;
pub use error::{ExplainError, Result};

/// Capacity of the process-wide scratch buffer and the default for
/// explanations returned as `String`.
pub const DEFAULT_CAPACITY: usize = 4096;
