//! Library defaults, used when neither the environment nor the caller
//! says otherwise.

pub const DIALECT_SPECIFIC: bool = false;
pub const NUMERIC_ERRNO: bool = false;
pub const ASSEMBLE_PROGRAM_NAME: bool = true;
pub const HANGING_INDENT: usize = 0;
pub const DEBUG: bool = false;
pub const SYMBOLIC_MODE_BITS: bool = false;

/// Largest hanging indent accepted; beyond this continuation lines would
/// have almost no room on an 80 column terminal.
pub const MAX_HANGING_INDENT: usize = 40;
