//! Environment variable helpers.
//!
//! Every knob in [`Options`](crate::options::Options) can come from the
//! environment. These helpers never fail: an unset or unparsable variable
//! yields the supplied default.
//!
//! ```ignore
//! use explain_core::env::{env_get, env_get_bool};
//!
//! let indent: usize = env_get("EXPLAIN_HANGING_INDENT", 0);
//! let debug = env_get_bool("EXPLAIN_DEBUG", false);
//! ```

use std::str::FromStr;

/// Variable parsed as `T`, or `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Variable as a boolean; see [`parse_bool`] for the accepted words.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// `Some(T)` when set and parsable.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Non-empty string value.
#[inline]
pub fn env_get_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Interpret a yes/no word, case-insensitive.
///
/// `1 true yes on` and `0 false no off`; anything else is `None`.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_gives_default() {
        let v: usize = env_get("__EXPLAIN_TEST_UNSET__", 42);
        assert_eq!(v, 42);
        assert!(env_get_bool("__EXPLAIN_TEST_UNSET__", true));
        assert_eq!(env_get_opt::<u16>("__EXPLAIN_TEST_UNSET__"), None);
        assert_eq!(env_get_str("__EXPLAIN_TEST_UNSET__"), None);
    }

    #[test]
    fn test_parse_with_whitespace() {
        std::env::set_var("__EXPLAIN_TEST_NUM__", " 17 ");
        let v: usize = env_get("__EXPLAIN_TEST_NUM__", 0);
        assert_eq!(v, 17);
        std::env::set_var("__EXPLAIN_TEST_NUM__", "seventeen");
        let v: usize = env_get("__EXPLAIN_TEST_NUM__", 3);
        assert_eq!(v, 3);
        std::env::remove_var("__EXPLAIN_TEST_NUM__");
    }

    #[test]
    fn test_bool_words() {
        for w in ["1", "true", "YES", "On"] {
            assert_eq!(parse_bool(w), Some(true), "{}", w);
        }
        for w in ["0", "False", "no", "OFF"] {
            assert_eq!(parse_bool(w), Some(false), "{}", w);
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_unrecognised_bool_keeps_default() {
        std::env::set_var("__EXPLAIN_TEST_BOOL__", "sometimes");
        assert!(env_get_bool("__EXPLAIN_TEST_BOOL__", true));
        assert!(!env_get_bool("__EXPLAIN_TEST_BOOL__", false));
        std::env::set_var("__EXPLAIN_TEST_BOOL__", "off");
        assert!(!env_get_bool("__EXPLAIN_TEST_BOOL__", true));
        std::env::remove_var("__EXPLAIN_TEST_BOOL__");
    }

    #[test]
    fn test_empty_string_is_none() {
        std::env::set_var("__EXPLAIN_TEST_STR__", "");
        assert_eq!(env_get_str("__EXPLAIN_TEST_STR__"), None);
        std::env::set_var("__EXPLAIN_TEST_STR__", "prog");
        assert_eq!(env_get_str("__EXPLAIN_TEST_STR__").as_deref(), Some("prog"));
        std::env::remove_var("__EXPLAIN_TEST_STR__");
    }
}
