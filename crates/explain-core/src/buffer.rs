//! Bounded string buffer.
//!
//! Every explanation is assembled into a `StringBuffer` of fixed capacity.
//! Writes never fail: anything that does not fit is dropped.
//!
//! ## Design
//!
//! ```text
//! capacity = 8
//! ┌───┬───┬───┬───┬───┬───┬───┬────┐
//! │ h │ e │ l │ l │ o │   │ w │ \0 │   len() <= capacity - 1
//! └───┴───┴───┴───┴───┴───┴───┴────┘
//! ```
//!
//! The last byte is reserved so the content can always be copied into a
//! C-style caller buffer with its terminator. Truncation happens at a
//! UTF-8 character boundary, and escape sequences produced by the quoting
//! helpers are written whole or not at all, so the content is always a
//! printable fragment.
//!
//! A buffer may own a sidecar *footnotes* buffer. Causes add supplementary
//! notes there; the assembler appends them after the explanation.

use std::fmt;

/// Rendering of an argument that points at inaccessible memory.
pub const EFAULT_TOKEN: &str = "<efault>";

/// Rendering of a NULL pointer argument.
pub const NULL_TOKEN: &str = "NULL";

/// Separator placed between the explanation and each footnote.
pub const FOOTNOTE_SEPARATOR: &str = "; ";

#[derive(Debug, Clone)]
pub struct StringBuffer {
    text: String,
    capacity: usize,
    footnotes: Option<Box<StringBuffer>>,
}

impl StringBuffer {
    /// Create a buffer holding at most `capacity - 1` bytes of text.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            text: String::with_capacity(capacity.min(4096)),
            capacity,
            footnotes: None,
        }
    }

    /// Create a buffer with a footnotes sidecar of the same capacity.
    pub fn with_footnotes(capacity: usize) -> Self {
        let mut sb = Self::new(capacity);
        sb.footnotes = Some(Box::new(Self::new(capacity)));
        sb
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Bytes that can still be appended.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - 1 - self.text.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Append text, truncating at the last character boundary that fits.
    pub fn push_str(&mut self, s: &str) {
        let room = self.remaining();
        if s.len() <= room {
            self.text.push_str(s);
            return;
        }
        let mut end = room;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        self.text.push_str(&s[..end]);
    }

    pub fn push_char(&mut self, c: char) {
        let mut tmp = [0u8; 4];
        self.push_atomic(c.encode_utf8(&mut tmp));
    }

    /// Append raw bytes; invalid UTF-8 sequences become U+FFFD.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        for chunk in bytes.utf8_chunks() {
            self.push_str(chunk.valid());
            if !chunk.invalid().is_empty() {
                self.push_char(char::REPLACEMENT_CHARACTER);
            }
        }
    }

    /// Append `s` only if all of it fits.
    fn push_atomic(&mut self, s: &str) -> bool {
        if s.len() > self.remaining() {
            return false;
        }
        self.text.push_str(s);
        true
    }

    /// Append a double-quoted, C-escaped rendering of `text`.
    ///
    /// `None` renders as the bare token `NULL`.
    pub fn push_quoted(&mut self, text: Option<&[u8]>) {
        match text {
            None => self.push_str(NULL_TOKEN),
            Some(bytes) => self.push_quoted_n(bytes, usize::MAX),
        }
    }

    /// Placeholder for an argument whose memory cannot be read.
    pub fn push_efault(&mut self) {
        self.push_atomic(EFAULT_TOKEN);
    }

    /// Like [`push_quoted`](Self::push_quoted) for at most `n` bytes of
    /// `text`; a longer argument gets a trailing `...` after the quote.
    pub fn push_quoted_n(&mut self, text: &[u8], n: usize) {
        let shown = &text[..text.len().min(n)];
        if !self.push_atomic("\"") || !self.push_escaped(shown) {
            return;
        }
        self.push_atomic("\"");
        if shown.len() < text.len() {
            self.push_atomic("...");
        }
    }

    /// Quoted rendering of a pathname.
    ///
    /// Path separators are kept verbatim. Control characters, quotes and
    /// anything not valid UTF-8 are escaped so that a name containing
    /// whitespace or terminal escapes is visible for what it is.
    pub fn push_quoted_path(&mut self, path: &[u8]) {
        if self.push_atomic("\"") && self.push_escaped(path) {
            self.push_atomic("\"");
        }
    }

    /// Shell-quoted rendering: bare when safe, else single quoted with
    /// double-quote fallbacks for embedded single quotes.
    pub fn push_shell_quoted(&mut self, text: &str) {
        let mut needs_quoting = false;
        let mut mode = '\0';
        for c in text.chars() {
            match c {
                '!' => {
                    mode = '\'';
                    needs_quoting = true;
                    break;
                }
                '\'' => {
                    mode = '"';
                    needs_quoting = true;
                    break;
                }
                '"' | '#' | '$' | '&' | '(' | ')' | '*' | ':' | ';' | '<' | '=' | '>' | '?'
                | '[' | '\\' | ']' | '^' | '`' | '{' | '|' | '}' | '~' => needs_quoting = true,
                c if c.is_whitespace() || c.is_control() => needs_quoting = true,
                _ => {}
            }
        }
        if !needs_quoting {
            self.push_str(text);
            return;
        }
        if mode == '\0' {
            mode = '\'';
        }
        self.push_char(mode);
        for c in text.chars() {
            if mode == '\'' {
                if c == '\'' {
                    self.push_atomic("'\"'");
                    mode = '"';
                } else {
                    self.push_char(c);
                }
            } else {
                match c {
                    '!' => {
                        self.push_atomic("\"'!");
                        mode = '\'';
                    }
                    '\n' | '"' | '\\' | '`' | '$' => {
                        let mut tmp = [0u8; 4];
                        let mut esc = String::from("\\");
                        esc.push_str(c.encode_utf8(&mut tmp));
                        self.push_atomic(&esc);
                    }
                    _ => self.push_char(c),
                }
            }
        }
        self.push_char(mode);
    }

    /// Returns false when the text had to be cut short.
    fn push_escaped(&mut self, bytes: &[u8]) -> bool {
        for chunk in bytes.utf8_chunks() {
            for c in chunk.valid().chars() {
                let ok = match c {
                    '"' => self.push_atomic("\\\""),
                    '\\' => self.push_atomic("\\\\"),
                    '\n' => self.push_atomic("\\n"),
                    '\t' => self.push_atomic("\\t"),
                    '\r' => self.push_atomic("\\r"),
                    '\x07' => self.push_atomic("\\a"),
                    '\x08' => self.push_atomic("\\b"),
                    '\x0c' => self.push_atomic("\\f"),
                    '\x0b' => self.push_atomic("\\v"),
                    c if c.is_control() && (c as u32) < 0x100 => {
                        self.push_atomic(&format!("\\{:03o}", c as u32))
                    }
                    c => {
                        let mut tmp = [0u8; 4];
                        self.push_atomic(c.encode_utf8(&mut tmp))
                    }
                };
                if !ok {
                    return false;
                }
            }
            for b in chunk.invalid() {
                if !self.push_atomic(&format!("\\{:03o}", b)) {
                    return false;
                }
            }
        }
        true
    }

    /// Append the text of another buffer.
    ///
    /// Text that does not fit is cut before any backslash escape it would
    /// split, so quoted arguments copied from a part buffer stay well formed.
    pub fn push_buffer(&mut self, other: &StringBuffer) {
        let s = other.as_str();
        let end = escape_safe_cut(s, self.remaining());
        self.text.push_str(&s[..end]);
    }

    /// Shorten to at most `len` bytes, backing off to a character boundary.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.text.len() {
            return;
        }
        let mut end = len;
        while end > 0 && !self.text.is_char_boundary(end) {
            end -= 1;
        }
        self.text.truncate(end);
    }

    /// Empty the buffer and its footnotes.
    pub fn rewind(&mut self) {
        self.text.clear();
        if let Some(fb) = self.footnotes.as_mut() {
            fb.rewind();
        }
    }

    pub fn footnotes(&self) -> Option<&StringBuffer> {
        self.footnotes.as_deref()
    }

    pub fn footnotes_mut(&mut self) -> Option<&mut StringBuffer> {
        self.footnotes.as_deref_mut()
    }

    /// Add a footnote, separated from earlier ones by `"; "`.
    ///
    /// Buffers without a sidecar silently drop the note.
    pub fn add_footnote(&mut self, args: fmt::Arguments<'_>) {
        if let Some(fb) = self.footnotes.as_deref_mut() {
            if !fb.is_empty() {
                fb.push_str(FOOTNOTE_SEPARATOR);
            }
            let _ = fmt::Write::write_fmt(fb, args);
        }
    }

    /// Copy into a C-style byte buffer, NUL terminated.
    ///
    /// Returns the number of text bytes written, excluding the NUL.
    pub fn copy_to_c_buffer(&self, out: &mut [u8]) -> usize {
        if out.is_empty() {
            return 0;
        }
        let mut n = self.text.len().min(out.len() - 1);
        while n > 0 && !self.text.is_char_boundary(n) {
            n -= 1;
        }
        out[..n].copy_from_slice(&self.text.as_bytes()[..n]);
        out[n] = 0;
        n
    }
}

/// Longest prefix of `s` no longer than `limit` that ends on neither a
/// partial character nor a partial `\x` or `\ooo` escape.
fn escape_safe_cut(s: &str, limit: usize) -> usize {
    if s.len() <= limit {
        return s.len();
    }
    let bytes = s.as_bytes();
    let char_len = |at: usize| s[at..].chars().next().map_or(1, char::len_utf8);
    let (mut i, mut cut) = (0, 0);
    while i < bytes.len() {
        let next = if bytes[i] == b'\\' && i + 1 < bytes.len() {
            let octal = bytes[i + 1..]
                .iter()
                .take(3)
                .take_while(|b| matches!(b, b'0'..=b'7'))
                .count();
            if octal == 3 { i + 4 } else { i + 1 + char_len(i + 1) }
        } else {
            i + char_len(i)
        };
        if next > limit {
            break;
        }
        cut = next;
        i = next;
    }
    cut
}

impl fmt::Write for StringBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl fmt::Display for StringBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut sb = StringBuffer::new(8);
        sb.push_str("hello world");
        assert_eq!(sb.as_str(), "hello w");
        assert_eq!(sb.len(), 7);
        assert!(sb.is_full());
        sb.push_str("more");
        assert_eq!(sb.len(), 7);
    }

    #[test]
    fn test_truncation_keeps_utf8_boundary() {
        let mut sb = StringBuffer::new(5);
        sb.push_str("ab\u{e9}\u{e9}");
        // "ab" + one two-byte char = 4 bytes
        assert_eq!(sb.as_str(), "ab\u{e9}");
        let mut sb = StringBuffer::new(4);
        sb.push_str("ab\u{e9}");
        assert_eq!(sb.as_str(), "ab");
    }

    #[test]
    fn test_printf_append() {
        let mut sb = StringBuffer::new(64);
        let _ = write!(sb, "{} > {}", 300, 255);
        assert_eq!(sb.as_str(), "300 > 255");
    }

    #[test]
    fn test_quoted_null_and_escapes() {
        let mut sb = StringBuffer::new(64);
        sb.push_quoted(None);
        sb.push_char(' ');
        sb.push_quoted(Some(b"a\"b\n\x01"));
        assert_eq!(sb.as_str(), "NULL \"a\\\"b\\n\\001\"");
    }

    #[test]
    fn test_escape_is_atomic() {
        // room for `"` `a` and one byte: the two-byte `\n` escape must not split
        let mut sb = StringBuffer::new(4);
        sb.push_quoted(Some(b"a\n"));
        assert_eq!(sb.as_str(), "\"a");
        assert!(!sb.as_str().ends_with('\\'));
    }

    #[test]
    fn test_quoted_n_marks_elision() {
        let mut sb = StringBuffer::new(64);
        sb.push_quoted_n(b"hello world", 5);
        assert_eq!(sb.as_str(), "\"hello\"...");
    }

    #[test]
    fn test_quoted_path_keeps_separators() {
        let mut sb = StringBuffer::new(64);
        sb.push_quoted_path(b"/tmp/a b\x1b");
        assert_eq!(sb.as_str(), "\"/tmp/a b\\033\"");
    }

    #[test]
    fn test_invalid_utf8_is_escaped() {
        let mut sb = StringBuffer::new(64);
        sb.push_quoted(Some(b"x\xffy"));
        assert_eq!(sb.as_str(), "\"x\\377y\"");
        let mut sb = StringBuffer::new(64);
        sb.push_bytes(b"x\xffy");
        assert_eq!(sb.as_str(), "x\u{fffd}y");
    }

    #[test]
    fn test_shell_quoted() {
        let mut sb = StringBuffer::new(64);
        sb.push_shell_quoted("plain");
        sb.push_char(' ');
        sb.push_shell_quoted("has space");
        sb.push_char(' ');
        sb.push_shell_quoted("it's");
        assert_eq!(sb.as_str(), "plain 'has space' \"it's\"");
    }

    #[test]
    fn test_footnotes_separator() {
        let mut sb = StringBuffer::with_footnotes(64);
        sb.add_footnote(format_args!("one"));
        sb.add_footnote(format_args!("two {}", 2));
        assert_eq!(sb.footnotes().map(|f| f.as_str()), Some("one; two 2"));
        sb.rewind();
        assert!(sb.footnotes().map(|f| f.is_empty()).unwrap_or(false));
    }

    #[test]
    fn test_footnotes_dropped_without_sidecar() {
        let mut sb = StringBuffer::new(64);
        sb.add_footnote(format_args!("lost"));
        assert!(sb.footnotes().is_none());
        assert!(sb.is_empty());
    }

    #[test]
    fn test_copy_to_c_buffer() {
        let mut sb = StringBuffer::new(64);
        sb.push_str("abcdef");
        let mut out = [0xffu8; 4];
        let n = sb.copy_to_c_buffer(&mut out);
        assert_eq!(n, 3);
        assert_eq!(&out, b"abc\0");
        assert_eq!(sb.copy_to_c_buffer(&mut []), 0);
    }

    #[test]
    fn test_push_buffer_and_truncate() {
        let mut a = StringBuffer::new(64);
        let mut b = StringBuffer::new(64);
        b.push_str("tail");
        a.push_str("head ");
        a.push_buffer(&b);
        assert_eq!(a.as_str(), "head tail");
        a.truncate(4);
        assert_eq!(a.as_str(), "head");
    }

    #[test]
    fn test_push_buffer_keeps_escapes_whole() {
        let mut part = StringBuffer::new(64);
        part.push_quoted(Some(b"a\nb\x01"));
        assert_eq!(part.as_str(), "\"a\\nb\\001\"");
        // cuts at 3, 6, 7 or 8 bytes would land inside `\n` or `\001`
        for (cap, want) in [(3, "\"a"), (4, "\"a"), (5, "\"a\\n"), (7, "\"a\\nb"), (9, "\"a\\nb")] {
            let mut out = StringBuffer::new(cap);
            out.push_buffer(&part);
            assert_eq!(out.as_str(), want, "capacity {}", cap);
        }
        let mut out = StringBuffer::new(10);
        out.push_buffer(&part);
        assert_eq!(out.as_str(), "\"a\\nb\\001");
    }
}
