//! Permission mode rendering.

use std::fmt::Write;

use explain_core::{Options, StringBuffer};

/// `ls -l` style permission string, set-id and sticky bits included.
///
/// ```
/// assert_eq!(explain::printers::rwx(0o4755), "rwsr-xr-x");
/// ```
pub fn rwx(perm: u32) -> String {
    let mut s = String::with_capacity(9);
    let special = [(0o4000, 's'), (0o2000, 's'), (0o1000, 't')];
    for (i, shift) in [6u32, 3, 0].into_iter().enumerate() {
        let bits = (perm >> shift) & 7;
        s.push(if bits & 4 != 0 { 'r' } else { '-' });
        s.push(if bits & 2 != 0 { 'w' } else { '-' });
        let (flag, ch) = special[i];
        let x = bits & 1 != 0;
        s.push(match (perm & flag != 0, x) {
            (true, true) => ch,
            (true, false) => ch.to_ascii_uppercase(),
            (false, true) => 'x',
            (false, false) => '-',
        });
    }
    s
}

const SYMBOLIC: &[(u32, &str)] = &[
    (0o4000, "S_ISUID"),
    (0o2000, "S_ISGID"),
    (0o1000, "S_ISVTX"),
    (0o700, "S_IRWXU"),
    (0o400, "S_IRUSR"),
    (0o200, "S_IWUSR"),
    (0o100, "S_IXUSR"),
    (0o070, "S_IRWXG"),
    (0o040, "S_IRGRP"),
    (0o020, "S_IWGRP"),
    (0o010, "S_IXGRP"),
    (0o007, "S_IRWXO"),
    (0o004, "S_IROTH"),
    (0o002, "S_IWOTH"),
    (0o001, "S_IXOTH"),
];

fn print_symbolic(sb: &mut StringBuffer, perm: u32) {
    if perm == 0 {
        sb.push_char('0');
        return;
    }
    let mut rest = perm;
    let mut first = true;
    for &(bits, name) in SYMBOLIC {
        if rest & bits == bits {
            if !first {
                sb.push_str(" | ");
            }
            sb.push_str(name);
            first = false;
            rest &= !bits;
        }
    }
    if rest != 0 {
        if !first {
            sb.push_str(" | ");
        }
        let _ = write!(sb, "0{:o}", rest);
    }
}

/// A mode argument as it appears in a call signature.
pub fn print_permission_mode(sb: &mut StringBuffer, mode: u32, opts: &Options) {
    let perm = mode & 0o7777;
    if opts.symbolic_mode_bits {
        print_symbolic(sb, perm);
        return;
    }
    if perm == 0 {
        sb.push_char('0');
    } else {
        let _ = write!(sb, "0{:o}", perm);
    }
}

/// A mode inside an explanation: `0700 (rwx------)`.
pub fn print_mode_explained(sb: &mut StringBuffer, perm: u32, opts: &Options) {
    let perm = perm & 0o7777;
    if opts.symbolic_mode_bits {
        print_symbolic(sb, perm);
    } else {
        let _ = write!(sb, "{:04o}", perm);
    }
    let _ = write!(sb, " ({})", rwx(perm));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rwx() {
        assert_eq!(rwx(0o700), "rwx------");
        assert_eq!(rwx(0o644), "rw-r--r--");
        assert_eq!(rwx(0o1777), "rwxrwxrwt");
        assert_eq!(rwx(0o2640), "rw-r-S---");
    }

    #[test]
    fn test_explained() {
        let mut sb = StringBuffer::new(64);
        print_mode_explained(&mut sb, 0o700, &Options::new());
        assert_eq!(sb.as_str(), "0700 (rwx------)");
        sb.rewind();
        print_mode_explained(&mut sb, 0o750, &Options::new().symbolic_mode_bits(true));
        assert_eq!(sb.as_str(), "S_IRWXU | S_IRGRP | S_IXGRP (rwxr-x---)");
    }

    #[test]
    fn test_signature_mode() {
        let mut sb = StringBuffer::new(64);
        print_permission_mode(&mut sb, 0o644, &Options::new());
        assert_eq!(sb.as_str(), "0644");
        sb.rewind();
        print_permission_mode(&mut sb, 0, &Options::new());
        assert_eq!(sb.as_str(), "0");
    }
}
