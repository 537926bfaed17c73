//! Environment variable expansion for user-supplied paths.
//!
//! Follows shell-style rules:
//! - `$NAME` and `${NAME}` are replaced by the variable's value; unset
//!   variables expand to the empty string
//! - a single special character (`$1`, `$?`, `$$`) is a complete name, so
//!   `$1abc` is `$1` followed by `abc`
//! - malformed braces (`${}`, an unterminated `${`) are dropped
//! - a `$` followed by nothing that starts a name is kept verbatim

/// Expand references against the process environment.
pub fn expand_env(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand references using `lookup` to resolve variable names.
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut literal = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() {
            out.push_str(&input[literal..i]);
            let (name, width) = shell_name(&input[i + 1..]);
            match name {
                Some(name) => out.push_str(&lookup(name).unwrap_or_default()),
                None if width == 0 => out.push('$'),
                None => {}
            }
            i += width;
            literal = i + 1;
        }
        i += 1;
    }

    out.push_str(&input[literal..]);
    out
}

/// The variable name at the start of `s` and how many bytes it spans.
///
/// `(None, 0)` means no reference starts here; `(None, n)` with `n > 0` is
/// malformed syntax to skip. `s` is never empty.
fn shell_name(s: &str) -> (Option<&str>, usize) {
    let b = s.as_bytes();
    if b[0] == b'{' {
        if b.len() > 2 && is_special(b[1]) && b[2] == b'}' {
            return (Some(&s[1..2]), 3);
        }
        return match s[1..].find('}') {
            Some(0) => (None, 2),
            Some(end) => (Some(&s[1..end + 1]), end + 2),
            None => (None, 1),
        };
    }
    if is_special(b[0]) {
        return (Some(&s[..1]), 1);
    }
    let len = b
        .iter()
        .take_while(|c| c.is_ascii_alphanumeric() || **c == b'_')
        .count();
    if len == 0 {
        (None, 0)
    } else {
        (Some(&s[..len]), len)
    }
}

fn is_special(c: u8) -> bool {
    matches!(c, b'*' | b'#' | b'$' | b'@' | b'!' | b'?' | b'-' | b'0'..=b'9')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/alice".to_string()),
            "EMPTY" => Some(String::new()),
            "1" => Some("one".to_string()),
            _ => None,
        }
    }

    #[test]
    fn expands_braced_and_bare_references() {
        assert_eq!(expand_with("${HOME}/.threads", env), "/home/alice/.threads");
        assert_eq!(expand_with("$HOME/.threads", env), "/home/alice/.threads");
        assert_eq!(expand_with("a${EMPTY}b", env), "ab");
    }

    #[test]
    fn unset_variables_expand_to_empty() {
        assert_eq!(expand_with("$MISSING/logs", env), "/logs");
        assert_eq!(expand_with("${MISSING}", env), "");
    }

    #[test]
    fn stray_dollars_are_kept() {
        assert_eq!(expand_with("a$", env), "a$");
        assert_eq!(expand_with("a$/b", env), "a$/b");
        assert_eq!(expand_with("$ x", env), "$ x");
    }

    #[test]
    fn malformed_braces_are_dropped() {
        assert_eq!(expand_with("${unterminated", env), "unterminated");
        assert_eq!(expand_with("a${}b", env), "ab");
    }

    #[test]
    fn special_names_are_one_character() {
        assert_eq!(expand_with("$1abc", env), "oneabc");
        assert_eq!(expand_with("${1}x", env), "onex");
        assert_eq!(expand_with("a$$b", env), "ab");
    }

    #[test]
    fn plain_paths_are_untouched() {
        assert_eq!(expand_with("/var/lib/threads", env), "/var/lib/threads");
        assert_eq!(expand_with("/home/ünï/$HOME", env), "/home/ünï//home/alice");
    }
}
