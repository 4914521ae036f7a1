//! Compile-time define extraction from build-flag strings.
//!
//! Build flags are a free-text string in which named constants are embedded
//! as `-D<NAME>=<value>` tokens. Values may be bare, single-quoted, or
//! double-quoted; quoted values may contain whitespace. Extraction works on
//! whole tokens, so a define name never matches a longer name it happens to
//! be a prefix of.

/// Extracts the value of the `-D<name>=<value>` define from a flags string.
///
/// Returns the unquoted value, or `None` when the define is absent. The
/// flags string is split on whitespace outside of quoted regions rather
/// than matched with a regular expression, so values like
/// `-DFRIENDLY_NAME="Door Reader"` survive intact.
///
/// # Example
///
/// ```
/// use flashpack::config::defines::extract_define;
///
/// let flags = "-DBASE_VERSION=1.2.0 -DFRIENDLY_NAME=\"Door Reader\"";
/// assert_eq!(extract_define(flags, "BASE_VERSION"), Some("1.2.0".to_string()));
/// assert_eq!(extract_define(flags, "FRIENDLY_NAME"), Some("Door Reader".to_string()));
/// assert_eq!(extract_define(flags, "BASE"), None);
/// ```
pub fn extract_define(flags: &str, name: &str) -> Option<String> {
    for token in tokenize(flags) {
        let Some(assignment) = token.strip_prefix("-D") else {
            continue;
        };
        let Some((token_name, value)) = assignment.split_once('=') else {
            continue;
        };
        if token_name == name {
            return Some(unquote(value).to_string());
        }
    }
    None
}

/// Splits a flags string on whitespace, treating quoted regions as atomic.
///
/// Quote characters are kept in the output tokens; they are stripped later
/// by [`unquote`] so that only the value part loses its quotes.
fn tokenize(flags: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in flags.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None => {
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                    current.push(ch);
                } else if ch.is_whitespace() {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                } else {
                    current.push(ch);
                }
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Strips one matching pair of surrounding quotes, if present.
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_unquoted() {
        assert_eq!(extract_define("-DFOO=bar", "FOO"), Some("bar".to_string()));
    }

    #[test]
    fn test_extract_double_quoted_with_spaces() {
        let flags = "-DFOO=\"bar baz\" -DQUX=1";
        assert_eq!(extract_define(flags, "FOO"), Some("bar baz".to_string()));
        assert_eq!(extract_define(flags, "QUX"), Some("1".to_string()));
    }

    #[test]
    fn test_extract_single_quoted() {
        let flags = "-DNAME='Front Door'";
        assert_eq!(extract_define(flags, "NAME"), Some("Front Door".to_string()));
    }

    #[test]
    fn test_no_partial_name_match() {
        let flags = "-DFOO=\"bar baz\" -DQUX=1";
        assert_eq!(extract_define(flags, "QU"), None);
        assert_eq!(extract_define(flags, "FO"), None);
    }

    #[test]
    fn test_absent_define() {
        assert_eq!(extract_define("-DFOO=bar", "BAR"), None);
        assert_eq!(extract_define("", "FOO"), None);
    }

    #[test]
    fn test_define_without_value_is_skipped() {
        assert_eq!(extract_define("-DDEBUG -DFOO=1", "DEBUG"), None);
        assert_eq!(extract_define("-DDEBUG -DFOO=1", "FOO"), Some("1".to_string()));
    }

    #[test]
    fn test_surrounding_flags_are_ignored() {
        let flags = "-Os -Wall -DCHIP_FAMILY=ESP32-C3 -fno-exceptions";
        assert_eq!(
            extract_define(flags, "CHIP_FAMILY"),
            Some("ESP32-C3".to_string())
        );
    }

    #[test]
    fn test_empty_quoted_value() {
        assert_eq!(extract_define("-DFOO=\"\"", "FOO"), Some(String::new()));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let flags = "-DFOO=first -DFOO=second";
        assert_eq!(extract_define(flags, "FOO"), Some("first".to_string()));
    }

    #[test]
    fn test_multiline_flags() {
        let flags = "-DBASE_VERSION=2.0\n  -DENV_VERSION=7";
        assert_eq!(extract_define(flags, "ENV_VERSION"), Some("7".to_string()));
    }
}
