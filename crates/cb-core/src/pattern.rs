//! URL pattern to regex translation
//!
//! Translates the ABP-style URL pattern mini-language (`||`, `|`, `^`, `*`)
//! into a regex source string that stays inside the host's restricted
//! regex dialect (see [`crate::dialect`]).

/// Regex matching any URL: the result for wildcard-equivalent patterns.
pub const MATCH_ALL: &str = ".*";

/// `||` at the start: any scheme, optional subdomain labels.
const START_URL: &str = r"^[^:]+://+([^:/]+\.)?";
/// `^` in the middle of a pattern.
const SEPARATOR: &str = "[/:&?]";
/// `^` at the end of a pattern: separator or end of URL.
const END_SEPARATOR: &str = "[/:&?]?";
/// `^` right after a `||` host.
const DOMAIN_SEPARATOR: &str = "[/:]";

/// Error returned by [`pattern_to_regex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Non ASCII characters are not supported (byte {position})")]
    NonAscii { position: usize },
}

/// Translate a URL pattern into a regex source string.
///
/// Single pass over the pattern bytes:
/// - `||` at position 0 becomes a scheme-agnostic host prefix
/// - a leading `|` anchors the start, a trailing `|` the end
/// - `^` becomes a separator class (optional at the end of the pattern)
/// - `*` becomes `.*`
/// - regex metacharacters are escaped
pub fn pattern_to_regex(pattern: &str) -> Result<String, PatternError> {
    if pattern.is_empty() || pattern == "||" || pattern == "|" || pattern == "*" {
        return Ok(MATCH_ALL.to_string());
    }

    let bytes = pattern.as_bytes();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut domain_targeting = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        match b {
            b'.' | b'+' | b'?' | b'$' | b'{' | b'}' | b'(' | b')' | b'[' | b']' | b'/' | b'\\' => {
                out.push('\\');
                out.push(b as char);
                if b != b'.' {
                    domain_targeting = false;
                }
            }
            b'|' => {
                if i == 0 {
                    if next == Some(b'|') {
                        out.push_str(START_URL);
                        domain_targeting = true;
                        i += 1;
                    } else {
                        out.push('^');
                    }
                } else if next.is_none() {
                    out.push('$');
                } else {
                    out.push_str("\\|");
                }
            }
            b'^' => {
                if domain_targeting {
                    out.push_str(DOMAIN_SEPARATOR);
                    domain_targeting = false;
                } else if next.is_none() {
                    out.push_str(END_SEPARATOR);
                } else {
                    out.push_str(SEPARATOR);
                }
            }
            b'*' => {
                out.push_str(MATCH_ALL);
                domain_targeting = false;
            }
            _ => {
                if b > 127 {
                    return Err(PatternError::NonAscii { position: i });
                }
                if b == b':' {
                    domain_targeting = false;
                }
                out.push(b as char);
            }
        }

        i += 1;
    }

    Ok(out)
}

/// Whether the pattern is a literal `/regex/`.
pub fn is_regex_pattern(pattern: &str) -> bool {
    pattern.len() > 2 && pattern.starts_with('/') && pattern.ends_with('/')
}

/// Body of a literal `/regex/` pattern.
pub fn extract_regex(pattern: &str) -> Option<&str> {
    if is_regex_pattern(pattern) {
        Some(&pattern[1..pattern.len() - 1])
    } else {
        None
    }
}

/// Regex source for a pattern: literal regexes pass through, anything else
/// is translated.
pub fn compile_pattern(pattern: &str) -> Result<String, PatternError> {
    match extract_regex(pattern) {
        Some(regex) => Ok(regex.to_string()),
        None => pattern_to_regex(pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::validate_regex;
    use proptest::prelude::*;

    #[test]
    fn wildcard_equivalents() {
        for p in ["", "*", "|", "||"] {
            assert_eq!(pattern_to_regex(p).unwrap(), MATCH_ALL);
        }
    }

    #[test]
    fn host_anchor() {
        assert_eq!(
            pattern_to_regex("||example.com^").unwrap(),
            r"^[^:]+://+([^:/]+\.)?example\.com[/:]"
        );
        assert_eq!(
            pattern_to_regex("||example.com/ads^").unwrap(),
            r"^[^:]+://+([^:/]+\.)?example\.com\/ads[/:&?]?"
        );
    }

    #[test]
    fn anchors_and_separators() {
        assert_eq!(pattern_to_regex("|http://a.b|").unwrap(), r"^http:\/\/a\.b$");
        assert_eq!(pattern_to_regex("/ad^x*y").unwrap(), r"\/ad[/:&?]x.*y");
        assert_eq!(pattern_to_regex("a|b").unwrap(), r"a\|b");
    }

    #[test]
    fn rejects_non_ascii() {
        assert_eq!(
            pattern_to_regex("/реклама/"),
            Err(PatternError::NonAscii { position: 1 })
        );
    }

    #[test]
    fn literal_regex_passes_through() {
        assert_eq!(extract_regex("/banner[0-9]+/"), Some("banner[0-9]+"));
        assert_eq!(extract_regex("//"), None);
        assert_eq!(compile_pattern("/ads/").unwrap(), "ads");
        assert_eq!(compile_pattern("ads").unwrap(), "ads");
    }

    proptest! {
        #[test]
        fn translated_patterns_stay_in_dialect(pattern in "[ -~]{0,40}") {
            if let Ok(regex) = pattern_to_regex(&pattern) {
                prop_assert!(validate_regex(&regex).is_ok(), "{} -> {}", pattern, regex);
            }
        }
    }
}
