//! Host regex dialect validator
//!
//! The host's `url-filter` engine understands a small regex subset: no
//! alternation, no counted repetition, anchors only at the ends, and only a
//! handful of escape sequences. This module rejects anything outside of it.

/// Reason a regex source is rejected. Positions are byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegexDialectError {
    #[error("Non ASCII character at byte {0}")]
    NonAscii(usize),
    #[error("Incomplete escape sequence at byte {0}")]
    IncompleteEscape(usize),
    #[error("Unsupported escape sequence at byte {0}")]
    UnsupportedEscape(usize),
    #[error("Start-of-line anchor misplaced at byte {0}")]
    MisplacedStartAnchor(usize),
    #[error("End-of-line anchor misplaced at byte {0}")]
    MisplacedEndAnchor(usize),
    #[error("Alternation is not allowed (byte {0})")]
    Alternation(usize),
    #[error("Explicit repetition range is not allowed (byte {0})")]
    RepetitionRange(usize),
    #[error("Quantifier applies to nothing at byte {0}")]
    UnquantifiableCharacter(usize),
    #[error("Unbalanced brackets at byte {0}")]
    UnbalancedBrackets(usize),
}

/// Bytes that may follow a backslash.
fn is_escapable(b: u8) -> bool {
    matches!(
        b,
        b'.' | b'*' | b'+' | b'?' | b'/' | b'[' | b']' | b'(' | b')' | b'|' | b'{' | b'}' | b'^'
            | b'$' | b'\\'
    )
}

/// Check a regex source against the host dialect.
pub fn validate_regex(source: &str) -> Result<(), RegexDialectError> {
    let bytes = source.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut quantifiable = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if !b.is_ascii() {
            return Err(RegexDialectError::NonAscii(i));
        }
        let in_class = stack.last() == Some(&b'[');

        match b {
            b'\\' => {
                let next = bytes.get(i + 1).copied().ok_or(RegexDialectError::IncompleteEscape(i))?;
                if !is_escapable(next) {
                    return Err(RegexDialectError::UnsupportedEscape(i));
                }
                i += 2;
                quantifiable = true;
                continue;
            }
            b'(' => {
                if !in_class {
                    stack.push(b);
                    quantifiable = false;
                }
            }
            b'[' => {
                stack.push(b);
                quantifiable = false;
            }
            b')' => {
                if !in_class && stack.pop() != Some(b'(') {
                    return Err(RegexDialectError::UnbalancedBrackets(i));
                }
                quantifiable = true;
            }
            b']' => {
                if stack.pop() != Some(b'[') {
                    return Err(RegexDialectError::UnbalancedBrackets(i));
                }
                quantifiable = true;
            }
            b'^' => {
                if i != 0 && !in_class {
                    return Err(RegexDialectError::MisplacedStartAnchor(i));
                }
                quantifiable = false;
            }
            b'$' => {
                if i + 1 < bytes.len() && !in_class {
                    return Err(RegexDialectError::MisplacedEndAnchor(i));
                }
                quantifiable = false;
            }
            b'|' => {
                if !in_class {
                    return Err(RegexDialectError::Alternation(i));
                }
            }
            b'{' | b'}' => {
                if !in_class {
                    return Err(RegexDialectError::RepetitionRange(i));
                }
            }
            b'*' | b'+' | b'?' => {
                if !quantifiable && !in_class {
                    return Err(RegexDialectError::UnquantifiableCharacter(i));
                }
                quantifiable = false;
            }
            _ => quantifiable = true,
        }

        i += 1;
    }

    if !stack.is_empty() {
        return Err(RegexDialectError::UnbalancedBrackets(bytes.len()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_supported_constructs() {
        assert_eq!(validate_regex(r"^[^:]+://+([^:/]+\.)?example\.com[/:]"), Ok(()));
        assert_eq!(validate_regex(r"banner[0-9]+\.gif$"), Ok(()));
        assert_eq!(validate_regex("[|{}]"), Ok(()));
        assert_eq!(validate_regex(".*"), Ok(()));
    }

    #[test]
    fn rejects_with_reason() {
        assert_eq!(validate_regex("ab|cd"), Err(RegexDialectError::Alternation(2)));
        assert_eq!(validate_regex("a{2}"), Err(RegexDialectError::RepetitionRange(1)));
        assert_eq!(validate_regex(r"\d+"), Err(RegexDialectError::UnsupportedEscape(0)));
        assert_eq!(validate_regex("a\\"), Err(RegexDialectError::IncompleteEscape(1)));
        assert_eq!(validate_regex("a^b"), Err(RegexDialectError::MisplacedStartAnchor(1)));
        assert_eq!(validate_regex("a$b"), Err(RegexDialectError::MisplacedEndAnchor(1)));
        assert_eq!(validate_regex("*a"), Err(RegexDialectError::UnquantifiableCharacter(0)));
        assert_eq!(validate_regex("a**"), Err(RegexDialectError::UnquantifiableCharacter(2)));
        assert_eq!(validate_regex("(ab"), Err(RegexDialectError::UnbalancedBrackets(3)));
        assert_eq!(validate_regex("ab)"), Err(RegexDialectError::UnbalancedBrackets(2)));
        assert_eq!(validate_regex("é"), Err(RegexDialectError::NonAscii(0)));
    }
}
