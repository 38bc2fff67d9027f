//! Scriptlet call parser
//!
//! `//scriptlet("name", "arg1", 'arg2')` → name plus argument list.

use crate::error::SyntaxError;

/// Content prefix that marks a scriptlet call.
pub const SCRIPTLET_MASK: &str = "//scriptlet(";

/// Parsed scriptlet call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scriptlet {
    pub name: String,
    pub args: Vec<String>,
}

pub fn is_scriptlet(content: &str) -> bool {
    content.starts_with(SCRIPTLET_MASK)
}

/// Parse a scriptlet call. The first quoted argument is the name and must be
/// non-empty.
pub fn parse_scriptlet(content: &str) -> Result<Scriptlet, SyntaxError> {
    if !is_scriptlet(content) || content.len() <= SCRIPTLET_MASK.len() {
        return Err(SyntaxError::rule("Invalid scriptlet"));
    }

    let body = &content.as_bytes()[SCRIPTLET_MASK.len()..content.len() - 1];
    let mut args = tokenize_args(body)?;
    if args.first().map_or(true, |name| name.is_empty()) {
        return Err(SyntaxError::rule("Invalid scriptlet params"));
    }

    let name = args.remove(0);
    Ok(Scriptlet { name, args })
}

/// Split a comma-separated list of quoted arguments.
///
/// Only commas and spaces are allowed between arguments. Inside quotes a
/// backslash escapes the active quote character or another backslash; any
/// other escape is kept verbatim.
fn tokenize_args(body: &[u8]) -> Result<Vec<String>, SyntaxError> {
    let mut args = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut quote: Option<u8> = None;
    let mut iter = body.iter().copied();

    while let Some(b) = iter.next() {
        match (quote, b) {
            (None, b',' | b' ') => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (Some(q), _) if b == q => {
                quote = None;
                args.push(String::from_utf8_lossy(&current).into_owned());
                current.clear();
            }
            (Some(q), b'\\') => {
                let next = iter
                    .next()
                    .ok_or_else(|| SyntaxError::rule("Invalid escape sequence in scriptlet arguments"))?;
                if next != q && next != b'\\' {
                    current.push(b'\\');
                }
                current.push(next);
            }
            (Some(_), _) => current.push(b),
            (None, _) => return Err(SyntaxError::rule("Invalid scriptlet arguments string")),
        }
    }

    if quote.is_some() {
        return Err(SyntaxError::rule("Unmatched quotes in scriptlet arguments"));
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_args() {
        let s = parse_scriptlet(r#"//scriptlet("set-constant", "ads.enabled", 'false')"#).unwrap();
        assert_eq!(s.name, "set-constant");
        assert_eq!(s.args, vec!["ads.enabled", "false"]);

        let s = parse_scriptlet(r#"//scriptlet('abort-on-property-read')"#).unwrap();
        assert!(s.args.is_empty());
    }

    #[test]
    fn handles_escapes_inside_quotes() {
        let s = parse_scriptlet(r#"//scriptlet("log", "a\"b", "c\\d", "e\nf", 'x"y')"#).unwrap();
        assert_eq!(s.args, vec![r#"a"b"#, r"c\d", r"e\nf", r#"x"y"#]);
    }

    #[test]
    fn rejects_malformed_calls() {
        assert!(parse_scriptlet("//scriptlet()").is_err());
        assert!(parse_scriptlet(r#"//scriptlet("")"#).is_err());
        assert!(parse_scriptlet(r#"//scriptlet(name)"#).is_err());
        assert!(parse_scriptlet(r#"//scriptlet("name", 'open)"#).is_err());
        assert!(parse_scriptlet(r#"//scriptlet("name\"#).is_err());
        assert!(parse_scriptlet("window.x = 1;").is_err());
    }
}
