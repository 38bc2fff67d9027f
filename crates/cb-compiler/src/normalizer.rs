//! Dialect normalizer
//!
//! Rewrites uBlock Origin and Adblock Plus specific syntax into canonical
//! rules before parsing:
//!
//! - `example.com##+js(name, arg)` → `example.com#%#//scriptlet("ubo-name", "arg")`
//! - `example.com#$#snippet arg; other` → one `#%#//scriptlet("abp-snippet", ...)` per statement
//! - `example.com##.ad:style(color: red)` → `example.com#$#.ad { color: red }`
//! - `||ads$denyallow=a.com|b.com,domain=x.com` → blocking rule plus per-domain exceptions

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SyntaxError;
use crate::marker::{find_cosmetic_marker, CosmeticMarker};
use crate::network::split_rule_options;

const UBO_SCRIPTLET_MASK: &str = "##+js";
const UBO_SCRIPTLET_EXCEPTION_MASK: &str = "#@#+js";
const UBO_STYLE_MASK: &str = ":style(";
const DENYALLOW_OPTION: &str = "denyallow=";
const DOMAIN_OPTION: &str = "domain=";

/// A `#$#` body that already is a `selector { declarations }` block.
static CSS_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)#@?\$#.+?\s*\{.*\}\s*$").expect("static regex must compile")
});

/// One snippet argument: quoted segment or run of non-space characters.
static SNIPPET_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'.*?'|".*?"|\S+"#).expect("static regex must compile"));

/// Rewrite one line into zero or more canonical lines.
///
/// An empty vector means the line is silently dropped. Lines in no known
/// dialect come back unchanged.
pub fn normalize(line: &str) -> Result<Vec<String>, SyntaxError> {
    if line.is_empty() {
        return Ok(vec![String::new()]);
    }

    let Some((index, marker)) = find_cosmetic_marker(line) else {
        if line.contains(DENYALLOW_OPTION) {
            if let Some(lines) = expand_denyallow(line)? {
                return Ok(lines);
            }
        }
        return Ok(vec![line.to_string()]);
    };

    let body = &line[index..];
    match marker {
        CosmeticMarker::ElementHiding | CosmeticMarker::ElementHidingException => {
            if body.starts_with(UBO_SCRIPTLET_MASK) || body.starts_with(UBO_SCRIPTLET_EXCEPTION_MASK) {
                return Ok(convert_ubo_scriptlet(line, index, marker).into_iter().collect());
            }
            if line.contains(UBO_STYLE_MASK) {
                return Ok(vec![convert_ubo_style(line, index, marker)]);
            }
        }
        CosmeticMarker::Css | CosmeticMarker::CssException if !CSS_BLOCK.is_match(body) => {
            return Ok(convert_abp_snippet(line, index, marker));
        }
        _ => {}
    }

    Ok(vec![line.to_string()])
}

fn scriptlet_rule(domains: &str, exception: bool, args: &[String]) -> String {
    let marker = if exception { "#@%#" } else { "#%#" };
    format!("{domains}{marker}//scriptlet({})", args.join(", "))
}

fn convert_ubo_scriptlet(line: &str, index: usize, marker: CosmeticMarker) -> Option<String> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    if open + 1 >= close {
        return None;
    }
    let raw = &line[open + 1..close];

    let parts: Vec<&str> = if raw.contains(", ") {
        raw.split(", ").collect()
    } else {
        raw.split(',').collect()
    };

    let args: Vec<String> = parts
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 {
                quote_arg(&format!("ubo-{arg}"))
            } else {
                quote_arg(arg)
            }
        })
        .collect();

    Some(scriptlet_rule(&line[..index], marker.is_exception(), &args))
}

fn convert_abp_snippet(line: &str, index: usize, marker: CosmeticMarker) -> Vec<String> {
    let domains = &line[..index];
    let body = &line[index + marker.byte_len()..];

    body.split("; ")
        .map(|statement| {
            let args: Vec<String> = SNIPPET_TOKEN
                .find_iter(statement)
                .map(|m| m.as_str())
                .filter(|token| !token.is_empty())
                .enumerate()
                .map(|(i, token)| {
                    if i == 0 {
                        quote_arg(&format!("abp-{token}"))
                    } else {
                        quote_arg(token)
                    }
                })
                .collect();
            scriptlet_rule(domains, marker.is_exception(), &args)
        })
        .collect()
}

fn convert_ubo_style(line: &str, index: usize, marker: CosmeticMarker) -> String {
    let replacement = if marker.is_exception() { "#@$#" } else { "#$#" };
    let mut converted = String::with_capacity(line.len() + 4);
    converted.push_str(&line[..index]);
    converted.push_str(replacement);
    converted.push_str(&line[index + marker.byte_len()..].replace(UBO_STYLE_MASK, " { "));
    converted.pop();
    converted.push_str(" }");
    converted
}

/// Wrap a scriptlet argument in double quotes, unwrapping existing quotes.
fn quote_arg(arg: &str) -> String {
    let inner = if arg.len() <= 1 {
        arg.replace('"', "\\\"")
    } else if arg.starts_with('\'') && arg.ends_with('\'') {
        arg.trim_matches('\'').replace('"', "\\\"")
    } else if arg.starts_with('"') && arg.ends_with('"') {
        arg.trim_matches('"').to_string()
    } else {
        arg.to_string()
    };
    format!("\"{inner}\"")
}

/// Expand `$denyallow=` into a blocking rule plus exceptions per domain.
///
/// `Ok(None)` leaves the line to the network parser.
fn expand_denyallow(line: &str) -> Result<Option<Vec<String>>, SyntaxError> {
    let parts = split_rule_options(line);
    let Some(options) = parts.options else {
        return Ok(None);
    };
    let pattern = parts.pattern;
    let anchored = pattern.starts_with('|') && !pattern.starts_with("||");
    if anchored || !options.contains(DOMAIN_OPTION) {
        return Ok(None);
    }

    let all_options: Vec<&str> = options.split(',').collect();
    let Some(denyallow) = all_options.iter().copied().find(|o| o.contains(DENYALLOW_OPTION)) else {
        return Ok(None);
    };
    let list = denyallow.replacen(DENYALLOW_OPTION, "", 1);
    let domains: Vec<&str> = list.split('|').collect();
    if domains.iter().any(|d| d.starts_with('~') || d.contains('*')) {
        return Err(SyntaxError::modifier(
            "Negated or wildcard domains are not allowed in $denyallow",
        ));
    }

    let remaining = all_options
        .iter()
        .copied()
        .filter(|o| *o != denyallow)
        .collect::<Vec<_>>()
        .join(",");

    let path = denyallow_path(pattern);
    let generic = path.is_empty() || path == "*";

    let (block_prefix, exception_prefix, exception_suffix) = if parts.exception {
        ("@@", "||", ",important")
    } else {
        ("", "@@||", "")
    };

    let mut lines = vec![format!("{block_prefix}{pattern}${remaining}")];
    for domain in &domains {
        if generic {
            lines.push(format!("{exception_prefix}{domain}${remaining}{exception_suffix}"));
        } else {
            lines.push(format!("{exception_prefix}{domain}/{path}${remaining}{exception_suffix}"));
            lines.push(format!("{exception_prefix}{domain}/*/{path}${remaining}{exception_suffix}"));
        }
    }
    Ok(Some(lines))
}

/// Path part of a denyallow pattern: text after the host for `||host/path`,
/// otherwise the pattern without a leading `/`.
fn denyallow_path(pattern: &str) -> &str {
    match pattern.strip_prefix("||") {
        Some(rest) => rest.split_once('/').map_or("", |(_, path)| path),
        None => pattern.strip_prefix('/').unwrap_or(pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(line: &str) -> String {
        let mut lines = normalize(line).unwrap();
        assert_eq!(lines.len(), 1, "{lines:?}");
        lines.remove(0)
    }

    #[test]
    fn passes_canonical_rules_through() {
        assert_eq!(one("||example.com^$script"), "||example.com^$script");
        assert_eq!(one("example.com##.ad"), "example.com##.ad");
        assert_eq!(
            one("example.com#$#.ad { display: none; }"),
            "example.com#$#.ad { display: none; }"
        );
    }

    #[test]
    fn ubo_scriptlets() {
        assert_eq!(
            one("example.com##+js(set-constant, ads, false)"),
            r#"example.com#%#//scriptlet("ubo-set-constant", "ads", "false")"#
        );
        assert_eq!(
            one("example.com#@#+js(nobab)"),
            r#"example.com#@%#//scriptlet("ubo-nobab")"#
        );
        assert_eq!(
            one("example.com##+js(aopr,'ads')"),
            r#"example.com#%#//scriptlet("ubo-aopr", "ads")"#
        );
        assert!(normalize("example.com##+js()").unwrap().is_empty());
    }

    #[test]
    fn abp_snippets() {
        let lines = normalize("example.com#$#log 'hello world'; abort-on-property-read ads").unwrap();
        assert_eq!(
            lines,
            vec![
                r#"example.com#%#//scriptlet("abp-log", "hello world")"#,
                r#"example.com#%#//scriptlet("abp-abort-on-property-read", "ads")"#,
            ]
        );
    }

    #[test]
    fn ubo_style() {
        assert_eq!(
            one("example.com##.ad:style(color: red)"),
            "example.com#$#.ad { color: red }"
        );
        assert_eq!(
            one("example.com#@#.ad:style(color: red)"),
            "example.com#@$#.ad { color: red }"
        );
    }

    #[test]
    fn denyallow_with_path() {
        let lines =
            normalize("@@||good.example/assets$denyallow=sub.example,domain=good.example").unwrap();
        assert_eq!(
            lines,
            vec![
                "@@||good.example/assets$domain=good.example",
                "||sub.example/assets$domain=good.example,important",
                "||sub.example/*/assets$domain=good.example,important",
            ]
        );
    }

    #[test]
    fn denyallow_generic() {
        let lines = normalize("*$script,denyallow=a.com|b.com,domain=x.com").unwrap();
        assert_eq!(
            lines,
            vec![
                "*$script,domain=x.com",
                "@@||a.com$script,domain=x.com",
                "@@||b.com$script,domain=x.com",
            ]
        );
    }

    #[test]
    fn denyallow_rejections() {
        assert!(normalize("*$denyallow=~a.com,domain=x.com").is_err());
        assert!(normalize("*$denyallow=a.*,domain=x.com").is_err());
        assert_eq!(one("*$denyallow=a.com"), "*$denyallow=a.com");
        assert_eq!(
            one("|https://x.com$denyallow=a.com,domain=x.com"),
            "|https://x.com$denyallow=a.com,domain=x.com"
        );
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_arg("\""), "\"\\\"\"");
        assert_eq!(quote_arg("'a\"b'"), "\"a\\\"b\"");
        assert_eq!(quote_arg("\"ab\""), "\"ab\"");
        assert_eq!(quote_arg("plain"), "\"plain\"");
    }
}
