//! Line → rule factory
//!
//! Trims and classifies each input line, runs it through the dialect
//! normalizer and hands every canonical line to the matching parser.

use std::sync::atomic::{AtomicUsize, Ordering};

use cb_core::HostVersion;
use log::debug;

use crate::cosmetic::CosmeticRule;
use crate::error::SyntaxError;
use crate::marker::find_cosmetic_marker;
use crate::network::NetworkRule;
use crate::normalizer::normalize;
use crate::rule::Rule;

/// Parse-error counter shared between conversion lanes.
#[derive(Debug, Default)]
pub struct ErrorCounter(AtomicUsize);

impl ErrorCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Rules parsed from a batch of lines.
#[derive(Debug, Default)]
pub struct RuleBatch {
    pub rules: Vec<Rule>,
    /// Lines (or normalized lines) that failed to parse.
    pub errors: usize,
}

/// `! comment`, `# comment`, a lone `#`, or a `[Adblock Plus 2.0]` header.
pub fn is_comment(line: &str) -> bool {
    match line.as_bytes() {
        [b'!', ..] => true,
        [b'#'] | [b'#', b' ', ..] => true,
        [b'[', rest @ ..] => rest.first() != Some(&b'$') && line.ends_with(']'),
        _ => false,
    }
}

/// Parse one canonical line. `Ok(None)` for blank lines and comments.
pub fn create_rule(line: &str, version: HostVersion) -> Result<Option<Rule>, SyntaxError> {
    if line.is_empty() || is_comment(line) {
        return Ok(None);
    }
    if line.len() < 3 {
        return Err(SyntaxError::rule("The rule is too short"));
    }

    let rule = if find_cosmetic_marker(line).is_some() {
        Rule::from(CosmeticRule::parse(line, version)?)
    } else {
        Rule::from(NetworkRule::parse(line, version)?)
    };
    Ok(Some(rule))
}

/// Parse a batch of raw lines. Failures are counted (and mirrored into
/// `counter` when given) and never stop the batch.
pub fn create_rules<S: AsRef<str>>(
    lines: &[S],
    version: HostVersion,
    counter: Option<&ErrorCounter>,
) -> RuleBatch {
    let mut batch = RuleBatch::default();

    for raw in lines {
        let line = raw.as_ref().trim();
        if line.is_empty() || is_comment(line) {
            continue;
        }

        let canonical = match normalize(line) {
            Ok(canonical) => canonical,
            Err(err) => {
                record_error(line, &err, counter);
                batch.errors += 1;
                continue;
            }
        };

        for text in &canonical {
            match create_rule(text, version) {
                Ok(Some(rule)) => batch.rules.push(rule),
                Ok(None) => {}
                Err(err) => {
                    record_error(text, &err, counter);
                    batch.errors += 1;
                }
            }
        }
    }

    batch
}

fn record_error(line: &str, err: &SyntaxError, counter: Option<&ErrorCounter>) {
    debug!("Dropping rule {line:?}: {err}");
    if let Some(counter) = counter {
        counter.add();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments() {
        assert!(is_comment("! Title: EasyList"));
        assert!(is_comment("#"));
        assert!(is_comment("# hosts style comment"));
        assert!(!is_comment("#\thosts"));
        assert!(is_comment("[Adblock Plus 2.0]"));
        assert!(!is_comment("##.ad"));
        assert!(!is_comment("#@#.ad"));
        assert!(!is_comment("[$path=/page]##.ad"));
    }

    #[test]
    fn creates_both_kinds() {
        let v = HostVersion::V16_4;
        assert!(matches!(create_rule("||ads.example^", v), Ok(Some(Rule::Network(_)))));
        assert!(matches!(create_rule("example.com##.ad", v), Ok(Some(Rule::Cosmetic(_)))));
        assert!(matches!(create_rule("! comment", v), Ok(None)));
        assert!(create_rule("ab", v).is_err());
    }

    #[test]
    fn counts_errors_and_continues() {
        let counter = ErrorCounter::new();
        let lines = [
            "! comment",
            "",
            "   ||ads.example^   ",
            "||bad.example^$unknown-modifier",
            "example.com##+js(set-constant, a, b)",
            "example.com$$script",
            "@@||good.example/assets$denyallow=sub.example,domain=good.example",
        ];
        let batch = create_rules(&lines, HostVersion::V16_4, Some(&counter));

        assert_eq!(batch.errors, 2);
        assert_eq!(counter.count(), 2);
        assert_eq!(batch.rules.len(), 5);
        assert_eq!(batch.rules[0].text(), "||ads.example^");
        assert_eq!(
            batch.rules[1].text(),
            r#"example.com#%#//scriptlet("ubo-set-constant", "a", "b")"#
        );
    }
}
