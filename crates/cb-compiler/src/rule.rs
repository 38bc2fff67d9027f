//! Parsed rule model
//!
//! A [`Rule`] is either a network rule or a cosmetic rule. Both share a
//! [`RuleHeader`] holding the source text, the exception/importance flags and
//! the domain scope.

use cb_core::domain::to_ascii_domain;

use crate::cosmetic::CosmeticRule;
use crate::error::SyntaxError;
use crate::network::NetworkRule;

/// Fields shared by every rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHeader {
    /// Source line the rule was parsed from.
    pub text: String,
    /// `@@` network rule or `#@#`-style cosmetic rule.
    pub is_exception: bool,
    /// `$important`.
    pub is_important: bool,
    /// Rule only applies on these domains (everywhere if empty).
    pub permitted_domains: Vec<String>,
    /// Rule never applies on these domains.
    pub restricted_domains: Vec<String>,
}

impl RuleHeader {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_exception: false,
            is_important: false,
            permitted_domains: Vec::new(),
            restricted_domains: Vec::new(),
        }
    }

    /// Parse a `separator`-delimited domain list; `~` routes an entry to the
    /// restricted set.
    pub(crate) fn add_domains(&mut self, list: &str, separator: u8) -> Result<(), SyntaxError> {
        for raw in list.split(separator as char) {
            let (restricted, domain) = match raw.strip_prefix('~') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };

            if domain.is_empty() {
                return Err(SyntaxError::modifier("Empty domain"));
            }
            if domain.contains('~') {
                return Err(SyntaxError::modifier("Unexpected tilde character"));
            }
            if domain.len() < 2 {
                return Err(SyntaxError::modifier(format!("Domain is too short: {domain}")));
            }
            if domain.len() > 2 && domain.starts_with('/') && domain.ends_with('/') {
                return Err(SyntaxError::modifier(
                    "Using regular expression for domain modifier is not supported",
                ));
            }

            let domain = to_ascii_domain(domain)
                .ok_or_else(|| SyntaxError::modifier(format!("Invalid domain: {domain}")))?;

            if restricted {
                self.restricted_domains.push(domain);
            } else {
                self.permitted_domains.push(domain);
            }
        }
        Ok(())
    }
}

/// A parsed filter rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Network(NetworkRule),
    Cosmetic(CosmeticRule),
}

impl Rule {
    pub fn header(&self) -> &RuleHeader {
        match self {
            Rule::Network(rule) => &rule.header,
            Rule::Cosmetic(rule) => &rule.header,
        }
    }

    /// Source text of the rule.
    pub fn text(&self) -> &str {
        &self.header().text
    }

    pub fn is_exception(&self) -> bool {
        self.header().is_exception
    }

    pub fn as_cosmetic(&self) -> Option<&CosmeticRule> {
        match self {
            Rule::Cosmetic(rule) => Some(rule),
            Rule::Network(_) => None,
        }
    }
}

impl From<NetworkRule> for Rule {
    fn from(rule: NetworkRule) -> Self {
        Rule::Network(rule)
    }
}

impl From<CosmeticRule> for Rule {
    fn from(rule: CosmeticRule) -> Self {
        Rule::Cosmetic(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_permitted_and_restricted() {
        let mut header = RuleHeader::new("x");
        header.add_domains("a.com|~b.com|пример.рф", b'|').unwrap();
        assert_eq!(header.permitted_domains, vec!["a.com", "xn--e1afmkfd.xn--p1ai"]);
        assert_eq!(header.restricted_domains, vec!["b.com"]);
    }

    #[test]
    fn rejects_malformed_entries() {
        let mut header = RuleHeader::new("x");
        assert!(header.add_domains("a.com,,b.com", b',').is_err());
        assert!(header.add_domains("a~b.com", b',').is_err());
        assert!(header.add_domains("a", b',').is_err());
        assert!(header.add_domains("/ex.*/", b',').is_err());
    }
}
