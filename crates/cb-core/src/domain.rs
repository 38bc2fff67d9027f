//! Domain utilities
//!
//! Subdomain tests used by exception folding, IDN encoding of domain lists,
//! and extraction of the host part of a URL pattern.
//!
//! # Examples
//!
//! ```
//! use cb_core::domain::is_domain_or_subdomain;
//!
//! assert!(is_domain_or_subdomain("sub.example.com", "example.com"));
//! assert!(!is_domain_or_subdomain("notexample.com", "example.com"));
//! ```

/// Prefixes that may precede the host part of a network pattern.
const DOMAIN_PREFIXES: &[&str] = &[
    "||", "@@||", "|https://", "|http://", "@@|https://", "@@|http://",
    "|ws://", "|wss://", "@@|ws://", "@@|wss://",
    "//", "://", "@@//", "@@://", "https://", "http://",
    "@@https://", "@@http://",
];

/// Shortest host the pattern extractor accepts.
const MIN_PATTERN_DOMAIN_LEN: usize = 5;

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Whether `candidate` is `domain` itself or one of its subdomains.
pub fn is_domain_or_subdomain(candidate: &str, domain: &str) -> bool {
    if candidate == domain {
        return true;
    }
    let mut current = candidate;
    while let Some(parent) = get_parent_domain(current) {
        if parent == domain {
            return true;
        }
        current = parent;
    }
    false
}

/// Encode a domain with IDNA (punycode) rules.
///
/// ASCII input is returned unchanged so that wildcard entries such as
/// `example.*` survive.
pub fn to_ascii_domain(domain: &str) -> Option<String> {
    if domain.is_ascii() {
        return Some(domain.to_string());
    }
    idna::domain_to_ascii(domain).ok()
}

/// Host part of a network pattern and whether a path follows it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatternDomain<'a> {
    pub domain: &'a str,
    pub has_path: bool,
}

/// Extract the host part of a URL pattern such as `||example.org^` or
/// `|https://example.org/path`.
///
/// Returns an empty domain when the pattern does not start with something
/// that looks like a host.
pub fn extract_pattern_domain(pattern: &str) -> PatternDomain<'_> {
    let bytes = pattern.as_bytes();
    let start = DOMAIN_PREFIXES
        .iter()
        .filter(|prefix| pattern.starts_with(*prefix))
        .map(|prefix| prefix.len())
        .max()
        .unwrap_or(0);

    let mut end = bytes.len();
    let mut last = 0u8;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        last = b;
        if b == b'^' || b == b'/' || b == b'$' {
            end = i;
            break;
        }

        let alnum = b.is_ascii_alphanumeric() || b >= 128;
        if i == start && !alnum {
            return PatternDomain::default();
        }
        if !alnum && b != b'-' && b != b'.' {
            return PatternDomain::default();
        }
    }

    if start >= end || last == b'.' {
        return PatternDomain::default();
    }

    let domain = &pattern[start..end];
    if domain.len() < MIN_PATTERN_DOMAIN_LEN {
        return PatternDomain::default();
    }

    PatternDomain {
        domain,
        has_path: bytes.len() - end > 1,
    }
}

/// Whether an ASCII string looks like a registrable host name
/// (`label.label.tld`, TLD of two or more characters starting with a letter).
pub fn looks_like_domain(domain: &str) -> bool {
    let bytes = domain.as_bytes();
    let Some(dot) = domain.rfind('.') else {
        return false;
    };
    let (host, tld) = (&bytes[..dot], &bytes[dot + 1..]);

    if host.len() < 2 || tld.len() < 2 {
        return false;
    }
    if !host[0].is_ascii_alphanumeric() || !host[host.len() - 1].is_ascii_alphanumeric() {
        return false;
    }
    host.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'.')
        && tld[0].is_ascii_alphabetic()
        && tld.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
}

/// IDN-encode the host part of a pattern if it contains non-ASCII labels.
///
/// Returns `None` when the host cannot be encoded; patterns without a
/// recognizable host come back unchanged.
pub fn encode_pattern_domain(pattern: &str) -> Option<String> {
    let extracted = extract_pattern_domain(pattern);
    if extracted.domain.is_empty() || extracted.domain.is_ascii() {
        return Some(pattern.to_string());
    }

    let encoded = idna::domain_to_ascii(extracted.domain).ok()?;
    if !looks_like_domain(&encoded) {
        return Some(pattern.to_string());
    }
    Some(pattern.replacen(extracted.domain, &encoded, 1))
}
