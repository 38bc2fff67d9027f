use cb_core::domain::encode_pattern_domain;
use cb_core::pattern::{extract_regex, pattern_to_regex};
use cb_core::types::{ContentType, NetworkOption, PartyMask};
use cb_core::{validate_regex, HostVersion};

use crate::error::SyntaxError;
use crate::rule::RuleHeader;

/// Raw parts of a network rule line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleParts<'a> {
    pub pattern: &'a str,
    pub options: Option<&'a str>,
    pub exception: bool,
}

/// Split a network rule into `@@` marker, pattern and options.
///
/// The options delimiter is the rightmost unescaped `$` that is not directly
/// followed by `/`, so `$` inside a `/regex$/` pattern is left alone.
pub fn split_rule_options(line: &str) -> RuleParts<'_> {
    let (exception, body) = match line.strip_prefix("@@") {
        Some(rest) => (true, rest),
        None => (false, line),
    };

    let bytes = body.as_bytes();
    let delimiter = (0..bytes.len()).rev().find(|&i| {
        bytes[i] == b'$'
            && (i == 0 || bytes[i - 1] != b'\\')
            && bytes.get(i + 1) != Some(&b'/')
    });

    match delimiter {
        Some(pos) => RuleParts {
            pattern: &body[..pos],
            options: Some(&body[pos + 1..]),
            exception,
        },
        None => RuleParts {
            pattern: body,
            options: None,
            exception,
        },
    }
}

/// Split on `delimiter`, honoring `\` escapes of the delimiter.
pub(crate) fn split_escaped(text: &str, delimiter: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\\' && chars.peek() == Some(&delimiter) {
            current.push(delimiter);
            chars.next();
        } else if ch == delimiter {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    parts.push(current);
    parts
}

/// A parsed network (URL blocking) rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRule {
    pub header: RuleHeader,
    /// URL pattern, IDN-encoded.
    pub pattern: String,
    /// Regex source for the pattern, absent for an empty pattern.
    pub regex: Option<String>,
    pub permitted_content_types: ContentType,
    pub restricted_content_types: ContentType,
    pub enabled_options: NetworkOption,
    pub disabled_options: NetworkOption,
    pub party: PartyMask,
    pub match_case: bool,
    pub badfilter: bool,
    pub is_document_exception: bool,
    pub is_url_block: bool,
    pub is_css_exception: bool,
    pub is_js_inject: bool,
}

impl NetworkRule {
    /// Parse a canonical network rule line.
    pub fn parse(line: &str, version: HostVersion) -> Result<Self, SyntaxError> {
        if line.is_empty() {
            return Err(SyntaxError::rule("Rule is too short"));
        }

        let parts = split_rule_options(line);
        let mut rule = Self {
            header: RuleHeader::new(line),
            pattern: String::new(),
            regex: None,
            permitted_content_types: ContentType::ALL,
            restricted_content_types: ContentType::empty(),
            enabled_options: NetworkOption::empty(),
            disabled_options: NetworkOption::empty(),
            party: PartyMask::empty(),
            match_case: false,
            badfilter: false,
            is_document_exception: false,
            is_url_block: false,
            is_css_exception: false,
            is_js_inject: false,
        };
        rule.header.is_exception = parts.exception;

        if let Some(options) = parts.options.filter(|o| !o.is_empty()) {
            rule.apply_options(options, version)?;
        }

        match extract_regex(parts.pattern) {
            Some(regex) => {
                rule.pattern = parts.pattern.to_string();
                rule.regex = Some(regex.to_string());
            }
            None => {
                rule.pattern = encode_pattern_domain(parts.pattern).ok_or_else(|| {
                    SyntaxError::rule(format!("Failed to encode the domain in {line}"))
                })?;
                if !rule.pattern.is_empty() {
                    rule.regex = Some(pattern_to_regex(&rule.pattern)?);
                }
            }
        }

        let exception = rule.header.is_exception;
        rule.is_document_exception = exception && rule.enabled_options.contains(NetworkOption::DOCUMENT);
        rule.is_url_block = rule.is_single_option(NetworkOption::URLBLOCK)
            || rule.is_single_option(NetworkOption::GENERICBLOCK);
        rule.is_css_exception = rule.is_single_option(NetworkOption::ELEMHIDE)
            || rule.is_single_option(NetworkOption::GENERICHIDE);
        rule.is_js_inject = rule.is_single_option(NetworkOption::JSINJECT);

        rule.validate(version)?;
        Ok(rule)
    }

    fn apply_options(&mut self, options: &str, version: HostVersion) -> Result<(), SyntaxError> {
        for option in split_escaped(options, ',') {
            let (name, value) = match option.split_once('=') {
                Some((name, value)) => (name, value),
                None => (option.as_str(), ""),
            };
            self.apply_option(name, value, version)?;
        }

        if self.enabled_options.intersects(NetworkOption::DOCUMENT_LEVEL)
            && self.permitted_content_types != ContentType::SUBDOCUMENT
        {
            self.permitted_content_types = ContentType::DOCUMENT;
        }
        Ok(())
    }

    fn apply_option(&mut self, name: &str, value: &str, version: HostVersion) -> Result<(), SyntaxError> {
        if !name.is_empty() && name.bytes().all(|b| b == b'_') {
            return Ok(());
        }

        match name {
            "all" => {}
            "match-case" => self.match_case = true,
            "~match-case" => self.match_case = false,
            "important" => self.header.is_important = true,
            "badfilter" => self.badfilter = true,
            "domain" | "from" => {
                if value.is_empty() {
                    return Err(SyntaxError::modifier("$domain cannot be empty"));
                }
                self.header.add_domains(value, b'|')?;
                return Ok(());
            }
            _ => {
                if let Some(party) = PartyMask::from_modifier(name) {
                    self.party = party;
                } else if let Some(option) = NetworkOption::from_modifier(name) {
                    self.enabled_options |= option;
                } else {
                    let (negated, type_name) = match name.strip_prefix('~') {
                        Some(rest) => (true, rest),
                        None => (false, name),
                    };
                    let content_type = ContentType::from_modifier(type_name)
                        .ok_or_else(|| SyntaxError::modifier(format!("Unsupported modifier: {name}")))?;
                    if content_type == ContentType::PING && !version.supports_ping() {
                        return Err(SyntaxError::modifier(format!("${name} is not supported")));
                    }
                    self.update_content_type(content_type, !negated);
                }
            }
        }

        if !value.is_empty() {
            return Err(SyntaxError::modifier(format!("Option {name} must not have value")));
        }
        Ok(())
    }

    fn update_content_type(&mut self, content_type: ContentType, enabled: bool) {
        if enabled {
            if self.permitted_content_types == ContentType::ALL {
                self.permitted_content_types = ContentType::empty();
            }
            self.permitted_content_types |= content_type;
        } else {
            self.restricted_content_types |= content_type;
        }
    }

    fn validate(&self, version: HostVersion) -> Result<(), SyntaxError> {
        let pattern = self.pattern.as_str();
        if (pattern == "||" || pattern == "*" || pattern.len() < 3)
            && self.header.permitted_domains.is_empty()
        {
            return Err(SyntaxError::pattern(
                "The rule is too wide, add domain restriction or make the pattern more specific",
            ));
        }

        if let Some(regex) = &self.regex {
            if regex.is_empty() {
                return Err(SyntaxError::pattern("Empty regular expression for URL"));
            }
            validate_regex(regex)?;
        }

        if !self.header.is_exception && self.enabled_options.intersects(NetworkOption::EXCEPTION_ONLY) {
            return Err(SyntaxError::modifier(
                "Blocking rule cannot use exception-only modifiers",
            ));
        }

        if version.requires_subdocument_scope()
            && !self.header.is_exception
            && self.permitted_content_types != ContentType::ALL
            && self.has_content_type(ContentType::SUBDOCUMENT)
            && self.party != PartyMask::THIRD_PARTY
            && self.header.permitted_domains.is_empty()
        {
            return Err(SyntaxError::rule(
                "$subdocument blocking rules are allowed only along with third-party or domain modifiers",
            ));
        }

        Ok(())
    }

    /// The rule applies to `content_type`.
    pub fn has_content_type(&self, content_type: ContentType) -> bool {
        self.permitted_content_types.contains(content_type)
            && !self.restricted_content_types.contains(content_type)
    }

    /// Content types the rule effectively applies to.
    pub fn effective_content_types(&self) -> ContentType {
        self.permitted_content_types & !self.restricted_content_types
    }

    /// The enabled options are exactly `option`.
    pub fn is_single_option(&self, option: NetworkOption) -> bool {
        self.enabled_options == option
    }

    /// Literal `/regex/` pattern.
    pub fn is_regex_rule(&self) -> bool {
        extract_regex(&self.pattern).is_some()
    }

    /// Whether this `$badfilter` rule cancels `other`.
    ///
    /// Everything but the badfilter flag must match exactly; permitted
    /// domains only need to intersect (or both be empty).
    pub fn negates(&self, other: &NetworkRule) -> bool {
        self.header.is_exception == other.header.is_exception
            && self.pattern == other.pattern
            && self.permitted_content_types == other.permitted_content_types
            && self.restricted_content_types == other.restricted_content_types
            && self.enabled_options == other.enabled_options
            && self.disabled_options == other.disabled_options
            && self.header.restricted_domains == other.header.restricted_domains
            && domains_intersect(&self.header.permitted_domains, &other.header.permitted_domains)
    }
}

fn domains_intersect(first: &[String], second: &[String]) -> bool {
    if first.is_empty() && second.is_empty() {
        return true;
    }
    first.iter().any(|domain| second.contains(domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> NetworkRule {
        NetworkRule::parse(line, HostVersion::V16_4).expect("rule should parse")
    }

    #[test]
    fn splits_options_on_rightmost_dollar() {
        let parts = split_rule_options("@@||example.com/a$b^$script,domain=x.com");
        assert!(parts.exception);
        assert_eq!(parts.pattern, "||example.com/a$b^");
        assert_eq!(parts.options, Some("script,domain=x.com"));

        let parts = split_rule_options("/ads$/");
        assert_eq!(parts.pattern, "/ads$/");
        assert_eq!(parts.options, None);

        let parts = split_rule_options("||a.com/\\$x");
        assert_eq!(parts.options, None);
    }

    #[test]
    fn escaped_commas_stay_in_option() {
        assert_eq!(split_escaped(r"a,b\,c,d", ','), vec!["a", "b,c", "d"]);
    }

    #[test]
    fn parses_basic_blocking_rule() {
        let rule = parse("||ads.example.com^$script,third-party,domain=site.com|~safe.site.com");
        assert!(!rule.header.is_exception);
        assert_eq!(rule.pattern, "||ads.example.com^");
        assert_eq!(rule.permitted_content_types, ContentType::SCRIPT);
        assert_eq!(rule.party, PartyMask::THIRD_PARTY);
        assert_eq!(rule.header.permitted_domains, vec!["site.com"]);
        assert_eq!(rule.header.restricted_domains, vec!["safe.site.com"]);
        assert_eq!(
            rule.regex.as_deref(),
            Some(r"^[^:]+://+([^:/]+\.)?ads\.example\.com[/:]")
        );
    }

    #[test]
    fn negated_content_types_restrict() {
        let rule = parse("||ads.example.com^$~image,~xhr");
        assert_eq!(rule.permitted_content_types, ContentType::ALL);
        assert_eq!(
            rule.restricted_content_types,
            ContentType::IMAGE | ContentType::XMLHTTPREQUEST
        );
        assert!(!rule.has_content_type(ContentType::IMAGE));
        assert!(rule.has_content_type(ContentType::SCRIPT));
    }

    #[test]
    fn exception_options_and_derived_flags() {
        let rule = parse("@@||example.com^$document");
        assert!(rule.is_document_exception);
        assert_eq!(rule.permitted_content_types, ContentType::DOCUMENT);

        let rule = parse("@@||example.com^$elemhide");
        assert!(rule.is_css_exception);

        let rule = parse("@@||example.com^$genericblock");
        assert!(rule.is_url_block);

        let rule = parse("@@||example.com^$jsinject");
        assert!(rule.is_js_inject);
    }

    #[test]
    fn literal_regex_rule() {
        let rule = parse("/banner[0-9]+\\.gif/$image");
        assert!(rule.is_regex_rule());
        assert_eq!(rule.regex.as_deref(), Some("banner[0-9]+\\.gif"));
    }

    #[test]
    fn rejects_invalid_rules() {
        let v = HostVersion::V16_4;
        assert!(NetworkRule::parse("||example.com^$unknown", v).is_err());
        assert!(NetworkRule::parse("||example.com^$elemhide", v).is_err());
        assert!(NetworkRule::parse("*$script", v).is_err());
        assert!(NetworkRule::parse("ab", v).is_err());
        assert!(NetworkRule::parse("||example.com^$script=1", v).is_err());
        assert!(NetworkRule::parse("||example.com^$domain=", v).is_err());
        assert!(NetworkRule::parse("/ad(s|x)/", v).is_err());
        assert!(NetworkRule::parse("||реклама.example/путь^", v).is_err());
    }

    #[test]
    fn wide_pattern_allowed_with_domain() {
        let rule = parse("*$script,domain=example.com");
        assert_eq!(rule.regex.as_deref(), Some(".*"));
    }

    #[test]
    fn ping_depends_on_version() {
        assert!(NetworkRule::parse("||example.com^$ping", HostVersion::V13).is_err());
        assert!(NetworkRule::parse("||example.com^$~ping", HostVersion::V14).is_ok());
    }

    #[test]
    fn subdocument_scope_check() {
        let line = "||example.com^$subdocument";
        assert!(NetworkRule::parse(line, HostVersion::V15).is_err());
        assert!(NetworkRule::parse(line, HostVersion::V16).is_ok());
        assert!(NetworkRule::parse("||example.com^$subdocument,third-party", HostVersion::V15).is_ok());
    }

    #[test]
    fn idn_pattern_host_is_encoded() {
        let rule = parse("||пример.рф^");
        assert_eq!(rule.pattern, "||xn--e1afmkfd.xn--p1ai^");
    }

    #[test]
    fn badfilter_negation_requires_exact_match() {
        let target = parse("||ads.example^");
        let kill = parse("||ads.example^$badfilter");
        assert!(kill.badfilter);
        assert!(kill.negates(&target));

        let scoped = parse("||ads.example^$script");
        assert!(!kill.negates(&scoped));

        let target = parse("||ads.example^$domain=a.com|b.com");
        let kill = parse("||ads.example^$domain=b.com,badfilter");
        assert!(kill.negates(&target));
    }
}
