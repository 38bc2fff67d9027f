use cb_core::pattern::compile_pattern;
use cb_core::types::CosmeticKind;
use cb_core::{validate_regex, HostVersion};

use crate::error::SyntaxError;
use crate::marker::{find_cosmetic_marker, CosmeticMarker};
use crate::network::split_escaped;
use crate::rule::RuleHeader;
use crate::scriptlet::{is_scriptlet, parse_scriptlet};

/// Pseudo-classes only the extended selector engine understands.
const EXTENDED_PSEUDO_CLASSES: &[&str] = &[
    "has",
    "is",
    "has-text",
    "contains",
    "matches-css",
    "if",
    "if-not",
    "xpath",
    "nth-ancestor",
    "upward",
    "remove",
    "matches-attr",
    "matches-property",
];

const EXTENDED_ATTRIBUTE_TOKEN: &str = "[-ext-";
const ABP_PSEUDO_PREFIX: &str = "-abp-";

/// A parsed cosmetic (element hiding / injection) rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosmeticRule {
    pub header: RuleHeader,
    /// Text after the marker: selector, style block or script.
    pub content: String,
    pub kind: CosmeticKind,
    pub is_extended_css: bool,
    pub is_scriptlet: bool,
    /// Raw `$path=` value.
    pub path_modifier: Option<String>,
    /// Regex source compiled from `$path=`.
    pub path_regex: Option<String>,
}

impl CosmeticRule {
    /// Parse a canonical cosmetic rule line.
    pub fn parse(line: &str, version: HostVersion) -> Result<Self, SyntaxError> {
        let (index, marker) =
            find_cosmetic_marker(line).ok_or_else(|| SyntaxError::rule("Not a cosmetic rule"))?;

        let content = &line[index + marker.byte_len()..];
        if content.is_empty() {
            return Err(SyntaxError::rule("Rule content is empty"));
        }

        let kind = match marker {
            CosmeticMarker::ElementHiding
            | CosmeticMarker::ElementHidingException
            | CosmeticMarker::ElementHidingExtended
            | CosmeticMarker::ElementHidingExtendedException => CosmeticKind::ElementHiding,
            CosmeticMarker::Css
            | CosmeticMarker::CssException
            | CosmeticMarker::CssExtended
            | CosmeticMarker::CssExtendedException => CosmeticKind::CssInjection,
            CosmeticMarker::Script | CosmeticMarker::ScriptException => CosmeticKind::ScriptInjection,
            CosmeticMarker::Html | CosmeticMarker::HtmlException => {
                return Err(SyntaxError::rule("Unsupported rule type"));
            }
        };

        let mut rule = Self {
            header: RuleHeader::new(line),
            content: content.to_string(),
            kind,
            is_extended_css: false,
            is_scriptlet: false,
            path_modifier: None,
            path_regex: None,
        };
        rule.header.is_exception = marker.is_exception();

        if kind == CosmeticKind::ScriptInjection && is_scriptlet(content) {
            parse_scriptlet(content)?;
            rule.is_scriptlet = true;
        }

        let domains = &line[..index];
        if !domains.is_empty() && domains != "*" {
            rule.set_domains(domains)?;
        }

        rule.is_extended_css = marker.is_extended() || has_extended_syntax(content, version);

        if kind == CosmeticKind::CssInjection && content.contains("url(") {
            return Err(SyntaxError::rule("Forbidden style in a CSS rule"));
        }
        if rule.header.is_exception && rule.path_modifier.is_some() {
            return Err(SyntaxError::rule(
                "Cosmetic exception rules with $path modifier are not supported",
            ));
        }

        Ok(rule)
    }

    /// `[$domain=a.com|b.com,path=/x]c.com,d.com` or a plain comma list.
    fn set_domains(&mut self, domains: &str) -> Result<(), SyntaxError> {
        if !domains.starts_with('[') {
            return self.header.add_domains(domains, b',');
        }

        if domains.len() < 3 || domains.as_bytes()[1] != b'$' {
            return Err(SyntaxError::modifier("Invalid cosmetic rule modifier"));
        }
        let close = domains
            .rfind(']')
            .ok_or_else(|| SyntaxError::modifier("Invalid option format"))?;
        if close < 2 {
            return Err(SyntaxError::modifier("Invalid option format"));
        }

        for option in split_escaped(&domains[2..close], ',') {
            let (name, value) = option.split_once('=').unwrap_or((option.as_str(), ""));
            self.apply_option(name, value)?;
        }

        let rest = &domains[close + 1..];
        if !rest.is_empty() {
            self.header.add_domains(rest, b',')?;
        }
        Ok(())
    }

    fn apply_option(&mut self, name: &str, value: &str) -> Result<(), SyntaxError> {
        match name {
            "domain" | "from" => {
                if value.is_empty() {
                    return Err(SyntaxError::modifier("$domain modifier cannot be empty"));
                }
                self.header.add_domains(value, b'|')
            }
            "path" => {
                if value.is_empty() {
                    return Err(SyntaxError::modifier("$path modifier cannot be empty"));
                }
                let regex = compile_pattern(value)?;
                if regex.is_empty() {
                    return Err(SyntaxError::modifier("Empty regular expression for path"));
                }
                validate_regex(&regex)?;
                self.path_modifier = Some(value.to_string());
                self.path_regex = Some(regex);
                Ok(())
            }
            _ => Err(SyntaxError::modifier(format!("Unsupported modifier {name}"))),
        }
    }

    pub fn is_element_hiding(&self) -> bool {
        self.kind == CosmeticKind::ElementHiding
    }

    /// Rule has neither permitted nor restricted domains.
    pub fn is_generic(&self) -> bool {
        self.header.permitted_domains.is_empty() && self.header.restricted_domains.is_empty()
    }
}

/// Whether a selector needs the extended CSS engine on `version`.
///
/// Scans for `[-ext-` attributes and for pseudo-classes (at least two
/// characters long) from the extended set. Native `:has` and `:is` are not
/// counted once the host supports them.
fn has_extended_syntax(content: &str, version: HostVersion) -> bool {
    if content.len() < 6 {
        return false;
    }

    let bytes = content.as_bytes();
    let mut pseudo_start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'[' if content[i..].starts_with(EXTENDED_ATTRIBUTE_TOKEN) => return true,
            b':' => pseudo_start = Some(i + 1),
            b'(' => {
                let Some(start) = pseudo_start.take() else {
                    continue;
                };
                if i < start + 2 {
                    continue;
                }
                let name = &content[start..i];
                if name == "has" && version.supports_native_has() {
                    continue;
                }
                if name == "is" && version.supports_native_is() {
                    continue;
                }
                if name.starts_with(ABP_PSEUDO_PREFIX) || EXTENDED_PSEUDO_CLASSES.contains(&name) {
                    return true;
                }
            }
            _ => {}
        }
    }

    false
}
