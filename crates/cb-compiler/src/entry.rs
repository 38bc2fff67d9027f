//! Declarative trigger/action entries
//!
//! Maps parsed rules onto the host's JSON content-blocker entries. Each entry
//! is tagged with a [`Group`]; the assembler emits groups in order so later
//! exceptions override earlier rules.

use cb_core::domain::extract_pattern_domain;
use cb_core::pattern::MATCH_ALL;
use cb_core::types::{ContentType, NetworkOption, PartyMask};
use cb_core::HostVersion;
use serde::{Deserialize, Serialize};

use crate::cosmetic::CosmeticRule;
use crate::network::NetworkRule;
use crate::rule::{Rule, RuleHeader};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub trigger: Trigger,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "url-filter")]
    pub url_filter: String,
    #[serde(
        rename = "url-filter-is-case-sensitive",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub url_filter_is_case_sensitive: Option<bool>,
    #[serde(rename = "if-domain", default, skip_serializing_if = "Option::is_none")]
    pub if_domain: Option<Vec<String>>,
    #[serde(rename = "unless-domain", default, skip_serializing_if = "Option::is_none")]
    pub unless_domain: Option<Vec<String>>,
    #[serde(rename = "resource-type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<Vec<String>>,
    #[serde(rename = "load-type", default, skip_serializing_if = "Option::is_none")]
    pub load_type: Option<Vec<String>>,
    #[serde(rename = "load-context", default, skip_serializing_if = "Option::is_none")]
    pub load_context: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    Block,
    IgnorePreviousRules,
    CssDisplayNone,
}

/// Emission group. Variants are declared in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Group {
    GenericHide,
    GenericHideException,
    DomainHide,
    ElemhideException,
    Blocking,
    Exception,
    Important,
    ImportantException,
    DocumentException,
}

/// Resource-type names in a fixed output order.
const RESOURCE_TYPES: &[(ContentType, &str)] = &[
    (ContentType::IMAGE, "image"),
    (ContentType::STYLESHEET, "style-sheet"),
    (ContentType::SCRIPT, "script"),
    (ContentType::MEDIA, "media"),
    (ContentType::XMLHTTPREQUEST, "raw"),
    (ContentType::OTHER, "raw"),
    (ContentType::WEBSOCKET, "raw"),
    (ContentType::FONT, "font"),
    (ContentType::DOCUMENT, "document"),
    (ContentType::SUBDOCUMENT, "document"),
    (ContentType::PING, "ping"),
];

/// Options that scope an exception to whole pages rather than requests.
const PAGE_LEVEL_OPTIONS: NetworkOption = NetworkOption::DOCUMENT
    .union(NetworkOption::ELEMHIDE)
    .union(NetworkOption::GENERICHIDE)
    .union(NetworkOption::SPECIFICHIDE)
    .union(NetworkOption::URLBLOCK)
    .union(NetworkOption::GENERICBLOCK);

/// Map one rule to its entry, or `None` when the host has no equivalent.
pub fn entry_for(rule: &Rule, version: HostVersion) -> Option<(Group, Entry)> {
    match rule {
        Rule::Network(rule) => network_entry(rule, version),
        Rule::Cosmetic(rule) => cosmetic_entry(rule, version),
    }
}

fn network_entry(rule: &NetworkRule, version: HostVersion) -> Option<(Group, Entry)> {
    let options = rule.enabled_options;
    if options.contains(NetworkOption::POPUP) {
        return None;
    }

    if rule.header.is_exception && options.intersects(PAGE_LEVEL_OPTIONS) {
        let group = if options.contains(NetworkOption::DOCUMENT) {
            Group::DocumentException
        } else if options.intersects(NetworkOption::ELEMHIDE | NetworkOption::SPECIFICHIDE) {
            Group::ElemhideException
        } else if options.contains(NetworkOption::GENERICHIDE) {
            Group::GenericHideException
        } else {
            Group::Exception
        };
        let entry = Entry {
            trigger: page_trigger(rule, version),
            action: Action::new(ActionType::IgnorePreviousRules),
        };
        return Some((group, entry));
    }

    if options.intersects(NetworkOption::EXCEPTION_ONLY) {
        // $jsinject / $content exceptions only affect the extended engine
        return None;
    }

    let effective = rule.effective_content_types();
    if effective.is_empty() {
        return None;
    }

    let mut trigger = Trigger {
        url_filter: rule.regex.clone().unwrap_or_else(|| MATCH_ALL.to_string()),
        url_filter_is_case_sensitive: rule.match_case.then_some(true),
        ..Trigger::default()
    };
    apply_domains(&mut trigger, &rule.header, version);
    if effective != ContentType::ALL {
        trigger.resource_type = Some(resource_types(effective));
        if effective == ContentType::SUBDOCUMENT {
            trigger.load_context = Some(vec!["child-frame".to_string()]);
        }
    }
    trigger.load_type = load_type(rule.party);

    let (group, action) = match (rule.header.is_exception, rule.header.is_important) {
        (false, false) => (Group::Blocking, ActionType::Block),
        (false, true) => (Group::Important, ActionType::Block),
        (true, false) => (Group::Exception, ActionType::IgnorePreviousRules),
        (true, true) => (Group::ImportantException, ActionType::IgnorePreviousRules),
    };
    Some((group, Entry { trigger, action: Action::new(action) }))
}

/// Trigger for a page-level exception: every load on the pattern's host,
/// or the pattern regex when no host can be extracted. A `$domain` list
/// keeps the pattern regex so the exception stays scoped to those sites.
fn page_trigger(rule: &NetworkRule, version: HostVersion) -> Trigger {
    let host = extract_pattern_domain(&rule.pattern);
    let mut trigger = Trigger::default();

    if !host.domain.is_empty() && !host.has_path && rule.header.permitted_domains.is_empty() {
        trigger.url_filter = MATCH_ALL.to_string();
        trigger.if_domain = Some(vec![format!("*{}", host.domain.to_ascii_lowercase())]);
        if version.supports_mixed_domain_scope() {
            trigger.unless_domain = domain_list(&rule.header.restricted_domains);
        }
    } else {
        trigger.url_filter = rule.regex.clone().unwrap_or_else(|| MATCH_ALL.to_string());
        apply_domains(&mut trigger, &rule.header, version);
    }

    trigger.url_filter_is_case_sensitive = rule.match_case.then_some(true);
    trigger
}

fn cosmetic_entry(rule: &CosmeticRule, version: HostVersion) -> Option<(Group, Entry)> {
    if !rule.is_element_hiding() || rule.header.is_exception || rule.is_extended_css {
        return None;
    }

    let mut trigger = Trigger {
        url_filter: rule.path_regex.clone().unwrap_or_else(|| MATCH_ALL.to_string()),
        ..Trigger::default()
    };
    apply_domains(&mut trigger, &rule.header, version);

    let group = if rule.header.permitted_domains.is_empty() {
        Group::GenericHide
    } else {
        Group::DomainHide
    };
    let action = Action {
        kind: ActionType::CssDisplayNone,
        selector: Some(rule.content.clone()),
    };
    Some((group, Entry { trigger, action }))
}

/// `if-domain` / `unless-domain`. Hosts before 16.4 reject a trigger with
/// both, so there the restricted list is dropped when permitted domains exist.
fn apply_domains(trigger: &mut Trigger, header: &RuleHeader, version: HostVersion) {
    trigger.if_domain = domain_list(&header.permitted_domains);
    if trigger.if_domain.is_none() || version.supports_mixed_domain_scope() {
        trigger.unless_domain = domain_list(&header.restricted_domains);
    }
}

fn domain_list(domains: &[String]) -> Option<Vec<String>> {
    if domains.is_empty() {
        return None;
    }
    Some(
        domains
            .iter()
            .map(|domain| format!("*{}", domain.to_ascii_lowercase()))
            .collect(),
    )
}

fn resource_types(types: ContentType) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (flag, name) in RESOURCE_TYPES {
        if types.contains(*flag) && !names.iter().any(|n| n == name) {
            names.push((*name).to_string());
        }
    }
    names
}

fn load_type(party: PartyMask) -> Option<Vec<String>> {
    if party == PartyMask::THIRD_PARTY {
        Some(vec!["third-party".to_string()])
    } else if party == PartyMask::FIRST_PARTY {
        Some(vec!["first-party".to_string()])
    } else {
        None
    }
}

impl Action {
    fn new(kind: ActionType) -> Self {
        Self { kind, selector: None }
    }
}
