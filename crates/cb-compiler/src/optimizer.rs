use std::collections::HashMap;

use cb_core::domain::is_domain_or_subdomain;
use cb_core::HostVersion;
use log::debug;

use crate::cosmetic::CosmeticRule;
use crate::network::NetworkRule;
use crate::rule::Rule;

pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub badfilter_rules: usize,
    pub badfiltered_rules: usize,
    pub cosmetic_exceptions: usize,
    pub cosmetic_removed: usize,
}

/// Resolve `$badfilter` rules and fold cosmetic exceptions into the rules
/// they target.
///
/// Badfilter rules and cosmetic exception rules are consumed: neither
/// appears in the output. Network rules come first, then cosmetic rules,
/// each in input order.
pub fn filter_out_exceptions(rules: Vec<Rule>, version: HostVersion) -> (Vec<Rule>, OptimizeStats) {
    let before = rules.len();
    let mut network: Vec<NetworkRule> = Vec::new();
    let mut cosmetic: Vec<CosmeticRule> = Vec::new();
    let mut badfilters: HashMap<String, Vec<NetworkRule>> = HashMap::new();
    let mut exceptions: HashMap<String, Vec<CosmeticRule>> = HashMap::new();

    for rule in rules {
        match rule {
            Rule::Network(rule) if rule.badfilter => {
                badfilters.entry(rule.pattern.clone()).or_default().push(rule);
            }
            Rule::Network(rule) => network.push(rule),
            Rule::Cosmetic(rule) if rule.header.is_exception => {
                exceptions.entry(rule.content.clone()).or_default().push(rule);
            }
            Rule::Cosmetic(rule) => cosmetic.push(rule),
        }
    }

    let badfilter_rules = badfilters.values().map(Vec::len).sum();
    let cosmetic_exceptions = exceptions.values().map(Vec::len).sum();

    let mut badfiltered_rules = 0usize;
    let mut output: Vec<Rule> = Vec::with_capacity(network.len() + cosmetic.len());

    for rule in network {
        let negated = badfilters
            .get(&rule.pattern)
            .is_some_and(|kills| kills.iter().any(|kill| kill.negates(&rule)));
        if negated {
            debug!("Rule {:?} disabled by $badfilter", rule.header.text);
            badfiltered_rules += 1;
        } else {
            output.push(Rule::Network(rule));
        }
    }

    let mut cosmetic_removed = 0usize;
    for rule in cosmetic {
        let folded = match exceptions.get(&rule.content) {
            Some(exceptions) => apply_cosmetic_exceptions(rule, exceptions, version),
            None => Some(rule),
        };
        match folded {
            Some(rule) => output.push(Rule::Cosmetic(rule)),
            None => cosmetic_removed += 1,
        }
    }

    let stats = OptimizeStats {
        before,
        after: output.len(),
        badfilter_rules,
        badfiltered_rules,
        cosmetic_exceptions,
        cosmetic_removed,
    };
    (output, stats)
}

/// Narrow a cosmetic rule's domain scope by its exceptions. `None` when the
/// rule no longer applies anywhere.
fn apply_cosmetic_exceptions(
    mut rule: CosmeticRule,
    exceptions: &[CosmeticRule],
    version: HostVersion,
) -> Option<CosmeticRule> {
    for exception in exceptions {
        if exception.header.permitted_domains.is_empty() {
            debug!("Rule {:?} disabled by generic exception", rule.header.text);
            return None;
        }

        for excluded in &exception.header.permitted_domains {
            let header = &mut rule.header;
            if header.permitted_domains.is_empty() {
                if !header.restricted_domains.contains(excluded) {
                    header.restricted_domains.push(excluded.clone());
                }
                continue;
            }

            header
                .permitted_domains
                .retain(|permitted| !is_domain_or_subdomain(permitted, excluded));
            if header.permitted_domains.is_empty() {
                debug!("Rule {:?} disabled by {:?}", header.text, exception.header.text);
                return None;
            }

            if version.supports_mixed_domain_scope()
                && !header.restricted_domains.contains(excluded)
                && header
                    .permitted_domains
                    .iter()
                    .any(|permitted| is_domain_or_subdomain(excluded, permitted))
            {
                header.restricted_domains.push(excluded.clone());
            }
        }
    }

    Some(rule)
}
