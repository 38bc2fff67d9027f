//! Conversion entry point
//!
//! Parses a batch of filter lines, splits the rules into the subset the host
//! executes natively and the extended subset, resolves exceptions on the
//! native subset and assembles the bounded JSON ruleset.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use cb_core::types::{CosmeticKind, NetworkOption};
use cb_core::HostVersion;
use log::{debug, info};
use serde::Serialize;

use crate::builder::{build_json, EMPTY_RESULT_JSON};
use crate::factory::{create_rules, ErrorCounter};
use crate::optimizer::filter_out_exceptions;
use crate::rule::Rule;

/// Exception options that matter to both the host and the extended engine.
const SHARED_EXCEPTION_OPTIONS: NetworkOption = NetworkOption::DOCUMENT
    .union(NetworkOption::ELEMHIDE)
    .union(NetworkOption::GENERICHIDE)
    .union(NetworkOption::SPECIFICHIDE);

/// Cooperative cancellation flag, polled between conversion stages.
#[derive(Debug, Default)]
pub struct CancellationToken(AtomicBool);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvertOptions {
    pub host_version: HostVersion,
    /// Also return the extended rules as text.
    pub advanced_blocking: bool,
    /// Byte cap on the emitted JSON.
    pub max_json_size: Option<usize>,
}

impl ConvertOptions {
    pub fn new(host_version: HostVersion) -> Self {
        Self {
            host_version,
            ..Self::default()
        }
    }

    pub fn with_advanced_blocking(mut self, enabled: bool) -> Self {
        self.advanced_blocking = enabled;
        self
    }

    pub fn with_max_json_size(mut self, max: Option<usize>) -> Self {
        self.max_json_size = max;
        self
    }
}

/// Outcome of one [`convert`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub source_lines_count: usize,
    /// Rules parsed from the input.
    pub source_rules_count: usize,
    /// Parsed rules in the native subset, before exception resolution.
    pub compatible_rules_count: usize,
    pub entries_count: usize,
    /// Rules in the extended subset (0 unless advanced blocking is on).
    pub extended_rules_count: usize,
    pub discarded_count: usize,
    pub errors_count: usize,
    pub json: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_text: Option<String>,
}

impl ConversionResult {
    /// Neutral result: zero counts and the no-op entry.
    pub fn empty() -> Self {
        Self {
            source_lines_count: 0,
            source_rules_count: 0,
            compatible_rules_count: 0,
            entries_count: 0,
            extended_rules_count: 0,
            discarded_count: 0,
            errors_count: 0,
            json: EMPTY_RESULT_JSON.to_string(),
            extended_text: None,
        }
    }
}

impl fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Conversion status")?;
        writeln!(f)?;
        writeln!(f, "* Source lines count: {}", self.source_lines_count)?;
        writeln!(f, "* Source rules count: {}", self.source_rules_count)?;
        writeln!(f, "* Source rules compatible with the host: {}", self.compatible_rules_count)?;
        writeln!(f, "* Failed to convert: {}", self.errors_count)?;
        writeln!(f, "* Discarded due to limits: {}", self.discarded_count)?;
        writeln!(f)?;
        writeln!(f, "## Result")?;
        writeln!(f)?;
        writeln!(f, "* JSON entries count: {}", self.entries_count)?;
        writeln!(f, "* JSON size: {}", self.json.len())?;
        writeln!(f, "* Extended rules count: {}", self.extended_rules_count)?;
        write!(
            f,
            "* Extended rules size: {}",
            self.extended_text.as_ref().map_or(0, String::len)
        )
    }
}

/// Split rules into the native and the extended subset.
///
/// Page-level exceptions go to both; `$jsinject` exceptions, script and
/// style injection and extended selectors go to the extended subset only.
pub fn split_rules(rules: Vec<Rule>) -> (Vec<Rule>, Vec<Rule>) {
    let mut basic = Vec::with_capacity(rules.len());
    let mut extended = Vec::new();

    for rule in rules {
        match &rule {
            Rule::Network(network) if network.header.is_exception => {
                if network.enabled_options.intersects(SHARED_EXCEPTION_OPTIONS) {
                    extended.push(rule.clone());
                    basic.push(rule);
                } else if network.enabled_options.contains(NetworkOption::JSINJECT) {
                    extended.push(rule);
                } else {
                    basic.push(rule);
                }
            }
            Rule::Network(_) => basic.push(rule),
            Rule::Cosmetic(cosmetic) => {
                if cosmetic.kind != CosmeticKind::ElementHiding || cosmetic.is_extended_css {
                    extended.push(rule);
                } else {
                    basic.push(rule);
                }
            }
        }
    }

    (basic, extended)
}

/// Convert filter lines into a host ruleset.
///
/// `counter` collects parse errors across calls (one increment per error);
/// the returned `errors_count` covers this call only. A cancelled call
/// returns [`ConversionResult::empty`].
pub fn convert<S: AsRef<str>>(
    lines: &[S],
    options: &ConvertOptions,
    cancel: Option<&CancellationToken>,
    counter: Option<&ErrorCounter>,
) -> ConversionResult {
    let cancelled = || cancel.is_some_and(CancellationToken::is_cancelled);
    if cancelled() {
        return ConversionResult::empty();
    }

    let version = options.host_version;
    let batch = create_rules(lines, version, counter);
    let source_rules_count = batch.rules.len();

    let (basic, extended) = split_rules(batch.rules);
    let compatible_rules_count = basic.len();

    let (basic, stats) = filter_out_exceptions(basic, version);
    debug!(
        "Exception resolution: {} -> {} rules ({} badfiltered, {} cosmetic removed)",
        stats.before, stats.after, stats.badfiltered_rules, stats.cosmetic_removed
    );

    if cancelled() {
        return ConversionResult::empty();
    }

    let output = build_json(&basic, version, version.rules_limit(), options.max_json_size);

    if cancelled() {
        return ConversionResult::empty();
    }

    let extended_rules_count = if options.advanced_blocking { extended.len() } else { 0 };
    let extended_text = (extended_rules_count > 0).then(|| {
        extended
            .iter()
            .map(Rule::text)
            .collect::<Vec<_>>()
            .join("\n")
    });

    let result = ConversionResult {
        source_lines_count: lines.len(),
        source_rules_count,
        compatible_rules_count,
        entries_count: output.entries_count,
        extended_rules_count,
        discarded_count: output.discarded_count,
        errors_count: batch.errors,
        json: output.json,
        extended_text,
    };

    info!(
        "Converted {} lines: {} entries, {} discarded, {} errors, {} extended",
        result.source_lines_count,
        result.entries_count,
        result.discarded_count,
        result.errors_count,
        result.extended_rules_count
    );
    result
}

/// Exception that disables blocking on `domain`.
pub fn allowlist_rule(domain: &str) -> String {
    format!("@@||{domain}$document")
}

/// Exception that disables blocking everywhere except on `domains`.
pub fn inverted_allowlist_rule<S: AsRef<str>>(domains: &[S]) -> Option<String> {
    let list = domains
        .iter()
        .map(AsRef::as_ref)
        .filter(|domain| !domain.is_empty())
        .collect::<Vec<_>>()
        .join("|~");
    if list.is_empty() {
        None
    } else {
        Some(format!("@@||*$document,domain=~{list}"))
    }
}
