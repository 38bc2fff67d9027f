use cb_core::HostVersion;
use log::warn;

use crate::entry::{entry_for, Entry, Group};
use crate::rule::Rule;

/// Emitted when nothing survives: the host rejects an empty ruleset.
pub const EMPTY_RESULT_JSON: &str = r#"[{"trigger":{"url-filter":".*","if-domain":["domain.com"]},"action":{"type":"ignore-previous-rules"}}]"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub json: String,
    /// Entries written to `json` (0 for the neutral entry).
    pub entries_count: usize,
    /// Eligible entries dropped by the count or size cap.
    pub discarded_count: usize,
}

/// Map rules to entries, order them by group and serialize the longest
/// prefix that fits `max_entries` and `max_json_size`.
pub fn build_json(
    rules: &[Rule],
    version: HostVersion,
    max_entries: usize,
    max_json_size: Option<usize>,
) -> BuildOutput {
    let mut entries: Vec<(Group, Entry)> = rules
        .iter()
        .filter_map(|rule| entry_for(rule, version))
        .collect();
    // stable: original order within a group
    entries.sort_by_key(|(group, _)| *group);

    let total = entries.len();
    let mut json = String::from("[");
    let mut kept = 0usize;

    for (_, entry) in &entries {
        if kept >= max_entries {
            break;
        }
        let serialized = match serde_json::to_string(entry) {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!("Failed to serialize entry: {err}");
                break;
            }
        };

        let separator = usize::from(kept > 0);
        let size = json.len() + separator + serialized.len() + 1;
        if max_json_size.is_some_and(|max| size > max) {
            break;
        }

        if kept > 0 {
            json.push(',');
        }
        json.push_str(&serialized);
        kept += 1;
    }

    let discarded_count = total - kept;
    if discarded_count > 0 {
        warn!("Discarded {discarded_count} of {total} entries due to limits");
    }

    if kept == 0 {
        return BuildOutput {
            json: EMPTY_RESULT_JSON.to_string(),
            entries_count: 0,
            discarded_count,
        };
    }

    json.push(']');
    BuildOutput {
        json,
        entries_count: kept,
        discarded_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::create_rules;

    fn rules(lines: &[&str]) -> Vec<Rule> {
        create_rules(lines, HostVersion::V16_4, None).rules
    }

    #[test]
    fn empty_input_gives_neutral_entry() {
        let output = build_json(&[], HostVersion::V16_4, 100, None);
        assert_eq!(output.json, EMPTY_RESULT_JSON);
        assert_eq!(output.entries_count, 0);
        assert_eq!(output.discarded_count, 0);

        let parsed: serde_json::Value = serde_json::from_str(EMPTY_RESULT_JSON).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn orders_by_group() {
        let input = rules(&[
            "@@||good.example^$document",
            "@@||ads.example^$image",
            "||ads.example^",
            "example.com##.ad",
            "##.banner",
        ]);
        let output = build_json(&input, HostVersion::V16_4, 100, None);
        let parsed: Vec<Entry> = serde_json::from_str(&output.json).unwrap();

        let summary: Vec<&str> = parsed
            .iter()
            .map(|e| e.action.selector.as_deref().unwrap_or(e.trigger.url_filter.as_str()))
            .collect();
        assert_eq!(summary[0], ".banner");
        assert_eq!(summary[1], ".ad");
        assert_eq!(parsed[2].action.kind, crate::entry::ActionType::Block);
        assert_eq!(parsed[3].action.kind, crate::entry::ActionType::IgnorePreviousRules);
        assert_eq!(parsed[4].trigger.if_domain, Some(vec!["*good.example".to_string()]));
        assert_eq!(output.entries_count, 5);
    }

    #[test]
    fn count_cap_truncates_prefix() {
        let input = rules(&["||a.example^", "||b.example^", "||c.example^"]);
        let output = build_json(&input, HostVersion::V16_4, 2, None);
        assert_eq!(output.entries_count, 2);
        assert_eq!(output.discarded_count, 1);
        assert!(output.json.contains("a\\\\.example"));
        assert!(!output.json.contains("c\\\\.example"));
    }

    #[test]
    fn size_cap_truncates_prefix() {
        let input = rules(&["||a.example^", "||b.example^", "||c.example^"]);
        let full = build_json(&input, HostVersion::V16_4, 100, None);
        let limit = full.json.len() - 1;

        let output = build_json(&input, HostVersion::V16_4, 100, Some(limit));
        assert_eq!(output.entries_count, 2);
        assert_eq!(output.discarded_count, 1);
        assert!(output.json.len() <= limit);
        assert!(serde_json::from_str::<Vec<Entry>>(&output.json).is_ok());
    }

    #[test]
    fn fully_discarded_gives_neutral_entry() {
        let input = rules(&["||a.example^"]);
        let output = build_json(&input, HostVersion::V16_4, 100, Some(10));
        assert_eq!(output.json, EMPTY_RESULT_JSON);
        assert_eq!(output.entries_count, 0);
        assert_eq!(output.discarded_count, 1);
    }
}
