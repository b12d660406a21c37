use std::collections::BTreeMap;

use log::debug;
use regex::Regex;

use crate::SummaryTier;

/// Section heading the topic scan anchors on. Tied to the prompt wording
/// in `summarize`; if the templates change, parsing degrades to empty maps
/// rather than failing.
pub fn section_marker(tier: SummaryTier) -> &'static str {
    match tier {
        SummaryTier::Short => "Main Key Points",
        SummaryTier::Medium | SummaryTier::Long => "Main Topics",
    }
}

/// Extract the topic→timestamp and timestamp→topic maps from a summary.
///
/// Scans bullet lines under the tier's section marker for a trailing
/// bracketed token: `- Point text [12:34]` yields `("Point text", "12:34")`.
/// Bullets without a token are skipped. A missing section yields two empty
/// maps — the LLM's formatting is not contractually guaranteed, so this
/// never errors. The two maps are exact inverses by construction.
pub fn extract_topics_and_timestamps(
    markdown: &str,
    tier: SummaryTier,
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let marker = section_marker(tier);
    let bullet_re = Regex::new(r"^[-*]\s+(.*?)\s*\[([^\[\]]+)\]$").unwrap();

    let mut topics = BTreeMap::new();
    let mut timestamps = BTreeMap::new();
    let mut in_section = false;

    for line in markdown.lines() {
        let trimmed = line.trim();

        if !in_section {
            if trimmed.contains(marker) {
                in_section = true;
            }
            continue;
        }

        // next heading ends the section
        if trimmed.starts_with('#') {
            break;
        }

        if let Some(caps) = bullet_re.captures(trimmed) {
            let label = caps[1].trim().to_string();
            let timestamp = caps[2].trim().to_string();
            // first occurrence wins; dropping duplicates keeps the maps
            // exact inverses of each other
            if !label.is_empty()
                && !timestamp.is_empty()
                && !topics.contains_key(&label)
                && !timestamps.contains_key(&timestamp)
            {
                topics.insert(label.clone(), timestamp.clone());
                timestamps.insert(timestamp, label);
            }
        }
    }

    if topics.is_empty() {
        debug!("no {marker:?} bullets found in summary");
    }

    (topics, timestamps)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT_SUMMARY: &str = r#"## Overview
A video about things.

## Main Key Points
- **Point A** [01:23]
- Second point without a timestamp
- Third point [12:34]
* Starred point [45:01]
"#;

    #[test]
    fn test_extract_short_tier() {
        let (topics, timestamps) = extract_topics_and_timestamps(SHORT_SUMMARY, SummaryTier::Short);
        assert_eq!(topics.len(), 3);
        assert_eq!(topics.get("**Point A**").map(String::as_str), Some("01:23"));
        assert_eq!(topics.get("Third point").map(String::as_str), Some("12:34"));
        assert_eq!(topics.get("Starred point").map(String::as_str), Some("45:01"));
        // the bullet without a bracket is skipped, not an error
        assert!(!topics.contains_key("Second point without a timestamp"));
    }

    #[test]
    fn test_maps_are_exact_inverses() {
        let (topics, timestamps) = extract_topics_and_timestamps(SHORT_SUMMARY, SummaryTier::Short);
        assert_eq!(topics.len(), timestamps.len());
        for (topic, ts) in &topics {
            assert_eq!(timestamps.get(ts), Some(topic));
        }
    }

    #[test]
    fn test_medium_tier_uses_main_topics_marker() {
        let summary = r#"## Overview
Stuff.

## Main Topics
- Intro [00:00]
- Deep dive [05:42]

## Notable Quotes
- "quoted" [07:00]
"#;
        let (topics, timestamps) = extract_topics_and_timestamps(summary, SummaryTier::Medium);
        assert_eq!(topics.len(), 2);
        assert_eq!(topics.get("Intro").map(String::as_str), Some("00:00"));
        assert_eq!(topics.get("Deep dive").map(String::as_str), Some("05:42"));
        // the quotes section is past the next heading and never scanned
        assert!(timestamps.get("07:00").is_none());
    }

    #[test]
    fn test_missing_marker_yields_empty_maps() {
        let summary = "## Something Else\n- Point [01:00]\n";
        let (topics, timestamps) = extract_topics_and_timestamps(summary, SummaryTier::Short);
        assert!(topics.is_empty());
        assert!(timestamps.is_empty());
    }

    #[test]
    fn test_wrong_tier_marker_yields_empty_maps() {
        // a short-tier summary parsed as medium looks for "Main Topics"
        let (topics, _) = extract_topics_and_timestamps(SHORT_SUMMARY, SummaryTier::Medium);
        assert!(topics.is_empty());
    }

    #[test]
    fn test_duplicate_labels_keep_first_pair() {
        let summary = r#"## Main Key Points
- Point [01:00]
- Point [02:00]
- Other [01:00]
"#;
        let (topics, timestamps) = extract_topics_and_timestamps(summary, SummaryTier::Short);
        assert_eq!(topics.len(), 1);
        assert_eq!(topics.get("Point").map(String::as_str), Some("01:00"));
        assert_eq!(timestamps.get("01:00").map(String::as_str), Some("Point"));
    }

    #[test]
    fn test_empty_summary() {
        let (topics, timestamps) = extract_topics_and_timestamps("", SummaryTier::Long);
        assert!(topics.is_empty());
        assert!(timestamps.is_empty());
    }
}
