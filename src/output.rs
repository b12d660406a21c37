use eyre::Result;

use crate::VideoRecord;

/// Render a record as readable text: metadata header, summary, topics.
pub fn render_text(record: &VideoRecord) -> String {
    let mut out = String::new();
    let meta = &record.metadata;

    out.push_str(&format!("Title:       {}\n", meta.title));
    out.push_str(&format!("Channel:     {}\n", meta.channel));
    out.push_str(&format!("Published:   {}\n", meta.publish_date));
    out.push_str(&format!("Views:       {}\n", meta.views));
    out.push_str(&format!("Duration:    {}\n", meta.duration));
    out.push_str(&format!("Subscribers: {}\n", meta.subscribers));
    out.push_str(&format!("Videos:      {}\n", meta.channel_videos));
    out.push_str(&format!(
        "Transcript:  {} words ({})\n",
        record.words_count, record.transcript_source
    ));
    if !record.tags.is_empty() {
        out.push_str(&format!("Tags:        {}\n", record.tags.join(", ")));
    }

    out.push('\n');
    out.push_str(&record.summary.markdown);
    if !out.ends_with('\n') {
        out.push('\n');
    }

    if !record.summary.topics.is_empty() {
        out.push_str("\nTopics:\n");
        for (topic, timestamp) in &record.summary.topics {
            out.push_str(&format!("- {topic} [{timestamp}]\n"));
        }
    }

    out
}

/// Render a record as pretty-printed JSON
pub fn render_json(record: &VideoRecord) -> Result<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SummaryResult, SummaryTier, TranscriptSource, VideoMetadata};
    use std::collections::BTreeMap;

    fn sample_record() -> VideoRecord {
        let mut topics = BTreeMap::new();
        let mut timestamps = BTreeMap::new();
        topics.insert("Intro".to_string(), "00:00".to_string());
        timestamps.insert("00:00".to_string(), "Intro".to_string());
        VideoRecord {
            video_id: "test1234567".to_string(),
            metadata: VideoMetadata {
                title: "Test Video".to_string(),
                channel: "Test Channel".to_string(),
                publish_date: "25/10/2009".to_string(),
                views: "1,234".to_string(),
                duration: "00:03:32".to_string(),
                subscribers: "unknown".to_string(),
                channel_videos: "unknown".to_string(),
            },
            transcript: "hello world".to_string(),
            transcript_source: TranscriptSource::Caption,
            words_count: 2,
            summary: SummaryResult {
                markdown: "## Overview\nA test.".to_string(),
                topics,
                timestamps,
                model: "gpt-4o-mini".to_string(),
            },
            tier: SummaryTier::Short,
            tags: vec!["test".to_string()],
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_render_text() {
        let output = render_text(&sample_record());
        assert!(output.contains("Title:       Test Video"));
        assert!(output.contains("Channel:     Test Channel"));
        assert!(output.contains("2 words (caption)"));
        assert!(output.contains("Tags:        test"));
        assert!(output.contains("## Overview"));
        assert!(output.contains("- Intro [00:00]"));
    }

    #[test]
    fn test_render_text_no_topics() {
        let mut record = sample_record();
        record.summary.topics.clear();
        let output = render_text(&record);
        assert!(!output.contains("Topics:"));
    }

    #[test]
    fn test_render_json_round_trips() {
        let record = sample_record();
        let json = render_json(&record).unwrap();
        let parsed: VideoRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.video_id, record.video_id);
        assert_eq!(parsed.summary.topics, record.summary.topics);
    }
}
