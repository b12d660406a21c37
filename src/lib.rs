pub mod captions;
pub mod config;
pub mod error;
pub mod llm;
pub mod metadata;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod repo;
pub mod summarize;
pub mod whisper;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel for channel-level stats the platform would not serve.
pub const UNKNOWN: &str = "unknown";

/// A single captioned segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// Source of the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptSource {
    Caption,
    Whisper,
}

impl std::fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptSource::Caption => write!(f, "caption"),
            TranscriptSource::Whisper => write!(f, "whisper"),
        }
    }
}

/// Complete transcript for a video, whichever path produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: String,
    pub language: String,
    pub source: TranscriptSource,
    pub segments: Vec<Segment>,
}

impl Transcript {
    /// Flatten all segment text into one whitespace-joined string
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Summary verbosity level, selecting the prompt template and the
/// section structure the parser expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum SummaryTier {
    Short,
    Medium,
    Long,
}

impl std::fmt::Display for SummaryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryTier::Short => write!(f, "short"),
            SummaryTier::Medium => write!(f, "medium"),
            SummaryTier::Long => write!(f, "long"),
        }
    }
}

/// Descriptive metadata for a video and its channel.
///
/// Dates, view counts and durations are stored pre-formatted, the way the
/// extractor shapes them (`DD/MM/YYYY`, `1,234,567`, `HH:MM:SS`). The two
/// channel-level fields fall back to [`UNKNOWN`] when the platform refuses
/// to serve them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub channel: String,
    pub publish_date: String,
    pub views: String,
    pub duration: String,
    pub subscribers: String,
    pub channel_videos: String,
}

/// Structured summary: the Markdown text plus the topic/timestamp maps
/// derived from it. `topics` and `timestamps` are exact inverses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResult {
    pub markdown: String,
    pub topics: BTreeMap<String, String>,
    pub timestamps: BTreeMap<String, String>,
    pub model: String,
}

/// The persisted unit: one record per video id, written only after the
/// pipeline ran to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub metadata: VideoMetadata,
    pub transcript: String,
    pub transcript_source: TranscriptSource,
    pub words_count: usize,
    pub summary: SummaryResult,
    pub tier: SummaryTier,
    pub tags: Vec<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    // Bare 11-character video ID
    if regex::Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap().is_match(input) {
        return Some(input.to_string());
    }

    // youtube.com/watch?v=ID
    if let Some(caps) = regex::Regex::new(r"(?:youtube\.com/watch\?.*v=)([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    // youtu.be/ID
    if let Some(caps) = regex::Regex::new(r"youtu\.be/([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    // youtube.com/embed/ID
    if let Some(caps) = regex::Regex::new(r"youtube\.com/embed/([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    // youtube.com/shorts/ID
    if let Some(caps) = regex::Regex::new(r"youtube\.com/shorts/([a-zA-Z0-9_-]{11})")
        .unwrap()
        .captures(input)
    {
        return Some(caps[1].to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_video_id() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_watch_url_with_extra_params() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=120"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_short_url() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_embed_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_shorts_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_all_forms_resolve_identically() {
        let forms = [
            "dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
        ];
        for form in forms {
            assert_eq!(extract_video_id(form), Some("dQw4w9WgXcQ".to_string()));
        }
    }

    #[test]
    fn test_invalid_url() {
        assert_eq!(extract_video_id("not-a-valid-id"), None);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn test_whitespace_trimming() {
        assert_eq!(extract_video_id("  dQw4w9WgXcQ  "), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_transcript_text_joins_with_spaces() {
        let t = Transcript {
            video_id: "abc12345678".to_string(),
            language: "en".to_string(),
            source: TranscriptSource::Caption,
            segments: vec![
                Segment {
                    text: "Hello".to_string(),
                    start: 0.0,
                    duration: 2.0,
                },
                Segment {
                    text: "world".to_string(),
                    start: 2.0,
                    duration: 2.0,
                },
            ],
        };
        assert_eq!(t.text(), "Hello world");
    }
}
