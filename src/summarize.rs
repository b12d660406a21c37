use log::debug;

use crate::SummaryTier;
use crate::error::PipelineError;
use crate::llm::LlmClient;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes video transcripts. \
Follow the requested section structure exactly and keep bullet points clear and concise. \
Every bullet point must end with its timestamp in square brackets, e.g. [12:34].";

/// Short tier: overview and key points only.
const SHORT_TEMPLATE: &str = r#"Given the subtitles of a Youtube video, write a short summary extracting the main key information. Structure the answer with exactly these Markdown sections:

## Overview
Two or three sentences describing what the video covers.

## Main Key Points
Clean and concise bullet points highlighting the main ideas, each ending with its timestamp in square brackets.

Write the summary in {lang}.
# Video titled "{title}" from the channel "{channel}"

# The subtitles: {subtitles}

# Answer: "#;

/// Medium tier: adds topics, quotes and technical details.
const MEDIUM_TEMPLATE: &str = r#"Given the subtitles of a Youtube video, write a moderate-length summary of its content. Structure the answer with exactly these Markdown sections:

## Overview
A short paragraph describing what the video covers.

## Main Topics
Bullet points for the topics discussed, each ending with the timestamp where the topic starts, in square brackets.

## Notable Quotes
The most memorable direct quotes from the video.

## Technical Details
Any technical terms, figures or references worth keeping.

Write the summary in {lang}.
# Video titled "{title}" from the channel "{channel}"

# The subtitles: {subtitles}

# Answer: "#;

/// Long tier: medium plus analysis and context.
const LONG_TEMPLATE: &str = r#"Given the subtitles of a Youtube video, write a detailed summary of its content. Structure the answer with exactly these Markdown sections:

## Overview
A paragraph describing what the video covers.

## Main Topics
Bullet points for the topics discussed, each ending with the timestamp where the topic starts, in square brackets.

## Notable Quotes
The most memorable direct quotes from the video.

## Technical Details
Any technical terms, figures or references worth keeping.

## Analysis & Insights
What the video argues, how well it supports its points, and what a viewer should take away.

## Additional Context
Background a viewer may need to fully understand the video.

Write the summary in {lang}.
# Video titled "{title}" from the channel "{channel}"

# The subtitles: {subtitles}

# Answer: "#;

fn template(tier: SummaryTier) -> &'static str {
    match tier {
        SummaryTier::Short => SHORT_TEMPLATE,
        SummaryTier::Medium => MEDIUM_TEMPLATE,
        SummaryTier::Long => LONG_TEMPLATE,
    }
}

#[derive(Debug)]
pub struct SummaryRequest<'a> {
    pub transcript: &'a str,
    pub title: &'a str,
    pub channel: &'a str,
    pub language: &'a str,
    pub tier: SummaryTier,
}

/// Drives the LLM through one of the three tier templates. Holds the
/// client it was constructed with; no process-wide state.
pub struct Summarizer {
    client: LlmClient,
}

impl Summarizer {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Blocking summarization: returns the complete Markdown text.
    pub async fn summarize(&self, req: &SummaryRequest<'_>) -> Result<String, PipelineError> {
        debug!("Summarizing \"{}\" at tier {}", req.title, req.tier);
        self.client.complete(SYSTEM_PROMPT, &build_prompt(req)).await
    }

    /// Incremental summarization: fragments are handed to `on_chunk` in
    /// emission order; the returned string is their exact concatenation.
    pub async fn summarize_streaming(
        &self,
        req: &SummaryRequest<'_>,
        on_chunk: impl FnMut(&str),
    ) -> Result<String, PipelineError> {
        debug!("Streaming summary of \"{}\" at tier {}", req.title, req.tier);
        self.client.stream(SYSTEM_PROMPT, &build_prompt(req), on_chunk).await
    }
}

fn build_prompt(req: &SummaryRequest<'_>) -> String {
    template(req.tier)
        .replace("{lang}", req.language)
        .replace("{title}", req.title)
        .replace("{channel}", req.channel)
        .replace("{subtitles}", req.transcript)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tier: SummaryTier) -> SummaryRequest<'static> {
        SummaryRequest {
            transcript: "hello world",
            title: "Test Video",
            channel: "Test Channel",
            language: "english",
            tier,
        }
    }

    #[test]
    fn test_short_template_pins_key_points_section() {
        let prompt = build_prompt(&request(SummaryTier::Short));
        assert!(prompt.contains("## Main Key Points"));
        assert!(!prompt.contains("## Main Topics"));
    }

    #[test]
    fn test_medium_template_pins_topics_quotes_details() {
        let prompt = build_prompt(&request(SummaryTier::Medium));
        assert!(prompt.contains("## Main Topics"));
        assert!(prompt.contains("## Notable Quotes"));
        assert!(prompt.contains("## Technical Details"));
        assert!(!prompt.contains("## Analysis & Insights"));
    }

    #[test]
    fn test_long_template_adds_analysis_and_context() {
        let prompt = build_prompt(&request(SummaryTier::Long));
        assert!(prompt.contains("## Main Topics"));
        assert!(prompt.contains("## Analysis & Insights"));
        assert!(prompt.contains("## Additional Context"));
    }

    #[test]
    fn test_build_prompt_substitutes_all_placeholders() {
        let prompt = build_prompt(&request(SummaryTier::Short));
        assert!(prompt.contains("Test Video"));
        assert!(prompt.contains("Test Channel"));
        assert!(prompt.contains("hello world"));
        assert!(prompt.contains("Write the summary in english."));
        assert!(!prompt.contains("{title}"));
        assert!(!prompt.contains("{subtitles}"));
    }
}
