use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};
use tokio::sync::mpsc;

use crate::captions::{self, CaptionOutcome};
use crate::config::Config;
use crate::error::{PipelineError, Stage};
use crate::llm::LlmClient;
use crate::metadata;
use crate::parser;
use crate::repo::VideoRepo;
use crate::summarize::{Summarizer, SummaryRequest};
use crate::whisper;
use crate::{SummaryResult, SummaryTier, VideoMetadata, VideoRecord, extract_video_id};

#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub url: String,
    pub language: String,
    pub tier: SummaryTier,
    pub tags: Vec<String>,
    /// Skip caption extraction, go straight to audio transcription.
    pub whisper_only: bool,
    /// Fail instead of transcribing audio when no captions exist.
    pub no_fallback: bool,
}

impl ProcessRequest {
    pub fn new(url: impl Into<String>, language: impl Into<String>, tier: SummaryTier, tags: Vec<String>) -> Self {
        Self {
            url: url.into(),
            language: language.into(),
            tier,
            tags,
            whisper_only: false,
            no_fallback: false,
        }
    }
}

#[derive(Debug)]
pub struct ProcessOutcome {
    pub record: VideoRecord,
    /// True when the run short-circuited on an existing record.
    pub cached: bool,
}

/// Events emitted by the streaming execution mode, in order. `Chunk`
/// fragments concatenated in emission order equal the markdown of the
/// final `Summary` event. Channel closure signals completion.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Status { stage: Stage, message: String },
    Metadata { metadata: VideoMetadata, transcript: String },
    Chunk { text: String },
    Summary(SummaryResult),
    Error { stage: Stage, message: String },
}

/// Sequences the extraction, summarization and persistence stages over
/// one video. Owns nothing durable: all committed state lives behind the
/// repository seam.
#[derive(Clone)]
pub struct Pipeline {
    http: reqwest::Client,
    config: Config,
    repo: Arc<dyn VideoRepo>,
}

impl Pipeline {
    pub fn new(config: Config, repo: Arc<dyn VideoRepo>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            repo,
        }
    }

    pub fn repo(&self) -> &Arc<dyn VideoRepo> {
        &self.repo
    }

    /// Blocking execution: returns the complete record or the stage-tagged
    /// failure. Re-submitting a processed URL returns the stored record
    /// without touching the network.
    pub async fn process(&self, req: &ProcessRequest) -> Result<ProcessOutcome, PipelineError> {
        self.run(req, None).await
    }

    /// Incremental execution: spawns a worker and returns its event
    /// stream. The receiver sees statuses, the metadata/transcript pair,
    /// summary fragments, then the final summary (or an error); the
    /// channel closing is the completion signal. The record is persisted
    /// before the final summary event is emitted.
    pub fn process_streaming(&self, req: ProcessRequest) -> mpsc::UnboundedReceiver<ProcessEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = self.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.run(&req, Some(tx.clone())).await {
                let _ = tx.send(ProcessEvent::Error {
                    stage: e.stage(),
                    message: e.to_string(),
                });
            }
        });
        rx
    }

    async fn run(
        &self,
        req: &ProcessRequest,
        events: Option<mpsc::UnboundedSender<ProcessEvent>>,
    ) -> Result<ProcessOutcome, PipelineError> {
        let emit = |event: ProcessEvent| {
            if let Some(tx) = &events {
                let _ = tx.send(event);
            }
        };
        let status = |stage: Stage, message: &str| ProcessEvent::Status {
            stage,
            message: message.to_string(),
        };

        emit(status(Stage::Resolving, "resolving video id"));
        let video_id = extract_video_id(&req.url).ok_or_else(|| PipelineError::InvalidInput {
            input: req.url.clone(),
        })?;

        emit(status(Stage::CacheCheck, "checking for an existing record"));
        if let Some(record) = self.repo.lookup(&video_id)? {
            info!("cache hit for {video_id}");
            emit(ProcessEvent::Metadata {
                metadata: record.metadata.clone(),
                transcript: record.transcript.clone(),
            });
            emit(ProcessEvent::Summary(record.summary.clone()));
            return Ok(ProcessOutcome { record, cached: true });
        }

        emit(status(Stage::ExtractingMetadata, "fetching video metadata"));
        let meta = metadata::fetch_metadata(&self.http, &video_id).await?;
        info!("processing {video_id}: \"{}\" by {}", meta.title, meta.channel);

        let whisper_lang = self
            .config
            .languages
            .first()
            .map(String::as_str)
            .unwrap_or("en")
            .to_string();

        let transcript = if req.whisper_only {
            emit(status(Stage::TranscribingAudio, "transcribing audio"));
            whisper::transcribe(&self.http, &video_id, &whisper_lang, &self.config.whisper).await?
        } else {
            emit(status(Stage::ExtractingCaptions, "looking for caption tracks"));
            match captions::fetch_captions(&self.http, &video_id, &self.config.languages).await {
                CaptionOutcome::Found(t) => {
                    info!("{video_id}: captions found ({} cues, {})", t.segments.len(), t.language);
                    t
                }
                CaptionOutcome::NoCaptions => {
                    if req.no_fallback {
                        return Err(PipelineError::TranscriptionFailed {
                            reason: "no caption tracks found and the audio fallback is disabled".to_string(),
                        });
                    }
                    info!("{video_id}: no captions, falling back to audio transcription");
                    emit(status(Stage::TranscribingAudio, "no captions, transcribing audio"));
                    whisper::transcribe(&self.http, &video_id, &whisper_lang, &self.config.whisper).await?
                }
            }
        };

        let source = transcript.source;
        let text = transcript.text();
        if text.is_empty() {
            return Err(PipelineError::TranscriptionFailed {
                reason: "transcript came back empty".to_string(),
            });
        }
        let words_count = text.split_whitespace().count();
        info!("{video_id}: transcript has {words_count} words ({source})");

        emit(ProcessEvent::Metadata {
            metadata: meta.clone(),
            transcript: text.clone(),
        });

        emit(status(Stage::Summarizing, "generating summary"));
        let llm = LlmClient::from_config(self.http.clone(), &self.config.llm)?;
        let summarizer = Summarizer::new(llm);
        let summary_req = SummaryRequest {
            transcript: &text,
            title: &meta.title,
            channel: &meta.channel,
            language: &req.language,
            tier: req.tier,
        };

        let markdown = if events.is_some() && self.config.llm.streaming {
            summarizer
                .summarize_streaming(&summary_req, |fragment| {
                    emit(ProcessEvent::Chunk {
                        text: fragment.to_string(),
                    });
                })
                .await?
        } else {
            summarizer.summarize(&summary_req).await?
        };

        emit(status(Stage::Parsing, "extracting topics and timestamps"));
        let (topics, timestamps) = parser::extract_topics_and_timestamps(&markdown, req.tier);
        if topics.is_empty() {
            warn!("{video_id}: summary yielded no topic/timestamp pairs");
        }
        let summary = SummaryResult {
            markdown,
            topics,
            timestamps,
            model: summarizer.model().to_string(),
        };

        emit(status(Stage::Persisting, "saving record"));
        let now = now_secs();
        let record = VideoRecord {
            video_id: video_id.clone(),
            metadata: meta,
            transcript: text,
            transcript_source: source,
            words_count,
            summary,
            tier: req.tier,
            tags: req.tags.clone(),
            created_at: now,
            updated_at: now,
        };
        self.repo.save(&record)?;
        info!("{video_id}: record saved");

        emit(ProcessEvent::Summary(record.summary.clone()));
        Ok(ProcessOutcome { record, cached: false })
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TranscriptSource;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    /// In-memory repository double, enough to drive the orchestrator.
    struct MemRepo {
        records: Mutex<HashMap<String, VideoRecord>>,
    }

    impl MemRepo {
        fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
            }
        }
    }

    impl VideoRepo for MemRepo {
        fn lookup(&self, video_id: &str) -> Result<Option<VideoRecord>, PipelineError> {
            Ok(self.records.lock().unwrap().get(video_id).cloned())
        }

        fn save(&self, record: &VideoRecord) -> Result<(), PipelineError> {
            let mut records = self.records.lock().unwrap();
            if records.contains_key(&record.video_id) {
                return Err(PipelineError::Conflict {
                    video_id: record.video_id.clone(),
                });
            }
            records.insert(record.video_id.clone(), record.clone());
            Ok(())
        }

        fn delete(&self, video_id: &str) -> Result<bool, PipelineError> {
            Ok(self.records.lock().unwrap().remove(video_id).is_some())
        }

        fn list(&self) -> Result<Vec<VideoRecord>, PipelineError> {
            Ok(self.records.lock().unwrap().values().cloned().collect())
        }
    }

    fn cached_record(video_id: &str) -> VideoRecord {
        let mut topics = BTreeMap::new();
        let mut timestamps = BTreeMap::new();
        topics.insert("Intro".to_string(), "00:00".to_string());
        timestamps.insert("00:00".to_string(), "Intro".to_string());
        VideoRecord {
            video_id: video_id.to_string(),
            metadata: VideoMetadata {
                title: "Cached Video".to_string(),
                channel: "Cached Channel".to_string(),
                publish_date: "01/01/2024".to_string(),
                views: "1,000".to_string(),
                duration: "00:10:00".to_string(),
                subscribers: "unknown".to_string(),
                channel_videos: "unknown".to_string(),
            },
            transcript: "cached transcript".to_string(),
            transcript_source: TranscriptSource::Caption,
            words_count: 2,
            summary: SummaryResult {
                markdown: "## Overview\ncached".to_string(),
                topics,
                timestamps,
                model: "gpt-4o-mini".to_string(),
            },
            tier: SummaryTier::Short,
            tags: vec![],
            created_at: 100,
            updated_at: 100,
        }
    }

    fn pipeline_with(repo: MemRepo) -> Pipeline {
        Pipeline::new(Config::default(), Arc::new(repo))
    }

    #[tokio::test]
    async fn test_invalid_url_fails_at_resolving() {
        let pipeline = pipeline_with(MemRepo::new());
        let req = ProcessRequest::new("not a video", "english", SummaryTier::Short, vec![]);

        let err = pipeline.process(&req).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Resolving);
        assert!(matches!(err, PipelineError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits() {
        let repo = MemRepo::new();
        repo.save(&cached_record("dQw4w9WgXcQ")).unwrap();
        let pipeline = pipeline_with(repo);

        // no network, no LLM credential: a cache hit must not need either
        let req = ProcessRequest::new(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "english",
            SummaryTier::Short,
            vec![],
        );
        let outcome = pipeline.process(&req).await.unwrap();
        assert!(outcome.cached);
        assert_eq!(outcome.record.metadata.title, "Cached Video");
    }

    #[tokio::test]
    async fn test_streaming_cache_hit_emits_metadata_and_summary() {
        let repo = MemRepo::new();
        repo.save(&cached_record("dQw4w9WgXcQ")).unwrap();
        let pipeline = pipeline_with(repo);

        let req = ProcessRequest::new("dQw4w9WgXcQ", "english", SummaryTier::Short, vec![]);
        let mut rx = pipeline.process_streaming(req);

        let mut saw_metadata = false;
        let mut saw_summary = false;
        while let Some(event) = rx.recv().await {
            match event {
                ProcessEvent::Metadata { metadata, transcript } => {
                    assert_eq!(metadata.title, "Cached Video");
                    assert_eq!(transcript, "cached transcript");
                    saw_metadata = true;
                }
                ProcessEvent::Summary(summary) => {
                    assert_eq!(summary.markdown, "## Overview\ncached");
                    assert_eq!(summary.topics.len(), 1);
                    saw_summary = true;
                }
                ProcessEvent::Error { message, .. } => panic!("unexpected error: {message}"),
                _ => {}
            }
        }
        assert!(saw_metadata);
        assert!(saw_summary);
    }

    #[tokio::test]
    async fn test_streaming_invalid_url_emits_error_event() {
        let pipeline = pipeline_with(MemRepo::new());
        let req = ProcessRequest::new("nope", "english", SummaryTier::Short, vec![]);
        let mut rx = pipeline.process_streaming(req);

        let mut saw_error = false;
        while let Some(event) = rx.recv().await {
            if let ProcessEvent::Error { stage, .. } = event {
                assert_eq!(stage, Stage::Resolving);
                saw_error = true;
            }
        }
        assert!(saw_error);
    }
}
