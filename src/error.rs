use serde::Serialize;
use thiserror::Error;

/// Pipeline stages, in execution order. Every fatal error is tagged with
/// the stage it aborted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Resolving,
    CacheCheck,
    ExtractingMetadata,
    ExtractingCaptions,
    TranscribingAudio,
    Summarizing,
    Parsing,
    Persisting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Resolving => "resolving",
            Stage::CacheCheck => "cache_check",
            Stage::ExtractingMetadata => "extracting_metadata",
            Stage::ExtractingCaptions => "extracting_captions",
            Stage::TranscribingAudio => "transcribing_audio",
            Stage::Summarizing => "summarizing",
            Stage::Parsing => "parsing",
            Stage::Persisting => "persisting",
        };
        write!(f, "{name}")
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("could not extract a video id from: {input}")]
    InvalidInput { input: String },

    #[error("video unavailable: {reason}")]
    VideoUnavailable { reason: String },

    #[error("missing credential: {name} is not configured")]
    MissingCredential { name: String },

    #[error("audio download failed: {reason}")]
    DownloadFailed { reason: String },

    #[error("transcription failed: {reason}")]
    TranscriptionFailed { reason: String },

    #[error("summarization failed: {reason}")]
    SummarizationFailed { reason: String },

    #[error("a record already exists for video {video_id}; delete it first to redo")]
    Conflict { video_id: String },

    #[error("persistence failed: {reason}")]
    PersistenceFailed { reason: String },
}

impl PipelineError {
    /// The stage this error aborts the run in.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InvalidInput { .. } => Stage::Resolving,
            PipelineError::VideoUnavailable { .. } => Stage::ExtractingMetadata,
            PipelineError::MissingCredential { .. }
            | PipelineError::DownloadFailed { .. }
            | PipelineError::TranscriptionFailed { .. } => Stage::TranscribingAudio,
            PipelineError::SummarizationFailed { .. } => Stage::Summarizing,
            PipelineError::Conflict { .. } | PipelineError::PersistenceFailed { .. } => Stage::Persisting,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
