use std::path::{Path, PathBuf};
use std::process::Command;

use eyre::{Result, bail};
use log::{debug, warn};
use reqwest::multipart;

use crate::config::WhisperConfig;
use crate::error::PipelineError;
use crate::{Segment, Transcript, TranscriptSource};

/// Maximum file size for a single Whisper API upload (25 MB)
const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Whisper transcription model
#[derive(Debug, Clone, Default)]
pub enum WhisperModel {
    Gpt4oMiniTranscribe,
    Gpt4oTranscribe,
    #[default]
    Whisper1,
}

impl WhisperModel {
    pub fn from_name(name: &str) -> Self {
        match name {
            "gpt-4o-mini-transcribe" => WhisperModel::Gpt4oMiniTranscribe,
            "gpt-4o-transcribe" => WhisperModel::Gpt4oTranscribe,
            "whisper-1" => WhisperModel::Whisper1,
            other => {
                warn!("unknown whisper model {other:?}, using whisper-1");
                WhisperModel::Whisper1
            }
        }
    }

    fn api_name(&self) -> &str {
        match self {
            WhisperModel::Gpt4oMiniTranscribe => "gpt-4o-mini-transcribe",
            WhisperModel::Gpt4oTranscribe => "gpt-4o-transcribe",
            WhisperModel::Whisper1 => "whisper-1",
        }
    }

    fn response_format(&self) -> &str {
        match self {
            WhisperModel::Whisper1 => "verbose_json",
            // Newer transcribe models only support "json" or "text"
            _ => "json",
        }
    }

    fn supports_timestamp_granularities(&self) -> bool {
        matches!(self, WhisperModel::Whisper1)
    }
}

/// Scoped temp audio file: unlinked on every exit path.
struct TempAudio {
    path: PathBuf,
}

impl TempAudio {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        if std::fs::remove_file(&self.path).is_ok() {
            debug!("Removed temp audio file: {}", self.path.display());
        }
    }
}

/// Transcribe a video using yt-dlp + the Whisper API.
///
/// Terminal fallback: invoked only when caption extraction came up empty,
/// and nothing catches a failure here. The credential is checked before
/// any download so a misconfigured environment fails fast and specifically.
pub async fn transcribe(
    client: &reqwest::Client,
    video_id: &str,
    lang: &str,
    cfg: &WhisperConfig,
) -> Result<Transcript, PipelineError> {
    let api_key = cfg
        .resolved_api_key()
        .ok_or_else(|| PipelineError::MissingCredential {
            name: "OPENAI_API_KEY".to_string(),
        })?;

    let model = WhisperModel::from_name(&cfg.model);

    let audio = download_audio(video_id)?;

    let file_size = std::fs::metadata(audio.path())
        .map_err(|e| PipelineError::DownloadFailed { reason: e.to_string() })?
        .len();
    debug!("Audio file size: {file_size} bytes");

    let result = if file_size > MAX_UPLOAD_BYTES {
        transcribe_chunked(client, cfg, &api_key, audio.path(), &model, lang).await
    } else {
        transcribe_file(client, cfg, &api_key, audio.path(), &model, lang).await
    };

    let segments = result.map_err(|e| PipelineError::TranscriptionFailed { reason: e.to_string() })?;

    Ok(Transcript {
        video_id: video_id.to_string(),
        language: lang.to_string(),
        source: TranscriptSource::Whisper,
        segments,
    })
}

fn download_audio(video_id: &str) -> Result<TempAudio, PipelineError> {
    let url = format!("https://www.youtube.com/watch?v={video_id}");
    let output_template = std::env::temp_dir().join(format!("ytsum-{video_id}.%(ext)s"));
    let audio = TempAudio {
        path: std::env::temp_dir().join(format!("ytsum-{video_id}.mp3")),
    };

    debug!("Downloading audio via yt-dlp: {url}");

    let status = Command::new("yt-dlp")
        .args([
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "9", // lowest quality = smallest file (speech doesn't need high quality)
            "--no-playlist",
            "-o",
            &output_template.to_string_lossy(),
            &url,
        ])
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .status();

    match status {
        Ok(s) if s.success() => {}
        Ok(s) => {
            return Err(PipelineError::DownloadFailed {
                reason: format!("yt-dlp exited with status {s}"),
            });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::DownloadFailed {
                reason: "yt-dlp not found. Install it to enable the audio fallback:\n  \
                         pip install yt-dlp\n  or: brew install yt-dlp"
                    .to_string(),
            });
        }
        Err(e) => {
            return Err(PipelineError::DownloadFailed {
                reason: format!("failed to run yt-dlp: {e}"),
            });
        }
    }

    if !audio.path().exists() {
        return Err(PipelineError::DownloadFailed {
            reason: format!(
                "yt-dlp did not produce expected output file: {}",
                audio.path().display()
            ),
        });
    }

    Ok(audio)
}

async fn transcribe_file(
    client: &reqwest::Client,
    cfg: &WhisperConfig,
    api_key: &str,
    audio_path: &Path,
    model: &WhisperModel,
    lang: &str,
) -> Result<Vec<Segment>> {
    debug!("Uploading {} to Whisper API", audio_path.display());

    let file_bytes = std::fs::read(audio_path)?;
    let file_name = audio_path.file_name().unwrap_or_default().to_string_lossy().to_string();

    let file_part = multipart::Part::bytes(file_bytes)
        .file_name(file_name)
        .mime_str("audio/mpeg")?;

    let mut form = multipart::Form::new()
        .part("file", file_part)
        .text("model", model.api_name().to_string())
        .text("language", lang.to_string())
        .text("response_format", model.response_format().to_string());

    if model.supports_timestamp_granularities() {
        form = form.text("timestamp_granularities[]", "segment");
    }

    let resp = client
        .post(&cfg.endpoint)
        .bearer_auth(api_key)
        .multipart(form)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("Whisper API returned {status}: {body}");
    }

    let json: serde_json::Value = resp.json().await?;
    parse_whisper_response(&json)
}

fn parse_whisper_response(json: &serde_json::Value) -> Result<Vec<Segment>> {
    // verbose_json format has a "segments" array
    if let Some(segments) = json.get("segments").and_then(|s| s.as_array())
        && !segments.is_empty()
    {
        return Ok(segments
            .iter()
            .filter_map(|seg| {
                let text = seg.get("text")?.as_str()?.trim().to_string();
                let start = seg.get("start")?.as_f64()?;
                let end = seg.get("end")?.as_f64()?;
                if text.is_empty() {
                    return None;
                }
                Some(Segment {
                    text,
                    start,
                    duration: end - start,
                })
            })
            .collect());
    }

    // Fallback: flat transcript becomes one cue spanning the reported duration
    if let Some(text) = json.get("text").and_then(|t| t.as_str()) {
        let text = text.trim();
        if text.is_empty() {
            bail!("transcription response contained no text");
        }
        let duration = json.get("duration").and_then(|d| d.as_f64()).unwrap_or(0.0);
        return Ok(vec![Segment {
            text: text.to_string(),
            start: 0.0,
            duration,
        }]);
    }

    bail!("unexpected Whisper API response format");
}

async fn transcribe_chunked(
    client: &reqwest::Client,
    cfg: &WhisperConfig,
    api_key: &str,
    audio_path: &Path,
    model: &WhisperModel,
    lang: &str,
) -> Result<Vec<Segment>> {
    // Each chunk is ~20 minutes to stay under 25MB at 64kbps
    let chunk_duration_secs = 1200;
    let file_size = std::fs::metadata(audio_path)?.len();
    let estimated_duration = file_size as f64 / (64_000.0 / 8.0); // 64kbps
    let num_chunks = (estimated_duration / chunk_duration_secs as f64).ceil() as usize;

    debug!("Splitting into {num_chunks} chunks of {chunk_duration_secs}s each");

    let mut all_segments = Vec::new();
    let mut time_offset = 0.0_f64;

    for i in 0..num_chunks {
        let start_time = i as f64 * chunk_duration_secs as f64;
        let chunk = TempAudio {
            path: std::env::temp_dir().join(format!("ytsum-chunk-{i}.mp3")),
        };

        let status = Command::new("ffmpeg")
            .args([
                "-y",
                "-i",
                &audio_path.to_string_lossy(),
                "-ss",
                &format!("{start_time}"),
                "-t",
                &format!("{chunk_duration_secs}"),
                "-acodec",
                "copy",
                &chunk.path().to_string_lossy(),
            ])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()?;

        if !status.success() {
            bail!("ffmpeg failed to split audio at offset {start_time}s");
        }

        let mut segments = transcribe_file(client, cfg, api_key, chunk.path(), model, lang).await?;

        // Adjust timestamps for the offset
        for seg in &mut segments {
            seg.start += time_offset;
        }

        time_offset = start_time + chunk_duration_secs as f64;
        all_segments.extend(segments);
    }

    Ok(all_segments)
}
