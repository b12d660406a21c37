use std::io::Write;
use std::path::PathBuf;

use log::{debug, warn};

use crate::VideoRecord;
use crate::error::PipelineError;

/// Storage seam for processed videos. `save` is the pipeline's sole commit
/// point: a run that fails before calling it leaves no trace.
pub trait VideoRepo: Send + Sync {
    fn lookup(&self, video_id: &str) -> Result<Option<VideoRecord>, PipelineError>;
    /// Commit a completed record. Refuses to overwrite an existing one —
    /// callers must `delete` first ("redo").
    fn save(&self, record: &VideoRecord) -> Result<(), PipelineError>;
    /// Returns whether a record existed.
    fn delete(&self, video_id: &str) -> Result<bool, PipelineError>;
    /// All records, newest first.
    fn list(&self) -> Result<Vec<VideoRecord>, PipelineError>;
}

/// One pretty-printed JSON file per video id.
pub struct JsonRepo {
    root: PathBuf,
}

impl JsonRepo {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("ytsum")
            .join("videos")
    }

    fn record_path(&self, video_id: &str) -> PathBuf {
        self.root.join(format!("{video_id}.json"))
    }
}

impl VideoRepo for JsonRepo {
    fn lookup(&self, video_id: &str) -> Result<Option<VideoRecord>, PipelineError> {
        let path = self.record_path(video_id);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PipelineError::PersistenceFailed {
                    reason: format!("reading {}: {e}", path.display()),
                });
            }
        };
        match serde_json::from_str(&data) {
            Ok(record) => {
                debug!("Cache hit: {}", path.display());
                Ok(Some(record))
            }
            Err(e) => {
                // Unreadable records are treated as absent; the conflict
                // check on save still prevents a silent overwrite.
                warn!("unparsable record {} ({e}), treating as absent", path.display());
                Ok(None)
            }
        }
    }

    fn save(&self, record: &VideoRecord) -> Result<(), PipelineError> {
        std::fs::create_dir_all(&self.root).map_err(|e| PipelineError::PersistenceFailed {
            reason: format!("creating {}: {e}", self.root.display()),
        })?;

        let path = self.record_path(&record.video_id);
        let data =
            serde_json::to_string_pretty(record).map_err(|e| PipelineError::PersistenceFailed {
                reason: e.to_string(),
            })?;

        let mut file = match std::fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PipelineError::Conflict {
                    video_id: record.video_id.clone(),
                });
            }
            Err(e) => {
                return Err(PipelineError::PersistenceFailed {
                    reason: format!("creating {}: {e}", path.display()),
                });
            }
        };

        file.write_all(data.as_bytes())
            .map_err(|e| PipelineError::PersistenceFailed {
                reason: format!("writing {}: {e}", path.display()),
            })?;
        debug!("Saved record: {}", path.display());
        Ok(())
    }

    fn delete(&self, video_id: &str) -> Result<bool, PipelineError> {
        let path = self.record_path(video_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted record: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PipelineError::PersistenceFailed {
                reason: format!("deleting {}: {e}", path.display()),
            }),
        }
    }

    fn list(&self) -> Result<Vec<VideoRecord>, PipelineError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PipelineError::PersistenceFailed {
                    reason: format!("listing {}: {e}", self.root.display()),
                });
            }
        };

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Ok(data) = std::fs::read_to_string(&path) else {
                continue;
            };
            match serde_json::from_str::<VideoRecord>(&data) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping unparsable record {} ({e})", path.display()),
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

/// Filter records by a free-text query (case-insensitive against title,
/// channel and summary) and/or tags (exact-token membership, any match).
pub fn search(records: Vec<VideoRecord>, query: Option<&str>, tags: &[String]) -> Vec<VideoRecord> {
    records
        .into_iter()
        .filter(|record| {
            if let Some(q) = query {
                let q = q.to_lowercase();
                let hit = record.metadata.title.to_lowercase().contains(&q)
                    || record.metadata.channel.to_lowercase().contains(&q)
                    || record.summary.markdown.to_lowercase().contains(&q);
                if !hit {
                    return false;
                }
            }
            if !tags.is_empty() && !tags.iter().any(|t| record.tags.iter().any(|rt| rt == t)) {
                return false;
            }
            true
        })
        .collect()
}
