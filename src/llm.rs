use log::debug;
use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::PipelineError;

/// Chat-completions client, explicitly constructed and passed into the
/// summarizer. All provider response shapes are normalized to plain text
/// at this boundary; nothing above it sees raw API payloads.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl LlmClient {
    /// Build a client from config. Fails with a configuration error when no
    /// credential can be resolved — checked here, before any call is made.
    pub fn from_config(http: reqwest::Client, cfg: &LlmConfig) -> Result<Self, PipelineError> {
        let api_key = cfg
            .resolved_api_key()
            .ok_or_else(|| PipelineError::SummarizationFailed {
                reason: "OPENAI_API_KEY is not configured (required for summarization)".to_string(),
            })?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Blocking completion: returns the full response text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, PipelineError> {
        debug!("LLM completion via {} with model {}", self.endpoint, self.model);

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ]
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::SummarizationFailed { reason: e.to_string() })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::SummarizationFailed {
                reason: format!("LLM API returned {status}: {body}"),
            });
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| PipelineError::SummarizationFailed { reason: e.to_string() })?;
        extract_text(&json).ok_or_else(|| PipelineError::SummarizationFailed {
            reason: "unexpected LLM API response format".to_string(),
        })
    }

    /// Streaming completion: forwards each text fragment to `on_chunk` in
    /// emission order and returns the reassembled full text. Concatenating
    /// the fragments yields exactly the returned string.
    pub async fn stream(
        &self,
        system: &str,
        user: &str,
        mut on_chunk: impl FnMut(&str),
    ) -> Result<String, PipelineError> {
        debug!("LLM streaming via {} with model {}", self.endpoint, self.model);

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "stream": true,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ]
        });

        let mut resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::SummarizationFailed { reason: e.to_string() })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::SummarizationFailed {
                reason: format!("LLM API returned {status}: {body}"),
            });
        }

        let mut buf: Vec<u8> = Vec::new();
        let mut full = String::new();

        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| PipelineError::SummarizationFailed { reason: e.to_string() })?
        {
            buf.extend_from_slice(&chunk);
            // Complete lines only; partial UTF-8 stays buffered until its
            // newline arrives.
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                match parse_sse_line(line.trim_end()) {
                    SseLine::Delta(text) => {
                        full.push_str(&text);
                        on_chunk(&text);
                    }
                    SseLine::Done => return Ok(full),
                    SseLine::Skip => {}
                }
            }
        }

        Ok(full)
    }
}

enum SseLine {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<Value>(data) {
        Ok(value) => match extract_text(&value) {
            Some(text) if !text.is_empty() => SseLine::Delta(text),
            _ => SseLine::Skip,
        },
        Err(_) => SseLine::Skip,
    }
}

/// Normalize a provider payload to its text: streaming deltas carry
/// `choices[0].delta.content`, full responses `choices[0].message.content`.
fn extract_text(json: &Value) -> Option<String> {
    let choice = json.get("choices")?.get(0)?;
    let content = choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .or_else(|| choice.get("message").and_then(|m| m.get("content")))?;
    content.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_full_response() {
        let json = serde_json::json!({
            "choices": [
                {
                    "message": {
                        "role": "assistant",
                        "content": "Summary of the video."
                    }
                }
            ]
        });
        assert_eq!(extract_text(&json).as_deref(), Some("Summary of the video."));
    }

    #[test]
    fn test_extract_text_streaming_delta() {
        let json = serde_json::json!({
            "choices": [
                {"delta": {"content": "frag"}}
            ]
        });
        assert_eq!(extract_text(&json).as_deref(), Some("frag"));
    }

    #[test]
    fn test_extract_text_empty_choices() {
        let json = serde_json::json!({"choices": []});
        assert!(extract_text(&json).is_none());
    }

    #[test]
    fn test_parse_sse_line_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#;
        match parse_sse_line(line) {
            SseLine::Delta(text) => assert_eq!(text, "Hello"),
            _ => panic!("expected a delta"),
        }
    }

    #[test]
    fn test_parse_sse_line_done() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseLine::Done));
    }

    #[test]
    fn test_parse_sse_line_skips_noise() {
        assert!(matches!(parse_sse_line(""), SseLine::Skip));
        assert!(matches!(parse_sse_line(": keep-alive"), SseLine::Skip));
        // role-only delta carries no text
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert!(matches!(parse_sse_line(line), SseLine::Skip));
    }

    #[test]
    fn test_from_config_with_explicit_key() {
        let cfg = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let client = LlmClient::from_config(reqwest::Client::new(), &cfg).unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
    }
}
