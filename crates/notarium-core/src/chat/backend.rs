//! Chat backend adapters
//!
//! Every backend normalizes to the same shape: send a message list, receive
//! a forward-only stream of text fragments. The local Ollama backend
//! streams NDJSON natively; the hosted APIs answer in one piece and yield a
//! single fragment. Connection failures surface as `BackendUnavailable`,
//! malformed or empty replies as `BackendResponse`; no adapter retries.

use super::Message;
use crate::config::{ChatBackendKind, ChatConfig};
use crate::error::{NotariumError, Result};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

/// Lazy, single-consumption sequence of reply fragments
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Uniform capability interface for conversational backends
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Dispatch a message list; the reply arrives as a fragment stream
    async fn send(&self, messages: &[Message], system: Option<&str>) -> Result<FragmentStream>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Build the configured backend variant. Selection happens exactly once,
/// at session construction.
pub fn build_backend(config: &ChatConfig) -> Result<Box<dyn ChatBackend>> {
    match config.backend {
        ChatBackendKind::Ollama => Ok(Box::new(OllamaBackend::new(config)?)),
        ChatBackendKind::Claude => {
            let api_key = config.anthropic_api_key.clone().ok_or_else(|| {
                NotariumError::Config("anthropic_api_key is required for the claude backend".into())
            })?;
            Ok(Box::new(ClaudeBackend::new(config, api_key)?))
        }
        ChatBackendKind::Gemini => {
            let api_key = config.google_api_key.clone().ok_or_else(|| {
                NotariumError::Config("google_api_key is required for the gemini backend".into())
            })?;
            Ok(Box::new(GeminiBackend::new(config, api_key)?))
        }
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| NotariumError::BackendUnavailable(e.to_string()))
}

/// Locally hosted model via Ollama's chat endpoint, streaming
pub struct OllamaBackend {
    client: reqwest::Client,
    host: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

impl OllamaBackend {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            host: config.ollama_host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn send(&self, messages: &[Message], system: Option<&str>) -> Result<FragmentStream> {
        let mut payload: Vec<Value> = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system {
            payload.push(serde_json::json!({ "role": "system", "content": system }));
        }
        payload.extend(
            messages
                .iter()
                .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content })),
        );

        let request = OllamaChatRequest {
            model: &self.model,
            messages: payload,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&request)
            .send()
            .await
            .map_err(|e| NotariumError::BackendUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotariumError::BackendResponse(format!(
                "ollama returned {}: {}",
                status, body
            )));
        }

        Ok(ndjson_fragments(response))
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

/// Decode an NDJSON chat response body into a fragment stream.
///
/// Fragments are emitted as complete lines arrive; a transport error ends
/// the stream after surfacing once.
fn ndjson_fragments(response: reqwest::Response) -> FragmentStream {
    let bytes = response.bytes_stream().boxed();
    let state = (bytes, Vec::<u8>::new(), VecDeque::<Result<String>>::new(), false);

    stream::unfold(state, |(mut bytes, mut buf, mut pending, mut done)| async move {
        loop {
            if let Some(item) = pending.pop_front() {
                return Some((item, (bytes, buf, pending, done)));
            }
            if done {
                return None;
            }

            match bytes.next().await {
                Some(Ok(chunk)) => {
                    buf.extend_from_slice(&chunk);
                    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        match decode_ndjson_line(&line) {
                            Ok(Some((fragment, chunk_done))) => {
                                if !fragment.is_empty() {
                                    pending.push_back(Ok(fragment));
                                }
                                if chunk_done {
                                    done = true;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                pending.push_back(Err(e));
                                done = true;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    pending.push_back(Err(NotariumError::BackendUnavailable(e.to_string())));
                    done = true;
                }
                None => done = true,
            }
        }
    })
    .boxed()
}

fn decode_ndjson_line(line: &[u8]) -> Result<Option<(String, bool)>> {
    let text = std::str::from_utf8(line)
        .map_err(|e| NotariumError::BackendResponse(e.to_string()))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }
    let chunk: OllamaChatChunk = serde_json::from_str(text)
        .map_err(|e| NotariumError::BackendResponse(format!("bad stream chunk: {}", e)))?;
    let fragment = chunk.message.map(|m| m.content).unwrap_or_default();
    Ok(Some((fragment, chunk.done)))
}

/// Anthropic Messages API, non-streaming: one fragment with the full reply
pub struct ClaudeBackend {
    client: reqwest::Client,
    model: String,
    api_key: String,
}

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_API_VERSION: &str = "2023-06-01";
const CLAUDE_MAX_TOKENS: u32 = 4096;

impl ClaudeBackend {
    pub fn new(config: &ChatConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ChatBackend for ClaudeBackend {
    async fn send(&self, messages: &[Message], system: Option<&str>) -> Result<FragmentStream> {
        let payload: Vec<Value> = messages
            .iter()
            .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": CLAUDE_MAX_TOKENS,
            "messages": payload,
        });
        if let Some(system) = system {
            body["system"] = Value::String(system.to_string());
        }

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", CLAUDE_API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotariumError::BackendUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotariumError::BackendResponse(format!(
                "claude returned {}: {}",
                status, body
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| NotariumError::BackendResponse(e.to_string()))?;

        let reply: String = data["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect()
            })
            .unwrap_or_default();

        if reply.is_empty() {
            return Err(NotariumError::BackendResponse(
                "claude returned no text content".into(),
            ));
        }

        Ok(stream::iter(vec![Ok(reply)]).boxed())
    }

    fn name(&self) -> &'static str {
        "claude"
    }
}

/// Google Gemini, non-streaming: one fragment with the full reply
pub struct GeminiBackend {
    client: reqwest::Client,
    model: String,
    api_key: String,
}

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

impl GeminiBackend {
    pub fn new(config: &ChatConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    async fn send(&self, messages: &[Message], system: Option<&str>) -> Result<FragmentStream> {
        // Gemini speaks user/model roles with text parts.
        let contents: Vec<Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    super::Role::Assistant => "model",
                    _ => "user",
                };
                serde_json::json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = serde_json::json!({ "contents": contents });
        if let Some(system) = system {
            body["system_instruction"] = serde_json::json!({ "parts": [{ "text": system }] });
        }

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotariumError::BackendUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotariumError::BackendResponse(format!(
                "gemini returned {}: {}",
                status, body
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| NotariumError::BackendResponse(e.to_string()))?;

        let reply: String = data["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();

        if reply.is_empty() {
            return Err(NotariumError::BackendResponse(
                "gemini returned no candidates".into(),
            ));
        }

        Ok(stream::iter(vec![Ok(reply)]).boxed())
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ndjson_fragment() {
        let line = br#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#;
        let (fragment, done) = decode_ndjson_line(line).unwrap().unwrap();
        assert_eq!(fragment, "Hel");
        assert!(!done);
    }

    #[test]
    fn test_decode_ndjson_final_chunk() {
        let line = br#"{"done":true}"#;
        let (fragment, done) = decode_ndjson_line(line).unwrap().unwrap();
        assert!(fragment.is_empty());
        assert!(done);
    }

    #[test]
    fn test_decode_ndjson_blank_line() {
        assert!(decode_ndjson_line(b"  \n").unwrap().is_none());
    }

    #[test]
    fn test_decode_ndjson_garbage_is_backend_response() {
        let err = decode_ndjson_line(b"not json\n").unwrap_err();
        assert!(matches!(err, NotariumError::BackendResponse(_)));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = ChatConfig {
            backend: ChatBackendKind::Claude,
            anthropic_api_key: None,
            ..test_config()
        };
        assert!(matches!(
            build_backend(&config).err().unwrap(),
            NotariumError::Config(_)
        ));
    }

    fn test_config() -> ChatConfig {
        ChatConfig {
            backend: ChatBackendKind::Ollama,
            model: "llama3.2".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            anthropic_api_key: None,
            google_api_key: None,
            context_limit: 5,
            max_turns: 10,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_unreachable_ollama_is_backend_unavailable() {
        let config = ChatConfig {
            ollama_host: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            ..test_config()
        };
        let backend = OllamaBackend::new(&config).unwrap();
        let err = backend
            .send(&[Message::user("hi")], None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, NotariumError::BackendUnavailable(_)));
    }
}
