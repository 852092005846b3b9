//! OpenAI-compatible chat completions engine.
//!
//! ### Specification
//!
//! - **Endpoint**: `{base_url}/chat/completions` with `stream: true`.
//! - **Authentication**: optional `Authorization: Bearer` header.
//! - **Framing**: server-sent events; each `data:` line carries one JSON
//!   chunk, `data: [DONE]` ends the stream. Other SSE fields are ignored.
//! - **Usage**: requested via `stream_options.include_usage`; arrives on a
//!   final chunk with an empty `choices` array.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::ChatMessage;
use super::engine::{ChunkStream, CompletionChunk, CompletionRequest, InferenceEngine, Usage};
use honyaku_core::{AppConfig, EngineConfig, Error};

/// Connect timeout. Streams themselves are not time-limited.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    temperature: f32,
    top_p: f32,
    logit_bias: &'a BTreeMap<String, i32>,
    repetition_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

impl<'a> WireRequest<'a> {
    fn new(model: &'a str, request: &'a CompletionRequest) -> Self {
        let sampling = &request.sampling;
        Self {
            model,
            messages: &request.messages,
            stream: request.stream,
            stream_options: request.include_usage.then_some(StreamOptions { include_usage: true }),
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            logit_bias: &sampling.logit_bias,
            repetition_penalty: sampling.repetition_penalty,
            frequency_penalty: sampling.frequency_penalty,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: WireDelta,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    content: Option<String>,
}

impl From<WireChunk> for CompletionChunk {
    fn from(chunk: WireChunk) -> Self {
        let delta = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty());
        Self { delta, usage: chunk.usage }
    }
}

/// One meaningful line of an SSE body.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Chunk(CompletionChunk),
    Done,
}

/// Parse one SSE line. Blank lines, comments and non-data fields yield None.
fn parse_sse_line(line: &str) -> Result<Option<SseEvent>, Error> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(Some(SseEvent::Done));
    }
    let chunk: WireChunk =
        serde_json::from_str(data).map_err(|e| Error::GenerationFailed(format!("malformed chunk: {e}")))?;
    Ok(Some(SseEvent::Chunk(chunk.into())))
}

struct SseState<S> {
    body: S,
    buffer: Vec<u8>,
    eof: bool,
    finished: bool,
    reply: Arc<Mutex<String>>,
}

/// Turn a raw SSE byte stream into completion chunks.
///
/// Deltas are also appended to `reply` so the assembled message survives
/// the stream.
fn sse_chunks<S, E>(body: S, reply: Arc<Mutex<String>>) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = SseState { body, buffer: Vec::new(), eof: false, finished: false, reply };
    futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                match parse_sse_line(&String::from_utf8_lossy(&line)) {
                    Ok(None) => continue,
                    Ok(Some(SseEvent::Done)) => {
                        state.finished = true;
                        return None;
                    }
                    Ok(Some(SseEvent::Chunk(chunk))) => {
                        if let Some(delta) = &chunk.delta {
                            state.reply.lock().unwrap_or_else(PoisonError::into_inner).push_str(delta);
                        }
                        return Some((Ok(chunk), state));
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
            }

            if state.eof {
                return None;
            }

            match state.body.next().await {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(&bytes),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(Error::GenerationFailed(format!("stream interrupted: {e}"))), state));
                }
                None => {
                    state.eof = true;
                    if !state.buffer.is_empty() {
                        state.buffer.push(b'\n');
                    }
                }
            }
        }
    })
    .boxed()
}

/// Engine backed by an OpenAI-compatible HTTP endpoint.
///
/// One engine serves one conversation at a time: [`InferenceEngine::last_message`]
/// reports the most recent stream started through it. Clone the engine to
/// drive another session; clones share the HTTP client but not the reply.
#[derive(Debug)]
pub struct OpenAiEngine {
    http: reqwest::Client,
    config: EngineConfig,
    reply: Arc<Mutex<String>>,
}

impl Clone for OpenAiEngine {
    fn clone(&self) -> Self {
        Self { http: self.http.clone(), config: self.config.clone(), reply: Arc::new(Mutex::new(String::new())) }
    }
}

impl OpenAiEngine {
    pub fn new(config: EngineConfig, user_agent: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config, reply: Arc::new(Mutex::new(String::new())) })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Self::new(config.engine.clone(), &config.user_agent)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl InferenceEngine for OpenAiEngine {
    async fn stream_chat(&self, request: CompletionRequest) -> Result<ChunkStream, Error> {
        self.reply.lock().unwrap_or_else(PoisonError::into_inner).clear();

        let body = WireRequest::new(&self.config.model_id, &request);
        let mut builder = self
            .http
            .post(self.endpoint())
            .header(header::ACCEPT, "text/event-stream")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(model = %self.config.model_id, "requesting completion stream");
        let response = builder
            .send()
            .await
            .map_err(|e| Error::GenerationFailed(format!("engine unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::GenerationFailed(format!("engine returned {}: {}", status.as_u16(), detail.trim())));
        }

        Ok(sse_chunks(response.bytes_stream().boxed(), Arc::clone(&self.reply)))
    }

    async fn last_message(&self) -> Result<String, Error> {
        Ok(self.reply.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}
