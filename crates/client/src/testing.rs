//! Test doubles for the network and the inference engine.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{StatusCode, header};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

use crate::chat::engine::{ChunkStream, CompletionChunk, CompletionRequest, InferenceEngine};
use crate::fetch::{Network, Request, Response, ResponseSource};
use honyaku_core::Error;

/// Network that answers from a fixed table and counts calls.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, (u16, &'static str)>>,
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ok(self, url: &str, body: &'static str) -> Self {
        self.with_status(url, 200, body)
    }

    pub fn with_status(self, url: &str, status: u16, body: &'static str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body));
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {}", request.url)));
        }
        let route = self.routes.lock().unwrap().get(request.url.as_str()).copied();
        let (status, body) = route.ok_or_else(|| Error::Network(format!("unreachable: {}", request.url)))?;
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/plain"));
        Ok(Response {
            url: request.url.clone(),
            status: StatusCode::from_u16(status).unwrap(),
            headers,
            body: Bytes::from_static(body.as_bytes()),
            source: ResponseSource::Network,
        })
    }
}

/// One scripted stream item.
#[derive(Debug, Clone)]
pub enum Step {
    Delta(&'static str),
    Usage(u32, u32),
    Fail(&'static str),
}

/// Engine replaying a script. When `gated`, each chunk waits for a permit
/// sent through [`FakeEngine::release`].
pub struct FakeEngine {
    script: Vec<Step>,
    final_message: Mutex<Option<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
    gate: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
    gate_tx: Option<mpsc::UnboundedSender<()>>,
    fail_on_start: bool,
}

impl FakeEngine {
    pub fn new(script: Vec<Step>) -> Self {
        let message: String = script
            .iter()
            .filter_map(|step| match step {
                Step::Delta(text) => Some(*text),
                _ => None,
            })
            .collect();
        Self {
            script,
            final_message: Mutex::new(Some(message)),
            requests: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            gate_tx: None,
            fail_on_start: false,
        }
    }

    pub fn gated(mut self) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        self.gate = Mutex::new(Some(rx));
        self.gate_tx = Some(tx);
        self
    }

    pub fn failing_on_start(mut self) -> Self {
        self.fail_on_start = true;
        self
    }

    /// Let `n` more chunks through a gated engine.
    pub fn release(&self, n: usize) {
        if let Some(tx) = &self.gate_tx {
            for _ in 0..n {
                let _ = tx.send(());
            }
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceEngine for FakeEngine {
    async fn stream_chat(&self, request: CompletionRequest) -> Result<ChunkStream, Error> {
        self.requests.lock().unwrap().push(request);
        if self.fail_on_start {
            return Err(Error::GenerationFailed("engine not loaded".into()));
        }

        let items: Vec<Result<CompletionChunk, Error>> = self
            .script
            .iter()
            .map(|step| match step {
                Step::Delta(text) => Ok(CompletionChunk { delta: Some(text.to_string()), usage: None }),
                Step::Usage(prompt, completion) => Ok(CompletionChunk {
                    delta: None,
                    usage: Some(crate::chat::engine::Usage {
                        prompt_tokens: *prompt,
                        completion_tokens: *completion,
                        total_tokens: prompt + completion,
                    }),
                }),
                Step::Fail(msg) => Err(Error::GenerationFailed(msg.to_string())),
            })
            .collect();

        let gate = self.gate.lock().unwrap().take();
        match gate {
            Some(gate) => {
                let stream = futures::stream::unfold((gate, items.into_iter()), |(mut gate, mut items)| async move {
                    gate.recv().await?;
                    let item = items.next()?;
                    Some((item, (gate, items)))
                });
                Ok(stream.boxed())
            }
            None => Ok(futures::stream::iter(items).boxed()),
        }
    }

    async fn last_message(&self) -> Result<String, Error> {
        self.final_message
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::GenerationFailed("no message".into()))
    }
}
