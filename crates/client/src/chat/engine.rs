//! Inference engine seam.
//!
//! An engine accepts an ordered conversation plus sampling settings and
//! yields incremental deltas; the last chunk may carry a usage record. After
//! the stream ends the fully assembled reply is available from
//! [`InferenceEngine::last_message`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ChatMessage;
use honyaku_core::Error;

/// Fixed sampling settings sent with every completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    /// Token id → bias. `-100` suppresses the token entirely.
    pub logit_bias: BTreeMap<String, i32>,
    pub repetition_penalty: f32,
    pub frequency_penalty: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            logit_bias: BTreeMap::from([("14444".to_string(), -100)]),
            repetition_penalty: 1.2,
            frequency_penalty: 0.5,
        }
    }
}

/// Token accounting reported at the end of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One streamed piece of a completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionChunk {
    pub delta: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingConfig,
    pub stream: bool,
    /// Ask for a usage record on the final chunk.
    pub include_usage: bool,
}

impl CompletionRequest {
    /// A streaming request with default sampling and usage reporting.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages, sampling: SamplingConfig::default(), stream: true, include_usage: true }
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }
}

pub type ChunkStream = BoxStream<'static, Result<CompletionChunk, Error>>;

#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Start a streamed completion.
    async fn stream_chat(&self, request: CompletionRequest) -> Result<ChunkStream, Error>;

    /// The reply assembled by the most recent stream.
    async fn last_message(&self) -> Result<String, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;

    #[test]
    fn test_sampling_defaults() {
        let sampling = SamplingConfig::default();
        assert_eq!(sampling.temperature, 0.7);
        assert_eq!(sampling.top_p, 0.95);
        assert_eq!(sampling.logit_bias.get("14444"), Some(&-100));
        assert_eq!(sampling.repetition_penalty, 1.2);
        assert_eq!(sampling.frequency_penalty, 0.5);
    }

    #[test]
    fn test_request_defaults_to_streaming_with_usage() {
        let request = CompletionRequest::new(vec![ChatMessage::new(Role::User, "hi")]);
        assert!(request.stream);
        assert!(request.include_usage);
        assert_eq!(request.sampling, SamplingConfig::default());
    }
}
