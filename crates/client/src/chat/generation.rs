//! Streaming generation controller.
//!
//! Drives one turn: push the user message, stream deltas from the engine
//! while watching the session's cancellation handle, then record the reply.
//! A cancelled turn is not an error; chunks arriving after cancellation are
//! dropped.

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::engine::{CompletionRequest, InferenceEngine, SamplingConfig, Usage};
use super::{ChatSession, GenerationState};
use honyaku_core::Error;

/// Receives progress of one generation.
pub trait GenerationObserver: Send {
    /// Called with the full text accumulated so far after every chunk.
    fn on_update(&mut self, text: &str);

    /// Called once with the final reply and the usage record, if any.
    fn on_finish(&mut self, message: &str, usage: Option<&Usage>);

    /// Called once when the turn fails for a reason other than cancellation.
    fn on_error(&mut self, error: &Error);
}

pub struct GenerationController {
    engine: Arc<dyn InferenceEngine>,
    sampling: SamplingConfig,
}

impl GenerationController {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self { engine, sampling: SamplingConfig::default() }
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Run one chat turn for `input`.
    ///
    /// Errors only when the turn cannot start (empty input or a generation
    /// already running). Engine failures are reported to `observer` and
    /// yield [`GenerationState::Failed`].
    pub async fn send(
        &self, session: &ChatSession, input: &str, observer: &mut dyn GenerationObserver,
    ) -> Result<GenerationState, Error> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidInput("message is empty".into()));
        }

        let (token, messages) = session.begin_turn(input)?;
        let request = CompletionRequest::new(messages).with_sampling(self.sampling.clone());
        tracing::debug!(messages = request.messages.len(), "starting generation");

        match self.stream(&token, request, observer).await {
            Ok(Some((message, usage))) => {
                if !session.finish_turn(&token, &message) {
                    return Ok(GenerationState::Cancelled);
                }
                if let Some(usage) = &usage {
                    tracing::debug!(
                        prompt = usage.prompt_tokens,
                        completion = usage.completion_tokens,
                        "generation finished"
                    );
                }
                observer.on_finish(&message, usage.as_ref());
                Ok(GenerationState::Completed)
            }
            Ok(None) => Ok(GenerationState::Cancelled),
            Err(e) => {
                if !session.fail_turn(&token) {
                    return Ok(GenerationState::Cancelled);
                }
                tracing::error!(code = e.code(), "generation failed: {e}");
                observer.on_error(&e);
                Ok(GenerationState::Failed)
            }
        }
    }

    /// Stream the reply. `None` means the turn was cancelled.
    async fn stream(
        &self, token: &CancellationToken, request: CompletionRequest, observer: &mut dyn GenerationObserver,
    ) -> Result<Option<(String, Option<Usage>)>, Error> {
        let mut chunks = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            started = self.engine.stream_chat(request) => started?,
        };

        let mut text = String::new();
        let mut usage = None;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(None),
                next = chunks.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            if let Some(delta) = chunk.delta {
                text.push_str(&delta);
            }
            if chunk.usage.is_some() {
                usage = chunk.usage;
            }
            observer.on_update(&text);
        }

        if token.is_cancelled() {
            return Ok(None);
        }
        let message = self.engine.last_message().await?;
        Ok(Some((message, usage)))
    }
}
