//! Chat session and streamed generation.
//!
//! ### Session
//! - A [`ChatSession`] owns the conversation history (starting with the
//!   system prompt) and the one live cancellation handle. Clones share state.
//! - At most one generation runs per session at a time.
//!
//! ### Turn outcomes
//! - Completed: the assembled reply is appended to history.
//! - Cancelled or Failed: history ends with the user's message; no assistant
//!   entry is kept for that turn.

pub mod engine;
pub mod generation;
pub mod inbox;
pub mod openai;

pub use engine::{ChunkStream, CompletionChunk, CompletionRequest, InferenceEngine, SamplingConfig, Usage};
pub use generation::{GenerationController, GenerationObserver};
pub use inbox::{Delivery, ShareInbox};
pub use openai::OpenAiEngine;

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use honyaku_core::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Where the session's most recent turn stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Generating,
    Completed,
    Cancelled,
    Failed,
}

impl std::fmt::Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationState::Idle => write!(f, "idle"),
            GenerationState::Generating => write!(f, "generating"),
            GenerationState::Completed => write!(f, "completed"),
            GenerationState::Cancelled => write!(f, "cancelled"),
            GenerationState::Failed => write!(f, "failed"),
        }
    }
}

struct ActiveTurn {
    token: CancellationToken,
    /// History length right after the user's message was pushed.
    reply_at: usize,
}

struct SessionState {
    history: Vec<ChatMessage>,
    active: Option<ActiveTurn>,
    state: GenerationState,
}

impl SessionState {
    fn abandon_turn(&mut self, outcome: GenerationState) {
        if let Some(turn) = self.active.take() {
            turn.token.cancel();
            self.history.truncate(turn.reply_at);
            self.state = outcome;
        }
    }
}

/// Shared conversation context for one chat.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Mutex<SessionState>>,
}

impl ChatSession {
    /// New session whose history holds only `system_prompt`.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let state = SessionState {
            history: vec![ChatMessage::new(Role::System, system_prompt)],
            active: None,
            state: GenerationState::Idle,
        };
        Self { inner: Arc::new(Mutex::new(state)) }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.lock().history.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().history.is_empty()
    }

    pub fn state(&self) -> GenerationState {
        self.lock().state
    }

    pub fn is_generating(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Abort the running generation, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        let running = state.active.is_some();
        state.abandon_turn(GenerationState::Cancelled);
        if running {
            tracing::info!("generation cancelled");
        }
        running
    }

    /// Cancel and drop everything but the system prompt.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.abandon_turn(GenerationState::Cancelled);
        state.history.truncate(1);
        state.state = GenerationState::Idle;
    }

    /// Push the user's message and mark a generation as running.
    ///
    /// Returns the turn's cancellation handle and the conversation to send.
    pub(crate) fn begin_turn(&self, input: &str) -> Result<(CancellationToken, Vec<ChatMessage>), Error> {
        let mut state = self.lock();
        if state.active.is_some() {
            return Err(Error::GenerationBusy);
        }
        state.history.push(ChatMessage::new(Role::User, input));
        let token = CancellationToken::new();
        state.active = Some(ActiveTurn { token: token.clone(), reply_at: state.history.len() });
        state.state = GenerationState::Generating;
        Ok((token, state.history.clone()))
    }

    /// Record the reply. Returns false if the turn was cancelled meanwhile.
    pub(crate) fn finish_turn(&self, token: &CancellationToken, reply: &str) -> bool {
        let mut state = self.lock();
        if token.is_cancelled() {
            return false;
        }
        state.history.push(ChatMessage::new(Role::Assistant, reply));
        state.active = None;
        state.state = GenerationState::Completed;
        true
    }

    /// Roll back a failed turn. Returns false if it was cancelled meanwhile.
    pub(crate) fn fail_turn(&self, token: &CancellationToken) -> bool {
        let mut state = self.lock();
        if token.is_cancelled() {
            return false;
        }
        state.abandon_turn(GenerationState::Failed);
        true
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ChatSession")
            .field("messages", &state.history.len())
            .field("state", &state.state)
            .field("generating", &state.active.is_some())
            .finish()
    }
}
