//! Client code for honyaku.
//!
//! This crate provides the network seam, the offline worker runtime (request
//! routing, cache lifecycle, share hand-off) and the streaming chat layer
//! shared by the CLI.

pub mod chat;
pub mod fetch;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{
    ChatMessage, ChatSession, GenerationController, GenerationObserver, GenerationState, InferenceEngine, OpenAiEngine,
    Role, ShareInbox, Usage,
};
pub use fetch::{FetchConfig, HttpNetwork, Network, Request, Response, ResponseSource, Scope};
pub use worker::{
    Classifier, ClientRegistry, EventOutcome, RequestClass, ServiceWorker, ServiceWorkerState, WorkerEvent,
};
