//! Open page instances and the messages exchanged with them.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use honyaku_core::Error;

/// Opaque identifier of an open client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Window,
    Worker,
    SharedWorker,
}

/// Snapshot of one client at the moment it was enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: ClientId,
    pub url: Url,
    pub kind: ClientType,
    /// Whether this worker currently controls the client.
    pub controlled: bool,
}

/// Filter for [`Clients::match_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientQuery {
    pub kind: ClientType,
    pub include_uncontrolled: bool,
}

impl ClientQuery {
    /// Every window, controlled or not.
    pub fn all_windows() -> Self {
        Self { kind: ClientType::Window, include_uncontrolled: true }
    }
}

/// Worker → page messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Shared content handed off from another application.
    ShareTarget { content: String },
    /// Reply to [`ClientMessage::GetVersion`].
    Version { version: String },
}

/// Page → worker messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    GetVersion,
}

/// The worker's view of open clients.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Enumerate clients matching `query`, in creation order.
    async fn match_all(&self, query: ClientQuery) -> Result<Vec<ClientInfo>, Error>;

    /// Deliver a message to one client.
    async fn post_message(&self, id: &ClientId, message: &WorkerMessage) -> Result<(), Error>;

    /// Bring a window client to the foreground.
    async fn focus(&self, id: &ClientId) -> Result<(), Error>;

    /// Take control of every in-scope client. Returns how many were claimed.
    async fn claim(&self) -> Result<usize, Error>;
}

#[derive(Debug)]
struct ClientRecord {
    info: ClientInfo,
    inbox: Vec<WorkerMessage>,
    focused: bool,
}

/// In-process client registry.
///
/// Uses a HashMap with a tokio RwLock; insertion order is kept separately so
/// enumeration is stable.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<RwLock<Registry>>,
}

#[derive(Debug, Default)]
struct Registry {
    order: Vec<ClientId>,
    records: HashMap<ClientId, ClientRecord>,
    next_id: u64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly opened client and return its id.
    pub async fn open(&self, url: Url, kind: ClientType, controlled: bool) -> ClientId {
        let mut registry = self.inner.write().await;
        registry.next_id += 1;
        let id = ClientId(format!("client-{}", registry.next_id));
        registry.order.push(id.clone());
        registry.records.insert(
            id.clone(),
            ClientRecord {
                info: ClientInfo { id: id.clone(), url, kind, controlled },
                inbox: Vec::new(),
                focused: false,
            },
        );
        id
    }

    /// Forget a client (tab closed).
    pub async fn close(&self, id: &ClientId) -> bool {
        let mut registry = self.inner.write().await;
        registry.order.retain(|other| other != id);
        registry.records.remove(id).is_some()
    }

    /// Drain the messages delivered to `id`.
    pub async fn take_messages(&self, id: &ClientId) -> Vec<WorkerMessage> {
        let mut registry = self.inner.write().await;
        registry
            .records
            .get_mut(id)
            .map(|record| std::mem::take(&mut record.inbox))
            .unwrap_or_default()
    }

    /// Whether `id` holds focus.
    pub async fn is_focused(&self, id: &ClientId) -> bool {
        let registry = self.inner.read().await;
        registry.records.get(id).is_some_and(|record| record.focused)
    }

    /// Whether `id` is controlled by the worker.
    pub async fn is_controlled(&self, id: &ClientId) -> bool {
        let registry = self.inner.read().await;
        registry.records.get(id).is_some_and(|record| record.info.controlled)
    }
}

#[async_trait]
impl Clients for ClientRegistry {
    async fn match_all(&self, query: ClientQuery) -> Result<Vec<ClientInfo>, Error> {
        let registry = self.inner.read().await;
        Ok(registry
            .order
            .iter()
            .filter_map(|id| registry.records.get(id))
            .map(|record| &record.info)
            .filter(|info| info.kind == query.kind && (query.include_uncontrolled || info.controlled))
            .cloned()
            .collect())
    }

    async fn post_message(&self, id: &ClientId, message: &WorkerMessage) -> Result<(), Error> {
        let mut registry = self.inner.write().await;
        let record = registry
            .records
            .get_mut(id)
            .ok_or_else(|| Error::ClientGone(id.to_string()))?;
        record.inbox.push(message.clone());
        Ok(())
    }

    async fn focus(&self, id: &ClientId) -> Result<(), Error> {
        let mut registry = self.inner.write().await;
        if !registry.records.contains_key(id) {
            return Err(Error::ClientGone(id.to_string()));
        }
        for (other, record) in registry.records.iter_mut() {
            record.focused = other == id;
        }
        Ok(())
    }

    async fn claim(&self) -> Result<usize, Error> {
        let mut registry = self.inner.write().await;
        let mut claimed = 0;
        for record in registry.records.values_mut() {
            if !record.info.controlled {
                record.info.controlled = true;
                claimed += 1;
            }
        }
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_worker_message_wire_format() {
        let json = serde_json::to_value(WorkerMessage::ShareTarget { content: "hello".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "SHARE_TARGET", "content": "hello"}));
    }

    #[test]
    fn test_client_message_wire_format() {
        let message: ClientMessage = serde_json::from_str(r#"{"type":"GET_VERSION"}"#).unwrap();
        assert_eq!(message, ClientMessage::GetVersion);
    }

    #[tokio::test]
    async fn test_match_all_filters() {
        let registry = ClientRegistry::new();
        let window = registry.open(url("https://app.test/"), ClientType::Window, false).await;
        registry.open(url("https://app.test/worker.js"), ClientType::Worker, true).await;

        let controlled_only = registry
            .match_all(ClientQuery { kind: ClientType::Window, include_uncontrolled: false })
            .await
            .unwrap();
        assert!(controlled_only.is_empty());

        let all = registry.match_all(ClientQuery::all_windows()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, window);
    }

    #[tokio::test]
    async fn test_match_all_preserves_open_order() {
        let registry = ClientRegistry::new();
        let first = registry.open(url("https://app.test/a"), ClientType::Window, true).await;
        let second = registry.open(url("https://app.test/b"), ClientType::Window, true).await;

        let ids: Vec<_> = registry
            .match_all(ClientQuery::all_windows())
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_post_message_and_focus() {
        let registry = ClientRegistry::new();
        let id = registry.open(url("https://app.test/"), ClientType::Window, true).await;

        registry
            .post_message(&id, &WorkerMessage::ShareTarget { content: "x".into() })
            .await
            .unwrap();
        registry.focus(&id).await.unwrap();

        assert!(registry.is_focused(&id).await);
        assert_eq!(registry.take_messages(&id).await.len(), 1);
        assert!(registry.take_messages(&id).await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_client_is_gone() {
        let registry = ClientRegistry::new();
        let id = registry.open(url("https://app.test/"), ClientType::Window, true).await;
        assert!(registry.close(&id).await);

        let result = registry.post_message(&id, &WorkerMessage::Version { version: "v1".into() }).await;
        assert!(matches!(result, Err(Error::ClientGone(_))));
        assert!(matches!(registry.focus(&id).await, Err(Error::ClientGone(_))));
    }

    #[tokio::test]
    async fn test_claim() {
        let registry = ClientRegistry::new();
        let a = registry.open(url("https://app.test/"), ClientType::Window, false).await;
        registry.open(url("https://app.test/x"), ClientType::Window, true).await;

        assert_eq!(registry.claim().await.unwrap(), 1);
        assert!(registry.is_controlled(&a).await);
        assert_eq!(registry.claim().await.unwrap(), 0);
    }
}
