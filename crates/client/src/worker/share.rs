//! Share-target hand-off.
//!
//! A share navigation (`/?text=..&title=..&url=..`) is redirected into an
//! already-open application window when one exists, so a second instance
//! never loads. Without such a window the navigation falls through and the
//! freshly loaded page reads the fields from its own URL.

use reqwest::Url;
use std::sync::Arc;

use super::classify::Classifier;
use super::clients::{ClientInfo, ClientQuery, Clients, WorkerMessage};
use crate::fetch::{Request, Response};
use honyaku_core::Error;

/// Shared content assembled from the share query fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedPayload(String);

impl SharedPayload {
    /// Join `text`, `title` and `url` (in that order) with blank lines.
    ///
    /// A field is skipped when empty or when it already appears as a
    /// substring of what has been assembled so far. Returns None when
    /// nothing remains.
    pub fn assemble(text: Option<&str>, title: Option<&str>, url: Option<&str>) -> Option<Self> {
        let mut content = String::new();
        for field in [text, title, url].into_iter().flatten() {
            if field.is_empty() || content.contains(field) {
                continue;
            }
            if !content.is_empty() {
                content.push_str("\n\n");
            }
            content.push_str(field);
        }
        (!content.is_empty()).then_some(Self(content))
    }

    /// Read the share fields from a URL's query string.
    ///
    /// Only the first occurrence of each parameter counts.
    pub fn from_url(url: &Url) -> Option<Self> {
        let first = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };
        let (text, title, shared_url) = (first("text"), first("title"), first("url"));
        Self::assemble(text.as_deref(), title.as_deref(), shared_url.as_deref())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SharedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Routes share navigations to an open application window.
#[derive(Clone)]
pub struct ShareRouter {
    classifier: Classifier,
    clients: Arc<dyn Clients>,
}

impl ShareRouter {
    pub fn new(classifier: Classifier, clients: Arc<dyn Clients>) -> Self {
        Self { classifier, clients }
    }

    /// First same-origin window that is not itself a pending share navigation.
    pub async fn find_target(&self) -> Result<Option<ClientInfo>, Error> {
        let windows = self.clients.match_all(ClientQuery::all_windows()).await?;
        Ok(windows.into_iter().find(|client| {
            self.classifier.scope().is_same_origin(&client.url) && !self.classifier.is_share_target(&client.url)
        }))
    }

    /// Handle a share navigation.
    ///
    /// Returns a 303 redirect to `/` after delivering the payload to an open
    /// window, or None when the request should load normally.
    pub async fn route(&self, request: &Request) -> Result<Option<Response>, Error> {
        let Some(payload) = SharedPayload::from_url(&request.url) else {
            tracing::debug!("share navigation without content: {}", request.url);
            return Ok(None);
        };

        let Some(target) = self.find_target().await? else {
            tracing::debug!("no open window for shared content; loading normally");
            return Ok(None);
        };

        let message = WorkerMessage::ShareTarget { content: payload.into_string() };
        if let Err(e) = self.clients.post_message(&target.id, &message).await {
            tracing::warn!(client = %target.id, "share delivery failed, loading normally: {e}");
            return Ok(None);
        }

        if let Err(e) = self.clients.focus(&target.id).await {
            tracing::warn!(client = %target.id, "failed to focus share target: {e}");
        }

        tracing::info!(client = %target.id, "delivered shared content to open window");
        Ok(Some(Response::see_other(request.url.clone(), self.classifier.scope().root())))
    }
}
