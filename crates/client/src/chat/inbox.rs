//! Page side of the share hand-off.
//!
//! Shared content reaches a page two ways: in the query string of a fresh
//! navigation, or as a `SHARE_TARGET` message posted by the worker into an
//! already-open page. Either way it ends up in the message input, but only
//! once the chat is usable; until then it is held here.

use reqwest::Url;

use crate::worker::{SharedPayload, WorkerMessage};

/// What happened to a delivered share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Chat is active; put this into the input now.
    Applied(String),
    /// Held until [`ShareInbox::take_pending`].
    Stashed,
}

#[derive(Debug, Default)]
pub struct ShareInbox {
    chat_active: bool,
    pending: Option<String>,
}

impl ShareInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read share fields from the page's startup URL.
    ///
    /// When content is found it is stashed and the query is removed from
    /// `url`, so a reload does not deliver it twice.
    pub fn from_startup_url(url: &mut Url) -> Self {
        let mut inbox = Self::new();
        if let Some(payload) = SharedPayload::from_url(url) {
            tracing::info!(chars = payload.as_str().chars().count(), "received shared content on startup");
            inbox.pending = Some(payload.into_string());
            url.set_query(None);
        }
        inbox
    }

    /// Mark the chat as usable (model loaded) or not.
    pub fn set_chat_active(&mut self, active: bool) {
        self.chat_active = active;
    }

    /// Handle a worker message. Returns None for messages that are not shares.
    pub fn receive(&mut self, message: &WorkerMessage) -> Option<Delivery> {
        let WorkerMessage::ShareTarget { content } = message else {
            return None;
        };
        if self.chat_active {
            return Some(Delivery::Applied(content.clone()));
        }
        tracing::debug!("chat not ready, holding shared content");
        self.pending = Some(content.clone());
        Some(Delivery::Stashed)
    }

    /// Take the held content, if any.
    pub fn take_pending(&mut self) -> Option<String> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(content: &str) -> WorkerMessage {
        WorkerMessage::ShareTarget { content: content.into() }
    }

    #[test]
    fn test_startup_url_stashes_and_cleans_query() {
        let mut url = Url::parse("https://app.test/?text=hello&url=http%3A%2F%2Fx").unwrap();
        let mut inbox = ShareInbox::from_startup_url(&mut url);

        assert_eq!(url.as_str(), "https://app.test/");
        assert_eq!(inbox.take_pending().as_deref(), Some("hello\n\nhttp://x"));
        assert_eq!(inbox.take_pending(), None);
    }

    #[test]
    fn test_startup_url_without_share_is_untouched() {
        let mut url = Url::parse("https://app.test/?lang=ja").unwrap();
        let mut inbox = ShareInbox::from_startup_url(&mut url);
        assert_eq!(url.as_str(), "https://app.test/?lang=ja");
        assert_eq!(inbox.take_pending(), None);
    }

    #[test]
    fn test_receive_applies_when_chat_active() {
        let mut inbox = ShareInbox::new();
        inbox.set_chat_active(true);
        assert_eq!(inbox.receive(&share("hi")), Some(Delivery::Applied("hi".into())));
        assert_eq!(inbox.take_pending(), None);
    }

    #[test]
    fn test_receive_stashes_latest_until_ready() {
        let mut inbox = ShareInbox::new();
        assert_eq!(inbox.receive(&share("first")), Some(Delivery::Stashed));
        assert_eq!(inbox.receive(&share("second")), Some(Delivery::Stashed));
        assert_eq!(inbox.take_pending().as_deref(), Some("second"));
    }

    #[test]
    fn test_receive_ignores_other_messages() {
        let mut inbox = ShareInbox::new();
        assert_eq!(inbox.receive(&WorkerMessage::Version { version: "v1".into() }), None);
    }
}
