//! Request classification.
//!
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. **Bypass**: host contains a model-hosting domain, or the path ends with
//!    a large-binary extension. Checked before anything else, so a bypassed
//!    URL is never treated as a share target.
//! 2. **ShareTarget**: GET of the same-origin root path carrying `text`,
//!    `title` or `url`.
//! 3. **SameOriginCacheFirst**: any other same-origin request.
//! 4. **CrossOriginNetworkFirst**: everything else.

use reqwest::{Method, Url};

use crate::fetch::{Request, Scope};
use honyaku_core::AppConfig;

/// Query parameters that mark a share-target navigation.
pub const SHARE_PARAMS: [&str; 3] = ["text", "title", "url"];

/// Handling strategy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Bypass,
    ShareTarget,
    SameOriginCacheFirst,
    CrossOriginNetworkFirst,
}

impl std::fmt::Display for RequestClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestClass::Bypass => write!(f, "bypass"),
            RequestClass::ShareTarget => write!(f, "share-target"),
            RequestClass::SameOriginCacheFirst => write!(f, "cache-first"),
            RequestClass::CrossOriginNetworkFirst => write!(f, "network-first"),
        }
    }
}

/// Pure URL → [`RequestClass`] decision function.
#[derive(Debug, Clone)]
pub struct Classifier {
    scope: Scope,
    bypass_domains: Vec<String>,
    bypass_extensions: Vec<String>,
}

impl Classifier {
    pub fn new(scope: Scope, bypass_domains: Vec<String>, bypass_extensions: Vec<String>) -> Self {
        Self { scope, bypass_domains, bypass_extensions }
    }

    /// Build from configuration, using `scope` as the controlled origin.
    pub fn from_config(scope: Scope, config: &AppConfig) -> Self {
        Self::new(scope, config.bypass_domains.clone(), config.bypass_extensions.clone())
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn classify(&self, url: &Url) -> RequestClass {
        if self.should_bypass(url) {
            RequestClass::Bypass
        } else if self.is_share_target(url) {
            RequestClass::ShareTarget
        } else if self.scope.is_same_origin(url) {
            RequestClass::SameOriginCacheFirst
        } else {
            RequestClass::CrossOriginNetworkFirst
        }
    }

    /// Like [`Classifier::classify`], but only a GET can be a share navigation.
    pub fn classify_request(&self, request: &Request) -> RequestClass {
        match self.classify(&request.url) {
            RequestClass::ShareTarget if request.method != Method::GET => RequestClass::SameOriginCacheFirst,
            class => class,
        }
    }

    /// Model hosts and weight/tensor files go straight to the network.
    pub fn should_bypass(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default();
        if self.bypass_domains.iter().any(|domain| host.contains(domain.as_str())) {
            return true;
        }
        let path = url.path();
        self.bypass_extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    /// Same-origin `/` with at least one share parameter present.
    pub fn is_share_target(&self, url: &Url) -> bool {
        self.scope.is_same_origin(url)
            && url.path() == "/"
            && url.query_pairs().any(|(key, _)| SHARE_PARAMS.iter().any(|param| *param == key))
    }
}
