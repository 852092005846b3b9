//! Fetch interception strategies.
//!
//! - cache-first: answer from the current bucket, otherwise fetch and store
//!   a copy when the response is a successful GET.
//! - network-first: answer from the network, fall back to the current
//!   bucket when the network fails. Nothing is stored.
//! - share fallback: a share navigation nobody picked up is served like a
//!   plain navigation to `/`.

use super::classify::RequestClass;
use super::{EventOutcome, ServiceWorker};
use crate::fetch::{Request, Response};
use honyaku_core::Error;
use reqwest::Method;

impl ServiceWorker {
    pub(super) async fn on_fetch(&self, request: Request) -> Result<EventOutcome, Error> {
        let class = self.classifier().classify_request(&request);
        tracing::debug!(url = %request.url, %class, "intercepted fetch");

        let response = match class {
            RequestClass::Bypass => return Ok(EventOutcome::PassThrough),
            RequestClass::ShareTarget => match self.router.route(&request).await? {
                Some(redirect) => redirect,
                None => self.share_fallback(&request).await?,
            },
            RequestClass::SameOriginCacheFirst => self.cache_first(&request).await?,
            RequestClass::CrossOriginNetworkFirst => self.network_first(&request).await?,
        };
        Ok(EventOutcome::Respond(response))
    }

    /// Serve the root document for a share navigation that was not handed off.
    ///
    /// The cache lookup ignores the share query so an offline load still
    /// finds the pre-cached `/`; the page reads the fields from its own URL.
    async fn share_fallback(&self, request: &Request) -> Result<Response, Error> {
        let root = Request { method: request.method.clone(), url: self.scope().root().clone() };
        let mut response = self.cache_first(&root).await?;
        response.url = request.url.clone();
        Ok(response)
    }

    pub(super) async fn cache_first(&self, request: &Request) -> Result<Response, Error> {
        if let Some(hit) = self.lookup(request).await {
            tracing::debug!(url = %request.url, "cache hit");
            return Ok(hit);
        }
        tracing::debug!(url = %request.url, "cache miss");

        let response = self.network.fetch(request).await?;
        if request.method == Method::GET && response.is_cacheable() {
            let (response, copy) = response.tee();
            if let Err(e) = self.cache().put_entry(self.version(), &copy.to_cached(request)).await {
                tracing::warn!(url = %request.url, "failed to store response: {e}");
            }
            return Ok(response);
        }
        Ok(response)
    }

    pub(super) async fn network_first(&self, request: &Request) -> Result<Response, Error> {
        match self.network.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::warn!(url = %request.url, "network failed, trying cache: {e}");
                self.lookup(request).await.ok_or(e)
            }
        }
    }

    /// Current-bucket lookup. Store failures count as a miss.
    async fn lookup(&self, request: &Request) -> Option<Response> {
        let entry = match self.cache().match_entry(self.version(), &request.cache_key()).await {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!(url = %request.url, "cache lookup failed: {e}");
                return None;
            }
        };
        match Response::from_cached(request.url.clone(), entry) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(url = %request.url, "discarding unreadable cache entry: {e}");
                None
            }
        }
    }
}
