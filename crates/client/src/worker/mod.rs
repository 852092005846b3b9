//! Offline worker runtime.
//!
//! ### Events
//! - The host delivers typed [`WorkerEvent`]s; each handler returns an
//!   explicit [`EventOutcome`] instead of mutating ambient state.
//!
//! ### Lifecycle
//! - `Install` fetches the static asset manifest into the bucket named after
//!   the current version. Any failure makes the worker redundant.
//! - `Activate` deletes every other bucket and claims open clients. The
//!   worker skips the waiting phase, so [`ServiceWorker::start`] runs both.
//! - Fetch events reach the routing policy only once activated.

pub mod classify;
pub mod clients;
pub mod intercept;
pub mod lifecycle;
pub mod share;

use std::sync::{Arc, Mutex, PoisonError};

pub use classify::{Classifier, RequestClass};
pub use clients::{ClientId, ClientInfo, ClientMessage, ClientQuery, ClientRegistry, ClientType, Clients, WorkerMessage};
pub use share::{ShareRouter, SharedPayload};

use crate::fetch::{Network, Request, Response, Scope};
use honyaku_core::{AppConfig, CacheDb, Error};

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceWorkerState {
    /// Created, nothing run yet
    Parsed,
    Installing,
    /// Installed and ready to activate
    Installed,
    Activating,
    /// Active and intercepting fetches
    Activated,
    /// Install failed; this instance never activates
    Redundant,
}

impl ServiceWorkerState {
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, ServiceWorkerState::Activated)
    }
}

impl std::fmt::Display for ServiceWorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceWorkerState::Parsed => write!(f, "parsed"),
            ServiceWorkerState::Installing => write!(f, "installing"),
            ServiceWorkerState::Installed => write!(f, "installed"),
            ServiceWorkerState::Activating => write!(f, "activating"),
            ServiceWorkerState::Activated => write!(f, "activated"),
            ServiceWorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Events delivered to the worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Message { source: ClientId, message: ClientMessage },
}

/// Result of handling one event.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed { cached: usize },
    Activated { deleted: Vec<String>, claimed: usize },
    /// Answer the fetch with this response.
    Respond(Response),
    /// Do not intercept; the request goes to the network untouched.
    PassThrough,
    /// Event consumed, nothing to return.
    Handled,
}

/// The worker: cache store, network, open clients and routing policy.
pub struct ServiceWorker {
    version: String,
    assets: Vec<String>,
    scope: Scope,
    classifier: Classifier,
    router: ShareRouter,
    cache: CacheDb,
    network: Arc<dyn Network>,
    clients: Arc<dyn Clients>,
    state: Mutex<ServiceWorkerState>,
}

impl ServiceWorker {
    /// Build a worker for the configured version and origin.
    pub fn new(
        config: &AppConfig, cache: CacheDb, network: Arc<dyn Network>, clients: Arc<dyn Clients>,
    ) -> Result<Self, Error> {
        let scope = Scope::new(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let classifier = Classifier::from_config(scope.clone(), config);
        let router = ShareRouter::new(classifier.clone(), Arc::clone(&clients));

        Ok(Self {
            version: config.cache_version.clone(),
            assets: config.static_assets.clone(),
            scope,
            classifier,
            router,
            cache,
            network,
            clients,
            state: Mutex::new(ServiceWorkerState::Parsed),
        })
    }

    /// Name of the current cache bucket.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn cache(&self) -> &CacheDb {
        &self.cache
    }

    pub fn state(&self) -> ServiceWorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ServiceWorkerState) {
        tracing::debug!(version = %self.version, %state, "worker state change");
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Move from `expected` to `next`, or fail if the worker is elsewhere.
    fn transition(&self, expected: ServiceWorkerState, next: ServiceWorkerState) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != expected {
            return Err(Error::InvalidState(format!("expected {expected}, worker is {}", *state)));
        }
        *state = next;
        Ok(())
    }

    /// Route one event to its handler.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        match event {
            WorkerEvent::Install => self.on_install().await,
            WorkerEvent::Activate => self.on_activate().await,
            WorkerEvent::Fetch(request) => {
                if !self.state().can_intercept_fetch() {
                    return Ok(EventOutcome::PassThrough);
                }
                self.on_fetch(request).await
            }
            WorkerEvent::Message { source, message } => self.on_message(&source, message).await,
        }
    }

    /// Install then activate right away.
    pub async fn start(&self) -> Result<(EventOutcome, EventOutcome), Error> {
        let installed = self.dispatch(WorkerEvent::Install).await?;
        let activated = self.dispatch(WorkerEvent::Activate).await?;
        Ok((installed, activated))
    }

    /// Pick up where a previous run of the same version left off.
    ///
    /// If the current bucket already exists the worker is considered
    /// activated without re-fetching the manifest.
    pub async fn resume(&self) -> Result<ServiceWorkerState, Error> {
        if self.state() == ServiceWorkerState::Parsed && self.cache.has_bucket(&self.version).await? {
            self.set_state(ServiceWorkerState::Activated);
        }
        Ok(self.state())
    }

    async fn on_install(&self) -> Result<EventOutcome, Error> {
        self.transition(ServiceWorkerState::Parsed, ServiceWorkerState::Installing)?;

        match lifecycle::install(&self.cache, self.network.as_ref(), &self.scope, &self.version, &self.assets).await {
            Ok(cached) => {
                self.set_state(ServiceWorkerState::Installed);
                Ok(EventOutcome::Installed { cached })
            }
            Err(e) => {
                tracing::error!(version = %self.version, "install failed: {e}");
                self.set_state(ServiceWorkerState::Redundant);
                Err(e)
            }
        }
    }

    async fn on_activate(&self) -> Result<EventOutcome, Error> {
        self.transition(ServiceWorkerState::Installed, ServiceWorkerState::Activating)?;

        let result = async {
            let deleted = lifecycle::activate(&self.cache, &self.version).await?;
            let claimed = self.clients.claim().await?;
            Ok::<_, Error>((deleted, claimed))
        }
        .await;

        match result {
            Ok((deleted, claimed)) => {
                self.set_state(ServiceWorkerState::Activated);
                tracing::info!(version = %self.version, deleted = deleted.len(), claimed, "worker activated");
                Ok(EventOutcome::Activated { deleted, claimed })
            }
            Err(e) => {
                self.set_state(ServiceWorkerState::Installed);
                Err(e)
            }
        }
    }

    async fn on_message(&self, source: &ClientId, message: ClientMessage) -> Result<EventOutcome, Error> {
        match message {
            ClientMessage::GetVersion => {
                let reply = WorkerMessage::Version { version: self.version.clone() };
                self.clients.post_message(source, &reply).await?;
            }
        }
        Ok(EventOutcome::Handled)
    }
}
