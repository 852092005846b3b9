//! Worker subcommands: install, buckets, classify, fetch, share.

use anyhow::{Context, Result, bail};
use std::sync::Arc;

use honyaku_client::fetch::{FetchConfig, HttpNetwork, Method, Network, Request, Response, Scope, Url};
use honyaku_client::worker::{ClientType, WorkerMessage};
use honyaku_client::{
    Classifier, ClientRegistry, EventOutcome, ServiceWorker, ServiceWorkerState, ShareInbox, WorkerEvent,
};
use honyaku_core::{AppConfig, CacheDb};

fn network(config: &AppConfig) -> Result<Arc<HttpNetwork>> {
    Ok(Arc::new(HttpNetwork::new(FetchConfig::from(config))?))
}

async fn open_cache(config: &AppConfig) -> Result<CacheDb> {
    CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache at {}", config.db_path.display()))
}

/// A worker ready to intercept: resumed if its bucket exists, installed otherwise.
async fn active_worker(config: &AppConfig, clients: &ClientRegistry) -> Result<ServiceWorker> {
    let worker = ServiceWorker::new(config, open_cache(config).await?, network(config)?, Arc::new(clients.clone()))?;
    if worker.resume().await? != ServiceWorkerState::Activated {
        tracing::info!(version = worker.version(), "no current bucket, installing");
        worker.start().await?;
    }
    Ok(worker)
}

fn print_response(response: &Response) {
    println!("{} {}", response.status.as_u16(), response.url);
    println!("source: {}", response.source);
    if let Some(location) = response.location() {
        println!("location: {location}");
    }
    println!("bytes: {}", response.body.len());
}

pub async fn install(config: &AppConfig) -> Result<()> {
    let worker = ServiceWorker::new(
        config,
        open_cache(config).await?,
        network(config)?,
        Arc::new(ClientRegistry::new()),
    )?;

    let (installed, activated) = worker.start().await?;
    if let EventOutcome::Installed { cached } = installed {
        println!("installed {} ({cached} assets)", worker.version());
    }
    if let EventOutcome::Activated { deleted, .. } = activated {
        for name in deleted {
            println!("deleted {name}");
        }
    }
    Ok(())
}

pub async fn buckets(config: &AppConfig) -> Result<()> {
    let cache = open_cache(config).await?;
    let buckets = cache.list_buckets().await?;
    if buckets.is_empty() {
        println!("no buckets");
        return Ok(());
    }
    for bucket in buckets {
        let marker = if bucket.name == config.cache_version { "*" } else { " " };
        println!("{marker} {:<24} {:>6} entries  {}", bucket.name, bucket.entries, bucket.created_at);
    }
    Ok(())
}

pub fn classify(config: &AppConfig, input: &str) -> Result<()> {
    let scope = Scope::new(&config.origin)?;
    let url = scope.resolve(input)?;
    let classifier = Classifier::from_config(scope, config);
    println!("{} {}", classifier.classify(&url), url);
    Ok(())
}

pub async fn fetch(config: &AppConfig, input: &str, method: &str) -> Result<()> {
    let clients = ClientRegistry::new();
    let worker = active_worker(config, &clients).await?;
    let url = worker.scope().resolve(input)?;
    let method = method
        .to_ascii_uppercase()
        .parse::<Method>()
        .with_context(|| format!("invalid method {method}"))?;
    let request = Request { method, url };

    match worker.dispatch(WorkerEvent::Fetch(request.clone())).await? {
        EventOutcome::Respond(response) => print_response(&response),
        EventOutcome::PassThrough => {
            println!("not intercepted");
            let response = network(config)?.fetch(&request).await?;
            print_response(&response);
        }
        other => bail!("unexpected outcome for a fetch: {other:?}"),
    }
    Ok(())
}

/// Query fields of a share navigation.
pub struct ShareFields {
    pub text: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
}

impl ShareFields {
    fn to_url(&self, scope: &Scope) -> Url {
        let pairs: Vec<(&str, &str)> = [("text", &self.text), ("title", &self.title), ("url", &self.url)]
            .into_iter()
            .filter_map(|(name, value)| value.as_deref().map(|value| (name, value)))
            .collect();

        let mut url = scope.root().clone();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        url
    }
}

pub async fn share(config: &AppConfig, fields: ShareFields, client: Option<&str>) -> Result<()> {
    let clients = ClientRegistry::new();
    let worker = active_worker(config, &clients).await?;

    let window = match client {
        Some(input) => {
            let url = worker.scope().resolve(input)?;
            Some(clients.open(url, ClientType::Window, true).await)
        }
        None => None,
    };

    let mut url = fields.to_url(worker.scope());
    if url.query().is_none() {
        bail!("nothing to share: pass --text, --title or --url");
    }

    let outcome = worker.dispatch(WorkerEvent::Fetch(Request::get(url.clone()))).await?;
    let EventOutcome::Respond(response) = outcome else {
        bail!("share navigation was not intercepted");
    };
    print_response(&response);

    match window {
        Some(id) => {
            for message in clients.take_messages(&id).await {
                println!("{id} <- {}", serde_json::to_string(&message)?);
            }
            if clients.is_focused(&id).await {
                println!("{id} focused");
            }
        }
        None => {
            // The freshly loaded page picks the fields up from its own URL.
            let mut inbox = ShareInbox::from_startup_url(&mut url);
            if let Some(content) = inbox.take_pending() {
                let message = WorkerMessage::ShareTarget { content };
                println!("page <- {}", serde_json::to_string(&message)?);
            }
            println!("page url: {url}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_fields_to_url() {
        let scope = Scope::new("https://app.test").unwrap();
        let fields = ShareFields { text: Some("a b".into()), title: None, url: Some("http://x".into()) };
        assert_eq!(fields.to_url(&scope).as_str(), "https://app.test/?text=a+b&url=http%3A%2F%2Fx");
    }

    #[test]
    fn test_share_fields_empty() {
        let scope = Scope::new("https://app.test").unwrap();
        let fields = ShareFields { text: None, title: None, url: None };
        assert_eq!(fields.to_url(&scope).query(), None);
    }
}
