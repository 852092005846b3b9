//! Install and activate steps of the worker lifecycle.

use futures::future::try_join_all;

use crate::fetch::{Network, Request, Scope};
use honyaku_core::{CacheDb, Error};

/// Fetch every static asset and store them all in `bucket`.
///
/// All fetches complete before anything is written; a single network
/// failure or non-success status fails the install and leaves the store
/// untouched.
pub async fn install(
    cache: &CacheDb, network: &dyn Network, scope: &Scope, bucket: &str, assets: &[String],
) -> Result<usize, Error> {
    let requests = assets
        .iter()
        .map(|path| -> Result<Request, Error> {
            let url = scope.resolve(path).map_err(|e| Error::InstallFailed(format!("{path}: {e}")))?;
            if !scope.is_same_origin(&url) {
                return Err(Error::InstallFailed(format!("{path}: resolves outside {}", scope.root())));
            }
            Ok(Request::get(url))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let responses = try_join_all(requests.iter().map(|request| async move {
        let response = network
            .fetch(request)
            .await
            .map_err(|e| Error::InstallFailed(format!("{}: {e}", request.url.path())))?;
        if !response.status.is_success() {
            return Err(Error::InstallFailed(format!(
                "{}: status {}",
                request.url.path(),
                response.status.as_u16()
            )));
        }
        Ok(response.to_cached(request))
    }))
    .await?;

    let stored = cache.store_all(bucket, responses).await?;
    tracing::info!(bucket, stored, "installed static assets");
    Ok(stored)
}

/// Delete every bucket except `current`. Returns the deleted names.
pub async fn activate(cache: &CacheDb, current: &str) -> Result<Vec<String>, Error> {
    let mut deleted = Vec::new();
    for name in cache.bucket_names().await? {
        if name != current && cache.delete_bucket(&name).await? {
            tracing::info!(bucket = %name, "deleted stale cache bucket");
            deleted.push(name);
        }
    }
    Ok(deleted)
}
