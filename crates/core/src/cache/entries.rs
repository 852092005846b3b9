//! Cached response entries.
//!
//! Entries are scoped to a bucket and addressed by request key. Writing an
//! entry into a bucket that does not exist yet creates the bucket, mirroring
//! the open-then-put behavior of a browser cache.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CachedResponse {
    /// Build an entry for `method url`, stamping the key and storage time.
    pub fn new(method: &str, url: &str, status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        let method = method.to_ascii_uppercase();
        Self {
            key_hash: compute_request_key(&method, url),
            method,
            url: url.to_string(),
            status,
            headers,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type EntryRow = (String, String, String, u16, String, Vec<u8>, String);

fn decode(row: EntryRow) -> Result<CachedResponse, Error> {
    let (key_hash, method, url, status, headers_json, body, stored_at) = row;
    let headers = serde_json::from_str(&headers_json)?;
    Ok(CachedResponse { key_hash, method, url, status, headers, body, stored_at })
}

pub(crate) fn insert_entry(conn: &rusqlite::Connection, bucket: &str, entry: &CachedResponse) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&entry.headers)?;
    conn.execute(
        "INSERT INTO entries (bucket, key_hash, method, url, status, headers_json, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(bucket, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            bucket,
            &entry.key_hash,
            &entry.method,
            &entry.url,
            entry.status,
            headers_json,
            &entry.body,
            &entry.stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Insert or replace an entry in `bucket`, creating the bucket if needed.
    pub async fn put_entry(&self, bucket: &str, entry: &CachedResponse) -> Result<(), Error> {
        let bucket = bucket.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                super::buckets::ensure_bucket(&tx, &bucket)?;
                insert_entry(&tx, &bucket, &entry)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by request key in `bucket`.
    ///
    /// Returns None on a miss, including when the bucket does not exist.
    pub async fn match_entry(&self, bucket: &str, key_hash: &str) -> Result<Option<CachedResponse>, Error> {
        let bucket = bucket.to_string();
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key_hash, method, url, status, headers_json, body, stored_at
                     FROM entries WHERE bucket = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![bucket, key_hash], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?))
                });

                match result {
                    Ok(row) => decode(row).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in `bucket`.
    pub async fn entry_count(&self, bucket: &str) -> Result<u64, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE bucket = ?1",
                    params![bucket],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
