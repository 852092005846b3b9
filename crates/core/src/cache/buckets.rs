//! Bucket lifecycle: create, enumerate, delete, bulk-populate.

use super::connection::CacheDb;
use super::entries::{CachedResponse, insert_entry};
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Summary of one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
}

/// Create `name` if absent. Returns true when the bucket was created.
pub(crate) fn ensure_bucket(conn: &rusqlite::Connection, name: &str) -> Result<bool, Error> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(inserted == 1)
}

impl CacheDb {
    /// Open (create-if-absent) a bucket. Returns true when it was created.
    pub async fn open_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> { ensure_bucket(conn, &name) })
            .await
            .map_err(Error::from)
    }

    /// Whether a bucket with this name exists.
    pub async fn has_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// All bucket names, oldest first.
    pub async fn bucket_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// All buckets with their entry counts, oldest first.
    pub async fn list_buckets(&self) -> Result<Vec<BucketInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<BucketInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT b.name, b.created_at, COUNT(e.key_hash)
                     FROM buckets b LEFT JOIN entries e ON e.bucket = b.name
                     GROUP BY b.name, b.created_at
                     ORDER BY b.created_at ASC, b.name ASC",
                )?;
                let buckets = stmt
                    .query_map([], |row| {
                        Ok(BucketInfo {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(buckets)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a bucket and all of its entries. Returns whether it existed.
    pub async fn delete_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Populate a bucket with a batch of entries in one transaction.
    ///
    /// The bucket is created inside the same transaction, so either every
    /// entry lands or the store is left exactly as it was.
    pub async fn store_all(&self, bucket: &str, entries: Vec<CachedResponse>) -> Result<usize, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                ensure_bucket(&tx, &bucket)?;
                for entry in &entries {
                    insert_entry(&tx, &bucket, entry)?;
                }
                tx.commit()?;
                Ok(entries.len())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(url: &str) -> CachedResponse {
        CachedResponse::new("GET", url, 200, Vec::new(), url.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_open_bucket_create_if_absent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.open_bucket("v1").await.unwrap());
        assert!(!db.open_bucket("v1").await.unwrap());
        assert_eq!(db.bucket_names().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_bucket_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_entry("https://app.test/");
        db.put_entry("v1", &entry).await.unwrap();

        assert!(db.delete_bucket("v1").await.unwrap());
        assert!(!db.has_bucket("v1").await.unwrap());
        assert!(db.match_entry("v1", &entry.key_hash).await.unwrap().is_none());
        assert_eq!(db.entry_count("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_bucket() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(!db.delete_bucket("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_all() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let stored = db
            .store_all("v2", vec![make_entry("https://app.test/"), make_entry("https://app.test/index.html")])
            .await
            .unwrap();

        assert_eq!(stored, 2);
        let buckets = db.list_buckets().await.unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].name, "v2");
        assert_eq!(buckets[0].entries, 2);
    }

    #[tokio::test]
    async fn test_list_buckets_includes_empty() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_bucket("empty").await.unwrap();
        let buckets = db.list_buckets().await.unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].entries, 0);
    }
}
