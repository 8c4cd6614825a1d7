//! Cache store manager.
//!
//! Maps partition classes to the current generation's partition names and
//! wraps the raw storage operations with the cache policy's rules:
//!
//! - reads never fail; a storage error is logged and reported as a miss
//! - writes are best-effort; only `GET` requests over `http`/`https` with a
//!   `200` response are stored, everything else is dropped silently
//! - concurrent writes to one key are last-write-wins

use super::connection::CacheDb;
use super::entries::StoredEntry;
use super::hash::compute_request_key;
use super::partitions::{CacheNames, CachePartition, PartitionClass};
use crate::Error;
use crate::http::{Request, Response, is_cacheable_scheme};

/// Generation-aware front end over [`CacheDb`].
#[derive(Clone, Debug)]
pub struct CacheStore {
    db: CacheDb,
    names: CacheNames,
}

impl CacheStore {
    pub fn new(db: CacheDb, names: CacheNames) -> Self {
        Self { db, names }
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Open the current generation's partition for `class`, creating it if absent.
    pub async fn open(&self, class: PartitionClass) -> Result<CachePartition, Error> {
        let name = self.names.name(class);
        self.db.ensure_partition(&name, class, self.names.generation()).await?;
        Ok(CachePartition { name, class })
    }

    /// Look up a stored response for `request` in one partition.
    pub async fn match_request(&self, partition: &CachePartition, request: &Request) -> Option<Response> {
        let key = request_key(request);
        match self.db.get_entry(&partition.name, &key).await {
            Ok(Some(entry)) => decode(entry),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(partition = %partition.name, url = %request.url, "cache read failed: {e}");
                None
            }
        }
    }

    /// Look up a stored response for `request` in every current partition.
    pub async fn match_any(&self, request: &Request) -> Option<Response> {
        let key = request_key(request);
        match self.db.find_entry_any(&self.names.all(), &key).await {
            Ok(Some(entry)) => decode(entry),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(url = %request.url, "cache read failed: {e}");
                None
            }
        }
    }

    /// Store `response` for `request`, best-effort.
    ///
    /// Returns whether the entry was written.
    pub async fn put(&self, partition: &CachePartition, request: &Request, response: &Response) -> bool {
        if !request.is_get() || !is_cacheable_scheme(&request.url) {
            tracing::debug!(method = %request.method, url = %request.url, "skipping non-cacheable request");
            return false;
        }
        if !response.is_ok() {
            tracing::debug!(status = response.status, url = %request.url, "skipping non-200 response");
            return false;
        }

        let key = request_key(request);
        let url = request.url.as_str();
        let entry = match StoredEntry::capture(&partition.name, &key, url, response) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(url, "cache capture failed: {e}");
                return false;
            }
        };

        match self.db.upsert_entry(&entry).await {
            Ok(()) => {
                tracing::debug!(partition = %partition.name, url, "cached response");
                true
            }
            Err(e) => {
                tracing::warn!(partition = %partition.name, url, "cache write failed: {e}");
                false
            }
        }
    }

    /// Delete every partition whose name is not in `current`.
    ///
    /// Returns the number of deleted partitions.
    pub async fn delete_stale_generations(&self, current: &[String]) -> Result<u64, Error> {
        let deleted = self.db.delete_partitions_except(current).await?;
        if deleted > 0 {
            tracing::info!(deleted, generation = self.names.generation(), "deleted stale cache partitions");
        }
        Ok(deleted)
    }

    /// Names of every partition currently stored.
    pub async fn partition_names(&self) -> Result<Vec<String>, Error> {
        self.db.list_partitions().await
    }
}

/// Fragments never reach the network, so they are not part of the key.
fn request_key(request: &Request) -> String {
    let mut url = request.url.clone();
    url.set_fragment(None);
    compute_request_key(&request.method, url.as_str())
}

fn decode(entry: StoredEntry) -> Option<Response> {
    let url = entry.url.clone();
    match entry.into_response() {
        Ok(response) => Some(response),
        Err(e) => {
            tracing::warn!(url = %url, "dropping undecodable cache entry: {e}");
            None
        }
    }
}
