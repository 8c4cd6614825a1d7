//! Partition and entry CRUD operations.
//!
//! Raw storage operations; policy (what may be stored, error swallowing)
//! lives in [`super::store`].

use std::collections::BTreeMap;

use super::connection::CacheDb;
use super::partitions::PartitionClass;
use crate::Error;
use crate::http::Response;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, params_from_iter};

/// A stored response snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub partition: String,
    pub key: String,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers_json: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl StoredEntry {
    /// Capture a response for storage under `partition`.
    pub fn capture(partition: &str, key: &str, url: &str, response: &Response) -> Result<Self, Error> {
        Ok(Self {
            partition: partition.to_string(),
            key: key.to_string(),
            url: url.to_string(),
            status: response.status,
            content_type: response.content_type().map(str::to_string),
            headers_json: Some(serde_json::to_string(&response.headers)?),
            body: response.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Rebuild the response this entry was captured from.
    pub fn into_response(self) -> Result<Response, Error> {
        let mut headers: BTreeMap<String, String> = match self.headers_json.as_deref() {
            Some(json) => serde_json::from_str(json)?,
            None => BTreeMap::new(),
        };
        if let Some(content_type) = self.content_type {
            headers.entry("content-type".into()).or_insert(content_type);
        }
        Ok(Response { status: self.status, headers, body: self.body.into(), url: Some(self.url) })
    }
}

const ENTRY_COLUMNS: &str = "partition, key, url, status, content_type, headers_json, body, stored_at";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredEntry> {
    Ok(StoredEntry {
        partition: row.get(0)?,
        key: row.get(1)?,
        url: row.get(2)?,
        status: row.get(3)?,
        content_type: row.get(4)?,
        headers_json: row.get(5)?,
        body: row.get(6)?,
        stored_at: row.get(7)?,
    })
}

impl CacheDb {
    /// Create a partition if it does not exist yet.
    pub async fn ensure_partition(&self, name: &str, class: PartitionClass, generation: &str) -> Result<(), Error> {
        let name = name.to_string();
        let class = class.as_str();
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, class, generation, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![name, class, generation, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite an entry. The partition must exist.
    pub async fn upsert_entry(&self, entry: &StoredEntry) -> Result<(), Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (
                    partition, key, url, status, content_type, headers_json, body, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(partition, key) DO UPDATE SET
                    url = excluded.url,
                    status = excluded.status,
                    content_type = excluded.content_type,
                    headers_json = excluded.headers_json,
                    body = excluded.body,
                    stored_at = excluded.stored_at",
                    params![
                        &entry.partition,
                        &entry.key,
                        &entry.url,
                        entry.status,
                        &entry.content_type,
                        &entry.headers_json,
                        &entry.body,
                        &entry.stored_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry by partition and key.
    pub async fn get_entry(&self, partition: &str, key: &str) -> Result<Option<StoredEntry>, Error> {
        let partition = partition.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE partition = ?1 AND key = ?2");
                let result = conn.query_row(&sql, params![partition, key], entry_from_row);
                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Find the most recently stored entry for `key` in any of `partitions`.
    pub async fn find_entry_any(&self, partitions: &[String], key: &str) -> Result<Option<StoredEntry>, Error> {
        if partitions.is_empty() {
            return Ok(None);
        }
        let mut values = Vec::with_capacity(partitions.len() + 1);
        values.push(key.to_string());
        values.extend(partitions.iter().cloned());
        self.conn
            .call(move |conn| -> Result<Option<StoredEntry>, Error> {
                let placeholders = (2..=values.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
                let sql = format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries
                     WHERE key = ?1 AND partition IN ({placeholders})
                     ORDER BY stored_at DESC LIMIT 1"
                );
                let result = conn.query_row(&sql, params_from_iter(values.iter()), entry_from_row);
                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all partitions, oldest first.
    pub async fn list_partitions(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every partition (and its entries) whose name is not in `keep`.
    ///
    /// Returns the number of deleted partitions.
    pub async fn delete_partitions_except(&self, keep: &[String]) -> Result<u64, Error> {
        let stale: Vec<String> = self
            .list_partitions()
            .await?
            .into_iter()
            .filter(|name| !keep.contains(name))
            .collect();
        if stale.is_empty() {
            return Ok(0);
        }
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let mut deleted = 0u64;
                for name in &stale {
                    deleted += conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])? as u64;
                }
                Ok(deleted)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries stored in a partition.
    pub async fn count_entries(&self, partition: &str) -> Result<u64, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
