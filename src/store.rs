use anyhow::{Context, Result};
use chrono::Utc;
use lru::LruCache;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The document collections this service persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Tweets,
    Users,
    Notifications,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Tweets => "tweet",
            Collection::Users => "user",
            Collection::Notifications => "notification",
        }
    }
}

/// A decoded document plus the row metadata the store owns: the rowid and
/// the creation/update epoch seconds. `created_at` drives feed ordering.
#[derive(Debug, Clone)]
pub struct Stored<T> {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub value: T,
}

#[derive(Clone)]
struct CachedRow {
    collection: &'static str,
    data: String,
    created: i64,
    updated: i64,
}

/// JSON document store over a SQLite pool. One `documents` table holds every
/// collection; payloads are serde_json text and children are found through an
/// indexed `parent_id` lookup. Saves are single-row UPDATEs with no
/// optimistic-concurrency check: the last writer for a document wins.
pub struct DocumentStore {
    pool: SqlitePool,
    cache: Arc<Mutex<LruCache<i64, CachedRow>>>,
}

impl DocumentStore {
    pub async fn new(database_url: &str, cache_capacity: usize) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url: {}", database_url))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self::with_pool(pool, cache_capacity))
    }

    /// Single-connection in-memory store for tests. A second connection would
    /// see a different empty database, so the pool is pinned to one.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let store = Self::with_pool(pool, 64);
        store.init().await?;
        Ok(store)
    }

    fn with_pool(pool: SqlitePool, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        DocumentStore {
            pool,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY,
                collection TEXT NOT NULL,
                data TEXT NOT NULL,
                created INTEGER NOT NULL,
                updated INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection_created
             ON documents(collection, created DESC, id DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_parent
             ON documents(collection, json_extract(data, '$.parent_id'))",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create<T: Serialize>(&self, collection: Collection, value: T) -> Result<Stored<T>> {
        let now = Utc::now().timestamp();
        let data = serde_json::to_string(&value)?;

        let result =
            sqlx::query("INSERT INTO documents (collection, data, created, updated) VALUES (?, ?, ?, ?)")
                .bind(collection.as_str())
                .bind(&data)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await?;

        let id = result.last_insert_rowid();

        self.cache.lock().await.put(
            id,
            CachedRow {
                collection: collection.as_str(),
                data,
                created: now,
                updated: now,
            },
        );

        Ok(Stored {
            id,
            created_at: now,
            updated_at: now,
            value,
        })
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: i64,
    ) -> Result<Option<Stored<T>>> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(row) = cache.get(&id) {
                if row.collection == collection.as_str() {
                    return Ok(Some(decode(id, &row.data, row.created, row.updated)?));
                }
            }
        }

        let row = sqlx::query(
            "SELECT data, created, updated FROM documents WHERE id = ? AND collection = ?",
        )
        .bind(id)
        .bind(collection.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let data: String = row.get("data");
                let created: i64 = row.get("created");
                let updated: i64 = row.get("updated");
                let stored = decode(id, &data, created, updated)?;
                self.cache.lock().await.put(
                    id,
                    CachedRow {
                        collection: collection.as_str(),
                        data,
                        created,
                        updated,
                    },
                );
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }

    /// Overwrite a document, last writer wins. Returns false when the row no
    /// longer exists (a save racing a delete) and nothing was written.
    pub async fn update<T: Serialize>(&self, id: i64, value: &T) -> Result<bool> {
        let now = Utc::now().timestamp();
        let data = serde_json::to_string(value)?;

        let result = sqlx::query("UPDATE documents SET data = ?, updated = ? WHERE id = ?")
            .bind(&data)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.cache.lock().await.pop(&id);

        let written = result.rows_affected() > 0;
        if !written {
            tracing::warn!(id, "update targeted a document that no longer exists");
        }
        Ok(written)
    }

    pub async fn save<T: Serialize>(&self, doc: &Stored<T>) -> Result<bool> {
        self.update(doc.id, &doc.value).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.cache.lock().await.pop(&id);
        Ok(())
    }

    /// Newest-first page of a collection. Rowids are the tiebreak within one
    /// second so insertion order survives coarse timestamps.
    pub async fn list<T: DeserializeOwned>(
        &self,
        collection: Collection,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Stored<T>>> {
        let rows = sqlx::query(
            "SELECT id, data, created, updated FROM documents
             WHERE collection = ?
             ORDER BY created DESC, id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(collection.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                decode(
                    row.get("id"),
                    &row.get::<String, _>("data"),
                    row.get("created"),
                    row.get("updated"),
                )
            })
            .collect()
    }

    pub async fn count(&self, collection: Collection) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(collection.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get(0))
    }

    /// Direct children of a document, in insertion (reply) order.
    pub async fn children<T: DeserializeOwned>(
        &self,
        collection: Collection,
        parent_id: i64,
    ) -> Result<Vec<Stored<T>>> {
        let rows = sqlx::query(
            "SELECT id, data, created, updated FROM documents
             WHERE collection = ? AND json_extract(data, '$.parent_id') = ?
             ORDER BY created ASC, id ASC",
        )
        .bind(collection.as_str())
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                decode(
                    row.get("id"),
                    &row.get::<String, _>("data"),
                    row.get("created"),
                    row.get("updated"),
                )
            })
            .collect()
    }

    pub async fn count_children(&self, collection: Collection, parent_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) FROM documents
             WHERE collection = ? AND json_extract(data, '$.parent_id') = ?",
        )
        .bind(collection.as_str())
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get(0))
    }
}

fn decode<T: DeserializeOwned>(id: i64, data: &str, created: i64, updated: i64) -> Result<Stored<T>> {
    let value = serde_json::from_str(data)
        .with_context(|| format!("corrupt document {} in store", id))?;
    Ok(Stored {
        id,
        created_at: created,
        updated_at: updated,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<i64>,
    }

    fn note(body: &str) -> Note {
        Note {
            body: body.to_string(),
            parent_id: None,
        }
    }

    fn child_of(body: &str, parent: i64) -> Note {
        Note {
            body: body.to_string(),
            parent_id: Some(parent),
        }
    }

    #[tokio::test]
    async fn create_get_update_delete_roundtrip() {
        let store = DocumentStore::in_memory().await.unwrap();

        let created = store.create(Collection::Tweets, note("hello")).await.unwrap();
        let fetched: Stored<Note> = store
            .get(Collection::Tweets, created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.value, created.value);

        // a document is only visible through its own collection
        let wrong: Option<Stored<Note>> = store.get(Collection::Users, created.id).await.unwrap();
        assert!(wrong.is_none());

        store.update(created.id, &note("edited")).await.unwrap();
        let fetched: Stored<Note> = store
            .get(Collection::Tweets, created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.value.body, "edited");

        store.delete(created.id).await.unwrap();
        let gone: Option<Stored<Note>> = store.get(Collection::Tweets, created.id).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn update_reports_whether_a_row_was_written() {
        let store = DocumentStore::in_memory().await.unwrap();
        let doc = store.create(Collection::Tweets, note("hello")).await.unwrap();

        assert!(store.update(doc.id, &note("edited")).await.unwrap());

        store.delete(doc.id).await.unwrap();
        assert!(!store.update(doc.id, &note("too late")).await.unwrap());
        let gone: Option<Stored<Note>> = store.get(Collection::Tweets, doc.id).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first_with_offset() {
        let store = DocumentStore::in_memory().await.unwrap();
        for i in 0..5 {
            store
                .create(Collection::Tweets, note(&format!("t{}", i)))
                .await
                .unwrap();
        }

        let page: Vec<Stored<Note>> = store.list(Collection::Tweets, 2, 1).await.unwrap();
        let bodies: Vec<_> = page.iter().map(|d| d.value.body.as_str()).collect();
        assert_eq!(bodies, vec!["t3", "t2"]);

        assert_eq!(store.count(Collection::Tweets).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn children_are_in_insertion_order() {
        let store = DocumentStore::in_memory().await.unwrap();
        let root = store.create(Collection::Tweets, note("root")).await.unwrap();
        let other = store.create(Collection::Tweets, note("other")).await.unwrap();

        for body in ["first", "second", "third"] {
            store
                .create(Collection::Tweets, child_of(body, root.id))
                .await
                .unwrap();
        }
        store
            .create(Collection::Tweets, child_of("elsewhere", other.id))
            .await
            .unwrap();

        let kids: Vec<Stored<Note>> = store.children(Collection::Tweets, root.id).await.unwrap();
        let bodies: Vec<_> = kids.iter().map(|d| d.value.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
        assert_eq!(
            store.count_children(Collection::Tweets, root.id).await.unwrap(),
            3
        );
        assert_eq!(
            store.count_children(Collection::Tweets, 999).await.unwrap(),
            0
        );
    }
}
