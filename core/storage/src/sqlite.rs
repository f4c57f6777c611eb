//! SQLite-backed item store.
//!
//! One row per item keyed by `(user_id, share_id, item_id)`. Upserts update
//! rows in place so the rowid, and with it the insertion order, is stable.

use async_trait::async_trait;
use rusqlite::{params, types::Type, OptionalExtension, Row};
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use passcore_common::{
    Error, ItemFlags, ItemId, ItemIdentifier, ItemRevision, Result, ShareId, UserId,
};

use crate::item::SymmetricallyEncryptedItem;
use crate::store::LocalItemStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    user_id TEXT NOT NULL,
    share_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    revision_json TEXT NOT NULL,
    encrypted_content TEXT NOT NULL,
    is_pinned INTEGER NOT NULL,
    flags INTEGER NOT NULL,
    last_use_time INTEGER,
    PRIMARY KEY (user_id, share_id, item_id)
);

CREATE INDEX IF NOT EXISTS idx_items_pinned ON items(user_id, is_pinned);
"#;

const SELECT_COLUMNS: &str =
    "user_id, share_id, item_id, revision_json, encrypted_content, is_pinned, flags, last_use_time";

/// Item store persisted in a SQLite database.
///
/// Statements run on the connection's background thread via `call()`.
pub struct SqliteItemStore {
    conn: Connection,
}

impl SqliteItemStore {
    /// Create or open a store database.
    ///
    /// # Errors
    /// - Database creation or schema initialization failure
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref().to_path_buf())
            .await
            .map_err(|e| Error::Storage(format!("Failed to open item store: {e}")))?;
        Self::with_connection(conn).await
    }

    /// Create an in-memory database (for testing).
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Storage(format!("Failed to open item store: {e}")))?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.call(|conn| conn.execute_batch(SCHEMA)).await?;
        info!("Local item store opened");
        Ok(store)
    }

    /// Run a database closure on the connection thread.
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        self.conn
            .call(f)
            .await
            .map_err(|e: tokio_rusqlite::Error<rusqlite::Error>| Error::Storage(e.to_string()))
    }

    async fn query(
        &self,
        user_id: &UserId,
        pinned_only: bool,
    ) -> Result<Vec<SymmetricallyEncryptedItem>> {
        let user_id = user_id.as_str().to_string();
        self.call(move |conn| {
            let sql = if pinned_only {
                format!(
                    "SELECT {SELECT_COLUMNS} FROM items WHERE user_id = ?1 AND is_pinned = 1 ORDER BY rowid"
                )
            } else {
                format!("SELECT {SELECT_COLUMNS} FROM items WHERE user_id = ?1 ORDER BY rowid")
            };
            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map([user_id], row_to_item)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(items)
        })
        .await
    }
}

fn id_from_column<T>(
    row: &Row<'_>,
    index: usize,
    make: fn(String) -> Result<T>,
) -> rusqlite::Result<T> {
    make(row.get(index)?)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<SymmetricallyEncryptedItem> {
    let revision_json: String = row.get(3)?;
    let item: ItemRevision = serde_json::from_str(&revision_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(SymmetricallyEncryptedItem {
        user_id: id_from_column(row, 0, |id| UserId::new(id))?,
        share_id: id_from_column(row, 1, |id| ShareId::new(id))?,
        item_id: id_from_column(row, 2, |id| ItemId::new(id))?,
        item,
        encrypted_content: row.get(4)?,
        is_pinned: row.get::<_, i64>(5)? != 0,
        flags: ItemFlags::from_bits(row.get::<_, u32>(6)?),
        last_use_time: row.get(7)?,
    })
}

#[async_trait]
impl LocalItemStore for SqliteItemStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, items: Vec<SymmetricallyEncryptedItem>) -> Result<()> {
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let revision_json = serde_json::to_string(&item.item)?;
            rows.push((item, revision_json));
        }

        self.call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO items
                    (user_id, share_id, item_id, revision_json, encrypted_content, is_pinned, flags, last_use_time)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(user_id, share_id, item_id) DO UPDATE SET
                        revision_json = excluded.revision_json,
                        encrypted_content = excluded.encrypted_content,
                        is_pinned = excluded.is_pinned,
                        flags = excluded.flags,
                        last_use_time = excluded.last_use_time
                    "#,
                )?;
                for (item, revision_json) in &rows {
                    debug!(share_id = %item.share_id, item_id = %item.item_id, "Upserting item");
                    stmt.execute(params![
                        item.user_id.as_str(),
                        item.share_id.as_str(),
                        item.item_id.as_str(),
                        revision_json,
                        item.encrypted_content,
                        item.is_pinned as i64,
                        item.flags.bits(),
                        item.last_use_time,
                    ])?;
                }
            }
            tx.commit()
        })
        .await
    }

    async fn get_all(&self, user_id: &UserId) -> Result<Vec<SymmetricallyEncryptedItem>> {
        self.query(user_id, false).await
    }

    async fn get_all_pinned(&self, user_id: &UserId) -> Result<Vec<SymmetricallyEncryptedItem>> {
        self.query(user_id, true).await
    }

    async fn get_item(
        &self,
        user_id: &UserId,
        share_id: &ShareId,
        item_id: &ItemId,
    ) -> Result<Option<SymmetricallyEncryptedItem>> {
        let key = (
            user_id.as_str().to_string(),
            share_id.as_str().to_string(),
            item_id.as_str().to_string(),
        );
        self.call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM items WHERE user_id = ?1 AND share_id = ?2 AND item_id = ?3"
                ),
                params![key.0, key.1, key.2],
                row_to_item,
            )
            .optional()
        })
        .await
    }

    async fn delete(&self, user_id: &UserId, items: &[ItemIdentifier]) -> Result<usize> {
        let user_id = user_id.as_str().to_string();
        let items = items.to_vec();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            for item in &items {
                removed += tx.execute(
                    "DELETE FROM items WHERE user_id = ?1 AND share_id = ?2 AND item_id = ?3",
                    params![user_id, item.share_id.as_str(), item.item_id.as_str()],
                )?;
            }
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn delete_share(&self, user_id: &UserId, share_id: &ShareId) -> Result<usize> {
        let user_id = user_id.as_str().to_string();
        let share_id = share_id.as_str().to_string();
        self.call(move |conn| {
            conn.execute(
                "DELETE FROM items WHERE user_id = ?1 AND share_id = ?2",
                params![user_id, share_id],
            )
        })
        .await
    }

    async fn set_pinned(&self, user_id: &UserId, item: &ItemIdentifier, pinned: bool) -> Result<()> {
        let cached = self
            .get_item(user_id, &item.share_id, &item.item_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Item not cached: {}", item)))?;

        let mut revision = cached.item;
        revision.pinned = pinned;
        let revision_json = serde_json::to_string(&revision)?;
        let key = (
            user_id.as_str().to_string(),
            item.share_id.as_str().to_string(),
            item.item_id.as_str().to_string(),
        );

        self.call(move |conn| {
            conn.execute(
                "UPDATE items SET is_pinned = ?4, revision_json = ?5 WHERE user_id = ?1 AND share_id = ?2 AND item_id = ?3",
                params![key.0, key.1, key.2, pinned as i64, revision_json],
            )
        })
        .await?;
        Ok(())
    }
}
