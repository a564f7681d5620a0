//! SQLite backend
//!
//! Each table is `(id, data)` rows where `data` is the entity as JSON.
//! Replace-all saves go through a staging table inside one transaction.

use std::path::Path;

use sqlx::Row;
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions};
use tracing::{debug, warn};

use super::Storage;
use super::entities::Persisted;
use crate::error::StorageError;
use crate::ingredient::KindRegistry;

pub struct SqliteStorage {
    pool: SqlitePool,
    prefix: String,
    registry: KindRegistry,
}

impl SqliteStorage {
    /// Connect to (and create if needed) the database file at `path`.
    pub async fn open(path: &Path, prefix: &str) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let url = format!("sqlite:{}?mode=rwc", path.display());
        Self::connect(&url, prefix).await
    }

    pub async fn connect(database_url: &str, prefix: &str) -> Result<Self, StorageError> {
        validate_name(prefix)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        debug!("Connected to sqlite storage at {}", database_url);
        Ok(Self {
            pool,
            prefix: prefix.to_string(),
            registry: KindRegistry::with_builtin(),
        })
    }

    /// Decode ingredient records with `registry` instead of the builtin kinds
    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Full table name with prefix, checked so it can be spliced into SQL.
    fn table_name(&self, table: &str) -> Result<String, StorageError> {
        if table.is_empty() {
            return Err(StorageError::InvalidTableName(table.to_string()));
        }
        validate_name(table)?;
        Ok(format!("{}{}", self.prefix, table))
    }

    fn decode<T: Persisted>(&self, table: &str, id: &str, data: &str) -> Result<T, StorageError> {
        serde_json::from_str(data)
            .map_err(|e| e.to_string())
            .and_then(|row| T::from_row(row, &self.registry))
            .map_err(|reason| StorageError::MalformedRecord {
                table: table.to_string(),
                id: id.to_string(),
                reason,
            })
    }

    /// Steps of a replace-all save. The caller owns commit and rollback.
    async fn replace_all(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        table: &str,
        rows: &[(String, String)],
    ) -> Result<(), StorageError> {
        let staging = format!("{}_staging", table);

        sqlx::query(&format!("DROP TABLE IF EXISTS temp.{}", staging))
            .execute(&mut **tx)
            .await?;
        sqlx::query(&format!(
            "CREATE TEMP TABLE {} (id TEXT PRIMARY KEY, data TEXT NOT NULL)",
            staging
        ))
        .execute(&mut **tx)
        .await?;

        let insert = format!("INSERT OR REPLACE INTO temp.{} (id, data) VALUES (?, ?)", staging);
        for (id, data) in rows {
            sqlx::query(&insert)
                .bind(id)
                .bind(data)
                .execute(&mut **tx)
                .await?;
        }

        sqlx::query(&format!(
            "DELETE FROM {} WHERE id NOT IN (SELECT id FROM temp.{})",
            table, staging
        ))
        .execute(&mut **tx)
        .await?;
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO {} (id, data) SELECT id, data FROM temp.{}",
            table, staging
        ))
        .execute(&mut **tx)
        .await?;
        sqlx::query(&format!("DROP TABLE temp.{}", staging))
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StorageError::InvalidTableName(name.to_string()))
    }
}

impl Storage for SqliteStorage {
    async fn create_table(&self, name: &str, max_id_len: usize) -> Result<(), StorageError> {
        let table = self.table_name(name)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (id VARCHAR({}) PRIMARY KEY, data TEXT NOT NULL)",
            table, max_id_len
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn drop_table(&self, name: &str) -> Result<(), StorageError> {
        let table = self.table_name(name)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_generic<T: Persisted>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<Option<T>, StorageError> {
        let name = self.table_name(table)?;
        let row = sqlx::query(&format!("SELECT data FROM {} WHERE id = ?", name))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let data: String = row.get("data");
                self.decode(table, id, &data).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn get_all_generic<T: Persisted>(&self, table: &str) -> Result<Vec<T>, StorageError> {
        let name = self.table_name(table)?;
        let rows = sqlx::query(&format!("SELECT id, data FROM {}", name))
            .fetch_all(&self.pool)
            .await?;

        let mut loaded = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let data: String = row.get("data");
            match self.decode(table, &id, &data) {
                Ok(entity) => loaded.push(entity),
                Err(e) => warn!("Skipping row: {}", e),
            }
        }
        Ok(loaded)
    }

    async fn save_generic<T: Persisted>(&self, table: &str, entity: &T) -> Result<(), StorageError> {
        let name = self.table_name(table)?;
        let data = serde_json::to_string(entity)?;
        sqlx::query(&format!(
            "INSERT INTO {} (id, data) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            name
        ))
        .bind(entity.id())
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_all_generic<T: Persisted>(
        &self,
        table: &str,
        entities: &[T],
    ) -> Result<(), StorageError> {
        let name = self.table_name(table)?;
        let rows = entities
            .iter()
            .map(|e| Ok((e.id(), serde_json::to_string(e)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;

        let mut tx = self.pool.begin().await?;
        match Self::replace_all(&mut tx, &name, &rows).await {
            Ok(()) => {
                tx.commit().await?;
                debug!("Replaced {} with {} rows", name, rows.len());
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback of {} failed: {}", name, rollback);
                }
                Err(e)
            }
        }
    }

    async fn delete_generic(&self, table: &str, id: &str) -> Result<(), StorageError> {
        let name = self.table_name(table)?;
        sqlx::query(&format!("DELETE FROM {} WHERE id = ?", name))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
