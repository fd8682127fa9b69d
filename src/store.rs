use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

use crate::config::DatabaseConfig;
use crate::models::{NewProduct, NotificationRecord, Product};

/// Failure modes of store operations, switched on explicitly by callers.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("product with url '{url}' already exists")]
    DuplicateUrl { url: String },

    #[error("product {id} not found")]
    NotFound { id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Typed access to the products and notifications tables.
///
/// Cheap to clone; all clones share one connection pool. Conflicting writes
/// to the same row are serialized by SQLite's single-writer model.
#[derive(Clone)]
pub struct ProductStore {
    pool: SqlitePool,
}

impl ProductStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store, handy for tests and dry runs. A single connection is
    /// used so every caller sees the same database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                selector TEXT NOT NULL,
                expected_text TEXT NOT NULL,
                email TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_checked TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL REFERENCES products(id),
                notification_type TEXT NOT NULL,
                message TEXT NOT NULL,
                sent_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a new product, active and never checked. Fails with
    /// [`StoreError::DuplicateUrl`] when the url is already monitored.
    pub async fn insert(&self, new: &NewProduct) -> Result<Product, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO products (name, url, selector, expected_text, email, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&new.name)
        .bind(&new.url)
        .bind(&new.selector)
        .bind(&new.expected_text)
        .bind(&new.email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_unique_violation(e, &new.url))?;

        self.get(result.last_insert_rowid()).await
    }

    fn map_unique_violation(error: sqlx::Error, url: &str) -> StoreError {
        if let sqlx::Error::Database(db) = &error {
            if db.kind() == ErrorKind::UniqueViolation {
                return StoreError::DuplicateUrl {
                    url: url.to_string(),
                };
            }
        }
        StoreError::Database(error)
    }

    pub async fn get(&self, id: i64) -> Result<Product, StoreError> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound { id })
    }

    /// Snapshot of products eligible for checking, in insertion order.
    pub async fn list_active(&self) -> Result<Vec<Product>, StoreError> {
        let products =
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE is_active = 1 ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(products)
    }

    pub async fn list_all(&self) -> Result<Vec<Product>, StoreError> {
        let products =
            sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(products)
    }

    pub async fn update_last_checked(
        &self,
        id: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET last_checked = ? WHERE id = ?")
            .bind(timestamp)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    /// Permanently stop monitoring a product. Idempotent on already-inactive
    /// rows.
    pub async fn deactivate(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { id });
        }
        Ok(())
    }

    pub async fn append_notification(
        &self,
        product_id: i64,
        notification_type: &str,
        message: &str,
    ) -> Result<NotificationRecord, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (product_id, notification_type, message, sent_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(product_id)
        .bind(notification_type)
        .bind(message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let record = sqlx::query_as::<_, NotificationRecord>(
            "SELECT * FROM notifications WHERE id = ?",
        )
        .bind(result.last_insert_rowid())
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn count_notifications(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
