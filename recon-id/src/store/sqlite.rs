//! SQLite-backed contact store
//!
//! Serialization: the first statements of every identify transaction upsert
//! one `identity_locks` row per lock key. That write takes SQLite's
//! database-wide write lock before the match reads run, so the reads and
//! the writes of one request form a single serialized unit; a deferred
//! transaction that read first would instead fail its later write with
//! `SQLITE_BUSY_SNAPSHOT` without waiting. The table holds one row per
//! distinct email or phone ever submitted and records when each was last
//! locked.
//!
//! SQLite admits one writer at a time, so transactions on disjoint keys
//! also queue behind each other for the length of one identify. SQLite's
//! busy timeout (set on every pooled connection) bounds the wait; expiry
//! surfaces as `Error::Conflict` through `From<sqlx::Error>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use recon_common::db::{ContactRecord, NewContact, CONTACT_COLUMNS};
use recon_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::time::Instant;
use tracing::debug;

use super::{ContactStore, ContactTx};

const LOCK_UPSERT: &str = "INSERT INTO identity_locks (lock_key, touched_at) VALUES (?, ?)
     ON CONFLICT(lock_key) DO UPDATE SET touched_at = excluded.touched_at";

static SELECT_MATCHES: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {} FROM contacts
         WHERE deleted_at IS NULL AND (email = ? OR phone_number = ?)
         ORDER BY id",
        CONTACT_COLUMNS
    )
});

static SELECT_BY_ID: Lazy<String> =
    Lazy::new(|| format!("SELECT {} FROM contacts WHERE id = ?", CONTACT_COLUMNS));

static SELECT_GROUP: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {} FROM contacts
         WHERE deleted_at IS NULL AND (id = ? OR linked_id = ?)
         ORDER BY id",
        CONTACT_COLUMNS
    )
});

static SELECT_PAGE: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {} FROM contacts
         WHERE deleted_at IS NULL
         ORDER BY id
         LIMIT ? OFFSET ?",
        CONTACT_COLUMNS
    )
});

/// Contact store over a SQLite connection pool
#[derive(Clone)]
pub struct SqliteContactStore {
    pool: SqlitePool,
}

impl SqliteContactStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ContactStore for SqliteContactStore {
    async fn begin(&self, lock_keys: &[String]) -> Result<Box<dyn ContactTx>> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        for key in lock_keys {
            sqlx::query(LOCK_UPSERT)
                .bind(key)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        debug!(
            keys = ?lock_keys,
            wait_ms = start.elapsed().as_millis() as u64,
            "Identity locks acquired"
        );

        Ok(Box::new(SqliteContactTx { tx }))
    }

    async fn count_live(&self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<ContactRecord>> {
        let rows = sqlx::query_as::<_, ContactRecord>(SELECT_PAGE.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

/// Open SQLite transaction; rolls back when dropped uncommitted
pub struct SqliteContactTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl ContactTx for SqliteContactTx {
    async fn match_by_email_or_phone(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<ContactRecord>> {
        // NULL never compares equal, so an absent value matches nothing
        let rows = sqlx::query_as::<_, ContactRecord>(SELECT_MATCHES.as_str())
            .bind(email)
            .bind(phone)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn find_by_id(&mut self, id: i64) -> Result<Option<ContactRecord>> {
        let row = sqlx::query_as::<_, ContactRecord>(SELECT_BY_ID.as_str())
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn list_group(&mut self, root_id: i64) -> Result<Vec<ContactRecord>> {
        let rows = sqlx::query_as::<_, ContactRecord>(SELECT_GROUP.as_str())
            .bind(root_id)
            .bind(root_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn insert(&mut self, contact: NewContact) -> Result<ContactRecord> {
        let result = sqlx::query(
            "INSERT INTO contacts (email, phone_number, linked_id, link_precedence, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(contact.email.as_deref())
        .bind(contact.phone.as_deref())
        .bind(contact.linked_id)
        .bind(contact.precedence.as_str())
        .bind(contact.created_at)
        .bind(contact.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(contact.into_record(result.last_insert_rowid()))
    }

    async fn demote_to_secondary(
        &mut self,
        ids: &[i64],
        root_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "UPDATE contacts SET link_precedence = 'secondary', linked_id = ",
        );
        builder.push_bind(root_id);
        builder.push(", updated_at = ");
        builder.push_bind(at);
        builder.push(" WHERE deleted_at IS NULL AND id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
