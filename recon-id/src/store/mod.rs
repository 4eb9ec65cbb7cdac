//! Storage interface for the reconciliation engine
//!
//! The engine never touches a pool directly. It opens a [`ContactTx`]
//! through a [`ContactStore`], which holds the advisory locks for the
//! request's identity values until commit or drop. Dropping a transaction
//! without calling [`ContactTx::commit`] discards every write made in it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recon_common::db::{ContactRecord, NewContact};
use recon_common::Result;

pub mod key_locks;
pub mod memory;
pub mod sqlite;

pub use key_locks::KeyLocks;
pub use memory::MemoryContactStore;
pub use sqlite::SqliteContactStore;

#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Open a transaction serialized against every other transaction that
    /// names any of `lock_keys`. May wait; the caller bounds the wait.
    async fn begin(&self, lock_keys: &[String]) -> Result<Box<dyn ContactTx>>;

    /// Number of live records
    async fn count_live(&self) -> Result<i64>;

    /// Live records ordered by id
    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<ContactRecord>>;
}

#[async_trait]
pub trait ContactTx: Send {
    /// Live records whose email equals `email` or whose phone equals
    /// `phone`, ordered by id. An absent value matches nothing.
    async fn match_by_email_or_phone(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<ContactRecord>>;

    /// Record by id, tombstoned or not
    async fn find_by_id(&mut self, id: i64) -> Result<Option<ContactRecord>>;

    /// The root plus every live record linked to it, ordered by id
    async fn list_group(&mut self, root_id: i64) -> Result<Vec<ContactRecord>>;

    async fn insert(&mut self, contact: NewContact) -> Result<ContactRecord>;

    /// Set precedence to Secondary and `linked_id` to `root_id` on every
    /// record in `ids`. Returns the number of rows changed.
    async fn demote_to_secondary(
        &mut self,
        ids: &[i64],
        root_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
