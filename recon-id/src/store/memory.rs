//! In-memory contact store
//!
//! Used to exercise the engine without a database. `begin` takes the
//! per-key locks for the request, so only transactions naming a common key
//! wait on each other. Reads see committed rows plus the transaction's own
//! pending writes. `commit` replays the pending writes onto the committed
//! rows under a short state lock, after checking that every row this
//! transaction demoted is unchanged and that the replay breaks no live
//! row's one-hop link to a Primary; otherwise it fails with `Error::Conflict` and
//! nothing is published. Dropping the transaction discards it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recon_common::db::{ContactRecord, LinkPrecedence, NewContact};
use recon_common::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::key_locks::{KeyGuards, KeyLocks};
use super::{ContactStore, ContactTx};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    rows: Vec<ContactRecord>,
    next_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryContactStore {
    state: Arc<Mutex<MemoryState>>,
    locks: KeyLocks,
    fail_on_write: Option<usize>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing rows; new ids continue after the largest
    pub fn with_records(mut records: Vec<ContactRecord>) -> Self {
        records.sort_by_key(|r| r.id);
        let next_id = records.last().map(|r| r.id).unwrap_or(0);
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                rows: records,
                next_id,
            })),
            locks: KeyLocks::new(),
            fail_on_write: None,
        }
    }

    /// Make the `n`th write (1-based) of every transaction fail with a
    /// storage error
    pub fn failing_on_write(mut self, n: usize) -> Self {
        self.fail_on_write = Some(n);
        self
    }

    /// Committed rows, ordered by id
    pub async fn snapshot(&self) -> Vec<ContactRecord> {
        self.state.lock().await.rows.clone()
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn begin(&self, lock_keys: &[String]) -> Result<Box<dyn ContactTx>> {
        let guards = self.locks.acquire(lock_keys).await;
        Ok(Box::new(MemoryContactTx {
            state: self.state.clone(),
            _guards: guards,
            pending: Vec::new(),
            observed: Vec::new(),
            writes: 0,
            fail_on_write: self.fail_on_write,
        }))
    }

    async fn count_live(&self) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state.rows.iter().filter(|r| r.is_live()).count() as i64)
    }

    async fn list_page(&self, offset: i64, limit: i64) -> Result<Vec<ContactRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .iter()
            .filter(|r| r.is_live())
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
enum PendingWrite {
    Insert(ContactRecord),
    Demote {
        ids: Vec<i64>,
        root_id: i64,
        at: DateTime<Utc>,
    },
}

impl PendingWrite {
    /// Apply to `rows`, returning the number of rows changed
    fn apply(&self, rows: &mut Vec<ContactRecord>) -> u64 {
        match self {
            PendingWrite::Insert(record) => {
                rows.push(record.clone());
                1
            }
            PendingWrite::Demote { ids, root_id, at } => {
                let mut changed = 0;
                for row in rows.iter_mut().filter(|r| r.is_live() && ids.contains(&r.id)) {
                    row.precedence = LinkPrecedence::Secondary;
                    row.linked_id = Some(*root_id);
                    row.updated_at = *at;
                    changed += 1;
                }
                changed
            }
        }
    }

    fn touched(&self) -> Vec<i64> {
        match self {
            PendingWrite::Insert(record) => vec![record.id],
            PendingWrite::Demote { ids, .. } => ids.clone(),
        }
    }
}

pub struct MemoryContactTx {
    state: Arc<Mutex<MemoryState>>,
    _guards: KeyGuards,
    pending: Vec<PendingWrite>,
    /// Committed rows as they were when this transaction demoted them
    observed: Vec<ContactRecord>,
    writes: usize,
    fail_on_write: Option<usize>,
}

impl MemoryContactTx {
    fn record_write(&mut self) -> Result<()> {
        self.writes += 1;
        if self.fail_on_write == Some(self.writes) {
            return Err(sqlx::Error::Protocol(format!("injected failure on write {}", self.writes)).into());
        }
        Ok(())
    }

    /// Committed rows with this transaction's pending writes applied
    async fn view(&self) -> Vec<ContactRecord> {
        let mut rows = self.state.lock().await.rows.clone();
        for write in &self.pending {
            write.apply(&mut rows);
        }
        rows
    }
}

/// Live rows that are neither unlinked Primaries nor one-hop Secondaries
fn broken_links(rows: &[ContactRecord]) -> HashSet<i64> {
    let primaries: HashSet<i64> = rows
        .iter()
        .filter(|r| r.is_live() && r.is_primary() && r.linked_id.is_none())
        .map(|r| r.id)
        .collect();

    rows.iter()
        .filter(|r| r.is_live())
        .filter(|r| match (r.precedence, r.linked_id) {
            (LinkPrecedence::Primary, None) => false,
            (LinkPrecedence::Secondary, Some(root_id)) => !primaries.contains(&root_id),
            _ => true,
        })
        .map(|r| r.id)
        .collect()
}

#[async_trait]
impl ContactTx for MemoryContactTx {
    async fn match_by_email_or_phone(
        &mut self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<ContactRecord>> {
        let mut rows: Vec<ContactRecord> = self
            .view()
            .await
            .into_iter()
            .filter(|r| r.is_live())
            .filter(|r| {
                let email_hit = email.is_some() && r.email.as_deref() == email;
                let phone_hit = phone.is_some() && r.phone.as_deref() == phone;
                email_hit || phone_hit
            })
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn find_by_id(&mut self, id: i64) -> Result<Option<ContactRecord>> {
        Ok(self.view().await.into_iter().find(|r| r.id == id))
    }

    async fn list_group(&mut self, root_id: i64) -> Result<Vec<ContactRecord>> {
        let mut rows: Vec<ContactRecord> = self
            .view()
            .await
            .into_iter()
            .filter(|r| r.is_live() && (r.id == root_id || r.linked_id == Some(root_id)))
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn insert(&mut self, contact: NewContact) -> Result<ContactRecord> {
        self.record_write()?;

        // Ids are never reused, even when the transaction rolls back
        let id = {
            let mut state = self.state.lock().await;
            state.next_id += 1;
            state.next_id
        };

        let record = contact.into_record(id);
        self.pending.push(PendingWrite::Insert(record.clone()));
        Ok(record)
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
        self.record_write()?;

        let mut rows = self.view().await;
        let own: Vec<i64> = self.pending.iter().flat_map(PendingWrite::touched).collect();
        self.observed.extend(
            rows.iter()
                .filter(|r| ids.contains(&r.id) && !own.contains(&r.id))
                .cloned(),
        );

        let write = PendingWrite::Demote {
            ids: ids.to_vec(),
            root_id,
            at,
        };
        let changed = write.apply(&mut rows);
        self.pending.push(write);
        Ok(changed)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut state = self.state.lock().await;

        for seen in &self.observed {
            if state.rows.iter().find(|r| r.id == seen.id) != Some(seen) {
                return Err(Error::Conflict(format!(
                    "record {} changed by a concurrent transaction",
                    seen.id
                )));
            }
        }

        let mut rows = state.rows.clone();
        for write in &self.pending {
            write.apply(&mut rows);
        }

        let already_broken = broken_links(&state.rows);
        if let Some(id) = broken_links(&rows).difference(&already_broken).next() {
            return Err(Error::Conflict(format!(
                "record {} would link to a root demoted by a concurrent transaction",
                id
            )));
        }

        rows.sort_by_key(|r| r.id);
        state.rows = rows;
        Ok(())
    }
}
