//! Identity reconciliation engine
//!
//! One identify request runs Matcher → Classifier → (create | append |
//! merge) → Writer → ResponseBuilder inside a single store transaction that
//! holds the advisory locks for the submitted values. Nothing is visible to
//! other requests until commit; any error drops the transaction.

use chrono::Utc;
use recon_common::db::ContactRecord;
use recon_common::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::pagination::{calculate_pagination, MAX_PAGE_SIZE};
use crate::store::{ContactStore, ContactTx};

pub mod classifier;
pub mod group;
pub mod matcher;
pub mod merger;
pub mod query;
pub mod response;
pub mod writer;

pub use classifier::{Decision, MatchKind};
pub use group::IdentityGroup;
pub use merger::MergePlan;
pub use query::ContactQuery;
pub use response::ConsolidatedIdentity;
pub use writer::Action;

/// One page of live contact records
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContactPage {
    pub contacts: Vec<ContactRecord>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// Reconciliation service over an explicitly passed store
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn ContactStore>,
    lock_wait: Duration,
}

impl IdentityService {
    pub fn new(store: Arc<dyn ContactStore>, lock_wait: Duration) -> Self {
        Self { store, lock_wait }
    }

    /// Reconcile a submitted pair and return its consolidated identity
    ///
    /// Errors: `Conflict` when the lock wait expires (retryable), `Database`
    /// on storage failure, `InvariantViolation` on corrupt link structure.
    pub async fn identify(&self, query: &ContactQuery) -> Result<ConsolidatedIdentity> {
        let lock_keys = query.lock_keys();

        let tx = match tokio::time::timeout(self.lock_wait, self.store.begin(&lock_keys)).await {
            Ok(tx) => tx?,
            Err(_) => {
                warn!(
                    keys = ?lock_keys,
                    wait_ms = self.lock_wait.as_millis() as u64,
                    "Lock wait expired"
                );
                return Err(Error::Conflict(format!(
                    "lock wait of {} ms expired for {}",
                    self.lock_wait.as_millis(),
                    lock_keys.join(", ")
                )));
            }
        };

        let result = reconcile(tx, query).await;
        match &result {
            Err(Error::InvariantViolation(msg)) => {
                error!(keys = ?lock_keys, "Invariant violation, nothing written: {}", msg)
            }
            Err(Error::Conflict(msg)) => warn!(keys = ?lock_keys, "Conflict: {}", msg),
            _ => {}
        }
        result
    }

    /// Page of live records ordered by id; pure read
    pub async fn list_contacts(&self, page: i64, limit: i64) -> Result<ContactPage> {
        if page < 1 {
            return Err(Error::Validation(format!("page must be at least 1, got {}", page)));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(Error::Validation(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, limit
            )));
        }

        let total = self.store.count_live().await?;
        let pagination = calculate_pagination(total, page, limit);
        let contacts = self.store.list_page(pagination.offset, limit).await?;

        Ok(ContactPage {
            contacts,
            total,
            page: pagination.page,
            limit,
            total_pages: pagination.total_pages,
        })
    }
}

/// Detect, write and read back under the already-held transaction
async fn reconcile(mut tx: Box<dyn ContactTx>, query: &ContactQuery) -> Result<ConsolidatedIdentity> {
    let now = Utc::now();

    let action = decide(tx.as_mut(), query).await?;
    let root = writer::apply(tx.as_mut(), query, &action, now).await?;
    let group = group::load_group(tx.as_mut(), &root).await?;
    let identity = ConsolidatedIdentity::from(&group);

    tx.commit().await?;

    debug!(
        primary_id = identity.primary_id,
        action = action.as_str(),
        secondaries = identity.secondary_ids.len(),
        "Identify committed"
    );
    Ok(identity)
}

async fn decide(tx: &mut dyn ContactTx, query: &ContactQuery) -> Result<Action> {
    let matches = matcher::find_matches(tx, query).await?;
    let kind = MatchKind::of(&matches);
    debug!(matched = matches.len(), kind = kind.as_str(), "Matched contacts");

    let resolved = matcher::resolve_matches(tx, matches).await?;

    match classifier::classify(query, &resolved)? {
        Decision::CreatePrimary => Ok(Action::CreatePrimary),
        Decision::Extend(root) => {
            let group = group::load_group(tx, &root).await?;
            if classifier::needs_secondary(query, &group) {
                Ok(Action::AppendSecondary(group))
            } else {
                Ok(Action::Unchanged(group))
            }
        }
        Decision::Merge(roots) => {
            let mut groups = Vec::with_capacity(roots.len());
            for root in &roots {
                groups.push(group::load_group(tx, root).await?);
            }
            let plan = merger::plan_merge(query, &groups)?;
            info!(
                survivor = plan.survivor.id,
                groups = groups.len(),
                "Merging identity groups"
            );
            Ok(Action::Merge(plan))
        }
    }
}
