//! Writer: apply one request's inserts and demotions inside its transaction

use chrono::{DateTime, Utc};
use recon_common::db::{ContactRecord, LinkPrecedence, NewContact};
use recon_common::{Error, Result};
use tracing::info;

use super::group::IdentityGroup;
use super::merger::MergePlan;
use super::query::ContactQuery;
use crate::store::ContactTx;

/// Resolved action for one identify request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreatePrimary,
    AppendSecondary(IdentityGroup),
    Unchanged(IdentityGroup),
    Merge(MergePlan),
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreatePrimary => "create_primary",
            Action::AppendSecondary(_) => "append_secondary",
            Action::Unchanged(_) => "unchanged",
            Action::Merge(_) => "merge",
        }
    }
}

fn new_contact(
    query: &ContactQuery,
    precedence: LinkPrecedence,
    linked_id: Option<i64>,
    now: DateTime<Utc>,
) -> NewContact {
    NewContact {
        email: query.email().map(str::to_string),
        phone: query.phone().map(str::to_string),
        linked_id,
        precedence,
        created_at: now,
    }
}

/// Apply `action`, returning the root of the resulting group
///
/// Nothing here commits; a failure leaves the transaction to be dropped.
pub async fn apply(
    tx: &mut dyn ContactTx,
    query: &ContactQuery,
    action: &Action,
    now: DateTime<Utc>,
) -> Result<ContactRecord> {
    match action {
        Action::CreatePrimary => {
            let root = tx
                .insert(new_contact(query, LinkPrecedence::Primary, None, now))
                .await?;
            info!(primary_id = root.id, "Created primary contact");
            Ok(root)
        }
        Action::AppendSecondary(group) => {
            let root = group.root().clone();
            let added = tx
                .insert(new_contact(query, LinkPrecedence::Secondary, Some(root.id), now))
                .await?;
            info!(
                primary_id = root.id,
                secondary_id = added.id,
                "Appended secondary contact"
            );
            Ok(root)
        }
        Action::Unchanged(group) => Ok(group.root().clone()),
        Action::Merge(plan) => {
            let root = plan.survivor.clone();
            let changed = tx
                .demote_to_secondary(&plan.demoted_ids, root.id, now)
                .await?;
            if changed != plan.demoted_ids.len() as u64 {
                return Err(Error::InvariantViolation(format!(
                    "expected to demote {} records into {}, changed {}",
                    plan.demoted_ids.len(),
                    root.id,
                    changed
                )));
            }

            if plan.new_secondary {
                tx.insert(new_contact(query, LinkPrecedence::Secondary, Some(root.id), now))
                    .await?;
            }

            info!(
                primary_id = root.id,
                demoted = ?plan.demoted_ids,
                new_secondary = plan.new_secondary,
                "Merged identity groups"
            );
            Ok(root)
        }
    }
}
