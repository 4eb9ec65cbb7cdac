//! Matcher: exact lookup of live records and root resolution

use recon_common::db::ContactRecord;
use recon_common::{Error, Result};
use std::collections::HashMap;

use super::query::ContactQuery;
use crate::store::ContactTx;

/// A matched record together with the root of its group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMatch {
    pub record: ContactRecord,
    pub root: ContactRecord,
}

/// Live records whose email or phone equals the submitted value, by id
pub async fn find_matches(
    tx: &mut dyn ContactTx,
    query: &ContactQuery,
) -> Result<Vec<ContactRecord>> {
    tx.match_by_email_or_phone(query.email(), query.phone()).await
}

/// Resolve a record to its group root with at most one link hop
///
/// A Primary is its own root. A Secondary must link to a live, unlinked
/// Primary; anything else (missing link, dangling link, link to a
/// Secondary) is an invariant violation and is never followed further.
pub async fn resolve_root(tx: &mut dyn ContactTx, record: &ContactRecord) -> Result<ContactRecord> {
    if record.is_primary() {
        if let Some(linked) = record.linked_id {
            return Err(Error::InvariantViolation(format!(
                "primary {} links to {}",
                record.id, linked
            )));
        }
        return Ok(record.clone());
    }

    let root_id = record.linked_id.ok_or_else(|| {
        Error::InvariantViolation(format!("secondary {} has no linked primary", record.id))
    })?;

    let root = tx.find_by_id(root_id).await?.ok_or_else(|| {
        Error::InvariantViolation(format!(
            "secondary {} links to missing record {}",
            record.id, root_id
        ))
    })?;

    if !root.is_live() {
        return Err(Error::InvariantViolation(format!(
            "secondary {} links to deleted record {}",
            record.id, root_id
        )));
    }
    if !root.is_primary() || root.linked_id.is_some() {
        return Err(Error::InvariantViolation(format!(
            "secondary {} links to secondary {} (multi-hop chain)",
            record.id, root_id
        )));
    }

    Ok(root)
}

/// Resolve every match to its root, fetching each root once
pub async fn resolve_matches(
    tx: &mut dyn ContactTx,
    matches: Vec<ContactRecord>,
) -> Result<Vec<ResolvedMatch>> {
    let mut roots: HashMap<i64, ContactRecord> = HashMap::new();
    let mut resolved = Vec::with_capacity(matches.len());

    for record in matches {
        let cached = if record.is_primary() {
            None
        } else {
            record.linked_id.and_then(|id| roots.get(&id).cloned())
        };
        let root = match cached {
            Some(root) => root,
            None => resolve_root(tx, &record).await?,
        };
        roots.insert(root.id, root.clone());
        resolved.push(ResolvedMatch { record, root });
    }

    Ok(resolved)
}
