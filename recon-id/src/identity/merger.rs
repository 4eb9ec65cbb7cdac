//! Merger: collapse several groups under the oldest root
//!
//! Pure planning over groups already loaded under the lock. The Writer
//! commits the resulting plan.

use recon_common::db::ContactRecord;
use recon_common::{Error, Result};

use super::group::IdentityGroup;
use super::query::ContactQuery;

/// Complete new state for a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    /// Root that stays Primary
    pub survivor: ContactRecord,
    /// Every record of the absorbed groups (their roots included), ascending
    pub demoted_ids: Vec<i64>,
    /// Whether the submission carries a value absent from all merged groups
    pub new_secondary: bool,
}

/// Earliest-created root; lowest id on equal timestamps
pub fn pick_survivor<'a, I>(roots: I) -> Option<&'a ContactRecord>
where
    I: IntoIterator<Item = &'a ContactRecord>,
{
    roots.into_iter().min_by_key(|r| r.seniority())
}

/// Plan the merge of `groups` for `query`
pub fn plan_merge(query: &ContactQuery, groups: &[IdentityGroup]) -> Result<MergePlan> {
    let survivor = pick_survivor(groups.iter().map(|g| g.root()))
        .cloned()
        .ok_or_else(|| Error::Internal("merge requested with no groups".to_string()))?;

    let mut demoted_ids: Vec<i64> = groups
        .iter()
        .filter(|g| g.root().id != survivor.id)
        .flat_map(|g| g.ids())
        .collect();
    demoted_ids.sort_unstable();
    demoted_ids.dedup();

    let new_email = query
        .email()
        .map_or(false, |e| !groups.iter().any(|g| g.contains_email(e)));
    let new_phone = query
        .phone()
        .map_or(false, |p| !groups.iter().any(|g| g.contains_phone(p)));

    Ok(MergePlan {
        survivor,
        demoted_ids,
        new_secondary: new_email || new_phone,
    })
}
