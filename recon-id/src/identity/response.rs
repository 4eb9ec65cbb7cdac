//! ResponseBuilder: the consolidated view of one group

use recon_common::db::ContactRecord;
use serde::Serialize;

use super::group::IdentityGroup;

/// Externally visible aggregate of an identity group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedIdentity {
    pub primary_id: i64,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub secondary_ids: Vec<i64>,
}

/// Aggregate a root and its live records
///
/// Emails and phones are de-duplicated in insertion order with the root's
/// values first; secondary ids ascend.
pub fn build_consolidated(root: &ContactRecord, records: &[ContactRecord]) -> ConsolidatedIdentity {
    let mut ordered: Vec<&ContactRecord> = records.iter().filter(|r| r.id != root.id).collect();
    ordered.sort_by_key(|r| r.id);
    ordered.insert(0, root);

    let mut emails: Vec<String> = Vec::new();
    let mut phones: Vec<String> = Vec::new();
    for record in &ordered {
        if let Some(email) = &record.email {
            if !emails.contains(email) {
                emails.push(email.clone());
            }
        }
        if let Some(phone) = &record.phone {
            if !phones.contains(phone) {
                phones.push(phone.clone());
            }
        }
    }

    let secondary_ids = ordered
        .iter()
        .filter(|r| !r.is_primary())
        .map(|r| r.id)
        .collect();

    ConsolidatedIdentity {
        primary_id: root.id,
        emails,
        phones,
        secondary_ids,
    }
}

impl From<&IdentityGroup> for ConsolidatedIdentity {
    fn from(group: &IdentityGroup) -> Self {
        build_consolidated(group.root(), group.records())
    }
}
