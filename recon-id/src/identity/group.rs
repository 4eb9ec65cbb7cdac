//! Identity groups: a Primary plus the live Secondaries linked to it

use recon_common::db::ContactRecord;
use recon_common::{Error, Result};
use std::collections::HashMap;

use crate::store::ContactTx;

/// A validated group, records ordered root first then ascending id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityGroup {
    root: ContactRecord,
    records: Vec<ContactRecord>,
}

impl IdentityGroup {
    /// Assemble a group from its root and the rows linked to it
    ///
    /// `records` must contain the root itself. Every other record must be a
    /// Secondary pointing at the root.
    pub fn new(root: ContactRecord, records: Vec<ContactRecord>) -> Result<Self> {
        if !root.is_primary() || root.linked_id.is_some() {
            return Err(Error::InvariantViolation(format!(
                "group root {} is not an unlinked primary",
                root.id
            )));
        }
        if !records.iter().any(|r| r.id == root.id) {
            return Err(Error::InvariantViolation(format!(
                "group root {} is not live",
                root.id
            )));
        }

        let mut members: Vec<ContactRecord> = Vec::with_capacity(records.len());
        for record in records.into_iter().filter(|r| r.id != root.id) {
            if record.is_primary() || record.linked_id != Some(root.id) {
                return Err(Error::InvariantViolation(format!(
                    "record {} in group {} is not a secondary of that root",
                    record.id, root.id
                )));
            }
            members.push(record);
        }
        members.sort_by_key(|r| r.id);

        let mut ordered = Vec::with_capacity(members.len() + 1);
        ordered.push(root.clone());
        ordered.extend(members);

        Ok(Self {
            root,
            records: ordered,
        })
    }

    pub fn root(&self) -> &ContactRecord {
        &self.root
    }

    /// Root first, then secondaries by ascending id
    pub fn records(&self) -> &[ContactRecord] {
        &self.records
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.records.iter().map(|r| r.id)
    }

    pub fn contains_email(&self, email: &str) -> bool {
        self.records.iter().any(|r| r.email.as_deref() == Some(email))
    }

    pub fn contains_phone(&self, phone: &str) -> bool {
        self.records.iter().any(|r| r.phone.as_deref() == Some(phone))
    }
}

/// Load the live group rooted at `root`
pub async fn load_group(tx: &mut dyn ContactTx, root: &ContactRecord) -> Result<IdentityGroup> {
    let records = tx.list_group(root.id).await?;
    IdentityGroup::new(root.clone(), records)
}

/// Check the structural invariants over a full set of rows
///
/// - a live Primary has no link
/// - a live Secondary links to a live Primary (one hop)
/// - no email or phone value is claimed by two groups
pub fn audit(records: &[ContactRecord]) -> Result<()> {
    let live: HashMap<i64, &ContactRecord> = records
        .iter()
        .filter(|r| r.is_live())
        .map(|r| (r.id, r))
        .collect();

    let mut email_owner: HashMap<&str, i64> = HashMap::new();
    let mut phone_owner: HashMap<&str, i64> = HashMap::new();

    let mut ids: Vec<i64> = live.keys().copied().collect();
    ids.sort_unstable();

    for id in ids {
        let record = live[&id];
        let root_id = if record.is_primary() {
            if record.linked_id.is_some() {
                return Err(Error::InvariantViolation(format!(
                    "primary {} carries a link",
                    record.id
                )));
            }
            record.id
        } else {
            let root_id = record.linked_id.ok_or_else(|| {
                Error::InvariantViolation(format!("secondary {} has no link", record.id))
            })?;
            match live.get(&root_id) {
                Some(root) if root.is_primary() => root_id,
                _ => {
                    return Err(Error::InvariantViolation(format!(
                        "secondary {} links to {} which is not a live primary",
                        record.id, root_id
                    )))
                }
            }
        };

        if let Some(email) = record.email.as_deref() {
            let owner = *email_owner.entry(email).or_insert(root_id);
            if owner != root_id {
                return Err(Error::InvariantViolation(format!(
                    "email {} claimed by groups {} and {}",
                    email, owner, root_id
                )));
            }
        }
        if let Some(phone) = record.phone.as_deref() {
            let owner = *phone_owner.entry(phone).or_insert(root_id);
            if owner != root_id {
                return Err(Error::InvariantViolation(format!(
                    "phone {} claimed by groups {} and {}",
                    phone, owner, root_id
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_records::{primary, secondary};

    #[test]
    fn test_group_orders_root_first() {
        let root = primary(5, Some("a@x"), Some("111"), 0);
        let group = IdentityGroup::new(
            root.clone(),
            vec![
                secondary(9, Some("b@x"), None, 5, 2),
                root.clone(),
                secondary(7, None, Some("222"), 5, 1),
            ],
        )
        .unwrap();

        assert_eq!(group.ids().collect::<Vec<_>>(), vec![5, 7, 9]);
        assert!(group.contains_email("b@x"));
        assert!(group.contains_phone("222"));
        assert!(!group.contains_phone("333"));
    }

    #[test]
    fn test_group_rejects_foreign_member() {
        let root = primary(1, Some("a@x"), None, 0);
        let stray = secondary(2, Some("b@x"), None, 3, 1);
        assert!(matches!(
            IdentityGroup::new(root.clone(), vec![root, stray]),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_group_requires_live_root() {
        let root = primary(1, Some("a@x"), None, 0);
        assert!(matches!(
            IdentityGroup::new(root, vec![]),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_audit_accepts_consistent_rows() {
        let rows = vec![
            primary(1, Some("a@x"), Some("111"), 0),
            secondary(2, Some("a@x"), Some("222"), 1, 1),
            primary(3, Some("c@x"), Some("333"), 2),
        ];
        assert!(audit(&rows).is_ok());
    }

    #[test]
    fn test_audit_flags_shared_value() {
        let rows = vec![
            primary(1, Some("a@x"), Some("111"), 0),
            primary(2, Some("b@x"), Some("111"), 1),
        ];
        assert!(matches!(audit(&rows), Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_audit_flags_chain() {
        let rows = vec![
            primary(1, Some("a@x"), None, 0),
            secondary(2, Some("b@x"), None, 1, 1),
            secondary(3, Some("c@x"), None, 2, 2),
        ];
        assert!(matches!(audit(&rows), Err(Error::InvariantViolation(_))));
    }
}
