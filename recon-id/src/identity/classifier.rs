//! Classifier: decide the required action from the match set

use recon_common::db::ContactRecord;
use recon_common::{Error, Result};

use super::group::IdentityGroup;
use super::matcher::ResolvedMatch;
use super::query::ContactQuery;

/// Shape of the raw match set, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    NoMatch,
    SingleMatch,
    MultiMatch,
}

impl MatchKind {
    pub fn of(matches: &[ContactRecord]) -> Self {
        match matches.len() {
            0 => MatchKind::NoMatch,
            1 => MatchKind::SingleMatch,
            _ => MatchKind::MultiMatch,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::NoMatch => "no_match",
            MatchKind::SingleMatch => "single_match",
            MatchKind::MultiMatch => "multi_match",
        }
    }
}

/// What the matched roots call for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing matched: the pair starts a new group
    CreatePrimary,
    /// Every match belongs to this one root's group
    Extend(ContactRecord),
    /// Matches span these roots (deduplicated, in first-seen order)
    Merge(Vec<ContactRecord>),
}

/// Classify resolved matches
///
/// A multi-match whose roots coincide is handled exactly like a single
/// match. Fails closed when one submitted value is already claimed by two
/// different groups.
pub fn classify(query: &ContactQuery, resolved: &[ResolvedMatch]) -> Result<Decision> {
    if resolved.is_empty() {
        return Ok(Decision::CreatePrimary);
    }

    check_value_ownership(query, resolved)?;

    let mut roots: Vec<ContactRecord> = Vec::new();
    for m in resolved {
        if !roots.iter().any(|r| r.id == m.root.id) {
            roots.push(m.root.clone());
        }
    }

    if roots.len() == 1 {
        Ok(Decision::Extend(roots.remove(0)))
    } else {
        Ok(Decision::Merge(roots))
    }
}

/// Whether extending `group` with the submission needs a new Secondary
///
/// True iff a submitted value is absent from every record of the group.
pub fn needs_secondary(query: &ContactQuery, group: &IdentityGroup) -> bool {
    let new_email = query.email().map_or(false, |e| !group.contains_email(e));
    let new_phone = query.phone().map_or(false, |p| !group.contains_phone(p));
    new_email || new_phone
}

fn check_value_ownership(query: &ContactQuery, resolved: &[ResolvedMatch]) -> Result<()> {
    if let Some(email) = query.email() {
        ensure_single_owner("email", email, resolved, |r| r.email.as_deref() == Some(email))?;
    }
    if let Some(phone) = query.phone() {
        ensure_single_owner("phone", phone, resolved, |r| r.phone.as_deref() == Some(phone))?;
    }
    Ok(())
}

fn ensure_single_owner(
    field: &str,
    value: &str,
    resolved: &[ResolvedMatch],
    hit: impl Fn(&ContactRecord) -> bool,
) -> Result<()> {
    let mut owner: Option<i64> = None;
    for m in resolved.iter().filter(|m| hit(&m.record)) {
        match owner {
            None => owner = Some(m.root.id),
            Some(id) if id != m.root.id => {
                return Err(Error::InvariantViolation(format!(
                    "{} {} is claimed by groups {} and {}",
                    field, value, id, m.root.id
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_records::{primary, secondary};

    fn query(email: Option<&str>, phone: Option<&str>) -> ContactQuery {
        ContactQuery::new(email.map(String::from), phone.map(String::from)).unwrap()
    }

    fn resolved(record: ContactRecord, root: &ContactRecord) -> ResolvedMatch {
        ResolvedMatch {
            record,
            root: root.clone(),
        }
    }

    #[test]
    fn test_no_match_creates_primary() {
        let decision = classify(&query(Some("a@x"), None), &[]).unwrap();
        assert_eq!(decision, Decision::CreatePrimary);
        assert_eq!(MatchKind::of(&[]), MatchKind::NoMatch);
    }

    #[test]
    fn test_single_match_extends_its_root() {
        let root = primary(1, Some("a@x"), Some("111"), 0);
        let child = secondary(2, Some("b@x"), Some("111"), 1, 1);

        let decision = classify(&query(Some("b@x"), None), &[resolved(child, &root)]).unwrap();
        assert_eq!(decision, Decision::Extend(root));
    }

    #[test]
    fn test_multi_match_same_root_extends() {
        let root = primary(1, Some("a@x"), Some("111"), 0);
        let child = secondary(2, Some("b@x"), Some("222"), 1, 1);

        let decision = classify(
            &query(Some("a@x"), Some("222")),
            &[resolved(root.clone(), &root), resolved(child, &root)],
        )
        .unwrap();
        assert_eq!(decision, Decision::Extend(root));
    }

    #[test]
    fn test_multi_match_distinct_roots_merges() {
        let a = primary(1, Some("a@x"), Some("111"), 0);
        let b = primary(2, Some("b@x"), Some("222"), 1);

        let decision = classify(
            &query(Some("a@x"), Some("222")),
            &[resolved(a.clone(), &a), resolved(b.clone(), &b)],
        )
        .unwrap();
        assert_eq!(decision, Decision::Merge(vec![a, b]));
    }

    #[test]
    fn test_value_claimed_by_two_groups_fails_closed() {
        let a = primary(1, Some("a@x"), Some("111"), 0);
        let b = primary(2, Some("a@x"), Some("222"), 1);

        let result = classify(
            &query(Some("a@x"), None),
            &[resolved(a.clone(), &a), resolved(b.clone(), &b)],
        );
        assert!(matches!(result, Err(Error::InvariantViolation(_))));
    }

    #[test]
    fn test_needs_secondary_only_for_new_values() {
        let root = primary(1, Some("a@x"), Some("111"), 0);
        let child = secondary(2, Some("b@x"), None, 1, 1);
        let group = IdentityGroup::new(root.clone(), vec![root, child]).unwrap();

        assert!(!needs_secondary(&query(Some("b@x"), Some("111")), &group));
        assert!(!needs_secondary(&query(Some("a@x"), None), &group));
        assert!(needs_secondary(&query(Some("a@x"), Some("222")), &group));
        assert!(needs_secondary(&query(Some("c@x"), None), &group));
    }
}
