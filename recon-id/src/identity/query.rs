//! Submitted contact pair

use recon_common::{Error, Result};

/// Longest phone value the contacts table was sized for
pub const MAX_PHONE_LEN: usize = 20;

/// Longest email value accepted
pub const MAX_EMAIL_LEN: usize = 255;

/// A validated (email?, phone?) submission with at least one value present
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactQuery {
    EmailOnly(String),
    PhoneOnly(String),
    Both { email: String, phone: String },
}

impl ContactQuery {
    /// Build a query from optional raw values
    ///
    /// Surrounding whitespace is trimmed and blank values count as absent.
    /// Fails with `Error::Validation` when neither value remains or a value
    /// is malformed.
    pub fn new(email: Option<String>, phone: Option<String>) -> Result<Self> {
        let email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        let phone = phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());

        if let Some(email) = &email {
            validate_email(email)?;
        }
        if let Some(phone) = &phone {
            validate_phone(phone)?;
        }

        match (email, phone) {
            (Some(email), Some(phone)) => Ok(ContactQuery::Both { email, phone }),
            (Some(email), None) => Ok(ContactQuery::EmailOnly(email)),
            (None, Some(phone)) => Ok(ContactQuery::PhoneOnly(phone)),
            (None, None) => Err(Error::Validation(
                "Either email or phoneNumber must be provided".to_string(),
            )),
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            ContactQuery::EmailOnly(email) | ContactQuery::Both { email, .. } => Some(email),
            ContactQuery::PhoneOnly(_) => None,
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match self {
            ContactQuery::PhoneOnly(phone) | ContactQuery::Both { phone, .. } => Some(phone),
            ContactQuery::EmailOnly(_) => None,
        }
    }

    /// Advisory lock keys for this submission, sorted
    ///
    /// Emails are lowercased for the key only; matching stays exact. A
    /// coarser key can only serialize more requests, never fewer.
    pub fn lock_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(2);
        if let Some(email) = self.email() {
            keys.push(format!("email:{}", email.to_lowercase()));
        }
        if let Some(phone) = self.phone() {
            keys.push(format!("phone:{}", phone));
        }
        keys.sort();
        keys
    }
}

fn validate_email(email: &str) -> Result<()> {
    if email.len() > MAX_EMAIL_LEN {
        return Err(Error::Validation(format!(
            "email exceeds {} characters",
            MAX_EMAIL_LEN
        )));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(Error::Validation(format!("invalid email: {}", email)));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(Error::Validation(format!("invalid email: {}", email))),
    }
}

fn validate_phone(phone: &str) -> Result<()> {
    if phone.chars().count() > MAX_PHONE_LEN {
        return Err(Error::Validation(format!(
            "phoneNumber exceeds {} characters",
            MAX_PHONE_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_both_values() {
        let q = ContactQuery::new(s("a@x"), s("111")).unwrap();
        assert_eq!(
            q,
            ContactQuery::Both {
                email: "a@x".to_string(),
                phone: "111".to_string()
            }
        );
        assert_eq!(q.email(), Some("a@x"));
        assert_eq!(q.phone(), Some("111"));
    }

    #[test]
    fn test_single_values() {
        assert_eq!(
            ContactQuery::new(s("a@x"), None).unwrap(),
            ContactQuery::EmailOnly("a@x".to_string())
        );
        assert_eq!(
            ContactQuery::new(None, s("111")).unwrap(),
            ContactQuery::PhoneOnly("111".to_string())
        );
    }

    #[test]
    fn test_neither_rejected() {
        assert!(matches!(ContactQuery::new(None, None), Err(Error::Validation(_))));
        assert!(matches!(
            ContactQuery::new(s("  "), s("")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_blank_value_treated_as_absent() {
        assert_eq!(
            ContactQuery::new(s(""), s(" 111 ")).unwrap(),
            ContactQuery::PhoneOnly("111".to_string())
        );
    }

    #[test]
    fn test_malformed_email_rejected() {
        for bad in ["plain", "@x", "a@", "a@b@c", "a b@x"] {
            assert!(
                matches!(ContactQuery::new(s(bad), None), Err(Error::Validation(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_long_phone_rejected() {
        let long = "1".repeat(MAX_PHONE_LEN + 1);
        assert!(matches!(
            ContactQuery::new(None, Some(long)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_lock_keys_normalized_and_sorted() {
        let q = ContactQuery::new(s("Doc@Example.com"), s("123456")).unwrap();
        assert_eq!(q.lock_keys(), vec!["email:doc@example.com", "phone:123456"]);
        // Matching still uses the submitted value
        assert_eq!(q.email(), Some("Doc@Example.com"));
    }
}
