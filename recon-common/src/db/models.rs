//! Database models

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::fmt;
use std::str::FromStr;

/// Role of a contact record within its identity group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
    /// Root of the group; the oldest record ever merged into it
    Primary,
    /// Alternate contact info linked to exactly one Primary
    Secondary,
}

impl LinkPrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkPrecedence::Primary => "primary",
            LinkPrecedence::Secondary => "secondary",
        }
    }
}

impl fmt::Display for LinkPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkPrecedence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(LinkPrecedence::Primary),
            "secondary" => Ok(LinkPrecedence::Secondary),
            other => Err(Error::InvariantViolation(format!(
                "unknown link precedence '{}'",
                other
            ))),
        }
    }
}

/// One row of the `contacts` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: i64,
    pub email: Option<String>,
    #[serde(rename = "phoneNumber")]
    pub phone: Option<String>,
    pub linked_id: Option<i64>,
    #[serde(rename = "linkPrecedence")]
    pub precedence: LinkPrecedence,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ContactRecord {
    pub fn is_primary(&self) -> bool {
        self.precedence == LinkPrecedence::Primary
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Ordering key for root selection: oldest first, lowest id on ties
    pub fn seniority(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }
}

impl<'r> FromRow<'r, SqliteRow> for ContactRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let precedence: String = row.try_get("link_precedence")?;
        let precedence = precedence
            .parse::<LinkPrecedence>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone_number")?,
            linked_id: row.try_get("linked_id")?,
            precedence,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

/// Column list matching the `FromRow` impl
pub const CONTACT_COLUMNS: &str =
    "id, email, phone_number, linked_id, link_precedence, created_at, updated_at, deleted_at";

/// A contact about to be inserted; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linked_id: Option<i64>,
    pub precedence: LinkPrecedence,
    pub created_at: DateTime<Utc>,
}

impl NewContact {
    /// Materialize the row once the store has assigned an id
    pub fn into_record(self, id: i64) -> ContactRecord {
        ContactRecord {
            id,
            email: self.email,
            phone: self.phone,
            linked_id: self.linked_id,
            precedence: self.precedence,
            created_at: self.created_at,
            updated_at: self.created_at,
            deleted_at: None,
        }
    }
}
