//! POST /identify: reconcile one email/phone pair

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::identity::{ConsolidatedIdentity, ContactQuery};
use crate::AppState;

/// Phone numbers arrive either as strings or as bare JSON integers
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PhoneValue {
    Text(String),
    Number(serde_json::Number),
}

impl PhoneValue {
    /// Floats and negative numbers are not phone numbers
    fn into_string(self) -> ApiResult<String> {
        match self {
            PhoneValue::Text(s) => Ok(s),
            PhoneValue::Number(n) => n.as_u64().map(|v| v.to_string()).ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "phoneNumber must be a string or a non-negative integer, got {}",
                    n
                ))
            }),
        }
    }
}

/// Request body for POST /identify
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<PhoneValue>,
}

/// Consolidated contact as sent to clients
///
/// `primaryContatctId` is misspelled on the wire; existing clients read that
/// key.
#[derive(Debug, Serialize)]
pub struct ContactView {
    #[serde(rename = "primaryContatctId")]
    pub primary_contact_id: i64,
    pub emails: Vec<String>,
    #[serde(rename = "phoneNumbers")]
    pub phone_numbers: Vec<String>,
    #[serde(rename = "secondaryContactIds")]
    pub secondary_contact_ids: Vec<i64>,
}

impl From<ConsolidatedIdentity> for ContactView {
    fn from(identity: ConsolidatedIdentity) -> Self {
        Self {
            primary_contact_id: identity.primary_id,
            emails: identity.emails,
            phone_numbers: identity.phones,
            secondary_contact_ids: identity.secondary_ids,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub contact: ContactView,
}

/// POST /identify
pub async fn identify(
    State(state): State<AppState>,
    payload: Result<Json<IdentifyRequest>, JsonRejection>,
) -> ApiResult<Json<IdentifyResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let query = ContactQuery::new(
        request.email,
        request.phone_number.map(PhoneValue::into_string).transpose()?,
    )?;
    debug!(email = ?query.email(), phone = ?query.phone(), "Identify request");

    let identity = state.identity.identify(&query).await?;

    Ok(Json(IdentifyResponse {
        contact: identity.into(),
    }))
}
