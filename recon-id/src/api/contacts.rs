//! GET /getall: paginated listing of live contact records

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use recon_common::db::ContactRecord;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::AppState;

/// Query parameters for the listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,

    /// Records per page
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationView {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct ListContactsResponse {
    pub contacts: Vec<ContactRecord>,
    pub pagination: PaginationView,
}

/// GET /getall?page=&limit=
pub async fn list_contacts(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ListContactsResponse>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let page = state.identity.list_contacts(query.page, query.limit).await?;

    Ok(Json(ListContactsResponse {
        contacts: page.contacts,
        pagination: PaginationView {
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages,
        },
    }))
}
