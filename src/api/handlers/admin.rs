//! Admin-gated endpoints.
//!
//! `GET /api/admin` accepts the webmaster and every stored admin.
//! `POST /api/admin/add-admin` accepts the webmaster only; grants are upserts,
//! so granting twice refreshes `addedBy` and `addedAt` on the same record.

use axum::{Json, extract::Extension, http::HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{email_from_body, principal::AuthGate};
use crate::{
    api::error::{ApiError, MessageResponse},
    store::{Admin, AdminStore},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddAdminRequest {
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddAdminResponse {
    pub message: String,
    pub admin: Admin,
}

#[utoipa::path(
    get,
    path = "/api/admin",
    responses(
        (status = 200, description = "Caller is an admin", body = MessageResponse),
        (status = 401, description = "Missing session or not an admin", body = MessageResponse),
        (status = 500, description = "Store failure", body = MessageResponse),
    ),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn admin(
    headers: HeaderMap,
    gate: Extension<Arc<AuthGate>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let principal = gate.require_admin(&headers).await?;

    Ok(Json(MessageResponse::new(format!(
        "Welcome, admin {}",
        principal.email
    ))))
}

#[utoipa::path(
    post,
    path = "/api/admin/add-admin",
    request_body = AddAdminRequest,
    responses(
        (status = 200, description = "Admin granted", body = AddAdminResponse),
        (status = 400, description = "Missing or invalid email", body = MessageResponse),
        (status = 401, description = "Caller is not the webmaster", body = MessageResponse),
        (status = 500, description = "Store failure", body = MessageResponse),
    ),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn add_admin(
    headers: HeaderMap,
    gate: Extension<Arc<AuthGate>>,
    admins: Extension<Arc<dyn AdminStore>>,
    payload: Option<Json<Value>>,
) -> Result<Json<AddAdminResponse>, ApiError> {
    let principal = gate.require_webmaster(&headers).await?;

    let email = email_from_body(payload.as_ref().map(|Json(body)| body))?;

    let admin = admins
        .add_admin(&email, &principal.email)
        .await
        .map_err(|err| ApiError::internal("Failed to add admin", err))?;

    info!(email = %admin.email, added_by = %admin.added_by, "admin granted");

    Ok(Json(AddAdminResponse {
        message: "Admin added successfully".to_string(),
        admin,
    }))
}
