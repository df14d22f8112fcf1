//! Final submission of an appraisal form.
//!
//! Flow Overview:
//! 1) Validate the `email` in the body before any session or form lookup.
//! 2) Authenticate the session.
//! 3) Only the owner (or an admin) may finalize a form.
//! 4) Flag the existing record as final; a missing record is a 404, never created.

use axum::{Json, extract::Extension, http::HeaderMap};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{email_from_body, principal::AuthGate};
use crate::{
    api::error::{ApiError, MessageResponse},
    store::{FinalSubmitOutcome, FormStore},
};

/// Request body documented for clients; parsing goes through raw JSON.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FinalSubmitRequest {
    pub email: String,
}

#[utoipa::path(
    post,
    path = "/api/final-submit",
    request_body = FinalSubmitRequest,
    responses(
        (status = 200, description = "Form flagged as final", body = MessageResponse),
        (status = 400, description = "Missing or invalid email", body = MessageResponse),
        (status = 401, description = "Missing or invalid session", body = MessageResponse),
        (status = 403, description = "Form belongs to another user", body = MessageResponse),
        (status = 404, description = "No saved form for this email", body = MessageResponse),
        (status = 500, description = "Store failure", body = MessageResponse),
    ),
    tag = "forms"
)]
#[instrument(skip_all)]
pub async fn final_submit(
    headers: HeaderMap,
    gate: Extension<Arc<AuthGate>>,
    forms: Extension<Arc<dyn FormStore>>,
    payload: Option<Json<Value>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = email_from_body(payload.as_ref().map(|Json(body)| body))?;

    let principal = gate.require_auth(&headers).await?;

    if email != principal.email {
        let is_admin = gate
            .is_admin(&principal.email)
            .await
            .map_err(|err| ApiError::internal("Failed to check admin membership", err))?;
        if !is_admin {
            return Err(ApiError::Forbidden(
                "Cannot submit another user's form".to_string(),
            ));
        }
    }

    match forms.final_submit(&email).await {
        Ok(FinalSubmitOutcome::Submitted) => {
            info!(email = %email, by = %principal.email, "form submitted");
            Ok(Json(MessageResponse::new("Form submitted successfully")))
        }
        Ok(FinalSubmitOutcome::NotFound) => Err(ApiError::NotFound(
            "No saved form found for this email".to_string(),
        )),
        Err(err) => Err(ApiError::internal("Failed to submit form", err)),
    }
}
