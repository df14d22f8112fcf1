//! Section saves and full form reads for the signed-in user.

use axum::{Json, extract::Extension, http::HeaderMap};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::principal::AuthGate;
use crate::{
    api::error::{ApiError, MessageResponse},
    forms::{FormSection, FormSubmission, Progress, validate_content},
    store::{FormStore, SaveOutcome},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveProgressRequest {
    /// Section identifier, e.g. `teaching-process`.
    pub section: String,
    /// Section content as a JSON object.
    #[schema(value_type = Object)]
    pub content: Value,
}

#[utoipa::path(
    post,
    path = "/api/save-progress",
    request_body = SaveProgressRequest,
    responses(
        (status = 200, description = "Section saved", body = Progress),
        (status = 400, description = "Unknown section or invalid content", body = MessageResponse),
        (status = 401, description = "Missing or invalid session", body = MessageResponse),
        (status = 409, description = "Form was already submitted", body = MessageResponse),
        (status = 500, description = "Store failure", body = MessageResponse),
    ),
    tag = "forms"
)]
#[instrument(skip_all)]
pub async fn save_progress(
    headers: HeaderMap,
    gate: Extension<Arc<AuthGate>>,
    forms: Extension<Arc<dyn FormStore>>,
    payload: Option<Json<SaveProgressRequest>>,
) -> Result<Json<Progress>, ApiError> {
    let principal = gate.require_auth(&headers).await?;

    let Some(Json(request)) = payload else {
        return Err(ApiError::BadRequest("Missing payload".to_string()));
    };

    let section = request
        .section
        .parse::<FormSection>()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let content =
        validate_content(request.content).map_err(|err| ApiError::BadRequest(err.to_string()))?;

    match forms.save_section(&principal.email, section, content).await {
        Ok(SaveOutcome::Saved(progress)) => {
            debug!(email = %principal.email, section = %section, "section saved");
            Ok(Json(progress))
        }
        Ok(SaveOutcome::Locked) => Err(ApiError::Conflict(
            "Form was already submitted and can no longer be edited".to_string(),
        )),
        Err(err) => Err(ApiError::internal("Failed to save section", err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/form-data",
    responses(
        (status = 200, description = "Saved form, or an empty form when nothing was saved yet", body = FormSubmission),
        (status = 401, description = "Missing or invalid session", body = MessageResponse),
        (status = 500, description = "Store failure", body = MessageResponse),
    ),
    tag = "forms"
)]
#[instrument(skip_all)]
pub async fn form_data(
    headers: HeaderMap,
    gate: Extension<Arc<AuthGate>>,
    forms: Extension<Arc<dyn FormStore>>,
) -> Result<Json<FormSubmission>, ApiError> {
    let principal = gate.require_auth(&headers).await?;

    let submission = forms
        .get_submission(&principal.email)
        .await
        .map_err(|err| ApiError::internal("Failed to fetch form", err))?;

    Ok(Json(
        submission.unwrap_or_else(|| FormSubmission::empty(&principal.email)),
    ))
}
