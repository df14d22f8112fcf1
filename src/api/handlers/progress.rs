use axum::{Json, extract::Extension, http::HeaderMap};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::principal::AuthGate;
use crate::{
    api::error::{ApiError, MessageResponse},
    forms::Progress,
    store::FormStore,
};

#[utoipa::path(
    get,
    path = "/api/get-progress",
    responses(
        (status = 200, description = "Saved progress, or an empty default when nothing was saved yet", body = Progress),
        (status = 401, description = "Missing or invalid session", body = MessageResponse),
        (status = 500, description = "Store failure", body = MessageResponse),
    ),
    tag = "forms"
)]
#[instrument(skip_all)]
pub async fn get_progress(
    headers: HeaderMap,
    gate: Extension<Arc<AuthGate>>,
    forms: Extension<Arc<dyn FormStore>>,
) -> Result<Json<Progress>, ApiError> {
    let principal = gate.require_auth(&headers).await?;

    let progress = forms
        .get_progress(&principal.email)
        .await
        .map_err(|err| ApiError::internal("Failed to fetch progress", err))?;

    // No record yet is a normal state, not a 404.
    let progress = progress.unwrap_or_else(|| {
        debug!(email = %principal.email, "no saved progress");
        Progress::empty()
    });

    Ok(Json(progress))
}
