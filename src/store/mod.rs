//! Storage accessors for forms, admins and externally issued sessions.
//!
//! Handlers only see the traits below. Production wiring uses [`PgStore`];
//! router tests use [`MemoryStore`]. Every operation is a single statement
//! against the backing store, so atomicity is whatever that statement gives.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgStore, SCHEMA_SQL};

use crate::forms::{ContentError, FormSection, FormSubmission, Progress, SectionContent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored record does not match the form schema: {0}")]
    Schema(#[from] ContentError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Identity attached to a valid session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub email: String,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalSubmitOutcome {
    Submitted,
    /// No record exists for the email; nothing was created.
    NotFound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(Progress),
    /// The record is already final; the save was not applied.
    Locked,
}

#[async_trait]
pub trait FormStore: Send + Sync {
    /// Cheap round trip used by `/health`.
    async fn ping(&self) -> StoreResult<()>;

    /// Read `completedSteps`, `lastUpdated` and `finalSubmit` only.
    async fn get_progress(&self, email: &str) -> StoreResult<Option<Progress>>;

    async fn get_submission(&self, email: &str) -> StoreResult<Option<FormSubmission>>;

    /// Upsert one section, creating the record on first save.
    async fn save_section(
        &self,
        email: &str,
        section: FormSection,
        content: SectionContent,
    ) -> StoreResult<SaveOutcome>;

    /// Flag an existing record as final. Never creates a record.
    async fn final_submit(&self, email: &str) -> StoreResult<FinalSubmitOutcome>;
}

#[async_trait]
pub trait AdminStore: Send + Sync {
    /// Upsert an admin grant; repeated grants refresh `added_by` and `added_at`.
    async fn add_admin(&self, email: &str, added_by: &str) -> StoreResult<Admin>;

    async fn is_admin(&self, email: &str) -> StoreResult<bool>;
}

/// Resolves tokens issued by the external auth provider.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// `Ok(None)` for unknown or expired tokens.
    async fn resolve(&self, token: &str) -> StoreResult<Option<Identity>>;
}

/// Session tokens are looked up by hash; raw tokens never reach storage.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
