//! `PostgreSQL` implementation of the store traits.
//!
//! Forms live in one row per email with section content in a `JSONB` column,
//! which keeps section saves a single atomic upsert.

use super::{
    Admin, AdminStore, FinalSubmitOutcome, FormStore, Identity, SaveOutcome, SessionResolver,
    StoreResult, hash_session_token,
};
use crate::forms::{
    FORM_SCHEMA_VERSION, FormSection, FormSubmission, Progress, SectionContent, parse_steps,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgPool, Row, types::Json};
use std::collections::BTreeMap;
use tracing::{Instrument, Span};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

fn query_span(operation: &'static str, statement: &'static str) -> Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Store backed by a shared connection pool.
///
/// The pool is created once at startup and cloned into every request through
/// this handle.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create missing tables. Every statement is `IF NOT EXISTS`.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be applied.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(query_span("CREATE", "sql/schema.sql"))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FormStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(tracing::info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await?;
        conn.ping()
            .instrument(tracing::info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await?;
        Ok(())
    }

    async fn get_progress(&self, email: &str) -> StoreResult<Option<Progress>> {
        let query = r"
            SELECT completed_steps, last_updated, final_submit
            FROM forms
            WHERE email = $1
            LIMIT 1
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let steps: Vec<String> = row.try_get("completed_steps")?;
        Ok(Some(Progress {
            completed_steps: parse_steps(&steps)?,
            last_updated: Some(row.try_get::<DateTime<Utc>, _>("last_updated")?),
            final_submit: Some(row.try_get("final_submit")?),
        }))
    }

    async fn get_submission(&self, email: &str) -> StoreResult<Option<FormSubmission>> {
        let query = r"
            SELECT email, completed_steps, data, final_submit, schema_version, last_updated
            FROM forms
            WHERE email = $1
            LIMIT 1
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let steps: Vec<String> = row.try_get("completed_steps")?;
        let Json(data): Json<BTreeMap<FormSection, SectionContent>> = row.try_get("data")?;
        Ok(Some(FormSubmission {
            email: row.try_get("email")?,
            completed_steps: parse_steps(&steps)?,
            data,
            final_submit: row.try_get("final_submit")?,
            schema_version: row.try_get("schema_version")?,
            last_updated: Some(row.try_get("last_updated")?),
        }))
    }

    async fn save_section(
        &self,
        email: &str,
        section: FormSection,
        content: SectionContent,
    ) -> StoreResult<SaveOutcome> {
        // The conflict branch only fires while the record is not final, so a
        // locked record returns no row and is left untouched.
        let query = r"
            INSERT INTO forms (email, completed_steps, data, final_submit, schema_version, last_updated)
            VALUES ($1, ARRAY[$2::text], jsonb_build_object($2::text, $3::jsonb), FALSE, $4, NOW())
            ON CONFLICT (email) DO UPDATE SET
                completed_steps = CASE
                    WHEN $2::text = ANY(forms.completed_steps) THEN forms.completed_steps
                    ELSE array_append(forms.completed_steps, $2::text)
                END,
                data = forms.data || jsonb_build_object($2::text, $3::jsonb),
                schema_version = $4,
                last_updated = NOW()
            WHERE forms.final_submit = FALSE
            RETURNING completed_steps, last_updated, final_submit
        ";
        let row = sqlx::query(query)
            .bind(email)
            .bind(section.as_str())
            .bind(Json(content))
            .bind(FORM_SCHEMA_VERSION)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPSERT", query))
            .await?;

        let Some(row) = row else {
            return Ok(SaveOutcome::Locked);
        };

        let steps: Vec<String> = row.try_get("completed_steps")?;
        Ok(SaveOutcome::Saved(Progress {
            completed_steps: parse_steps(&steps)?,
            last_updated: Some(row.try_get("last_updated")?),
            final_submit: Some(row.try_get("final_submit")?),
        }))
    }

    async fn final_submit(&self, email: &str) -> StoreResult<FinalSubmitOutcome> {
        let query = r"
            UPDATE forms
            SET final_submit = TRUE, last_updated = NOW()
            WHERE email = $1
        ";
        let result = sqlx::query(query)
            .bind(email)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await?;

        if result.rows_affected() == 0 {
            Ok(FinalSubmitOutcome::NotFound)
        } else {
            Ok(FinalSubmitOutcome::Submitted)
        }
    }
}

#[async_trait]
impl AdminStore for PgStore {
    async fn add_admin(&self, email: &str, added_by: &str) -> StoreResult<Admin> {
        let query = r"
            INSERT INTO admins (email, added_by, added_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (email) DO UPDATE SET
                added_by = EXCLUDED.added_by,
                added_at = EXCLUDED.added_at
            RETURNING email, added_by, added_at
        ";
        let row = sqlx::query(query)
            .bind(email)
            .bind(added_by)
            .fetch_one(&self.pool)
            .instrument(query_span("UPSERT", query))
            .await?;

        Ok(Admin {
            email: row.try_get("email")?,
            added_by: row.try_get("added_by")?,
            added_at: row.try_get("added_at")?,
        })
    }

    async fn is_admin(&self, email: &str) -> StoreResult<bool> {
        let query = r"
            SELECT 1 AS found
            FROM admins
            WHERE email = $1
            LIMIT 1
        ";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl SessionResolver for PgStore {
    async fn resolve(&self, token: &str) -> StoreResult<Option<Identity>> {
        let query = r"
            SELECT email
            FROM user_sessions
            WHERE session_hash = $1
              AND expires_at > NOW()
            LIMIT 1
        ";
        let row = sqlx::query(query)
            .bind(hash_session_token(token))
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        row.map(|row| {
            row.try_get::<String, _>("email").map(|email| Identity {
                email: email.trim().to_lowercase(),
            })
        })
        .transpose()
        .map_err(Into::into)
    }
}
