//! In-process store with the same semantics as the Postgres one.
//!
//! Used by the router tests; each map sits behind its own lock and every
//! operation holds at most one lock.

use super::{
    Admin, AdminStore, FinalSubmitOutcome, FormStore, Identity, SaveOutcome, SessionResolver,
    StoreResult, hash_session_token,
};
use crate::forms::{FormSection, FormSubmission, Progress, SectionContent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    forms: RwLock<HashMap<String, FormSubmission>>,
    admins: RwLock<HashMap<String, Admin>>,
    sessions: RwLock<HashMap<Vec<u8>, (Identity, Option<DateTime<Utc>>)>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session as the external auth provider would.
    pub async fn insert_session(&self, token: &str, email: &str) {
        self.insert_session_until(token, email, None).await;
    }

    /// Register a session that stops resolving after `expires_at`.
    pub async fn insert_session_until(
        &self,
        token: &str,
        email: &str,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let identity = Identity {
            email: email.trim().to_lowercase(),
        };
        self.sessions
            .write()
            .await
            .insert(hash_session_token(token), (identity, expires_at));
    }

    pub async fn admin(&self, email: &str) -> Option<Admin> {
        self.admins.read().await.get(email).cloned()
    }

    pub async fn admin_count(&self) -> usize {
        self.admins.read().await.len()
    }

    pub async fn submission(&self, email: &str) -> Option<FormSubmission> {
        self.forms.read().await.get(email).cloned()
    }

    pub async fn form_count(&self) -> usize {
        self.forms.read().await.len()
    }
}

#[async_trait]
impl FormStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get_progress(&self, email: &str) -> StoreResult<Option<Progress>> {
        Ok(self
            .forms
            .read()
            .await
            .get(email)
            .map(FormSubmission::progress))
    }

    async fn get_submission(&self, email: &str) -> StoreResult<Option<FormSubmission>> {
        Ok(self.submission(email).await)
    }

    async fn save_section(
        &self,
        email: &str,
        section: FormSection,
        content: SectionContent,
    ) -> StoreResult<SaveOutcome> {
        let mut forms = self.forms.write().await;
        let form = forms
            .entry(email.to_string())
            .or_insert_with(|| FormSubmission::empty(email));

        if form.final_submit {
            return Ok(SaveOutcome::Locked);
        }

        form.apply_section(section, content);
        form.last_updated = Some(Utc::now());
        Ok(SaveOutcome::Saved(form.progress()))
    }

    async fn final_submit(&self, email: &str) -> StoreResult<FinalSubmitOutcome> {
        let mut forms = self.forms.write().await;
        let Some(form) = forms.get_mut(email) else {
            return Ok(FinalSubmitOutcome::NotFound);
        };

        form.final_submit = true;
        form.last_updated = Some(Utc::now());
        Ok(FinalSubmitOutcome::Submitted)
    }
}

#[async_trait]
impl AdminStore for MemoryStore {
    async fn add_admin(&self, email: &str, added_by: &str) -> StoreResult<Admin> {
        let admin = Admin {
            email: email.to_string(),
            added_by: added_by.to_string(),
            added_at: Utc::now(),
        };
        self.admins
            .write()
            .await
            .insert(email.to_string(), admin.clone());
        Ok(admin)
    }

    async fn is_admin(&self, email: &str) -> StoreResult<bool> {
        Ok(self.admins.read().await.contains_key(email))
    }
}

#[async_trait]
impl SessionResolver for MemoryStore {
    async fn resolve(&self, token: &str) -> StoreResult<Option<Identity>> {
        let sessions = self.sessions.read().await;
        let identity = sessions
            .get(&hash_session_token(token))
            .filter(|(_, expires_at)| expires_at.map_or(true, |at| at > Utc::now()))
            .map(|(identity, _)| identity.clone());
        Ok(identity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn content(value: serde_json::Value) -> SectionContent {
        match value {
            serde_json::Value::Object(map) => map,
            _ => SectionContent::new(),
        }
    }

    #[tokio::test]
    async fn progress_is_none_without_record() {
        let store = MemoryStore::new();
        assert_eq!(store.get_progress("a@nitp.ac.in").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_section_creates_then_updates() {
        let store = MemoryStore::new();
        let email = "a@nitp.ac.in";

        store
            .save_section(email, FormSection::GeneralInformation, content(json!({"name": "A"})))
            .await
            .unwrap();
        let outcome = store
            .save_section(email, FormSection::GeneralInformation, content(json!({"name": "B"})))
            .await
            .unwrap();

        let SaveOutcome::Saved(progress) = outcome else {
            panic!("expected save to succeed");
        };
        assert_eq!(progress.completed_steps, vec![FormSection::GeneralInformation]);
        assert_eq!(progress.final_submit, Some(false));
        assert_eq!(store.form_count().await, 1);

        let form = store.submission(email).await.unwrap();
        assert_eq!(
            form.data.get(&FormSection::GeneralInformation),
            Some(&content(json!({"name": "B"})))
        );
    }

    #[tokio::test]
    async fn final_submit_never_creates_records() {
        let store = MemoryStore::new();
        assert_eq!(
            store.final_submit("nobody@x.com").await.unwrap(),
            FinalSubmitOutcome::NotFound
        );
        assert_eq!(store.form_count().await, 0);
    }

    #[tokio::test]
    async fn saves_after_final_submit_are_locked() {
        let store = MemoryStore::new();
        let email = "a@nitp.ac.in";
        store
            .save_section(email, FormSection::TeachingProcess, SectionContent::new())
            .await
            .unwrap();
        assert_eq!(
            store.final_submit(email).await.unwrap(),
            FinalSubmitOutcome::Submitted
        );

        let outcome = store
            .save_section(email, FormSection::SelfAssessment, SectionContent::new())
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Locked);

        let form = store.submission(email).await.unwrap();
        assert_eq!(form.completed_steps, vec![FormSection::TeachingProcess]);
    }

    #[tokio::test]
    async fn add_admin_is_an_upsert() {
        let store = MemoryStore::new();
        let first = store.add_admin("hod@nitp.ac.in", "webmaster@nitp.ac.in").await.unwrap();
        let second = store.add_admin("hod@nitp.ac.in", "dean@nitp.ac.in").await.unwrap();

        assert_eq!(store.admin_count().await, 1);
        assert!(second.added_at >= first.added_at);
        assert_eq!(
            store.admin("hod@nitp.ac.in").await.map(|admin| admin.added_by),
            Some("dean@nitp.ac.in".to_string())
        );
        assert!(store.is_admin("hod@nitp.ac.in").await.unwrap());
        assert!(!store.is_admin("other@nitp.ac.in").await.unwrap());
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let store = MemoryStore::new();
        store.insert_session("live", "A@nitp.ac.in").await;
        store
            .insert_session_until("stale", "b@nitp.ac.in", Some(Utc::now() - Duration::minutes(1)))
            .await;

        assert_eq!(
            store.resolve("live").await.unwrap(),
            Some(Identity {
                email: "a@nitp.ac.in".to_string()
            })
        );
        assert_eq!(store.resolve("stale").await.unwrap(), None);
        assert_eq!(store.resolve("missing").await.unwrap(), None);
    }
}
