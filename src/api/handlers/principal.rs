//! Authenticated principal extraction and admin gating.
//!
//! Flow Overview: read the session token, resolve it to an email through the
//! external provider's session store, then apply the admin policy. The
//! webmaster identity is always an admin and is the only identity allowed to
//! grant admin rights; everyone else qualifies through the admin store.

use axum::http::HeaderMap;
use std::{fmt, sync::Arc};
use tracing::debug;

use super::{normalize_email, session::extract_session_token};
use crate::{
    api::error::ApiError,
    store::{AdminStore, Identity, SessionResolver, StoreResult},
};

/// Bootstrap admin identity used when no override is configured.
pub const DEFAULT_WEBMASTER_EMAIL: &str = "webmaster@nitp.ac.in";

/// Authenticated user context derived from the session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
}

/// Authorization gate shared by all handlers.
pub struct AuthGate {
    sessions: Arc<dyn SessionResolver>,
    admins: Arc<dyn AdminStore>,
    webmaster_email: String,
}

impl AuthGate {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionResolver>,
        admins: Arc<dyn AdminStore>,
        webmaster_email: &str,
    ) -> Self {
        Self {
            sessions,
            admins,
            webmaster_email: normalize_email(webmaster_email),
        }
    }

    #[must_use]
    pub fn is_webmaster(&self, email: &str) -> bool {
        normalize_email(email) == self.webmaster_email
    }

    /// Webmaster or a member of the admin store.
    ///
    /// # Errors
    /// Returns the store error if the membership lookup fails.
    pub async fn is_admin(&self, email: &str) -> StoreResult<bool> {
        if self.is_webmaster(email) {
            return Ok(true);
        }
        self.admins.is_admin(&normalize_email(email)).await
    }

    /// Resolve the request's session, if any.
    ///
    /// # Errors
    /// Returns [`ApiError::Internal`] when the session store fails.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>, ApiError> {
        let Some(token) = extract_session_token(headers) else {
            return Ok(None);
        };
        let identity = self
            .sessions
            .resolve(&token)
            .await
            .map_err(|err| ApiError::internal("Failed to lookup session", err))?;
        Ok(identity.map(|identity| Identity {
            email: normalize_email(&identity.email),
        }))
    }

    /// # Errors
    /// Returns 401 when no valid session is presented.
    pub async fn require_auth(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        match self.authenticate(headers).await? {
            Some(identity) => Ok(Principal {
                email: identity.email,
            }),
            None => Err(ApiError::Unauthenticated),
        }
    }

    /// # Errors
    /// Returns 401 unless the session belongs to the webmaster or a stored admin.
    pub async fn require_admin(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        let principal = self.require_auth(headers).await?;
        let is_admin = self
            .is_admin(&principal.email)
            .await
            .map_err(|err| ApiError::internal("Failed to check admin membership", err))?;
        if is_admin {
            Ok(principal)
        } else {
            debug!(email = %principal.email, "rejected non-admin");
            Err(ApiError::Unauthorized)
        }
    }

    /// # Errors
    /// Returns 401 for every caller other than the webmaster, signed in or not.
    pub async fn require_webmaster(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        match self.authenticate(headers).await? {
            Some(identity) if self.is_webmaster(&identity.email) => Ok(Principal {
                email: identity.email,
            }),
            Some(identity) => {
                debug!(email = %identity.email, "rejected non-webmaster");
                Err(ApiError::Unauthorized)
            }
            None => Err(ApiError::Unauthorized),
        }
    }
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate")
            .field("webmaster_email", &self.webmaster_email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::http::{HeaderValue, header::AUTHORIZATION};

    fn gate(store: &Arc<MemoryStore>) -> AuthGate {
        AuthGate::new(store.clone(), store.clone(), DEFAULT_WEBMASTER_EMAIL)
    }

    fn bearer(token: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn webmaster_match_ignores_case_and_whitespace() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        assert!(gate.is_webmaster(" WebMaster@nitp.ac.in "));
        assert!(!gate.is_webmaster("webmaster@nitp.ac.in.evil"));
    }

    #[tokio::test]
    async fn admin_membership_comes_from_store_or_webmaster() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        assert!(gate.is_admin(DEFAULT_WEBMASTER_EMAIL).await.unwrap());
        assert!(!gate.is_admin("hod@nitp.ac.in").await.unwrap());

        store
            .add_admin("hod@nitp.ac.in", DEFAULT_WEBMASTER_EMAIL)
            .await
            .unwrap();
        assert!(gate.is_admin("HOD@nitp.ac.in").await.unwrap());
    }

    #[tokio::test]
    async fn require_auth_rejects_missing_and_unknown_sessions() {
        let store = Arc::new(MemoryStore::new());
        store.insert_session("known", "faculty@nitp.ac.in").await;
        let gate = gate(&store);

        assert!(matches!(
            gate.require_auth(&HeaderMap::new()).await,
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            gate.require_auth(&bearer("unknown")).await,
            Err(ApiError::Unauthenticated)
        ));
        assert_eq!(
            gate.require_auth(&bearer("known")).await.unwrap().email,
            "faculty@nitp.ac.in"
        );
    }

    #[tokio::test]
    async fn stored_admins_cannot_act_as_webmaster() {
        let store = Arc::new(MemoryStore::new());
        store.insert_session("hod", "hod@nitp.ac.in").await;
        store.insert_session("wm", DEFAULT_WEBMASTER_EMAIL).await;
        store
            .add_admin("hod@nitp.ac.in", DEFAULT_WEBMASTER_EMAIL)
            .await
            .unwrap();
        let gate = gate(&store);

        assert!(gate.require_admin(&bearer("hod")).await.is_ok());
        assert!(matches!(
            gate.require_webmaster(&bearer("hod")).await,
            Err(ApiError::Unauthorized)
        ));
        assert!(gate.require_webmaster(&bearer("wm")).await.is_ok());
    }
}
