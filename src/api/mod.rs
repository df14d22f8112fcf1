use crate::{
    api::handlers::{admin, final_submit, form, health, principal::AuthGate, progress, session},
    store::{AdminStore, FormStore, PgStore, SessionResolver},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Json, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;

pub mod error;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Server settings resolved from the CLI.
#[derive(Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub dsn: SecretString,
    pub webmaster_email: String,
    pub frontend_base_url: Option<String>,
    pub max_connections: u32,
}

/// Store handles injected into the router.
#[derive(Clone)]
pub struct Stores {
    pub forms: Arc<dyn FormStore>,
    pub admins: Arc<dyn AdminStore>,
    pub sessions: Arc<dyn SessionResolver>,
}

impl Stores {
    /// Use one backend for every collection.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: FormStore + AdminStore + SessionResolver + 'static,
    {
        Self {
            forms: store.clone(),
            admins: store.clone(),
            sessions: store,
        }
    }
}

/// Build the application router: every API route plus `/openapi.json`.
///
/// Tracing, request ids and CORS are added by [`new`]; tests drive this
/// router directly.
#[must_use]
pub fn router(stores: Stores, webmaster_email: &str) -> Router {
    let gate = Arc::new(AuthGate::new(
        stores.sessions.clone(),
        stores.admins.clone(),
        webmaster_email,
    ));

    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/openapi.json", get(|| async { Json(openapi()) }))
        .route("/api/session", get(session::session))
        .route("/api/get-progress", get(progress::get_progress))
        .route("/api/save-progress", post(form::save_progress))
        .route("/api/form-data", get(form::form_data))
        .route("/api/final-submit", post(final_submit::final_submit))
        .route("/api/admin", get(admin::admin))
        .route("/api/admin/add-admin", post(admin::add_admin))
        .layer(
            ServiceBuilder::new()
                .layer(Extension(gate))
                .layer(Extension(stores.forms))
                .layer(Extension(stores.admins)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(config: ServerConfig) -> Result<()> {
    // The pool is created once here and shared by every request through the store.
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(config.dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgStore::new(pool));
    store
        .ensure_schema()
        .await
        .context("Failed to apply database schema")?;

    let cors = config
        .frontend_base_url
        .as_deref()
        .map(frontend_origin)
        .transpose()?
        .map(|origin| {
            CorsLayer::new()
                .allow_headers([CONTENT_TYPE, AUTHORIZATION])
                .allow_methods([Method::GET, Method::POST])
                .allow_origin(AllowOrigin::exact(origin))
                .allow_credentials(true)
        });

    let app = router(Stores::shared(store), &config.webmaster_email).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .option_layer(cors),
    );

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path() {
        let origin = frontend_origin("https://appraisal.nitp.ac.in/forms/").unwrap();
        assert_eq!(origin, "https://appraisal.nitp.ac.in");
    }

    #[test]
    fn frontend_origin_keeps_explicit_port() {
        let origin = frontend_origin("http://localhost:3000").unwrap();
        assert_eq!(origin, "http://localhost:3000");
    }

    #[test]
    fn frontend_origin_rejects_invalid_url() {
        assert!(frontend_origin("not a url").is_err());
    }
}
