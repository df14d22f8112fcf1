use crate::api::{self, ServerConfig};
use anyhow::{Context, Result, anyhow};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub webmaster_email: String,
    pub frontend_base_url: Option<String>,
    pub max_connections: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN is invalid, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let dsn = Url::parse(args.dsn.expose_secret()).context("Invalid database connection string")?;
    if !matches!(dsn.scheme(), "postgres" | "postgresql") {
        return Err(anyhow!(
            "Unsupported database scheme: {}, expected postgres://",
            dsn.scheme()
        ));
    }

    debug!("Server args: {:?}", args);

    api::new(ServerConfig {
        port: args.port,
        dsn: args.dsn,
        webmaster_email: args.webmaster_email,
        frontend_base_url: args.frontend_base_url,
        max_connections: args.max_connections,
    })
    .await
}
