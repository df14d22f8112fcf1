use crate::cli::{
    actions::{Action, server::Args},
    commands::{ARG_DSN, ARG_FRONTEND_BASE_URL, ARG_MAX_CONNECTIONS, ARG_PORT, ARG_WEBMASTER_EMAIL},
};
use crate::api::handlers::principal::DEFAULT_WEBMASTER_EMAIL;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;

    let webmaster_email = matches
        .get_one::<String>(ARG_WEBMASTER_EMAIL)
        .map_or(DEFAULT_WEBMASTER_EMAIL, String::as_str)
        .trim()
        .to_lowercase();

    let frontend_base_url = matches
        .get_one::<String>(ARG_FRONTEND_BASE_URL)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    let max_connections = matches
        .get_one::<u32>(ARG_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        webmaster_email,
        frontend_base_url,
        max_connections,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    fn matches(args: &[&str]) -> clap::ArgMatches {
        let mut argv = vec!["appraisal"];
        argv.extend_from_slice(args);
        commands::new().get_matches_from(argv)
    }

    #[test]
    fn test_handler_builds_server_action() {
        temp_env::with_vars_unset(
            [
                "APPRAISAL_PORT",
                "APPRAISAL_WEBMASTER_EMAIL",
                "APPRAISAL_FRONTEND_BASE_URL",
                "APPRAISAL_MAX_CONNECTIONS",
            ],
            || {
                let matches = matches(&[
                    "--dsn",
                    "postgres://localhost/appraisal",
                    "--webmaster-email",
                    " Root@NITP.ac.in ",
                ]);

                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected a server action");
                };

                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn.expose_secret(), "postgres://localhost/appraisal");
                assert_eq!(args.webmaster_email, "root@nitp.ac.in");
                assert_eq!(args.frontend_base_url, None);
                assert_eq!(args.max_connections, 5);
            },
        );
    }

    #[test]
    fn test_handler_ignores_blank_frontend_url() {
        temp_env::with_vars_unset(["APPRAISAL_FRONTEND_BASE_URL"], || {
            let matches = matches(&[
                "--dsn",
                "postgres://localhost/appraisal",
                "--frontend-base-url",
                "  ",
            ]);

            let Ok(Action::Server(args)) = handler(&matches) else {
                panic!("expected a server action");
            };
            assert_eq!(args.frontend_base_url, None);
        });
    }
}
