use crate::api;
use crate::api::handlers::auth::AuthConfig;
use crate::cli::actions::Action;
use crate::throttle::LoginPolicy;
use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;

/// Everything the server action needs, parsed from the CLI.
#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub frontend_base_url: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub max_attempts_by_origin: i64,
    pub max_attempts_by_identifier: i64,
    pub origin_block_seconds: u64,
    pub identifier_block_seconds: u64,
}

/// Execute the server action.
///
/// # Errors
///
/// Returns an error if the signing secret is unusable, the database is
/// unreachable, or the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server(args) = action;

    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_access_ttl_seconds(args.access_ttl_seconds)
        .with_refresh_ttl_seconds(args.refresh_ttl_seconds);

    let login_policy = LoginPolicy::new()
        .with_max_attempts_by_origin(args.max_attempts_by_origin)
        .with_max_attempts_by_identifier(args.max_attempts_by_identifier)
        .with_origin_block_duration(Duration::from_secs(args.origin_block_seconds))
        .with_identifier_block_duration(Duration::from_secs(args.identifier_block_seconds));

    api::new(
        args.port,
        args.dsn,
        args.token_secret,
        auth_config,
        login_policy,
    )
    .await
}
