use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

/// Auth, token, and throttle arguments.
#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_throttle_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("token-secret")
                .long("token-secret")
                .help("Process-wide token signing secret (at least 32 bytes)")
                .env("AGORA_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for CORS and cookie security")
                .env("AGORA_FRONTEND_BASE_URL")
                .default_value("https://agora-forum.dev"),
        )
        .arg(
            Arg::new("access-ttl-seconds")
                .long("access-ttl-seconds")
                .help("Access token TTL in seconds")
                .env("AGORA_ACCESS_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("refresh-ttl-seconds")
                .long("refresh-ttl-seconds")
                .help("Refresh token TTL in seconds")
                .env("AGORA_REFRESH_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_throttle_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("max-attempts-by-origin")
                .long("max-attempts-by-origin")
                .help("Failed attempts per origin address before blocking")
                .env("AGORA_MAX_ATTEMPTS_BY_ORIGIN")
                .default_value("10")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("max-attempts-by-identifier")
                .long("max-attempts-by-identifier")
                .help("Failed attempts per identifier before blocking")
                .env("AGORA_MAX_ATTEMPTS_BY_IDENTIFIER")
                .default_value("5")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("origin-block-seconds")
                .long("origin-block-seconds")
                .help("Sliding window for the per-origin block, in seconds")
                .env("AGORA_ORIGIN_BLOCK_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("identifier-block-seconds")
                .long("identifier-block-seconds")
                .help("Sliding window for the per-identifier block, in seconds")
                .env("AGORA_IDENTIFIER_BLOCK_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
}

/// Parsed auth options.
#[derive(Debug)]
pub struct Options {
    pub token_secret: SecretString,
    pub frontend_base_url: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub max_attempts_by_origin: i64,
    pub max_attempts_by_identifier: i64,
    pub origin_block_seconds: u64,
    pub identifier_block_seconds: u64,
}

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    ///
    /// Returns an error when a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            token_secret: matches
                .get_one::<String>("token-secret")
                .cloned()
                .map(SecretString::from)
                .context("missing required argument: --token-secret")?,
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .context("missing argument: --frontend-base-url")?,
            access_ttl_seconds: matches
                .get_one::<i64>("access-ttl-seconds")
                .copied()
                .unwrap_or(900),
            refresh_ttl_seconds: matches
                .get_one::<i64>("refresh-ttl-seconds")
                .copied()
                .unwrap_or(604_800),
            max_attempts_by_origin: matches
                .get_one::<i64>("max-attempts-by-origin")
                .copied()
                .unwrap_or(10),
            max_attempts_by_identifier: matches
                .get_one::<i64>("max-attempts-by-identifier")
                .copied()
                .unwrap_or(5),
            origin_block_seconds: matches
                .get_one::<u64>("origin-block-seconds")
                .copied()
                .unwrap_or(900),
            identifier_block_seconds: matches
                .get_one::<u64>("identifier-block-seconds")
                .copied()
                .unwrap_or(3600),
        })
    }
}
