use crate::{
    auth::PasswordHasherConfig,
    cli::telemetry,
    session::SessionConfig,
    snippetbox::{self, ServerConfig, SessionBackend},
};
use anyhow::{anyhow, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Arguments for the server action.
///
/// The DSN is kept without its password; the password lives in
/// `db_password` so it never shows up in `Debug` output.
#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Url,
    pub db_password: Option<SecretString>,
    pub static_dir: PathBuf,
    pub session_backend: SessionBackend,
    pub session_lifetime_seconds: i64,
    pub session_cookie_secure: bool,
    pub session_cleanup_seconds: u64,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    pub argon2_parallelism: u32,
}

impl Args {
    /// Full connection string with the password put back in.
    ///
    /// # Errors
    /// Returns an error if the password cannot be set on the URL.
    pub fn connection_string(&self) -> Result<SecretString> {
        let mut dsn = self.dsn.clone();
        if let Some(password) = &self.db_password {
            dsn.set_password(Some(password.expose_secret()))
                .map_err(|()| anyhow!("Error setting password"))?;
        }
        Ok(SecretString::from(dsn.to_string()))
    }
}

/// Handle the server action
/// # Errors
/// Returns an error if the configuration is invalid or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    let config = ServerConfig {
        port: args.port,
        dsn: args.connection_string()?,
        static_dir: args.static_dir,
        session_backend: args.session_backend,
        session: SessionConfig::new()
            .with_lifetime_seconds(args.session_lifetime_seconds)
            .with_cookie_secure(args.session_cookie_secure),
        session_cleanup_interval: Duration::from_secs(args.session_cleanup_seconds),
        hasher: PasswordHasherConfig::new(
            args.argon2_memory_kib,
            args.argon2_iterations,
            args.argon2_parallelism,
        )?,
    };

    let result = snippetbox::new(config).await;

    telemetry::shutdown_tracer();

    result
}
