use clap::{Arg, ArgAction, Command};

/// One year.
pub const MAX_SESSION_LIFETIME_SECONDS: i64 = 365 * 24 * 60 * 60;

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("session-store")
                .long("session-store")
                .help("Where sessions are kept")
                .env("SNIPPETBOX_SESSION_STORE")
                .default_value("postgres")
                .value_parser(["postgres", "memory"]),
        )
        .arg(
            Arg::new("session-lifetime-seconds")
                .long("session-lifetime-seconds")
                .help("Session lifetime in seconds, counted from the last write")
                .env("SNIPPETBOX_SESSION_LIFETIME_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_SESSION_LIFETIME_SECONDS)),
        )
        .arg(
            Arg::new("session-cookie-secure")
                .long("session-cookie-secure")
                .help("Mark the session cookie Secure (HTTPS only)")
                .env("SNIPPETBOX_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("session-cleanup-seconds")
                .long("session-cleanup-seconds")
                .help("Interval between expired-session sweeps")
                .env("SNIPPETBOX_SESSION_CLEANUP_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
