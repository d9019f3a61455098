//! # Snippetbox
//!
//! A small multi-user service for sharing text snippets. Anyone can browse and
//! view snippets; signed-in users can create them.
//!
//! ## Request pipeline
//!
//! Every request passes through the same ordered chain of middleware (outermost
//! first): fault recovery, request logging, common headers, session load/save,
//! identity resolution, and, for protected routes, the authorization gate.
//!
//! - **Sessions** are server-side records keyed by the SHA-256 of an opaque
//!   cookie token. Tokens are rotated on every privilege change (login, logout).
//! - **Identity** is never trusted from the session alone: the stored user id is
//!   re-checked against the user store on every request.
//! - **Forms** are decoded into typed structs first and validated second, so a
//!   malformed number is a `400` while a failed rule is a `422` with field errors.

pub mod auth;
pub mod cli;
pub mod forms;
pub mod models;
pub mod render;
pub mod session;
pub mod snippetbox;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
