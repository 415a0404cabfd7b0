//! Command-line and environment configuration.

use std::path::PathBuf;

use clap::Parser;

/// Runtime configuration, from command-line flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "snippetbox", version, about = "Serve the snippetbox web application")]
pub struct Config {
    /// HTTP network address
    #[arg(long, env = "SNIPPETBOX_ADDR", default_value = "0.0.0.0:4000")]
    pub addr: String,

    /// Include error details and stack traces in server error responses
    #[arg(long, env = "SNIPPETBOX_DEBUG")]
    pub debug: bool,

    /// Directory holding base.tmpl, partials/ and pages/
    #[arg(long, env = "SNIPPETBOX_TEMPLATES", default_value = "ui/html")]
    pub templates: PathBuf,

    /// Idle time after which a session expires
    #[arg(long, env = "SNIPPETBOX_SESSION_LIFETIME_HOURS", default_value_t = 12)]
    pub session_lifetime_hours: i64,

    /// Mark the session cookie Secure (requires HTTPS)
    #[arg(long, env = "SNIPPETBOX_SECURE_COOKIES")]
    pub secure_cookies: bool,
}
