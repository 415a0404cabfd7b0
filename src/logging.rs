//! Structured logging setup and per-request log handles.

use std::{backtrace::Backtrace, fmt};

use axum::http::Method;
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// Installs the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` and falls back to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    subscriber_fmt().with_env_filter(filter).init();
}

/// A logger bound to a single request.
///
/// `RequestLog` is obtained from [`RequestMeta::log`](crate::RequestMeta::log)
/// and borrows the request's metadata, so it cannot outlive the request.
/// Every entry carries the request method and URI as structured fields.
#[derive(Debug, Clone, Copy)]
pub struct RequestLog<'a> {
    method: &'a Method,
    uri: &'a str,
}

impl<'a> RequestLog<'a> {
    pub(crate) fn new(method: &'a Method, uri: &'a str) -> Self {
        Self { method, uri }
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        self.method
    }

    /// Returns the request URI.
    pub fn uri(&self) -> &str {
        self.uri
    }

    /// Logs an info-level message.
    ///
    /// Use with `format_args!`:
    /// ```no_run
    /// # use axum::http::{Method, Uri};
    /// # use snippetbox::RequestMeta;
    /// let meta = RequestMeta::new(Method::GET, &Uri::from_static("/"));
    /// meta.log().info(format_args!("rendering {}", "home.tmpl"));
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(method = %self.method, uri = %self.uri, "{}", args);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(method = %self.method, uri = %self.uri, "{}", args);
    }

    /// Logs an error-level message.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(method = %self.method, uri = %self.uri, "{}", args);
    }

    /// Logs an error together with the stack trace captured where it was handled.
    pub fn error_with_trace(&self, err: &dyn std::error::Error, trace: &Backtrace) {
        tracing::error!(
            method = %self.method,
            uri = %self.uri,
            trace = %trace,
            "{}",
            err
        );
    }
}
