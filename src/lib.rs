//! HTTP helper layer for a server-rendered snippet sharing application.
//!
//! The crate wraps the request/response cycle of an axum application with
//! the helpers every handler needs:
//! - **Error responses**: [`Application::server_error`],
//!   [`Application::client_error`] and [`Application::not_found`]
//! - **Rendering**: [`Application::render`] executes a page from the
//!   precompiled [`TemplateCache`] into a buffer before writing anything
//! - **View-model**: [`Application::new_template_data`] gathers the current
//!   year, the one-time flash message, the authentication flag and the CSRF
//!   token
//! - **Forms**: [`Application::decode_post_form`] parses and decodes POST bodies
//! - **Authentication flag**: [`Application::is_authenticated`] reads the
//!   request context
//!
//! # Examples
//!
//! ```
//! use axum::http::StatusCode;
//! use snippetbox::{Application, TemplateCache};
//!
//! let app = Application::new(false, TemplateCache::default());
//!
//! let response = app.not_found();
//! assert_eq!(response.status(), StatusCode::NOT_FOUND);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod csrf;
mod error;
pub mod flash;
pub mod form;
mod helpers;
pub mod logging;
mod request;
pub mod server;
mod template_data;
pub mod templates;
pub mod validator;
pub mod web;

pub use config::Config;
pub use context::RequestContext;
pub use error::Error;
pub use form::FormError;
pub use helpers::{plain_error, status_text, Application};
pub use request::RequestMeta;
pub use template_data::TemplateData;
pub use templates::TemplateCache;
