use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the helper layer.
///
/// Every variant is server-caused: handlers pass these to
/// [`Application::server_error`](crate::Application::server_error), which
/// logs them and answers 500.
#[derive(Debug, Error)]
pub enum Error {
    /// The template cache has no entry for the requested page.
    #[error("the template {0} does not exist")]
    TemplateNotFound(String),

    /// A template file failed to compile while building the cache.
    #[error("template {name} failed to compile: {source}")]
    TemplateParse {
        /// Name the template was registered under
        name: String,
        /// Compile error reported by the template engine
        #[source]
        source: Box<handlebars::TemplateError>,
    },

    /// Executing a template's `base` entry point failed.
    #[error(transparent)]
    TemplateRender(#[from] handlebars::RenderError),

    /// A value could not be converted into template data.
    #[error("template data serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A handler panicked; carries the panic message.
    #[error("{0}")]
    Panic(String),

    /// A template file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File or directory being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
