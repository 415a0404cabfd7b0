use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Method, Uri},
};

use crate::logging::RequestLog;

/// Request line pieces attached to every log entry about a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    /// HTTP method of the request
    pub method: Method,
    /// Path and query, as sent on the request line
    pub uri: String,
}

impl RequestMeta {
    /// Builds metadata from a method and URI.
    ///
    /// # Examples
    ///
    /// ```
    /// use axum::http::{Method, Uri};
    /// use snippetbox::RequestMeta;
    ///
    /// let meta = RequestMeta::new(Method::GET, &Uri::from_static("/snippet/view?id=1"));
    /// assert_eq!(meta.uri, "/snippet/view?id=1");
    /// ```
    pub fn new(method: Method, uri: &Uri) -> Self {
        Self {
            method,
            uri: request_uri(uri),
        }
    }

    /// Returns a logger that tags every entry with this request's method and URI.
    pub fn log(&self) -> RequestLog<'_> {
        RequestLog::new(&self.method, &self.uri)
    }
}

impl From<&Parts> for RequestMeta {
    fn from(parts: &Parts) -> Self {
        Self::new(parts.method.clone(), &parts.uri)
    }
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from(&*parts))
    }
}

// Absolute-form URIs keep only the path and query, like the request line.
fn request_uri(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_path_and_query() {
        let meta = RequestMeta::new(Method::POST, &Uri::from_static("/user/login?next=%2F"));

        assert_eq!(meta.method, Method::POST);
        assert_eq!(meta.uri, "/user/login?next=%2F");
    }

    #[test]
    fn strips_scheme_and_authority() {
        let meta = RequestMeta::new(
            Method::GET,
            &Uri::from_static("http://localhost:4000/about"),
        );

        assert_eq!(meta.uri, "/about");
    }
}
