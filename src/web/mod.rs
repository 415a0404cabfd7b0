//! HTTP surface: request extraction, middleware and handlers.

mod extract;
pub mod handlers;
pub mod middleware;

pub use extract::RequestScope;
pub use middleware::{authenticate, common_headers, recover_panic, AUTHENTICATED_USER_ID};
