//! One-time session messages.

use tower_sessions::Session;
use tracing::warn;

/// Session key holding the pending flash message.
pub const FLASH_KEY: &str = "flash";

/// Stores `message` to be shown on the next rendered page.
pub async fn put_flash(
    session: &Session,
    message: impl Into<String>,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(FLASH_KEY, message.into()).await
}

/// Removes and returns the string stored under `key`.
///
/// Returns an empty string when the key is absent, holds a non-string value,
/// or the store fails. The key is cleared in every case where it existed.
pub async fn pop_string(session: &Session, key: &str) -> String {
    match session.remove::<String>(key).await {
        Ok(value) => value.unwrap_or_default(),
        Err(err) => {
            warn!(key, error = %err, "failed to pop session value");
            String::new()
        }
    }
}
