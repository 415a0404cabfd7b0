//! Request-scoped context values.
//!
//! Middleware that learns something about a request (for example that its
//! session belongs to a signed-in user) records it in a [`RequestContext`]
//! stored in the request extensions. Handlers and helpers read it back by key.
//!
//! Values are type-erased, so a reader asking for the wrong type gets `None`
//! rather than a panic.

use std::{any::Any, collections::HashMap, fmt, sync::Arc};

/// Key under which a value is stored in a [`RequestContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextKey(&'static str);

impl ContextKey {
    /// Creates a key with the given name.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the key's name.
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Context key holding whether the request comes from an authenticated user.
pub const IS_AUTHENTICATED: ContextKey = ContextKey::new("isAuthenticated");

/// Type-erased values attached to a single request.
///
/// Cloning is cheap: values are shared, not copied.
///
/// # Examples
///
/// ```
/// use snippetbox::context::{RequestContext, IS_AUTHENTICATED};
///
/// let ctx = RequestContext::new().with_value(IS_AUTHENTICATED, true);
///
/// assert_eq!(ctx.value::<bool>(IS_AUTHENTICATED), Some(&true));
/// assert_eq!(ctx.value::<String>(IS_AUTHENTICATED), None);
/// ```
#[derive(Clone, Default)]
pub struct RequestContext {
    values: HashMap<ContextKey, Arc<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this context with `value` stored under `key`.
    ///
    /// A previous value under the same key is replaced in the copy only.
    pub fn with_value<T>(&self, key: ContextKey, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        let mut values = self.values.clone();
        values.insert(key, Arc::new(value));
        Self { values }
    }

    /// Returns the value under `key` if present and of type `T`.
    pub fn value<T: Any>(&self, key: ContextKey) -> Option<&T> {
        self.values.get(&key)?.downcast_ref::<T>()
    }

    /// Returns `true` if any value is stored under `key`.
    pub fn contains(&self, key: ContextKey) -> bool {
        self.values.contains_key(&key)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Returns the authentication flag stored in `ctx`.
///
/// Absent values and values of any type other than `bool` read as `false`.
pub fn is_authenticated(ctx: &RequestContext) -> bool {
    ctx.value::<bool>(IS_AUTHENTICATED)
        .copied()
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_is_not_authenticated() {
        assert!(!is_authenticated(&RequestContext::new()));
    }

    #[test]
    fn stored_flag_is_returned() {
        let ctx = RequestContext::new().with_value(IS_AUTHENTICATED, true);
        assert!(is_authenticated(&ctx));

        let ctx = ctx.with_value(IS_AUTHENTICATED, false);
        assert!(!is_authenticated(&ctx));
    }

    #[test]
    fn non_bool_value_reads_as_unauthenticated() {
        let ctx = RequestContext::new().with_value(IS_AUTHENTICATED, "true");
        assert!(ctx.contains(IS_AUTHENTICATED));
        assert!(!is_authenticated(&ctx));

        let ctx = RequestContext::new().with_value(IS_AUTHENTICATED, 1_u8);
        assert!(!is_authenticated(&ctx));
    }

    #[test]
    fn with_value_leaves_original_untouched() {
        let original = RequestContext::new();
        let derived = original.with_value(IS_AUTHENTICATED, true);

        assert!(!original.contains(IS_AUTHENTICATED));
        assert!(derived.contains(IS_AUTHENTICATED));
    }

    #[test]
    fn keys_compare_by_name() {
        let key = ContextKey::new("isAuthenticated");
        assert_eq!(key, IS_AUTHENTICATED);
        assert_eq!(key.to_string(), "isAuthenticated");
    }

    #[test]
    fn debug_lists_keys_only() {
        let ctx = RequestContext::new().with_value(ContextKey::new("secret"), "hunter2".to_string());
        let debug_output = format!("{:?}", ctx);

        assert!(debug_output.contains("secret"));
        assert!(!debug_output.contains("hunter2"));
    }
}
