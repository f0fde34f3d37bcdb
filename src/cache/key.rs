//! Canonical cache keys built from bound argument lists.

use std::fmt;

/// Separator between rendered arguments.
pub const KEY_SEPARATOR: &str = "|";

/// A canonical key identifying one argument signature.
///
/// Arguments are rendered as `name_value` in the order they are added and
/// joined with [`KEY_SEPARATOR`]. Callers add every parameter in declaration
/// order, defaults included, so two calls bind to the same entry exactly when
/// their bound values are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CacheKey {
    parts: Vec<String>,
}

impl CacheKey {
    /// Start an empty key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named argument.
    pub fn arg(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.parts.push(format!("{}_{}", name, value));
        self
    }

    /// Append an optional argument, rendering `None` literally.
    pub fn opt_arg<V: fmt::Display>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.arg(name, v),
            None => self.arg(name, "None"),
        }
    }

    /// Number of arguments in the key.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether no arguments were added.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join(KEY_SEPARATOR))
    }
}

/// Argument bundles that know how to render their own cache key.
///
/// Implement this on a struct holding a memoized function's parameters.
/// Struct construction fills in defaults, so the key always reflects the
/// fully bound argument list.
pub trait CacheArgs {
    /// Render the canonical key for these arguments.
    fn cache_key(&self) -> CacheKey;
}

impl CacheArgs for () {
    fn cache_key(&self) -> CacheKey {
        CacheKey::new()
    }
}

impl CacheArgs for String {
    fn cache_key(&self) -> CacheKey {
        CacheKey::new().arg("arg", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct CardArgs {
        user_id: String,
        uid: String,
        use_cache: bool,
    }

    impl CardArgs {
        fn new(user_id: &str, uid: &str) -> Self {
            Self {
                user_id: user_id.to_string(),
                uid: uid.to_string(),
                use_cache: true,
            }
        }
    }

    impl CacheArgs for CardArgs {
        fn cache_key(&self) -> CacheKey {
            CacheKey::new()
                .arg("user_id", &self.user_id)
                .arg("uid", &self.uid)
                .arg("use_cache", self.use_cache)
        }
    }

    #[test]
    fn test_key_rendering() {
        let key = CardArgs::new("42", "100000001").cache_key();
        assert_eq!(key.to_string(), "user_id_42|uid_100000001|use_cache_true");
        assert_eq!(key.len(), 3);
    }

    #[test]
    fn test_defaults_and_explicit_values_bind_equal() {
        let defaulted = CardArgs::new("42", "100000001");
        let explicit = CardArgs {
            use_cache: true,
            uid: "100000001".to_string(),
            user_id: "42".to_string(),
        };
        assert_eq!(defaulted.cache_key(), explicit.cache_key());
    }

    #[test]
    fn test_different_values_produce_different_keys() {
        let a = CardArgs::new("42", "100000001").cache_key();
        let b = CardArgs::new("42", "500000001").cache_key();
        let mut c = CardArgs::new("42", "100000001");
        c.use_cache = false;

        assert_ne!(a, b);
        assert_ne!(a, c.cache_key());
    }

    #[test]
    fn test_optional_argument() {
        let key = CacheKey::new().opt_arg::<u32>("month", None).arg("uid", 7);
        assert_eq!(key.to_string(), "month_None|uid_7");

        let key = CacheKey::new().opt_arg("month", Some(3));
        assert_eq!(key.to_string(), "month_3");
    }

    #[test]
    fn test_empty_key() {
        assert!(().cache_key().is_empty());
        assert_eq!(().cache_key().to_string(), "");
    }
}
