//! Secret wrapper for credential values
//!
//! Access and refresh tokens are opaque strings that must never reach a log
//! line. Wrapping them here makes `{:?}` and `{}` print `[REDACTED]` and wipes
//! the buffer when the value is dropped.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value - redacted in Debug/Display/logs
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Create a new secret value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Borrow the secret as a string slice.
    pub fn expose_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether the wrapped string is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret<String> {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

impl<T: Zeroize + PartialEq> PartialEq for Secret<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: Zeroize + Eq> Eq for Secret<T> {}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_redacted_in_debug_and_display() {
        let token = Secret::new(String::from("eyJhbGciOi.access"));
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        assert_eq!(format!("{token}"), "[REDACTED]");
    }

    #[test]
    fn expose_str_returns_raw_value() {
        let token: Secret<String> = "rt_abc".into();
        assert_eq!(token.expose_str(), "rt_abc");
        assert_eq!(token.expose(), "rt_abc");
        assert!(!token.is_empty());
    }

    #[test]
    fn equality_compares_inner_values() {
        let a: Secret<String> = "T2".into();
        let b: Secret<String> = String::from("T2").into();
        let c: Secret<String> = "T3".into();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn clone_is_independent_copy() {
        let original: Secret<String> = "T1".into();
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.expose_str(), "T1");
    }
}
