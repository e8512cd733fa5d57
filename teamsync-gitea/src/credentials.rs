//! Ordered credential pool with explicit fallback state.
//!
//! The pool itself is immutable; which credential is active lives in a
//! [`CredentialSelector`] value owned by the caller and passed into every
//! client call. The client advances it when a credential is rejected, the
//! orchestrator resets it at loop boundaries.

use std::fmt;

/// Tokens in the order they are tried.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPool {
    tokens: Vec<String>,
}

impl CredentialPool {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The credential `selector` points at, or `None` once the pool is
    /// exhausted.
    pub fn get(&self, selector: &CredentialSelector) -> Option<&str> {
        self.tokens.get(selector.index).map(String::as_str)
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPool")
            .field("tokens", &format_args!("<{} redacted>", self.tokens.len()))
            .finish()
    }
}

/// Index of the active credential. Only ever moves forward until reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CredentialSelector {
    index: usize,
}

impl CredentialSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Start over from the first credential.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub(crate) fn advance(&mut self) {
        self.index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_walks_pool_until_exhausted() {
        let pool = CredentialPool::new(vec!["a".into(), "b".into()]);
        let mut selector = CredentialSelector::new();
        assert_eq!(pool.get(&selector), Some("a"));
        selector.advance();
        assert_eq!(pool.get(&selector), Some("b"));
        selector.advance();
        assert_eq!(pool.get(&selector), None);
        selector.reset();
        assert_eq!(selector.index(), 0);
    }

    #[test]
    fn debug_output_hides_tokens() {
        let pool = CredentialPool::new(vec!["s3cret".into()]);
        assert!(!format!("{pool:?}").contains("s3cret"));
    }
}
