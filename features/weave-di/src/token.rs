use std::{
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a token
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenId(u64);

/// Untyped identity of a [Token]
///
/// Equality, ordering and hashing use the id only - the name is for diagnostics.
#[derive(Clone, Copy)]
pub struct TokenInfo {
    pub id: TokenId,
    pub name: &'static str,
}
impl PartialEq for TokenInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for TokenInfo {}
impl Hash for TokenInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl PartialOrd for TokenInfo {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TokenInfo {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}
impl Display for TokenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}
impl Debug for TokenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.id.0)
    }
}

/// Typed handle used to address a dependency without naming its implementation
///
/// Every call to [Token::new] creates a new identity, even when the name is reused:
/// ```rust
/// use weave_di::Token;
///
/// let first: Token<String> = Token::new("Greeting");
/// let second: Token<String> = Token::new("Greeting");
/// assert_ne!(first, second);
/// ```
pub struct Token<T> {
    info: TokenInfo,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Token<T> {
    pub fn new(name: &'static str) -> Self {
        let id = TokenId(NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed));
        Token {
            info: TokenInfo { id, name },
            _marker: PhantomData,
        }
    }

    pub fn info(&self) -> TokenInfo {
        self.info
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Same token, but a missing binding resolves to absence instead of an error
    pub fn optional(&self) -> Optional<T> {
        Optional {
            info: self.info,
            _marker: PhantomData,
        }
    }
}

// Manual impls - derives would require `T: Clone` etc.
impl<T> Clone for Token<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Token<T> {}
impl<T> PartialEq for Token<T> {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
    }
}
impl<T> Eq for Token<T> {}
impl<T> Hash for Token<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.info.hash(state);
    }
}
impl<T> Debug for Token<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Token").field(&self.info).finish()
    }
}
impl<T> Display for Token<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.info.name)
    }
}

/// Optional view of a [Token], see [Token::optional]
pub struct Optional<T> {
    info: TokenInfo,
    _marker: PhantomData<fn() -> T>,
}
impl<T> Optional<T> {
    pub fn info(&self) -> TokenInfo {
        self.info
    }
}
impl<T> Clone for Optional<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Optional<T> {}
impl<T> PartialEq for Optional<T> {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
    }
}
impl<T> Eq for Optional<T> {}
impl<T> Debug for Optional<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Optional").field(&self.info).finish()
    }
}

/// Anything that can be declared as a dependency
pub trait DependencyToken {
    fn token_info(&self) -> TokenInfo;
    fn is_optional(&self) -> bool;
}
impl<T> DependencyToken for Token<T> {
    fn token_info(&self) -> TokenInfo {
        self.info
    }

    fn is_optional(&self) -> bool {
        false
    }
}
impl<T> DependencyToken for Optional<T> {
    fn token_info(&self) -> TokenInfo {
        self.info
    }

    fn is_optional(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_with_the_same_name_are_distinct() {
        let a: Token<u32> = Token::new("same");
        let b: Token<u32> = Token::new("same");

        assert_ne!(a, b);
        assert_ne!(a.info(), b.info());
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn optional_keeps_identity() {
        let token: Token<u32> = Token::new("numbers");

        assert_eq!(token.optional(), token.optional());
        assert_eq!(token.optional().info(), token.info());
        assert!(token.optional().is_optional());
        assert!(!token.is_optional());
    }

    #[test]
    fn copies_compare_equal() {
        let token: Token<String> = Token::new("copied");
        let copy = token;

        assert_eq!(token, copy);
        assert_eq!(format!("{token}"), "copied");
    }
}
