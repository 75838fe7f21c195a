use std::collections::BTreeMap;

use crate::{errors::RequireError, token::TokenInfo, types::Instance};

pub mod arc;

/// Extracts a typed value out of a resolved dependency
///
/// Implemented for `Arc<T>` (value required) and `Option<R>` (absence allowed).
pub trait Resolver: Sized {
    fn resolve(slot: &Slot) -> Result<Self, RequireError>;
}

/// What a dependency resolved to
#[derive(Debug, Clone)]
pub enum SlotValue {
    /// Optional dependency without a registration
    Absent,
    /// Registered, but bound to nothing (an empty entry or a plugin without `provides`)
    Empty,
    Value(Instance),
}

/// A single resolved dependency
#[derive(Debug, Clone)]
pub struct Slot {
    /// The effective token, after aliasing
    pub token: TokenInfo,
    pub value: SlotValue,
}
impl Slot {
    /// Whether the token has a registration, even one without value
    pub fn is_bound(&self) -> bool {
        !matches!(self.value, SlotValue::Absent)
    }
}

/// Resolved dependencies of a plugin, keyed by the declared dependency names
#[derive(Debug, Clone, Default)]
pub struct Deps {
    slots: BTreeMap<&'static str, Slot>,
}
impl Deps {
    pub(crate) fn insert(&mut self, name: &'static str, slot: Slot) {
        self.slots.insert(name, slot);
    }

    /// Extracts the dependency declared under `name`
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use weave_di::{Plugin, Registry, RequireError, Token};
    ///
    /// let host: Token<String> = Token::new("Host");
    /// let port: Token<u16> = Token::new("Port");
    /// let address: Token<String> = Token::new("Address");
    ///
    /// let mut registry = Registry::new();
    /// registry.register_value(host, "localhost".to_string()).unwrap();
    /// registry
    ///     .register(
    ///         address,
    ///         Plugin::new()
    ///             .dep("host", host)
    ///             .dep("port", port.optional())
    ///             .provides_sync(|deps| {
    ///                 let host: Arc<String> = deps.get("host")?;
    ///                 let port: Option<Arc<u16>> = deps.get("port")?;
    ///                 let port = port.map_or(80, |port| *port);
    ///                 Ok::<_, RequireError>(format!("{host}:{port}"))
    ///             }),
    ///     )
    ///     .unwrap();
    ///
    /// let container = futures::executor::block_on(registry.resolve()).unwrap();
    /// assert_eq!(container.get_service(address).unwrap().as_str(), "localhost:80");
    /// ```
    pub fn get<R: Resolver>(&self, name: &'static str) -> Result<R, RequireError> {
        let slot = self
            .slots
            .get(name)
            .ok_or(RequireError::UnknownDependency(name))?;

        R::resolve(slot)
    }

    /// Whether the dependency declared under `name` has a registration
    ///
    /// Tells an explicitly empty binding apart from an unregistered optional dependency.
    pub fn is_bound(&self, name: &'static str) -> Result<bool, RequireError> {
        self.slots
            .get(name)
            .map(Slot::is_bound)
            .ok_or(RequireError::UnknownDependency(name))
    }

    /// The token the dependency was resolved from
    pub fn token(&self, name: &str) -> Option<TokenInfo> {
        self.slots.get(name).map(|slot| slot.token)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
