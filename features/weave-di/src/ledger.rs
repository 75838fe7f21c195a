use std::{any::type_name, collections::HashMap, fmt::Display, sync::Arc};

use crate::{
    container::Container,
    cycle,
    errors::{RegisterError, RequireError, ResolveError},
    graph::DependencyGraph,
    plugin::{self, Dependencies, Entry, ErasedEntry, Plugin},
    resolver::Deps,
    scheduler::Scheduler,
    token::{Token, TokenInfo},
    types::{DynError, Injectable, Instance},
};

pub(crate) type EnhanceFn = Box<dyn FnOnce(Instance) -> Result<Instance, DynError> + Send>;

/// Who a registration (or a requirement) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Registered under a token
    Token(TokenInfo),
    /// Anonymous registration, always instantiated
    Unnamed,
    /// A value enhancer
    Enhancer,
}
impl Owner {
    pub fn token(&self) -> Option<TokenInfo> {
        match self {
            Owner::Token(info) => Some(*info),
            _ => None,
        }
    }
}
impl Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Owner::Token(info) => f.write_str(info.name),
            Owner::Unnamed => f.write_str("UnnamedPlugin"),
            Owner::Enhancer => f.write_str("Enhancer"),
        }
    }
}

pub(crate) struct Registration {
    pub(crate) owner: Owner,
    pub(crate) entry: ErasedEntry,
    /// Rewrites of this registration's own dependency lookups
    pub(crate) aliases: HashMap<TokenInfo, TokenInfo>,
}
impl Registration {
    fn new(owner: Owner, entry: ErasedEntry) -> Self {
        Registration {
            owner,
            entry,
            aliases: HashMap::new(),
        }
    }

    /// The token a dependency lookup of this registration actually resolves to
    pub(crate) fn effective(&self, token: TokenInfo) -> TokenInfo {
        self.aliases.get(&token).copied().unwrap_or(token)
    }
}

/// Handle to a single registration, used to alias its dependencies
pub struct RegistrationHandle<'a> {
    registration: &'a mut Registration,
}
impl RegistrationHandle<'_> {
    /// Makes this registration resolve `from` as `to`
    ///
    /// Only affects dependencies declared by this registration's own entry.
    pub fn alias<T>(self, from: Token<T>, to: Token<T>) -> Self {
        tracing::trace!(
            "'{}' aliases '{}' to '{}'",
            self.registration.owner,
            from,
            to
        );
        self.registration.aliases.insert(from.info(), to.info());
        self
    }

    pub fn owner(&self) -> Owner {
        self.registration.owner
    }
}

enum Phase {
    Registering,
    /// Entries were handed to the scheduler
    Instantiating,
    Resolved(Container),
}

/// The registration ledger
///
/// 1. Register tokens, plugins, values and middleware
/// 2. Resolve once - validates the graph and instantiates everything
/// 3. Access services through [Registry::get_service] or the returned [Container]
pub struct Registry {
    /// In registration order
    pub(crate) registrations: Vec<Registration>,
    by_token: HashMap<TokenInfo, usize>,
    /// In `enhance` call order
    pub(crate) enhancers: Vec<(TokenInfo, EnhanceFn)>,
    phase: Phase,
}
impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            registrations: Vec::new(),
            by_token: HashMap::new(),
            enhancers: Vec::new(),
            phase: Phase::Registering,
        }
    }

    pub(crate) fn index_of(&self, token: TokenInfo) -> Option<usize> {
        self.by_token.get(&token).copied()
    }

    fn ensure_registering(&self) -> Result<(), RegisterError> {
        match self.phase {
            Phase::Registering => Ok(()),
            _ => Err(RegisterError::Frozen),
        }
    }

    /// Number of current registrations, replaced ones are not counted
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.phase, Phase::Resolved(_))
    }
}

impl Registry {
    /// Binds `token` to `entry`, replacing any previous binding and its aliases
    pub fn register<T: Injectable>(
        &mut self,
        token: Token<T>,
        entry: impl Into<Entry<T>>,
    ) -> Result<RegistrationHandle<'_>, RegisterError> {
        self.ensure_registering()?;

        let info = token.info();
        let registration = Registration::new(Owner::Token(info), entry.into().into_erased());

        let index = match self.index_of(info) {
            Some(index) => {
                tracing::debug!("Replacing registration for '{}'", info);
                self.registrations[index] = registration;
                index
            }
            None => {
                self.registrations.push(registration);
                let index = self.registrations.len() - 1;
                self.by_token.insert(info, index);
                index
            }
        };

        Ok(RegistrationHandle {
            registration: &mut self.registrations[index],
        })
    }

    pub fn register_value<T: Injectable>(
        &mut self,
        token: Token<T>,
        value: T,
    ) -> Result<RegistrationHandle<'_>, RegisterError> {
        self.register(token, Entry::Value(value))
    }

    /// Registers a value the caller keeps a reference to
    pub fn register_shared<T: Injectable>(
        &mut self,
        token: Token<T>,
        value: Arc<T>,
    ) -> Result<RegistrationHandle<'_>, RegisterError> {
        self.register(token, Entry::Shared(value))
    }

    /// Registers a plugin without a token - it is always instantiated
    ///
    /// Raw values and empty entries can't be retrieved without a token and are rejected.
    pub fn register_anonymous<T: Injectable>(
        &mut self,
        entry: impl Into<Entry<T>>,
    ) -> Result<RegistrationHandle<'_>, RegisterError> {
        self.ensure_registering()?;

        let plugin = match entry.into() {
            Entry::Plugin(plugin) => plugin,
            Entry::Value(_) | Entry::Shared(_) => {
                return Err(RegisterError::InvalidRegistration {
                    value: format!("a value of type `{}` without a token", type_name::<T>()),
                })
            }
            Entry::Empty => {
                return Err(RegisterError::InvalidRegistration {
                    value: "an empty entry without a token".to_string(),
                })
            }
        };

        self.registrations.push(Registration::new(
            Owner::Unnamed,
            ErasedEntry::Plugin(plugin.into_erased()),
        ));
        let index = self.registrations.len() - 1;

        Ok(RegistrationHandle {
            registration: &mut self.registrations[index],
        })
    }

    /// Declares request-scoped middleware with its own dependencies
    ///
    /// Middleware is composed in registration order.
    pub fn middleware<H, F, E>(
        &mut self,
        dependencies: Dependencies,
        factory: F,
    ) -> Result<(), RegisterError>
    where
        H: Injectable,
        F: FnOnce(Deps) -> Result<H, E> + Send + 'static,
        E: Into<DynError>,
    {
        let plugin = Plugin::<()>::new()
            .deps(dependencies)
            .middleware(move |deps, _| factory(deps));

        self.register_anonymous(plugin)?;
        Ok(())
    }

    /// Transforms the resolved value of `token` before any dependent sees it
    pub fn enhance<T, F, E>(&mut self, token: Token<T>, enhancer: F) -> Result<(), RegisterError>
    where
        T: Injectable,
        F: FnOnce(Arc<T>) -> Result<T, E> + Send + 'static,
        E: Into<DynError>,
    {
        self.ensure_registering()?;

        let enhance: EnhanceFn = Box::new(move |instance| {
            let value = plugin::downcast::<T>(&instance)?;
            enhancer(value).map(Instance::new).map_err(|e| e.into())
        });
        self.enhancers.push((token.info(), enhance));
        Ok(())
    }
}

impl Registry {
    /// Validates the registrations and instantiates every plugin exactly once
    ///
    /// Validation failures leave the registrations untouched.
    /// Once instantiation started, the registry can't be resolved again.
    pub async fn resolve(&mut self) -> Result<Container, ResolveError> {
        if !matches!(self.phase, Phase::Registering) {
            return Err(ResolveError::AlreadyResolved);
        }

        tracing::debug!(
            "Resolving {} registrations and {} enhancers",
            self.registrations.len(),
            self.enhancers.len()
        );

        let graph = DependencyGraph::build(self)?;
        cycle::detect(&graph)?;
        graph.check_extraneous()?;

        let registrations = std::mem::take(&mut self.registrations);
        let enhancers = std::mem::take(&mut self.enhancers);
        self.by_token.clear();
        self.phase = Phase::Instantiating;

        let resolution = Scheduler::new(&graph, registrations, enhancers)
            .run()
            .await?;

        let container = Container::new(resolution, graph);
        self.phase = Phase::Resolved(container.clone());
        Ok(container)
    }

    /// The container, once resolved
    pub fn container(&self) -> Result<&Container, RequireError> {
        match &self.phase {
            Phase::Resolved(container) => Ok(container),
            _ => Err(RequireError::Unresolved),
        }
    }

    /// Resolved value of `token`
    pub fn get_service<T: Injectable>(&self, token: Token<T>) -> Result<Arc<T>, RequireError> {
        self.container()?.get_service(token)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    #[test]
    fn re_registering_keeps_position_and_drops_aliases() {
        let a: Token<u32> = Token::new("A");
        let b: Token<u32> = Token::new("B");
        let c: Token<u32> = Token::new("C");

        let mut registry = Registry::new();
        registry.register_value(a, 1).unwrap();
        registry
            .register(b, Plugin::new().dep("a", a))
            .unwrap()
            .alias(a, c);
        registry.register_value(c, 3).unwrap();

        assert_eq!(registry.registrations[1].effective(a.info()), c.info());

        registry.register(b, Plugin::new()).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.registrations[1].owner, Owner::Token(b.info()));
        assert_eq!(registry.registrations[1].effective(a.info()), a.info());
    }

    #[test]
    fn aliasing_is_idempotent() {
        let a: Token<u32> = Token::new("A");
        let b: Token<u32> = Token::new("B");
        let c: Token<u32> = Token::new("C");

        let mut registry = Registry::new();
        let handle = registry
            .register(c, Plugin::new().dep("a", a))
            .unwrap()
            .alias(a, b)
            .alias(a, b);

        assert_eq!(handle.owner(), Owner::Token(c.info()));
        assert_eq!(registry.registrations[0].aliases.len(), 1);
    }

    #[test]
    fn anonymous_values_are_invalid() {
        let mut registry = Registry::new();

        let err = registry
            .register_anonymous(Entry::value("some-value"))
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("Cannot register a value of type `&str`"));

        let err = registry
            .register_anonymous(None::<Plugin<u32>>)
            .err()
            .unwrap();
        assert!(matches!(err, RegisterError::InvalidRegistration { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn anonymous_plugins_are_unnamed() {
        let mut registry = Registry::new();
        let handle = registry
            .register_anonymous(Plugin::<()>::new().provides_sync(|_| Ok::<_, Infallible>(())))
            .unwrap();

        assert_eq!(handle.owner(), Owner::Unnamed);
        assert_eq!(Owner::Unnamed.to_string(), "UnnamedPlugin");
    }
}
