use std::{any::type_name, future::Future, marker::PhantomData, sync::Arc};

use futures::{
    future::{self, BoxFuture},
    FutureExt,
};

use crate::{
    errors::RequireError,
    resolver::Deps,
    token::{DependencyToken, TokenInfo},
    types::{DynError, Injectable, Instance, TypeInfo},
};

pub(crate) type ProvideFn =
    Box<dyn FnOnce(Deps) -> BoxFuture<'static, Result<Instance, DynError>> + Send>;
pub(crate) type MiddlewareFn =
    Box<dyn FnOnce(Deps, Option<Instance>) -> Result<Instance, DynError> + Send>;
pub(crate) type CleanupFn =
    Box<dyn FnOnce(Instance) -> BoxFuture<'static, Result<(), DynError>> + Send>;

/// A declared dependency of a plugin
#[derive(Debug, Clone, Copy)]
pub struct Dependency {
    /// Name the resolved value is handed to the plugin under
    pub name: &'static str,
    /// The declared token, before aliasing
    pub token: TokenInfo,
    /// If absence of a registration is allowed
    pub optional: bool,
}

/// Ordered list of dependencies, names are unique
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    list: Vec<Dependency>,
}
impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `token` under `name`, replacing an earlier declaration with the same name
    pub fn with(mut self, name: &'static str, token: impl DependencyToken) -> Self {
        self.push(Dependency {
            name,
            token: token.token_info(),
            optional: token.is_optional(),
        });
        self
    }

    fn push(&mut self, dependency: Dependency) {
        match self.list.iter_mut().find(|d| d.name == dependency.name) {
            Some(existing) => *existing = dependency,
            None => self.list.push(dependency),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.list.iter()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

/// A unit declaring named dependencies and how to construct its service and middleware
///
/// Nothing is called before [Registry::resolve](crate::Registry::resolve).
///
/// ```rust
/// use std::sync::Arc;
/// use weave_di::{Plugin, Token};
///
/// let name: Token<String> = Token::new("Name");
///
/// let greeter = Plugin::new()
///     .dep("name", name)
///     .provides(|deps| async move {
///         let name: Arc<String> = deps.get("name")?;
///         Ok::<_, weave_di::RequireError>(format!("Hello {name}"))
///     });
/// # let _: Plugin<String> = greeter;
/// ```
pub struct Plugin<T> {
    dependencies: Dependencies,
    provides: Option<ProvideFn>,
    middleware: Option<MiddlewareFn>,
    cleanup: Option<CleanupFn>,
    _marker: PhantomData<fn() -> T>,
}
impl<T: Injectable> Default for Plugin<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Injectable> Plugin<T> {
    pub fn new() -> Self {
        Plugin {
            dependencies: Dependencies::new(),
            provides: None,
            middleware: None,
            cleanup: None,
            _marker: PhantomData,
        }
    }

    pub fn dep(mut self, name: &'static str, token: impl DependencyToken) -> Self {
        self.dependencies = self.dependencies.with(name, token);
        self
    }

    /// Replaces all declared dependencies
    pub fn deps(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Asynchronously constructs the provided service
    pub fn provides<F, Fut, E>(mut self, provides: F) -> Self
    where
        F: FnOnce(Deps) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<DynError>,
    {
        self.provides = Some(Box::new(move |deps| {
            let construction_fut = provides(deps);
            async move {
                construction_fut
                    .await
                    .map(Instance::new)
                    .map_err(|e| e.into())
            }
            .boxed()
        }));
        self
    }

    /// Synchronously constructs the provided service
    pub fn provides_sync<F, E>(mut self, provides: F) -> Self
    where
        F: FnOnce(Deps) -> Result<T, E> + Send + 'static,
        E: Into<DynError>,
    {
        self.provides = Some(Box::new(move |deps| {
            future::ready(provides(deps).map(Instance::new).map_err(|e| e.into())).boxed()
        }));
        self
    }

    /// Builds request-scoped middleware from the dependencies and the provided service
    pub fn middleware<H, F, E>(mut self, factory: F) -> Self
    where
        H: Injectable,
        F: FnOnce(Deps, Option<Arc<T>>) -> Result<H, E> + Send + 'static,
        E: Into<DynError>,
    {
        self.middleware = Some(Box::new(move |deps, provided| {
            let provided = provided.map(|instance| downcast::<T>(&instance)).transpose()?;
            factory(deps, provided)
                .map(Instance::new)
                .map_err(|e| e.into())
        }));
        self
    }

    /// Teardown hook, run by [Container::cleanup](crate::Container::cleanup)
    ///
    /// Only called if the plugin provided a value.
    pub fn cleanup<F, Fut, E>(mut self, cleanup: F) -> Self
    where
        F: FnOnce(Arc<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<DynError>,
    {
        self.cleanup = Some(Box::new(move |instance| match downcast::<T>(&instance) {
            Ok(provided) => cleanup(provided).map(|res| res.map_err(|e| e.into())).boxed(),
            Err(e) => future::ready(Err(e)).boxed(),
        }));
        self
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub(crate) fn into_erased(self) -> ErasedPlugin {
        ErasedPlugin {
            provides_type: TypeInfo::of::<T>(),
            dependencies: self.dependencies,
            provides: self.provides,
            middleware: self.middleware,
            cleanup: self.cleanup,
        }
    }
}

pub(crate) fn downcast<T: Injectable>(instance: &Instance) -> Result<Arc<T>, DynError> {
    instance.downcast::<T>().map_err(|actual_type| {
        Box::new(RequireError::DowncastFailed {
            required_type: type_name::<T>(),
            actual_type,
        }) as DynError
    })
}

/// What a token (or an anonymous registration) is bound to
pub enum Entry<T> {
    Plugin(Plugin<T>),
    /// A raw value, it is the resolved service itself
    Value(T),
    /// A raw value shared with the caller
    Shared(Arc<T>),
    /// Explicitly nothing, e.g. a plugin not available on this platform
    Empty,
}
impl<T> From<Plugin<T>> for Entry<T> {
    fn from(plugin: Plugin<T>) -> Self {
        Entry::Plugin(plugin)
    }
}
impl<T> From<Option<Plugin<T>>> for Entry<T> {
    fn from(plugin: Option<Plugin<T>>) -> Self {
        match plugin {
            Some(plugin) => Entry::Plugin(plugin),
            None => Entry::Empty,
        }
    }
}
impl<T: Injectable> Entry<T> {
    pub fn value(value: T) -> Self {
        Entry::Value(value)
    }

    pub(crate) fn into_erased(self) -> ErasedEntry {
        match self {
            Entry::Plugin(plugin) => ErasedEntry::Plugin(plugin.into_erased()),
            Entry::Value(value) => ErasedEntry::Value(Instance::new(value)),
            Entry::Shared(value) => ErasedEntry::Value(Instance::shared(value)),
            Entry::Empty => ErasedEntry::Empty,
        }
    }
}

/// Shape of a registered entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Plugin,
    Value,
    Empty,
}

pub(crate) struct ErasedPlugin {
    pub(crate) provides_type: TypeInfo,
    pub(crate) dependencies: Dependencies,
    pub(crate) provides: Option<ProvideFn>,
    pub(crate) middleware: Option<MiddlewareFn>,
    pub(crate) cleanup: Option<CleanupFn>,
}

pub(crate) enum ErasedEntry {
    Plugin(ErasedPlugin),
    Value(Instance),
    Empty,
}
impl ErasedEntry {
    pub(crate) fn kind(&self) -> EntryKind {
        match self {
            ErasedEntry::Plugin(_) => EntryKind::Plugin,
            ErasedEntry::Value(_) => EntryKind::Value,
            ErasedEntry::Empty => EntryKind::Empty,
        }
    }

    pub(crate) fn dependencies(&self) -> Option<&Dependencies> {
        match self {
            ErasedEntry::Plugin(plugin) => Some(&plugin.dependencies),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::token::Token;

    #[test]
    fn dependency_names_are_unique() {
        let first: Token<u32> = Token::new("first");
        let second: Token<u32> = Token::new("second");

        let deps = Dependencies::new()
            .with("a", first)
            .with("b", second.optional())
            .with("a", second);

        let declared: Vec<_> = deps.iter().map(|d| (d.name, d.token, d.optional)).collect();
        assert_eq!(
            declared,
            vec![("a", second.info(), false), ("b", second.info(), true)]
        );
    }

    #[test]
    fn nothing_runs_while_building() {
        let plugin: Plugin<u32> = Plugin::new()
            .provides_sync(|_| -> Result<u32, Infallible> { panic!("must not run") })
            .middleware(|_, _| -> Result<(), Infallible> { panic!("must not run") });

        let erased = plugin.into_erased();
        assert!(erased.provides.is_some());
        assert!(erased.middleware.is_some());
        assert!(erased.cleanup.is_none());
        assert_eq!(erased.provides_type, TypeInfo::of::<u32>());
    }

    #[test]
    fn missing_plugin_is_empty() {
        let entry: Entry<u32> = None::<Plugin<u32>>.into();
        assert_eq!(entry.into_erased().kind(), EntryKind::Empty);

        let entry = Entry::value(3_u32);
        assert_eq!(entry.into_erased().kind(), EntryKind::Value);
    }

    #[test]
    fn provides_sync_produces_instance() {
        let plugin: Plugin<u32> = Plugin::new().provides_sync(|_| Ok::<_, Infallible>(7));

        let provides = plugin.into_erased().provides.unwrap();
        let instance = futures::executor::block_on(provides(Deps::default())).unwrap();
        assert_eq!(*instance.downcast::<u32>().unwrap(), 7);
    }
}
