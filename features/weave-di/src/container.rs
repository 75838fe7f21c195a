use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex},
};

use futures::{future::join_all, FutureExt};

use crate::{
    errors::{CleanupError, RequireError},
    graph::DependencyGraph,
    middleware::MiddlewareChain,
    resolver::{Resolver, Slot, SlotValue},
    scheduler::{BoundCleanup, Resolution},
    token::{Token, TokenInfo},
    types::{Injectable, Instance},
};

/// Container holding all resolved services
///
/// Read only - cheap to clone and share with the request handling layer.
#[derive(Clone)]
pub struct Container(pub Arc<ContainerInner>);
pub struct ContainerInner {
    /// None = Token is known but resolved to no value
    services: HashMap<TokenInfo, Option<Instance>>,
    graph: DependencyGraph,
    middleware: MiddlewareChain,
    cleanups: Mutex<Vec<BoundCleanup>>,
}
impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_struct("Container");
        for node in self.0.graph.nodes() {
            let Some(token) = node.owner.token() else {
                continue;
            };
            let val = match self.0.services.get(&token) {
                Some(Some(instance)) => instance.info.type_name,
                _ => "no value",
            };
            map.field(token.name, &val);
        }
        map.field("middleware", &self.0.middleware.len());
        map.finish()
    }
}

impl Container {
    pub(crate) fn new(resolution: Resolution, graph: DependencyGraph) -> Self {
        let Resolution {
            services,
            middleware,
            cleanups,
        } = resolution;

        Self(Arc::new(ContainerInner {
            services,
            graph,
            middleware,
            cleanups: Mutex::new(cleanups),
        }))
    }

    /// Resolved value of `token`
    pub fn get_service<T: Injectable>(&self, token: Token<T>) -> Result<Arc<T>, RequireError> {
        self.get(token)
    }

    /// Resolved value of `token`, extracted through a [Resolver]
    ///
    /// `get::<Option<Arc<T>>>` does not fail for tokens without value.
    pub fn get<R: Resolver, T>(&self, token: Token<T>) -> Result<R, RequireError> {
        let info = token.info();
        let value = self
            .0
            .services
            .get(&info)
            .ok_or(RequireError::TokenMissing(info))?;

        let value = match value {
            Some(instance) => SlotValue::Value(instance.clone()),
            None => SlotValue::Empty,
        };

        R::resolve(&Slot { token: info, value })
    }

    pub fn contains<T>(&self, token: Token<T>) -> bool {
        self.0.services.contains_key(&token.info())
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.0.graph
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.0.middleware
    }

    /// Runs all cleanup hooks concurrently
    ///
    /// Hooks run at most once - later calls only run hooks which were not run yet.
    pub async fn cleanup(&self) -> Result<(), CleanupError> {
        let cleanups = {
            let mut guard = self
                .0
                .cleanups
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *guard)
        };

        tracing::debug!("Running {} cleanup hooks", cleanups.len());
        let results = join_all(cleanups.into_iter().map(|bound| {
            let owner = bound.owner;
            (bound.cleanup)(bound.value).map(move |result| (owner, result))
        }))
        .await;

        let failures: Vec<_> = results
            .into_iter()
            .filter_map(|(owner, result)| result.err().map(|error| (owner, error)))
            .collect();

        if !failures.is_empty() {
            let error = CleanupError { failures };
            tracing::error!("{}", error);
            return Err(error);
        }

        Ok(())
    }
}
