use std::{any::type_name, sync::Arc};

use crate::{
    errors::RequireError,
    graph::DependencyGraph,
    ledger::Owner,
    types::{Injectable, Instance},
};

/// Middleware produced by one registration
#[derive(Debug, Clone)]
pub struct MiddlewareLink {
    pub owner: Owner,
    pub handler: Instance,
}
impl MiddlewareLink {
    /// The middleware, as produced by its factory
    pub fn handler<H: Injectable>(&self) -> Result<Arc<H>, RequireError> {
        self.handler
            .downcast()
            .map_err(|actual_type| RequireError::DowncastFailed {
                required_type: type_name::<H>(),
                actual_type,
            })
    }
}

/// Request-scoped middleware in registration order
///
/// Running the chain is up to the request handling layer.
#[derive(Debug, Clone, Default)]
pub struct MiddlewareChain {
    links: Vec<MiddlewareLink>,
}
impl MiddlewareChain {
    /// Orders produced middleware by the registration position of its node
    pub(crate) fn compose(graph: &DependencyGraph, mut produced: Vec<(usize, Instance)>) -> Self {
        produced.sort_by_key(|(index, _)| *index);

        let links: Vec<MiddlewareLink> = produced
            .into_iter()
            .map(|(index, handler)| MiddlewareLink {
                owner: graph.node_at(index).owner,
                handler,
            })
            .collect();

        tracing::debug!("Composed {} middleware", links.len());
        MiddlewareChain { links }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MiddlewareLink> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// All handlers, if they share one type
    pub fn handlers<H: Injectable>(&self) -> Result<Vec<Arc<H>>, RequireError> {
        self.links.iter().map(MiddlewareLink::handler).collect()
    }
}
impl<'a> IntoIterator for &'a MiddlewareChain {
    type Item = &'a MiddlewareLink;
    type IntoIter = std::slice::Iter<'a, MiddlewareLink>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.iter()
    }
}
