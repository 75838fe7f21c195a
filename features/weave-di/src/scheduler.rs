use std::collections::{HashMap, VecDeque};

use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};

use crate::{
    errors::ResolveError,
    graph::DependencyGraph,
    ledger::{EnhanceFn, Owner, Registration},
    middleware::MiddlewareChain,
    plugin::{CleanupFn, ErasedEntry, ErasedPlugin},
    resolver::{Deps, Slot, SlotValue},
    token::TokenInfo,
    types::{DynError, Instance},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Pending,
    InProgress,
    Resolved,
    Failed,
}

/// Output of a plugin once its futures settled
struct Provided {
    value: Option<Instance>,
    middleware: Option<Instance>,
    cleanup: Option<CleanupFn>,
}

type NodeFuture = BoxFuture<'static, (usize, Result<Provided, DynError>)>;

/// Registered cleanup hook, bound to the value it tears down
pub(crate) struct BoundCleanup {
    pub(crate) owner: Owner,
    pub(crate) value: Instance,
    pub(crate) cleanup: CleanupFn,
}

/// Everything produced by a resolve pass
pub(crate) struct Resolution {
    /// None = Token is known but resolved to no value
    pub(crate) services: HashMap<TokenInfo, Option<Instance>>,
    pub(crate) middleware: MiddlewareChain,
    pub(crate) cleanups: Vec<BoundCleanup>,
}

/// Instantiates all registrations in dependency order
///
/// Every node is started once all nodes it depends on are resolved.
/// Started nodes are driven concurrently on the calling task.
pub(crate) struct Scheduler<'g> {
    graph: &'g DependencyGraph,
    entries: Vec<Option<ErasedEntry>>,
    enhancers: HashMap<TokenInfo, Vec<EnhanceFn>>,

    states: Vec<NodeState>,
    /// Number of unresolved edges per node
    waiting_on: Vec<usize>,
    dependents: Vec<Vec<usize>>,
    /// Memoized values, only meaningful once Resolved
    values: Vec<Option<Instance>>,
    ready: VecDeque<usize>,

    middleware: Vec<(usize, Instance)>,
    cleanups: Vec<BoundCleanup>,
}

impl<'g> Scheduler<'g> {
    pub(crate) fn new(
        graph: &'g DependencyGraph,
        registrations: Vec<Registration>,
        enhancers: Vec<(TokenInfo, EnhanceFn)>,
    ) -> Self {
        let count = graph.len();
        let mut waiting_on = vec![0; count];
        let mut dependents = vec![Vec::new(); count];

        for index in 0..count {
            for edge in &graph.node_at(index).edges {
                if let Some(dependency) = edge.node {
                    waiting_on[index] += 1;
                    dependents[dependency].push(index);
                }
            }
        }

        let ready = (0..count).filter(|index| waiting_on[*index] == 0).collect();

        let mut enhancers_by_token: HashMap<TokenInfo, Vec<EnhanceFn>> = HashMap::new();
        for (token, enhancer) in enhancers {
            enhancers_by_token.entry(token).or_default().push(enhancer);
        }

        Scheduler {
            graph,
            entries: registrations
                .into_iter()
                .map(|registration| Some(registration.entry))
                .collect(),
            enhancers: enhancers_by_token,
            states: vec![NodeState::Pending; count],
            waiting_on,
            dependents,
            values: vec![None; count],
            ready,
            middleware: Vec::new(),
            cleanups: Vec::new(),
        }
    }

    pub(crate) async fn run(mut self) -> Result<Resolution, ResolveError> {
        let total = self.states.len();
        let mut in_flight: FuturesUnordered<NodeFuture> = FuturesUnordered::new();

        loop {
            while let Some(index) = self.ready.pop_front() {
                let Some(mut future) = self.start(index)? else {
                    continue;
                };

                // Settle synchronous plugins before starting the next one,
                // a failure must stop siblings which did not start yet
                match (&mut future).now_or_never() {
                    Some((index, result)) => self.finish(index, result)?,
                    None => in_flight.push(future),
                }
            }

            let resolved = self
                .states
                .iter()
                .filter(|state| **state == NodeState::Resolved)
                .count();
            tracing::debug!("Waiting for plugins to finish [{resolved} of {total} complete]");

            match in_flight.next().await {
                Some((index, result)) => self.finish(index, result)?,
                // Nothing in flight and nothing ready - everything is resolved
                None => break,
            }
        }

        debug_assert!(
            self.states.iter().all(|state| *state == NodeState::Resolved),
            "Not all registrations were resolved"
        );
        tracing::debug!("All {total} registrations resolved");

        Ok(self.into_resolution())
    }

    /// Moves a ready node to InProgress
    ///
    /// Values and empty entries resolve immediately, plugins return their future.
    fn start(&mut self, index: usize) -> Result<Option<NodeFuture>, ResolveError> {
        self.states[index] = NodeState::InProgress;
        let owner = self.graph.node_at(index).owner;

        let Some(entry) = self.entries[index].take() else {
            // Entries are taken exactly once
            self.states[index] = NodeState::Failed;
            return Err(ResolveError::AlreadyResolved);
        };

        let plugin = match entry {
            ErasedEntry::Value(instance) => {
                self.complete(index, Some(instance))?;
                return Ok(None);
            }
            ErasedEntry::Empty => {
                self.complete(index, None)?;
                return Ok(None);
            }
            ErasedEntry::Plugin(plugin) => plugin,
        };

        let ErasedPlugin {
            provides_type,
            provides,
            middleware,
            cleanup,
            ..
        } = plugin;
        let deps = self.deps_for(index);

        tracing::debug!("Instantiating '{}' providing {}", owner, provides_type);
        let provision = provides.map(|provides| provides(deps.clone()));

        let future = async move {
            let result = async move {
                let value = match provision {
                    Some(provision) => Some(provision.await?),
                    None => None,
                };
                let middleware = match middleware {
                    Some(factory) => Some(factory(deps, value.clone())?),
                    None => None,
                };

                Ok::<_, DynError>(Provided {
                    value,
                    middleware,
                    cleanup,
                })
            }
            .await;

            (index, result)
        };

        Ok(Some(future.boxed()))
    }

    /// Handles the settled future of a plugin
    fn finish(
        &mut self,
        index: usize,
        result: Result<Provided, DynError>,
    ) -> Result<(), ResolveError> {
        let owner = self.graph.node_at(index).owner;

        let provided = match result {
            Ok(provided) => provided,
            Err(error) => {
                // If one plugin fails - abort resolution
                self.states[index] = NodeState::Failed;
                tracing::error!("Plugin '{}' failed: {}", owner, error);
                return Err(ResolveError::ProvisionFailed {
                    product: owner,
                    error,
                });
            }
        };

        if let Some(middleware) = provided.middleware {
            self.middleware.push((index, middleware));
        }
        if let (Some(value), Some(cleanup)) = (&provided.value, provided.cleanup) {
            self.cleanups.push(BoundCleanup {
                owner,
                value: value.clone(),
                cleanup,
            });
        }

        self.complete(index, provided.value)
    }

    /// Applies enhancers, memoizes the value and readies dependents
    fn complete(&mut self, index: usize, value: Option<Instance>) -> Result<(), ResolveError> {
        let owner = self.graph.node_at(index).owner;

        let mut value = value;
        if let Some(enhancers) = owner.token().and_then(|token| self.enhancers.remove(&token)) {
            for enhancer in enhancers {
                let Some(current) = value.take() else {
                    tracing::debug!("Skipping enhancer for '{}', it has no value", owner);
                    break;
                };

                match enhancer(current) {
                    Ok(enhanced) => value = Some(enhanced),
                    Err(error) => {
                        self.states[index] = NodeState::Failed;
                        tracing::error!("Enhancer for '{}' failed: {}", owner, error);
                        return Err(ResolveError::ProvisionFailed {
                            product: owner,
                            error,
                        });
                    }
                }
            }
        }

        match &value {
            Some(instance) => tracing::debug!("Resolved '{}' as {}", owner, instance.info),
            None => tracing::debug!("Resolved '{}' without a value", owner),
        }
        self.values[index] = value;
        self.states[index] = NodeState::Resolved;

        for dependent in std::mem::take(&mut self.dependents[index]) {
            self.waiting_on[dependent] -= 1;
            if self.waiting_on[dependent] == 0 {
                self.ready.push_back(dependent);
            }
        }

        Ok(())
    }

    /// Collects the memoized values of the dependencies of a node, keyed by declared name
    fn deps_for(&self, index: usize) -> Deps {
        let mut deps = Deps::default();
        for edge in &self.graph.node_at(index).edges {
            let value = match edge.node {
                None => SlotValue::Absent,
                Some(node) => match &self.values[node] {
                    Some(instance) => SlotValue::Value(instance.clone()),
                    None => SlotValue::Empty,
                },
            };
            deps.insert(
                edge.name,
                Slot {
                    token: edge.effective,
                    value,
                },
            );
        }
        deps
    }

    fn into_resolution(self) -> Resolution {
        let graph = self.graph;

        let services = self
            .values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| graph.node_at(index).owner.token().map(|t| (t, value)))
            .collect();

        Resolution {
            services,
            middleware: MiddlewareChain::compose(graph, self.middleware),
            cleanups: self.cleanups,
        }
    }
}
