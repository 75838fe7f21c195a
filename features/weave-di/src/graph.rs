use std::{collections::HashMap, fmt::Write};

use thiserror::Error;

use crate::{
    ledger::{Owner, Registry},
    plugin::EntryKind,
    token::TokenInfo,
};

/// Effective dependency graph of all registrations, after aliasing
///
/// Used to validate the registrations, to schedule instantiation and for visualization.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// In registration order
    nodes: Vec<GraphNode>,
    index: HashMap<TokenInfo, usize>,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub owner: Owner,
    pub kind: EntryKind,
    /// In declaration order
    pub edges: Vec<Edge>,
}

/// A declared dependency of a node
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub name: &'static str,
    /// The token as declared by the plugin
    pub declared: TokenInfo,
    /// The token after aliasing
    pub effective: TokenInfo,
    /// Index of the node depended on, None if an optional dependency is absent
    pub(crate) node: Option<usize>,
}
impl Edge {
    pub fn is_absent(&self) -> bool {
        self.node.is_none()
    }
}

impl DependencyGraph {
    /// Builds the graph from the current registrations
    ///
    /// Collects every missing dependency before failing.
    pub(crate) fn build(registry: &Registry) -> Result<Self, MissingDependencies> {
        let mut nodes = Vec::with_capacity(registry.registrations.len());
        let mut index = HashMap::new();
        let mut missing = MissingDependencies::default();

        for (position, registration) in registry.registrations.iter().enumerate() {
            if let Owner::Token(info) = registration.owner {
                index.insert(info, position);
            }

            let mut edges = Vec::new();
            for dependency in registration.entry.dependencies().into_iter().flat_map(|d| d.iter()) {
                let effective = registration.effective(dependency.token);
                let node = registry.index_of(effective);

                if node.is_none() && !dependency.optional {
                    missing.add(effective, registration.owner);
                    continue;
                }

                edges.push(Edge {
                    name: dependency.name,
                    declared: dependency.token,
                    effective,
                    node,
                });
            }

            nodes.push(GraphNode {
                owner: registration.owner,
                kind: registration.entry.kind(),
                edges,
            });
        }

        for (token, _) in &registry.enhancers {
            if registry.index_of(*token).is_none() {
                missing.add(*token, Owner::Enhancer);
            }
        }

        if !missing.missing.is_empty() {
            tracing::error!("{}", missing);
            return Err(missing);
        }

        Ok(DependencyGraph { nodes, index })
    }

    /// Raw values registered under a token must have at least one dependent
    pub(crate) fn check_extraneous(&self) -> Result<(), ExtraneousRegistrations> {
        let mut dependents = vec![0_usize; self.nodes.len()];
        for edge in self.nodes.iter().flat_map(|n| &n.edges) {
            if let Some(node) = edge.node {
                dependents[node] += 1;
            }
        }

        let tokens: Vec<TokenInfo> = self
            .nodes
            .iter()
            .zip(dependents)
            .filter(|(node, count)| node.kind == EntryKind::Value && *count == 0)
            .filter_map(|(node, _)| node.owner.token())
            .collect();

        if !tokens.is_empty() {
            let extraneous = ExtraneousRegistrations { tokens };
            tracing::error!("{}", extraneous);
            return Err(extraneous);
        }

        Ok(())
    }

    pub(crate) fn node_at(&self, index: usize) -> &GraphNode {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    pub fn node(&self, token: TokenInfo) -> Option<&GraphNode> {
        self.index.get(&token).map(|index| &self.nodes[*index])
    }

    /// Tokens `token` depends on, after aliasing - absent optionals are skipped
    pub fn dependencies_of(&self, token: TokenInfo) -> Vec<TokenInfo> {
        self.node(token)
            .map(|node| {
                node.edges
                    .iter()
                    .filter(|edge| !edge.is_absent())
                    .map(|edge| edge.effective)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Owners of all registrations depending on `token`
    pub fn dependents_of(&self, token: TokenInfo) -> Vec<Owner> {
        let Some(target) = self.index.get(&token).copied() else {
            return Vec::new();
        };

        self.nodes
            .iter()
            .filter(|node| node.edges.iter().any(|edge| edge.node == Some(target)))
            .map(|node| node.owner)
            .collect()
    }

    /// Renders the graph in Graphviz dot format
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph dependencies {\n");
        let node_id = |index: usize| format!("n{index}");

        for (index, node) in self.nodes.iter().enumerate() {
            let shape = match node.kind {
                EntryKind::Plugin => "box",
                EntryKind::Value => "ellipse",
                EntryKind::Empty => "point",
            };
            let _ = writeln!(
                dot,
                "    {} [label=\"{}\", shape={}];",
                node_id(index),
                node.owner,
                shape
            );
        }
        for (index, node) in self.nodes.iter().enumerate() {
            for edge in &node.edges {
                if let Some(target) = edge.node {
                    let _ = writeln!(
                        dot,
                        "    {} -> {} [label=\"{}\"];",
                        node_id(index),
                        node_id(target),
                        edge.name
                    );
                }
            }
        }

        dot.push('}');
        dot
    }
}

/// A token without registration and everyone requiring it
#[derive(Debug, Clone)]
pub struct MissingDependency {
    pub dependency: TokenInfo,
    pub required_by: Vec<Owner>,
}
impl std::fmt::Display for MissingDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let required_by: Vec<String> = self
            .required_by
            .iter()
            .map(|owner| format!("\"{owner}\""))
            .collect();
        write!(
            f,
            "\"{}\" is required by plugins registered with tokens: {}",
            self.dependency,
            required_by.join(", ")
        )
    }
}

#[derive(Error, Debug, Clone, Default)]
pub struct MissingDependencies {
    /// In order of first discovery
    pub missing: Vec<MissingDependency>,
}
impl MissingDependencies {
    fn add(&mut self, dependency: TokenInfo, required_by: Owner) {
        match self.missing.iter_mut().find(|m| m.dependency == dependency) {
            Some(existing) => {
                if !existing.required_by.contains(&required_by) {
                    existing.required_by.push(required_by);
                }
            }
            None => self.missing.push(MissingDependency {
                dependency,
                required_by: vec![required_by],
            }),
        }
    }
}
impl std::fmt::Display for MissingDependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("Missing registrations for one or more tokens:".to_string());
        for missing in &self.missing {
            display.push(format!("- {}", missing));
        }
        f.write_str(&display.join("\n"))
    }
}

/// Raw values registered under a token nothing depends on
#[derive(Error, Debug, Clone)]
pub struct ExtraneousRegistrations {
    pub tokens: Vec<TokenInfo>,
}
impl std::fmt::Display for ExtraneousRegistrations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("Registered values which nothing depends on:".to_string());
        for token in &self.tokens {
            display.push(format!("- \"{}\"", token));
        }
        f.write_str(&display.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::{plugin::Plugin, token::Token};

    fn noop<T: Send + Sync + Default + 'static>() -> Plugin<T> {
        Plugin::new().provides_sync(|_| Ok::<_, Infallible>(T::default()))
    }

    #[test]
    fn edges_follow_aliases() {
        let a: Token<u32> = Token::new("A");
        let b: Token<u32> = Token::new("B");
        let c: Token<u32> = Token::new("C");

        let mut registry = Registry::new();
        registry.register(a, noop()).unwrap();
        registry.register(b, noop()).unwrap();
        registry
            .register(c, noop::<u32>().dep("x", a).dep("y", a))
            .unwrap()
            .alias(a, b);

        let graph = DependencyGraph::build(&registry).unwrap();

        assert_eq!(graph.dependencies_of(c.info()), vec![b.info(), b.info()]);
        assert_eq!(graph.dependents_of(b.info()), vec![Owner::Token(c.info())]);
        assert!(graph.dependents_of(a.info()).is_empty());

        let edge = graph.node(c.info()).unwrap().edges[0];
        assert_eq!(edge.declared, a.info());
        assert_eq!(edge.effective, b.info());
    }

    #[test]
    fn missing_dependencies_are_aggregated() {
        let a: Token<u32> = Token::new("A");
        let b: Token<u32> = Token::new("B");
        let c: Token<u32> = Token::new("C");
        let missing: Token<u32> = Token::new("Missing");

        let mut registry = Registry::new();
        registry.register(a, noop::<u32>().dep("m", missing)).unwrap();
        registry
            .register(b, noop::<u32>().dep("m", missing).dep("c", c))
            .unwrap();
        registry
            .register_anonymous(noop::<u32>().dep("m", missing))
            .unwrap();

        let err = DependencyGraph::build(&registry).unwrap_err();

        assert_eq!(err.missing.len(), 2);
        assert_eq!(err.missing[0].dependency, missing.info());
        assert_eq!(
            err.missing[0].required_by,
            vec![
                Owner::Token(a.info()),
                Owner::Token(b.info()),
                Owner::Unnamed
            ]
        );
        assert_eq!(err.missing[1].dependency, c.info());

        let message = err.to_string();
        assert!(message.contains(
            "\"Missing\" is required by plugins registered with tokens: \"A\", \"B\", \"UnnamedPlugin\""
        ));
        assert!(message.contains("\"C\" is required by plugins registered with tokens: \"B\""));
    }

    #[test]
    fn optional_dependencies_may_be_absent() {
        let a: Token<u32> = Token::new("A");
        let absent: Token<u32> = Token::new("Absent");

        let mut registry = Registry::new();
        registry
            .register(a, noop::<u32>().dep("absent", absent.optional()))
            .unwrap();

        let graph = DependencyGraph::build(&registry).unwrap();
        let node = graph.node(a.info()).unwrap();

        assert!(node.edges[0].is_absent());
        assert!(graph.dependencies_of(a.info()).is_empty());
    }

    #[test]
    fn unused_values_are_extraneous() {
        let used: Token<u32> = Token::new("Used");
        let unused: Token<u32> = Token::new("Unused");
        let plugin: Token<u32> = Token::new("Plugin");

        let mut registry = Registry::new();
        registry.register_value(used, 1).unwrap();
        registry.register_value(unused, 2).unwrap();
        registry
            .register(plugin, noop::<u32>().dep("used", used))
            .unwrap();

        let graph = DependencyGraph::build(&registry).unwrap();
        let err = graph.check_extraneous().unwrap_err();

        assert_eq!(err.tokens, vec![unused.info()]);
        assert!(err.to_string().contains("\"Unused\""));
    }

    #[test]
    fn enhancing_unregistered_tokens_is_missing() {
        let a: Token<u32> = Token::new("A");

        let mut registry = Registry::new();
        registry
            .enhance(a, |value| Ok::<_, Infallible>(*value + 1))
            .unwrap();

        let err = DependencyGraph::build(&registry).unwrap_err();
        assert_eq!(err.missing[0].required_by, vec![Owner::Enhancer]);
    }

    #[test]
    fn dot_output_lists_nodes_and_edges() {
        let a: Token<u32> = Token::new("A");
        let b: Token<u32> = Token::new("B");

        let mut registry = Registry::new();
        registry.register_value(a, 1).unwrap();
        registry.register(b, noop::<u32>().dep("a", a)).unwrap();

        let dot = DependencyGraph::build(&registry).unwrap().to_dot();

        assert!(dot.starts_with("digraph dependencies {"));
        assert!(dot.contains("n0 [label=\"A\", shape=ellipse];"));
        assert!(dot.contains("n1 -> n0 [label=\"a\"];"));
    }
}
