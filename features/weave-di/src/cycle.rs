use thiserror::Error;

use crate::{graph::DependencyGraph, token::TokenInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet
    White,
    /// On the current path
    Gray,
    /// Fully processed
    Black,
}

/// Tokens forming a cycle, in traversal order
#[derive(Error, Debug, Clone)]
pub struct DependencyCycle {
    pub chain: Vec<TokenInfo>,
}
impl std::fmt::Display for DependencyCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.chain.iter().map(|token| token.name).collect();
        if let Some(first) = names.first() {
            names.push(first);
        }
        write!(f, "Circular dependency detected: {}", names.join(" -> "))
    }
}

/// Depth first search over the graph, fails on the first cycle found
///
/// Nodes are visited in registration order, edges in declaration order.
pub(crate) fn detect(graph: &DependencyGraph) -> Result<(), DependencyCycle> {
    let mut colors = vec![Color::White; graph.len()];

    for start in 0..graph.len() {
        if colors[start] != Color::White {
            continue;
        }

        if let Some(cycle) = visit(graph, start, &mut colors) {
            let chain = cycle
                .into_iter()
                .filter_map(|index| graph.node_at(index).owner.token())
                .collect();
            let cycle = DependencyCycle { chain };
            tracing::error!("{}", cycle);
            return Err(cycle);
        }
    }

    Ok(())
}

/// Iterative visit, the stack holds the current path with the next edge to follow per node
fn visit(graph: &DependencyGraph, start: usize, colors: &mut [Color]) -> Option<Vec<usize>> {
    let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
    colors[start] = Color::Gray;

    while let Some(&(node, edge_index)) = stack.last() {
        let Some(edge) = graph.node_at(node).edges.get(edge_index) else {
            stack.pop();
            colors[node] = Color::Black;
            continue;
        };

        let top = stack.len() - 1;
        stack[top].1 += 1;

        let Some(next) = edge.node else {
            continue;
        };

        match colors[next] {
            Color::Gray => {
                // Gray nodes are exactly the ones on the path
                let start = stack.iter().position(|(n, _)| *n == next)?;
                return Some(stack[start..].iter().map(|(n, _)| *n).collect());
            }
            Color::White => {
                colors[next] = Color::Gray;
                stack.push((next, 0));
            }
            Color::Black => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::{ledger::Registry, plugin::Plugin, token::Token};

    fn plugin() -> Plugin<u32> {
        Plugin::new().provides_sync(|_| Ok::<_, Infallible>(0))
    }

    fn check(registry: &Registry) -> Result<(), DependencyCycle> {
        detect(&DependencyGraph::build(registry).unwrap())
    }

    #[test]
    fn two_node_cycle() {
        let b: Token<u32> = Token::new("B");
        let c: Token<u32> = Token::new("C");

        let mut registry = Registry::new();
        registry.register(b, plugin().dep("c", c)).unwrap();
        registry.register(c, plugin().dep("b", b)).unwrap();

        let cycle = check(&registry).unwrap_err();

        assert_eq!(cycle.chain, vec![b.info(), c.info()]);
        assert_eq!(cycle.to_string(), "Circular dependency detected: B -> C -> B");
    }

    #[test]
    fn long_cycle_behind_a_tail() {
        let root: Token<u32> = Token::new("Root");
        let a: Token<u32> = Token::new("A");
        let b: Token<u32> = Token::new("B");
        let c: Token<u32> = Token::new("C");

        let mut registry = Registry::new();
        registry.register(root, plugin().dep("a", a)).unwrap();
        registry.register(a, plugin().dep("b", b)).unwrap();
        registry.register(b, plugin().dep("c", c)).unwrap();
        registry.register(c, plugin().dep("a", a)).unwrap();

        let cycle = check(&registry).unwrap_err();

        assert_eq!(cycle.chain, vec![a.info(), b.info(), c.info()]);
    }

    #[test]
    fn self_dependency() {
        let a: Token<u32> = Token::new("A");

        let mut registry = Registry::new();
        registry.register(a, plugin().dep("a", a)).unwrap();

        assert_eq!(check(&registry).unwrap_err().chain, vec![a.info()]);
    }

    #[test]
    fn aliasing_can_break_a_cycle() {
        let a: Token<u32> = Token::new("A");
        let b: Token<u32> = Token::new("B");
        let other: Token<u32> = Token::new("Other");

        let mut registry = Registry::new();
        registry.register(a, plugin().dep("b", b)).unwrap();
        registry
            .register(b, plugin().dep("a", a))
            .unwrap()
            .alias(a, other);
        registry.register(other, plugin()).unwrap();

        assert!(check(&registry).is_ok());
    }

    #[test]
    fn deep_chains_do_not_exhaust_the_stack() {
        let tokens: Vec<Token<u32>> = (0..50_000).map(|_| Token::new("Link")).collect();

        let mut registry = Registry::new();
        for pair in tokens.windows(2) {
            registry.register(pair[0], plugin().dep("next", pair[1])).unwrap();
        }
        registry.register(tokens[tokens.len() - 1], plugin()).unwrap();

        assert!(check(&registry).is_ok());

        registry
            .register(tokens[tokens.len() - 1], plugin().dep("first", tokens[0]))
            .unwrap();

        assert_eq!(check(&registry).unwrap_err().chain.len(), tokens.len());
    }

    #[test]
    fn diamonds_are_not_cycles() {
        let a: Token<u32> = Token::new("A");
        let b: Token<u32> = Token::new("B");
        let c: Token<u32> = Token::new("C");

        let mut registry = Registry::new();
        registry.register(a, plugin()).unwrap();
        registry.register(b, plugin().dep("a", a)).unwrap();
        registry.register(c, plugin().dep("a", a)).unwrap();
        registry
            .register_anonymous(plugin().dep("b", b).dep("c", c))
            .unwrap();

        assert!(check(&registry).is_ok());
    }
}
