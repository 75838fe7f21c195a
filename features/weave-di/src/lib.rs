//! Weave DI resolves a graph of plugins which depend on each other through tokens.
//!
//! Resolution consists of three parts:
//! 1. [Registry]: register plugins, raw values and middleware under [Token]s
//! 2. [Registry::resolve]: validates the graph (missing, circular and extraneous registrations)
//!    and instantiates every plugin exactly once, in dependency order
//! 3. [Container]: read only access to the resolved services and the middleware chain
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use weave_di::{Plugin, Registry, RequireError, Token};
//!
//! let greeting: Token<String> = Token::new("Greeting");
//! let greeter: Token<String> = Token::new("Greeter");
//!
//! let mut registry = Registry::new();
//! registry.register_value(greeting, "Hello".to_string()).unwrap();
//! registry
//!     .register(
//!         greeter,
//!         Plugin::new()
//!             .dep("greeting", greeting)
//!             .provides(|deps| async move {
//!                 let greeting: Arc<String> = deps.get("greeting")?;
//!                 Ok::<_, RequireError>(format!("{greeting} world"))
//!             }),
//!     )
//!     .unwrap();
//!
//! let container = futures::executor::block_on(registry.resolve()).unwrap();
//! assert_eq!(container.get_service(greeter).unwrap().as_str(), "Hello world");
//! ```

pub mod container;
pub mod cycle;
pub mod errors;
pub mod graph;
pub mod ledger;
pub mod middleware;
pub mod plugin;
pub mod resolver;
mod scheduler;
pub mod token;
pub mod types;

pub use container::Container;
pub use errors::{CleanupError, RegisterError, RequireError, ResolveError};
pub use ledger::{Owner, RegistrationHandle, Registry};
pub use middleware::{MiddlewareChain, MiddlewareLink};
pub use plugin::{Dependencies, Dependency, Entry, Plugin};
pub use resolver::{Deps, Resolver};
pub use token::{Optional, Token, TokenInfo};
pub use types::{DynError, Injectable};
