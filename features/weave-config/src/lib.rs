//! Weave Config provides a registry of configs that can be injected into plugins.
//!
//! Weave Config is split into two major parts:
//! 1. ConfigProvider: Used to collect all configs under their tokens and install them into a
//!    [Registry](weave_di::Registry)
//! 2. Config<T>: A wrapper type to be able to resolve and retrieve configs
//!
//! # Examples
//!
//! ```rust
//! use weave_config::provider::ConfigProvider;
//! use weave_di::Token;
//!
//! struct AppConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! let app_config: Token<AppConfig> = Token::new("AppConfig");
//!
//! let mut config_provider = ConfigProvider::new();
//! config_provider
//!     .add_config(
//!         app_config,
//!         AppConfig {
//!             host: "localhost".to_string(),
//!             port: 8080,
//!         },
//!     )
//!     .unwrap();
//!
//! let retrieved_config = config_provider.get_config(&app_config).unwrap();
//! assert_eq!(retrieved_config.host, "localhost");
//! assert_eq!(retrieved_config.port, 8080);
//! ```
//!
//! Weave Config consists of the following components:
//!
//! 1. Config - for resolving configs as plugin dependencies
//! 2. Provider - for creating a registry of configs, adding, retrieving and installing configs
//! 3. Errors - for config errors

pub mod config;
pub mod errors;
pub mod provider;

pub use config::Config;
pub use provider::ConfigProvider;
