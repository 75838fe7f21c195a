use std::{ops::Deref, sync::Arc};

use weave_di::{resolver::Slot, Injectable, RequireError, Resolver};

/// A wrapper type to allow for config injections
///
/// Resolves the config installed by a [ConfigProvider](crate::provider::ConfigProvider)
/// under the dependency's token.
///
/// # Example
/// ```rust
/// use weave_config::{config::Config, provider::ConfigProvider};
/// use weave_di::{Plugin, Registry, RequireError, Token};
///
/// struct ServerConfig {
///     port: u16,
/// }
///
/// let server_config: Token<ServerConfig> = Token::new("ServerConfig");
/// let address: Token<String> = Token::new("Address");
///
/// let mut provider = ConfigProvider::new();
/// provider.add_config(server_config, ServerConfig { port: 8080 }).unwrap();
///
/// let mut registry = Registry::new();
/// provider.install(&mut registry).unwrap();
/// registry
///     .register(
///         address,
///         Plugin::new().dep("config", server_config).provides_sync(|deps| {
///             let config: Config<ServerConfig> = deps.get("config")?;
///             Ok::<_, RequireError>(format!("0.0.0.0:{}", config.port))
///         }),
///     )
///     .unwrap();
///
/// let container = futures::executor::block_on(registry.resolve()).unwrap();
/// assert_eq!(container.get_service(address).unwrap().as_str(), "0.0.0.0:8080");
/// ```
pub struct Config<T> {
    inner: Arc<T>,
}
impl<T> Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
impl<T> Config<T> {
    pub fn inner(&self) -> Arc<T> {
        self.inner.clone()
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T: Injectable> Resolver for Config<T> {
    fn resolve(slot: &Slot) -> Result<Self, RequireError> {
        let inner = Arc::<T>::resolve(slot)?;
        Ok(Config { inner })
    }
}
