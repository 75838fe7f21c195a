use std::{
    any::Any,
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use weave_di::{Injectable, RegisterError, Registry, Token, TokenInfo};

use crate::errors::{ConfigError, InstallError};

type Installer = Box<dyn FnOnce(&mut Registry) -> Result<(), RegisterError> + Send>;

/// A provider to register all configs.
///
/// Configs are registered and retrieved by token, and installed into a [Registry] as raw values.
#[derive(Default)]
pub struct ConfigProvider {
    configs: HashMap<TokenInfo, Arc<dyn Any + Send + Sync + 'static>>,
    /// In `add_config` order
    installers: Vec<(TokenInfo, Installer)>,
}

impl ConfigProvider {
    /// Initializes an empty Config Provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve the config registered under `token`.
    pub fn get_config<T: Injectable>(&self, token: &Token<T>) -> Option<Arc<T>> {
        self.configs
            .get(&token.info())
            .and_then(|config| config.clone().downcast().ok())
    }

    /// Add a config to the provider.
    ///
    /// If a config is already registered under `token`, it will return a
    /// [`ConfigError`] runtime error
    pub fn add_config<T: Injectable>(
        &mut self,
        token: Token<T>,
        config: T,
    ) -> Result<&mut Self, ConfigError> {
        let info = token.info();
        let config = Arc::new(config);

        match self.configs.entry(info) {
            Entry::Occupied(_) => return Err(ConfigError::AlreadyRegistered(info)),
            Entry::Vacant(vacant) => {
                vacant.insert(config.clone());
            }
        }

        tracing::debug!("Added config '{}'", info);
        let install: Installer = Box::new(move |registry: &mut Registry| {
            registry.register_shared(token, config).map(|_| ())
        });
        self.installers.push((info, install));
        Ok(self)
    }

    /// Can optionally add a config to the provider.
    ///
    /// If the config provided is `Some(T)`, it will be the same as calling [`ConfigProvider::add_config`]
    /// If the config provided is `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_config<T: Injectable>(
        &mut self,
        token: Token<T>,
        config: Option<T>,
    ) -> Result<&mut Self, ConfigError> {
        match config {
            Some(c) => self.add_config(token, c),
            None => Ok(self),
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Registers every config under its token
    ///
    /// Configs are raw values - a config nothing depends on fails resolution as extraneous.
    pub fn install(self, registry: &mut Registry) -> Result<(), InstallError> {
        tracing::debug!("Installing {} configs", self.installers.len());

        for (token, install) in self.installers {
            install(registry).map_err(|source| InstallError::Register { token, source })?;
        }

        Ok(())
    }
}
