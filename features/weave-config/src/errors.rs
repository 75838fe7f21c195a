use weave_di::{RegisterError, TokenInfo};

/// Errors when trying to register a config
#[derive(thiserror::Error, Debug, Clone)]
pub enum ConfigError {
    /// A config is already registered under the token
    #[error("A config is already registered for token '{0}'")]
    AlreadyRegistered(TokenInfo),
}

/// Errors when installing configs into a registry
#[derive(thiserror::Error, Debug, Clone)]
pub enum InstallError {
    #[error("Failed to install config '{token}': {source}")]
    Register {
        token: TokenInfo,
        #[source]
        source: RegisterError,
    },
}
