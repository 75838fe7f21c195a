use thiserror::Error;

use crate::{
    cycle::DependencyCycle,
    graph::{ExtraneousRegistrations, MissingDependencies},
    ledger::Owner,
    token::TokenInfo,
    types::DynError,
};

/// Errors while registering entries
#[derive(Error, Debug, Clone)]
pub enum RegisterError {
    /// The entry can't be registered in this position
    #[error("Cannot register {value}")]
    InvalidRegistration { value: String },
    /// The registry has already been resolved
    #[error("Cannot register after the registry has been resolved")]
    Frozen,
}

/// Errors when trying to require a certain token
#[derive(Error, Debug, Clone)]
pub enum RequireError {
    /// Services were requested before resolution completed
    #[error("Cannot get service from unresolved registry")]
    Unresolved,
    /// The required token is not registered
    #[error("No registration for token '{0}'")]
    TokenMissing(TokenInfo),
    /// The token is registered, but resolved to no value
    #[error("Token '{0}' resolved to no value")]
    NoValue(TokenInfo),
    /// An optional dependency without a registration
    #[error("Optional dependency '{0}' is not registered")]
    Absent(TokenInfo),
    /// The dependency name was never declared by the plugin
    #[error("'{0}' is not a declared dependency")]
    UnknownDependency(&'static str),

    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
}

/// Errors while resolving the registry
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Dependencies without a registration
    #[error(transparent)]
    MissingDependency(#[from] MissingDependencies),
    /// The dependency graph contains a cycle
    #[error(transparent)]
    CircularDependency(#[from] DependencyCycle),
    /// Raw values nothing depends on
    #[error(transparent)]
    ExtraneousRegistration(#[from] ExtraneousRegistrations),
    /// A plugin, middleware factory or enhancer failed
    #[error("Plugin '{product}' failed - error: {error}")]
    ProvisionFailed {
        product: Owner,
        #[source]
        error: DynError,
    },
    /// Resolve was called on a registry that already resolved
    #[error("The registry has already been resolved")]
    AlreadyResolved,
}
impl ResolveError {
    /// Returns the plugin authored error for provision failures
    pub fn into_provision_error(self) -> Option<DynError> {
        match self {
            ResolveError::ProvisionFailed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// One or more cleanup hooks failed
#[derive(Error, Debug)]
pub struct CleanupError {
    pub failures: Vec<(Owner, DynError)>,
}
impl std::fmt::Display for CleanupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("One or more cleanup hooks failed:".to_string());
        for (owner, error) in &self.failures {
            display.push(format!("- '{owner}': {error}"));
        }
        f.write_str(&display.join("\n"))
    }
}
