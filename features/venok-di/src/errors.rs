use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    dependency_graph::DependencyGraphErrors,
    types::{DynError, Scope},
};

/// Errors while building the module graph
#[derive(Error, Debug, Clone)]
pub enum ContainerError {
    /// The module token is not registered
    #[error("Venok could not find the module '{0}' in the container. Make sure it has been registered.")]
    UnknownModule(String),
    /// A provider slot was empty, or modules import each other without a forward reference
    #[error("A circular dependency has been detected ({context}). Declare one edge of the cycle as a forward reference.")]
    CircularDependency { context: String },
    /// A module declaration is unusable
    #[error("Venok cannot create the '{module}' module instance. The import at index [{index}] is invalid: {reason}.")]
    InvalidModule {
        module: String,
        index: usize,
        reason: &'static str,
    },
    /// A forward reference to a module resolved to nothing
    #[error("Venok cannot create the '{module}' module instance. The module at index [{index}] of its imports is an undefined forward reference.")]
    UndefinedForwardRef { module: String, index: usize },
    /// An export is neither a provider nor an imported module
    #[error("Venok cannot export '{token}' from '{module}' as it is neither a provider nor an imported module of it.")]
    UnknownExport { token: String, module: String },
}

/// Errors while resolving or instantiating providers
#[derive(Error, Debug, Clone)]
pub enum InjectError {
    /// A dependency could not be found in the reachable module graph
    #[error("Venok can't resolve dependencies of the {requester} ({signature}). Please make sure that the {position} is available in the {module} context.")]
    UnknownDependency {
        requester: String,
        signature: String,
        dependency: String,
        position: DependencyPosition,
        module: String,
    },
    /// A provider depends on itself through the chain
    #[error("A circular dependency has been detected: {}. Providers in a cycle cannot be constructed.", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },
    /// A forward reference resolved to nothing
    #[error("Venok can't resolve dependencies of the {requester}. The dependency at {position} is an undefined forward reference.")]
    UndefinedForwardRef {
        requester: String,
        position: DependencyPosition,
    },
    /// The requested token is not registered
    #[error("Venok could not find {0} element (this provider does not exist in the current context).")]
    UnknownElement(String),
    /// `get` was used for a provider which has to be resolved per context
    #[error("{name} is marked as a scoped provider ({scope}). Request and transient-scoped providers can't be used in combination with \"get\". Use \"resolve\" instead.")]
    InvalidClassScope { name: String, scope: Scope },
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
    /// A constructor or factory failed
    #[error("Factory for '{product}' failed - error: {error}")]
    FactoryFailed {
        product: String,
        error: Arc<DynError>,
    },
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// Where a dependency sits on its requester
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyPosition {
    Argument { name: String, index: usize },
    Property { name: String, key: &'static str },
}

impl fmt::Display for DependencyPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyPosition::Argument { name, index } => {
                write!(f, "argument {name} at index [{index}]")
            }
            DependencyPosition::Property { name, key } => {
                write!(f, "property \"{key}\" ({name})")
            }
        }
    }
}

/// Errors while initiating the application
#[derive(Error, Debug, Clone)]
pub enum InitError {
    /// There are issues with the dependency graph
    #[error(transparent)]
    DependencyGraphError(#[from] DependencyGraphErrors),
    /// The module graph could not be built
    #[error(transparent)]
    Container(#[from] ContainerError),
    /// A provider failed to instantiate
    #[error(transparent)]
    Inject(#[from] InjectError),
    /// Initiation timed out
    #[error("Initiation timed out")]
    Timeout,
}
