//! Pipes transform handler arguments before the handler sees them.

use venok_di::{Instance, TypeInfo};

use crate::deferred::Deferred;

mod consumer;
mod context_creator;

pub use consumer::PipesConsumer;
pub use context_creator::PipesContextCreator;

/// What a pipe knows about the argument it transforms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentMetadata {
    /// Position in the handler's argument list
    pub index: usize,
    /// `"arg"`, `"custom"` or a transport specific kind such as `"body"`
    pub kind: &'static str,
    pub data: Option<String>,
    pub metatype: Option<TypeInfo>,
}

/// Transforms or validates one argument
///
/// A missing value is passed as `None`, a pipe may supply a default for it.
pub trait PipeTransform: Send + Sync + 'static {
    fn transform(&self, value: Option<Instance>, metadata: &ArgumentMetadata)
        -> Deferred<Option<Instance>>;
}
