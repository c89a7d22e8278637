//! Exception filters turn errors raised during a call into results.

use venok_di::Instance;

use crate::{
    deferred::Deferred,
    exceptions::{Exception, ExceptionType},
    execution_context::ArgumentsHost,
};

mod context_creator;
mod handler;
mod proxy;

pub use context_creator::FiltersContextCreator;
pub use handler::ExceptionsHandler;
pub use proxy::{ContextCallback, ExceptionsProxy};

/// Handles exceptions of the types it declares
pub trait ExceptionFilter: Send + Sync + 'static {
    /// Error types this filter handles, an empty list catches everything
    fn catches(&self) -> Vec<ExceptionType> {
        Vec::new()
    }

    /// Produces the result of the failed call, or fails with another exception
    fn catch(&self, exception: Exception, host: &dyn ArgumentsHost) -> Deferred<Instance>;
}
