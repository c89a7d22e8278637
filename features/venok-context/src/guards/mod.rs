//! Guards decide whether a call may reach its handler.

use crate::{deferred::Deferred, execution_context::ExecutionContext};

mod consumer;
mod context_creator;

pub use consumer::GuardsConsumer;
pub use context_creator::GuardsContextCreator;

/// Decides whether a call may proceed
///
/// Guards run before any pipe or interceptor. A guard resolving to `false` rejects the
/// call with a [ForbiddenException](crate::exceptions::ForbiddenException).
pub trait Guard: Send + Sync + 'static {
    fn can_activate(&self, context: &ExecutionContext) -> Deferred<bool>;
}
