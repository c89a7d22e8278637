//! Interceptors wrap the handler call.

use std::{fmt, sync::Arc};

use futures::future::BoxFuture;
use venok_di::Instance;

use crate::{deferred::Deferred, exceptions::Exception, execution_context::ExecutionContext};

mod consumer;
mod context_creator;

pub use consumer::InterceptorsConsumer;
pub use context_creator::InterceptorsContextCreator;

/// Wraps the rest of the chain
///
/// `next.handle()` runs the remaining interceptors and finally the handler. An
/// interceptor may transform the result, replace it, or call `handle` again to retry.
pub trait Interceptor: Send + Sync + 'static {
    fn intercept(&self, context: &ExecutionContext, next: CallHandler) -> Deferred<Instance>;
}

type NextFn = dyn Fn() -> BoxFuture<'static, Result<Instance, Exception>> + Send + Sync;

/// The remaining part of an interceptor chain
#[derive(Clone)]
pub struct CallHandler {
    next: Arc<NextFn>,
}

impl CallHandler {
    pub fn new(
        next: impl Fn() -> BoxFuture<'static, Result<Instance, Exception>> + Send + Sync + 'static,
    ) -> Self {
        CallHandler {
            next: Arc::new(next),
        }
    }

    /// Runs the rest of the chain, nothing happens until the result is awaited
    pub fn handle(&self) -> Deferred<Instance> {
        Deferred::Future((self.next)())
    }
}

impl fmt::Debug for CallHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallHandler")
    }
}
