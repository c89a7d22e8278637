use std::sync::Arc;

use futures::future::BoxFuture;
use venok_di::Instance;

use super::{CallHandler, Interceptor};
use crate::{exceptions::Exception, execution_context::ExecutionContext};

/// Composes interceptors around a handler
#[derive(Debug, Clone, Copy, Default)]
pub struct InterceptorsConsumer;

impl InterceptorsConsumer {
    /// Runs `interceptors` in order, the innermost one wraps `next`
    pub fn intercept(
        &self,
        interceptors: Arc<[Arc<dyn Interceptor>]>,
        context: ExecutionContext,
        next: CallHandler,
    ) -> BoxFuture<'static, Result<Instance, Exception>> {
        if interceptors.is_empty() {
            return next.handle().boxed();
        }
        chain(interceptors, 0, context, next).handle().boxed()
    }
}

/// The chain starting at interceptor `index`
fn chain(
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    index: usize,
    context: ExecutionContext,
    handler: CallHandler,
) -> CallHandler {
    if index >= interceptors.len() {
        return handler;
    }
    CallHandler::new(move || {
        let next = chain(
            interceptors.clone(),
            index + 1,
            context.clone(),
            handler.clone(),
        );
        interceptors[index].intercept(&context, next).boxed()
    })
}
