use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt};
use venok_di::Instance;

use super::ExceptionsHandler;
use crate::{exceptions::Exception, execution_context::ExecutionContext};

/// A composed call taking the context of one invocation
pub type ContextCallback =
    Arc<dyn Fn(ExecutionContext) -> BoxFuture<'static, Result<Instance, Exception>> + Send + Sync>;

/// Routes failures of a call through its exception filters
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionsProxy;

impl ExceptionsProxy {
    pub fn wrap(&self, callback: ContextCallback, handler: ExceptionsHandler) -> ContextCallback {
        let handler = Arc::new(handler);
        Arc::new(move |context: ExecutionContext| {
            let call = callback(context.clone());
            let handler = handler.clone();
            async move {
                match call.await {
                    Ok(result) => Ok(result),
                    Err(exception) => handler.handle(exception, &context).await,
                }
            }
            .boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use venok_di::TypeInfo;

    use super::*;
    use crate::{
        deferred::Deferred,
        exceptions::RuntimeException,
        execution_context::{ArgumentsHost, HandlerRef},
        filters::ExceptionFilter,
    };

    struct EchoFirstArg;

    impl ExceptionFilter for EchoFirstArg {
        fn catch(&self, _: Exception, host: &dyn ArgumentsHost) -> Deferred<Instance> {
            match host.arg(0) {
                Some(arg) => Deferred::value(arg.clone()),
                None => Deferred::error(RuntimeException::new("no arguments")),
            }
        }
    }

    #[test]
    fn filters_see_the_call_arguments() {
        let failing: ContextCallback =
            Arc::new(|_: ExecutionContext| {
                async { Err::<Instance, Exception>(RuntimeException::new("boom").into()) }.boxed()
            });
        let proxied =
            ExceptionsProxy.wrap(failing, ExceptionsHandler::new(vec![Arc::new(EchoFirstArg)]));

        let context = ExecutionContext::new(
            vec![Instance::new(7_u32)],
            HandlerRef {
                class: TypeInfo::of::<()>(),
                method: "handle",
            },
        );
        let result = block_on(proxied(context)).unwrap();
        assert_eq!(result.downcast_ref::<u32>(), Some(&7));
    }
}
