use std::sync::Arc;

use tracing::{debug, error};
use venok_di::Instance;

use super::ExceptionFilter;
use crate::{exceptions::Exception, execution_context::ArgumentsHost};

/// Picks the filter handling an exception
///
/// Filters are tried in order and the first one catching the exception wins.
/// Unhandled exceptions are logged and returned to the caller.
#[derive(Clone, Default)]
pub struct ExceptionsHandler {
    filters: Vec<Arc<dyn ExceptionFilter>>,
}

impl ExceptionsHandler {
    pub fn new(filters: Vec<Arc<dyn ExceptionFilter>>) -> Self {
        ExceptionsHandler { filters }
    }

    pub fn filters(&self) -> &[Arc<dyn ExceptionFilter>] {
        &self.filters
    }

    pub async fn handle(
        &self,
        exception: Exception,
        host: &dyn ArgumentsHost,
    ) -> Result<Instance, Exception> {
        let filter = self.filters.iter().position(|filter| {
            let catches = filter.catches();
            catches.is_empty() || catches.iter().any(|kind| kind.matches(&exception))
        });
        match filter {
            Some(index) => {
                debug!("Exception filter [{index}] handles: {exception}");
                self.filters[index].catch(exception, host).last().await
            }
            None => {
                error!("Unhandled exception: {exception}");
                Err(exception)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use thiserror::Error;
    use venok_di::TypeInfo;

    use super::*;
    use crate::{
        deferred::Deferred,
        exceptions::{ExceptionType, ForbiddenException, RuntimeException},
        execution_context::{ExecutionContext, HandlerRef},
    };

    #[derive(Error, Debug)]
    #[error("not found")]
    struct NotFound;

    struct Answer {
        catches: Vec<ExceptionType>,
        answer: &'static str,
    }

    impl ExceptionFilter for Answer {
        fn catches(&self) -> Vec<ExceptionType> {
            self.catches.clone()
        }

        fn catch(&self, _: Exception, _: &dyn ArgumentsHost) -> Deferred<Instance> {
            Deferred::value(Instance::new(self.answer))
        }
    }

    fn answer(catches: Vec<ExceptionType>, answer: &'static str) -> Arc<dyn ExceptionFilter> {
        Arc::new(Answer { catches, answer })
    }

    fn host() -> ExecutionContext {
        ExecutionContext::new(
            Vec::new(),
            HandlerRef {
                class: TypeInfo::of::<()>(),
                method: "handle",
            },
        )
    }

    #[test]
    fn first_matching_filter_wins() {
        let handler = ExceptionsHandler::new(vec![
            answer(vec![ExceptionType::of::<NotFound>()], "not found"),
            answer(vec![ExceptionType::of::<RuntimeException>()], "runtime"),
            answer(Vec::new(), "anything"),
        ]);

        let result = block_on(handler.handle(ForbiddenException::new().into(), &host())).unwrap();
        assert_eq!(result.downcast_ref::<&str>(), Some(&"runtime"));

        let result = block_on(handler.handle(NotFound.into(), &host())).unwrap();
        assert_eq!(result.downcast_ref::<&str>(), Some(&"not found"));
    }

    #[test]
    fn unhandled_exceptions_are_returned() {
        let handler =
            ExceptionsHandler::new(vec![answer(vec![ExceptionType::of::<NotFound>()], "nope")]);
        let error = block_on(handler.handle(RuntimeException::new("boom").into(), &host()))
            .unwrap_err();
        assert_eq!(error.to_string(), "boom");
    }
}
