use std::sync::Arc;

use tracing::debug;

use super::Guard;
use crate::{exceptions::Exception, execution_context::ExecutionContext};

/// Runs guards against one call
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardsConsumer;

impl GuardsConsumer {
    /// True if every guard lets the call through
    ///
    /// Guards run one after the other and evaluation stops at the first refusal.
    pub async fn try_activate(
        &self,
        guards: &[Arc<dyn Guard>],
        context: &ExecutionContext,
    ) -> Result<bool, Exception> {
        for (index, guard) in guards.iter().enumerate() {
            if !guard.can_activate(context).last().await? {
                debug!("Guard [{index}] denied {}", context.handler());
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::{executor::block_on, stream};
    use venok_di::TypeInfo;

    use super::*;
    use crate::{deferred::Deferred, execution_context::HandlerRef};

    struct Counting {
        answer: bool,
        calls: AtomicUsize,
    }

    impl Guard for Counting {
        fn can_activate(&self, _: &ExecutionContext) -> Deferred<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let answer = self.answer;
            Deferred::future(async move { Ok(answer) })
        }
    }

    struct Streaming;

    impl Guard for Streaming {
        fn can_activate(&self, _: &ExecutionContext) -> Deferred<bool> {
            Deferred::stream(stream::iter([Ok(false), Ok(true)]))
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new(
            Vec::new(),
            HandlerRef {
                class: TypeInfo::of::<()>(),
                method: "handle",
            },
        )
    }

    fn counting(answer: bool) -> Arc<Counting> {
        Arc::new(Counting {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn stops_at_the_first_refusal() {
        let deny = counting(false);
        let allow = counting(true);
        let guards: Vec<Arc<dyn Guard>> = vec![deny.clone(), allow.clone()];

        assert!(!block_on(GuardsConsumer.try_activate(&guards, &context())).unwrap());
        assert_eq!(deny.calls.load(Ordering::SeqCst), 1);
        assert_eq!(allow.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn streams_are_judged_by_their_last_value() {
        let guards: Vec<Arc<dyn Guard>> = vec![Arc::new(Streaming), counting(true)];
        assert!(block_on(GuardsConsumer.try_activate(&guards, &context())).unwrap());
    }

    #[test]
    fn no_guards_activate() {
        assert!(block_on(GuardsConsumer.try_activate(&[], &context())).unwrap());
    }
}
