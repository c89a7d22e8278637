use std::{
    sync::Arc,
    thread::{self, sleep},
    time::Duration,
};

use futures::{stream::FuturesUnordered, StreamExt};
use futures_channel::oneshot;

use crate::{
    container::Container, context_id::ContextId, dependency_graph::DependencyGraph,
    errors::InitError, injector::Injector,
};

/// Instantiates every provider with a static dependency tree
///
/// The dependency graph is checked first, nothing is constructed if it has missing or
/// circular dependencies. Request scoped and transient providers are left for later.
pub struct InstanceLoader {
    container: Arc<Container>,
    injector: Injector,
}

impl InstanceLoader {
    pub fn new(container: Arc<Container>) -> Self {
        let injector = Injector::new(&container);
        InstanceLoader {
            container,
            injector,
        }
    }

    pub async fn create_instances_of_dependencies(
        &self,
        timeout: Option<Duration>,
    ) -> Result<(), InitError> {
        // If we have a timeout - spawn a thread to signal once it's done
        let (timeout_tx, mut timeout_rx) = oneshot::channel::<()>();
        let _timeout_guard = match timeout {
            Some(timeout) => {
                // We don't join the thread - it will just die after the timeout
                thread::spawn(move || {
                    sleep(timeout);
                    let _ = timeout_tx.send(());
                });
                None
            }
            None => Some(timeout_tx),
        };

        DependencyGraph::new(&self.container).check()?;

        let mut pending = FuturesUnordered::new();
        for wrapper in self.container.wrappers() {
            if wrapper.is_value() || wrapper.is_transient() || !wrapper.is_dependency_tree_static() {
                continue;
            }
            pending.push(
                self.injector
                    .load_instance(wrapper.clone(), ContextId::STATIC),
            );
        }

        let total = pending.len();
        tracing::debug!("Instantiating {total} providers");

        loop {
            futures::select! {
                result = pending.next() => match result {
                    Some(Ok(instance)) => {
                        tracing::debug!(
                            "Constructed instance of {} [{} of {total} left]",
                            instance.info,
                            pending.len()
                        );
                    }
                    // If one provider fails - abort
                    Some(Err(error)) => return Err(error.into()),
                    None => break,
                },
                _ = timeout_rx => {
                    return Err(InitError::Timeout)
                }
            }
        }

        Ok(())
    }
}
