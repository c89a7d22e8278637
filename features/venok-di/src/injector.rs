use std::sync::{Arc, Weak};

use futures::{future::BoxFuture, FutureExt};
use tracing::debug;

use crate::{
    container::{Container, DependencyLookup},
    context_id::ContextId,
    errors::InjectError,
    factories::Args,
    instance_wrapper::{InstanceSlot, InstanceWrapper},
    module_ref::ModuleRef,
    provider::{Dependency, ProviderKind, REQUEST},
    token::Token,
    types::Instance,
};

/// Resolves and instantiates providers
///
/// Dependencies are resolved depth first in declaration order. Every resolution
/// carries the chain of wrappers currently being constructed, a wrapper showing up
/// twice in it is a circular dependency.
#[derive(Clone)]
pub struct Injector {
    container: Weak<Container>,
}

impl Injector {
    pub fn new(container: &Arc<Container>) -> Self {
        Injector {
            container: Arc::downgrade(container),
        }
    }

    pub(crate) fn container(&self) -> Result<Arc<Container>, InjectError> {
        self.container
            .upgrade()
            .ok_or_else(|| InjectError::UnknownElement("the application container".into()))
    }

    /// Loads the instance of `wrapper` for a context
    pub fn load_instance(
        &self,
        wrapper: Arc<InstanceWrapper>,
        context_id: ContextId,
    ) -> BoxFuture<'static, Result<Instance, InjectError>> {
        self.load_in_chain(wrapper, context_id, Vec::new())
    }

    fn load_in_chain(
        &self,
        wrapper: Arc<InstanceWrapper>,
        context_id: ContextId,
        chain: Vec<(u64, String)>,
    ) -> BoxFuture<'static, Result<Instance, InjectError>> {
        let injector = self.clone();
        async move {
            if let Some(start) = chain.iter().position(|(id, _)| *id == wrapper.id()) {
                let mut cycle = chain[start..]
                    .iter()
                    .map(|(_, name)| name.clone())
                    .collect::<Vec<_>>();
                cycle.push(wrapper.name().to_string());
                return Err(InjectError::CircularDependency { chain: cycle });
            }

            if let ProviderKind::Value(instance) = &wrapper.kind {
                return Ok(instance.clone());
            }

            if wrapper.is_transient() {
                return injector.instantiate(wrapper, context_id, chain).await;
            }

            let effective = wrapper.effective_context(&context_id);
            let key = effective.id;
            let slot = wrapper.slot_or_install(key, || {
                injector
                    .instantiate(wrapper.clone(), effective, chain)
                    .shared()
            });

            match slot {
                InstanceSlot::Resolved(instance) => Ok(instance),
                InstanceSlot::Pending(pending) => {
                    let result = pending.await;
                    wrapper.settle(key, &result);
                    result
                }
            }
        }
        .boxed()
    }

    /// Resolves the dependencies of `wrapper` and runs its constructor
    fn instantiate(
        &self,
        wrapper: Arc<InstanceWrapper>,
        context_id: ContextId,
        mut chain: Vec<(u64, String)>,
    ) -> BoxFuture<'static, Result<Instance, InjectError>> {
        let injector = self.clone();
        async move {
            if *wrapper.token() == Token::named(REQUEST) {
                if let Some(payload) = context_id.payload.clone() {
                    return Ok(payload);
                }
            }

            let container = injector.container()?;
            let Some(recipe) = wrapper.recipe().cloned() else {
                return wrapper
                    .instance()
                    .ok_or_else(|| InjectError::UnknownElement(wrapper.name().to_string()));
            };
            debug!("Instantiating {} ({})", wrapper.name(), wrapper.scope());
            chain.push((wrapper.id(), wrapper.name().to_string()));

            let mut values = Vec::with_capacity(recipe.inject.len());
            for (index, dependency) in recipe.inject.iter().enumerate() {
                let value = injector
                    .resolve_dependency(&container, &wrapper, index, dependency, &context_id, &chain)
                    .await?;
                values.push(value);
            }

            let mut properties = Vec::with_capacity(recipe.properties.len());
            for (offset, property) in recipe.properties.iter().enumerate() {
                let index = recipe.inject.len() + offset;
                let value = injector
                    .resolve_dependency(
                        &container,
                        &wrapper,
                        index,
                        &property.dependency,
                        &context_id,
                        &chain,
                    )
                    .await?;
                properties.push((property.key, value));
            }
            drop(container);

            let args = Args::new(wrapper.name().to_string(), values, properties);
            (recipe.construct)(args)
                .await
                .map_err(|error| InjectError::FactoryFailed {
                    product: wrapper.name().to_string(),
                    error: Arc::new(error),
                })
        }
        .boxed()
    }

    async fn resolve_dependency(
        &self,
        container: &Arc<Container>,
        wrapper: &InstanceWrapper,
        index: usize,
        dependency: &Dependency,
        context_id: &ContextId,
        chain: &[(u64, String)],
    ) -> Result<Option<Instance>, InjectError> {
        match container.lookup_dependency(wrapper, index, dependency)? {
            DependencyLookup::Missing => Ok(None),
            DependencyLookup::ModuleRef => Ok(Some(Instance::new(ModuleRef::new(
                Arc::downgrade(container),
                wrapper.host().clone(),
            )))),
            DependencyLookup::Wrapper(found) => self
                .load_in_chain(found, context_id.clone(), chain.to_vec())
                .await
                .map(Some),
        }
    }
}
