use std::{fmt::Debug, sync::Arc};

use crate::{
    container::Container,
    context_id::{ContextId, InboundRequest},
    errors::{ContainerError, InjectError},
    injector::Injector,
    instance_resolver::{self, IntrospectionResult},
    module::{Module, ModuleDefinition},
    module_ref::ModuleRef,
    resolver::arc::downcast,
    token::{ModuleToken, Token},
    types::{Injectable, Instance},
};

/// Fully initiated application
///
/// Static providers are available through `get`, request scoped and transient ones
/// through `resolve`. A context created with [ApplicationContext::select] only sees the
/// providers of the selected module.
#[derive(Clone)]
pub struct ApplicationContext {
    container: Arc<Container>,
    injector: Injector,
    module: Option<ModuleToken>,
}

impl Debug for ApplicationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_struct("ApplicationContext");
        for module in self.container.modules().values() {
            map.field(&module.name(), &module.providers().len());
        }
        map.finish()
    }
}

impl ApplicationContext {
    pub(crate) fn new(container: Arc<Container>) -> Self {
        let injector = Injector::new(&container);
        ApplicationContext {
            container,
            injector,
            module: None,
        }
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Module this context is restricted to
    pub fn module(&self) -> Option<&ModuleToken> {
        self.module.as_ref()
    }

    /// Context restricted to the providers of module `M`
    pub fn select<M: ModuleDefinition>(&self) -> Result<ApplicationContext, ContainerError> {
        let module = self
            .container
            .modules_of::<M>()
            .first()
            .cloned()
            .ok_or_else(|| ContainerError::UnknownModule(std::any::type_name::<M>().into()))?;
        Ok(ApplicationContext {
            container: self.container.clone(),
            injector: self.injector.clone(),
            module: Some(module),
        })
    }

    /// Handle of a registered module
    pub fn module_ref(&self, module: &ModuleToken) -> Result<ModuleRef, ContainerError> {
        self.container.module(module)?;
        Ok(ModuleRef::new(Arc::downgrade(&self.container), module.clone()))
    }

    /// Attempts to get the static instance of `T`
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>, InjectError> {
        downcast(&self.get_token(Token::of::<T>())?)
    }

    pub fn get_token(&self, token: impl Into<Token>) -> Result<Instance, InjectError> {
        instance_resolver::find(&self.container, &token.into(), self.module.as_ref())
    }

    /// Static instances of every registration of `T`
    pub fn get_all<T: Injectable>(&self) -> Result<Vec<Arc<T>>, InjectError> {
        instance_resolver::find_each(&self.container, &Token::of::<T>(), self.module.as_ref())?
            .iter()
            .map(downcast)
            .collect()
    }

    /// Resolves `T` for a context, a fresh context is created if none is given
    pub async fn resolve<T: Injectable>(
        &self,
        context_id: Option<&ContextId>,
    ) -> Result<Arc<T>, InjectError> {
        downcast(&self.resolve_token(Token::of::<T>(), context_id).await?)
    }

    pub async fn resolve_token(
        &self,
        token: impl Into<Token>,
        context_id: Option<&ContextId>,
    ) -> Result<Instance, InjectError> {
        let context_id = self.context_or_new(context_id);
        instance_resolver::resolve_per_context(
            &self.container,
            &self.injector,
            &token.into(),
            self.module.as_ref(),
            &context_id,
        )
        .await
    }

    pub async fn resolve_all<T: Injectable>(
        &self,
        context_id: Option<&ContextId>,
    ) -> Result<Vec<Arc<T>>, InjectError> {
        let context_id = self.context_or_new(context_id);
        instance_resolver::resolve_each_per_context(
            &self.container,
            &self.injector,
            &Token::of::<T>(),
            self.module.as_ref(),
            &context_id,
        )
        .await?
        .iter()
        .map(downcast)
        .collect()
    }

    pub fn introspect(&self, token: impl Into<Token>) -> Result<IntrospectionResult, InjectError> {
        instance_resolver::introspect(&self.container, &token.into(), self.module.as_ref())
    }

    pub fn create_context_id(&self) -> ContextId {
        self.container.context_ids().create()
    }

    fn context_or_new(&self, context_id: Option<&ContextId>) -> ContextId {
        context_id
            .cloned()
            .unwrap_or_else(|| self.create_context_id())
    }

    /// Context of an inbound request, its payload becomes the `REQUEST` value
    pub fn register_request(&self, request: &InboundRequest) -> ContextId {
        self.container.get_context_id(request, false)
    }

    pub fn register_request_by_context_id<T: Injectable>(&self, request: T, context_id: &ContextId) {
        self.container
            .register_request_provider(Instance::new(request), context_id);
    }

    /// Drops the request scoped instances of a finished request
    pub fn end_request(&self, context_id: &ContextId) -> usize {
        self.container.release_context(context_id)
    }

    /// Modules ordered for lifecycle hooks, global modules first
    pub fn modules_by_distance(&self) -> Vec<&Module> {
        let mut modules = self.container.modules().values().collect::<Vec<_>>();
        modules.sort_by(|a, b| b.distance().cmp(&a.distance()));
        modules
    }
}
