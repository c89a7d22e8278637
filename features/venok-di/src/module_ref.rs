use std::{
    any::type_name,
    fmt,
    sync::{Arc, Weak},
};

use crate::{
    container::Container,
    context_id::ContextId,
    errors::InjectError,
    factories::Class,
    injector::Injector,
    instance_resolver::{self, IntrospectionResult},
    instance_wrapper::InstanceWrapper,
    provider::{Dependency, Provider},
    resolver::{
        arc::{downcast, require},
        Resolver,
    },
    token::{ModuleToken, Token},
    types::{Injectable, Instance, ScopeOptions},
};

/// Handle of the module a provider is declared in
///
/// Lookups are strict by default: only providers registered in this module are found.
#[derive(Clone)]
pub struct ModuleRef {
    container: Weak<Container>,
    module: ModuleToken,
}

impl ModuleRef {
    pub(crate) fn new(container: Weak<Container>, module: ModuleToken) -> Self {
        ModuleRef { container, module }
    }

    pub fn module(&self) -> &ModuleToken {
        &self.module
    }

    fn container(&self) -> Result<Arc<Container>, InjectError> {
        self.container
            .upgrade()
            .ok_or_else(|| InjectError::UnknownElement("the application container".into()))
    }

    fn scope(&self, strict: bool) -> Option<&ModuleToken> {
        strict.then_some(&self.module)
    }

    /// Static instance of `T`
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>, InjectError> {
        downcast(&self.get_token(&Token::of::<T>(), true)?)
    }

    pub fn get_token(&self, token: &Token, strict: bool) -> Result<Instance, InjectError> {
        instance_resolver::find(&*self.container()?, token, self.scope(strict))
    }

    /// Resolves `T` for a context, a new context is created if none is given
    pub async fn resolve<T: Injectable>(
        &self,
        context_id: Option<&ContextId>,
    ) -> Result<Arc<T>, InjectError> {
        downcast(&self.resolve_token(&Token::of::<T>(), context_id, true).await?)
    }

    pub async fn resolve_token(
        &self,
        token: &Token,
        context_id: Option<&ContextId>,
        strict: bool,
    ) -> Result<Instance, InjectError> {
        let container = self.container()?;
        let context_id = match context_id {
            Some(context_id) => context_id.clone(),
            None => container.context_ids().create(),
        };
        let injector = Injector::new(&container);
        instance_resolver::resolve_per_context(
            &container,
            &injector,
            token,
            self.scope(strict),
            &context_id,
        )
        .await
    }

    /// Instantiates a class which is not registered, against this module's providers
    pub async fn create<T: Class>(&self) -> Result<Arc<T>, InjectError> {
        let container = self.container()?;
        let provider = Provider::class::<T>().scope(ScopeOptions::transient());
        let wrapper = Arc::new(InstanceWrapper::new(provider, self.module.clone(), None));
        let instance = Injector::new(&container)
            .load_instance(wrapper, container.context_ids().create())
            .await?;
        downcast(&instance)
    }

    /// Scope `token` behaves with
    pub fn introspect(&self, token: &Token) -> Result<IntrospectionResult, InjectError> {
        instance_resolver::introspect(&*self.container()?, token, None)
    }

    /// Sets the `REQUEST` value of a context
    pub fn register_request_by_context_id<T: Injectable>(&self, request: T, context_id: &ContextId) {
        if let Ok(container) = self.container() {
            container.register_request_provider(Instance::new(request), context_id);
        }
    }
}

impl Resolver for ModuleRef {
    fn dependency() -> Dependency {
        Dependency::of::<ModuleRef>()
    }

    fn from_instance(instance: Option<Instance>) -> Result<Self, InjectError> {
        let instance = require(instance, type_name::<ModuleRef>())?;
        Ok(downcast::<ModuleRef>(&instance)?.as_ref().clone())
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleRef").field(&self.module).finish()
    }
}
