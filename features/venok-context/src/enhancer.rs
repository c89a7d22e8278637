use std::{any::type_name, fmt, marker::PhantomData, sync::Arc};

use parking_lot::RwLock;
use tracing::warn;
use venok_di::{
    Class, Container, ContextId, DynError, EnhancerSubtype, InjectError, Injector, Instance,
    InstanceWrapper, ModuleToken, Provider, Token,
};

use crate::{
    application_config::{ApplicationConfig, GlobalEnhancers},
    filters::ExceptionFilter,
    guards::Guard,
    interceptors::Interceptor,
    pipes::PipeTransform,
};

/// One of the enhancer trait objects: `dyn Guard`, `dyn Interceptor`, `dyn PipeTransform`
/// or `dyn ExceptionFilter`
pub trait EnhancerKind: Send + Sync + 'static {
    const SUBTYPE: EnhancerSubtype;
    /// Token global enhancers of this kind are provided under
    const APP_TOKEN: &'static str;

    fn globals(config: &ApplicationConfig) -> &RwLock<GlobalEnhancers<Self>>;
}

/// Converts a concrete enhancer into its trait object
pub trait IntoEnhancer<T: ?Sized> {
    fn into_enhancer(self: Arc<Self>) -> Arc<T>;
}

macro_rules! enhancer_kind {
    ($trait:ident, $subtype:ident, $app_token:path, $field:ident) => {
        impl EnhancerKind for dyn $trait {
            const SUBTYPE: EnhancerSubtype = EnhancerSubtype::$subtype;
            const APP_TOKEN: &'static str = $app_token;

            fn globals(config: &ApplicationConfig) -> &RwLock<GlobalEnhancers<Self>> {
                &config.$field
            }
        }

        impl<E: $trait> IntoEnhancer<dyn $trait> for E {
            fn into_enhancer(self: Arc<Self>) -> Arc<dyn $trait> {
                self
            }
        }
    };
}

enhancer_kind!(Guard, Guard, venok_di::APP_GUARD, guards);
enhancer_kind!(Interceptor, Interceptor, venok_di::APP_INTERCEPTOR, interceptors);
enhancer_kind!(PipeTransform, Pipe, venok_di::APP_PIPE, pipes);
enhancer_kind!(ExceptionFilter, Filter, venok_di::APP_FILTER, filters);

/// Identity of class `E` registered as an enhancer of kind `T`
///
/// One class may be both a guard and an interceptor, each kind gets its own injectable.
pub struct Enhancer<E, T: ?Sized>(PhantomData<fn() -> (E, Box<T>)>);

/// Token of the injectable backing `E` as an enhancer of kind `T`
pub fn enhancer_token<T, E>() -> Token
where
    T: ?Sized + EnhancerKind,
    E: 'static,
{
    Token::of::<Enhancer<E, T>>()
}

/// An enhancer attached to a class or handler
///
/// Either a ready instance, or a class resolved from the injectables of the module
/// declaring the handler.
pub enum EnhancerRef<T: ?Sized> {
    Instance(Arc<T>),
    Class {
        token: Token,
        provider: fn() -> Provider,
    },
}

impl<T: ?Sized + EnhancerKind> EnhancerRef<T> {
    pub fn instance<E: IntoEnhancer<T>>(enhancer: E) -> Self {
        EnhancerRef::Instance(IntoEnhancer::<T>::into_enhancer(Arc::new(enhancer)))
    }

    pub fn shared(enhancer: Arc<T>) -> Self {
        EnhancerRef::Instance(enhancer)
    }

    /// A class the container instantiates, honoring its scope
    pub fn class<E: Class + IntoEnhancer<T>>() -> Self {
        EnhancerRef::Class {
            token: enhancer_token::<T, E>(),
            provider: enhancer_provider::<T, E>,
        }
    }

    /// The injectable to register for a class reference
    pub fn provider(&self) -> Option<Provider> {
        match self {
            EnhancerRef::Instance(_) => None,
            EnhancerRef::Class { provider, .. } => Some(provider()),
        }
    }
}

impl<T: ?Sized> Clone for EnhancerRef<T> {
    fn clone(&self) -> Self {
        match self {
            EnhancerRef::Instance(instance) => EnhancerRef::Instance(instance.clone()),
            EnhancerRef::Class { token, provider } => EnhancerRef::Class {
                token: token.clone(),
                provider: *provider,
            },
        }
    }
}

impl<T: ?Sized> fmt::Debug for EnhancerRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnhancerRef::Instance(_) => f.write_str("EnhancerRef::Instance"),
            EnhancerRef::Class { token, .. } => write!(f, "EnhancerRef::Class({token})"),
        }
    }
}

/// Provider of the enhancer class `E`, its instance is stored as `Arc<T>`
pub fn enhancer_provider<T, E>() -> Provider
where
    T: ?Sized + EnhancerKind,
    E: Class + IntoEnhancer<T>,
{
    Provider::class::<E>()
        .provide(enhancer_token::<T, E>())
        .map_instance(|instance| {
            let enhancer = instance.downcast::<E>().map_err(DynError::from)?;
            Ok(Instance::new(IntoEnhancer::<T>::into_enhancer(enhancer)))
        })
        .enhancer(T::SUBTYPE)
}

/// Registers `E` as a global enhancer, e.g. `app_enhancer::<dyn Guard, AuthGuard>()`
pub fn app_enhancer<T, E>() -> Provider
where
    T: ?Sized + EnhancerKind,
    E: Class + IntoEnhancer<T>,
{
    enhancer_provider::<T, E>().provide(T::APP_TOKEN)
}

/// Turns enhancer references into live instances
///
/// Global enhancers come first, then the given layers in order. References which
/// cannot be resolved are skipped.
#[derive(Clone)]
pub struct EnhancerResolver {
    container: Arc<Container>,
    injector: Injector,
    config: Arc<ApplicationConfig>,
}

impl EnhancerResolver {
    pub fn new(container: Arc<Container>, config: Arc<ApplicationConfig>) -> Self {
        let injector = Injector::new(&container);
        EnhancerResolver {
            container,
            injector,
            config,
        }
    }

    pub fn config(&self) -> &Arc<ApplicationConfig> {
        &self.config
    }

    /// Global enhancers of kind `T`
    ///
    /// Request scoped ones are only available with a request context.
    pub async fn global<T: ?Sized + EnhancerKind>(
        &self,
        context_id: &ContextId,
    ) -> Result<Vec<Arc<T>>, InjectError> {
        let (mut enhancers, scoped) = {
            let globals = T::globals(&self.config).read();
            (globals.instances().to_vec(), globals.scoped().to_vec())
        };
        for wrapper in scoped {
            if let Some(enhancer) = self.load::<T>(wrapper, context_id).await? {
                enhancers.push(enhancer);
            }
        }
        Ok(enhancers)
    }

    /// Resolves references declared in `module`
    pub async fn resolve<T: ?Sized + EnhancerKind>(
        &self,
        refs: &[EnhancerRef<T>],
        module: &ModuleToken,
        context_id: &ContextId,
    ) -> Result<Vec<Arc<T>>, InjectError> {
        let mut enhancers = Vec::with_capacity(refs.len());
        for enhancer in refs {
            match enhancer {
                EnhancerRef::Instance(instance) => enhancers.push(instance.clone()),
                EnhancerRef::Class { token, .. } => {
                    let wrapper = self.container.module(module)?.injectables().get(token).cloned();
                    let Some(wrapper) = wrapper else {
                        warn!("Skipping enhancer {token}, it is not registered in {module}");
                        continue;
                    };
                    if let Some(enhancer) = self.load::<T>(wrapper, context_id).await? {
                        enhancers.push(enhancer);
                    }
                }
            }
        }
        Ok(enhancers)
    }

    /// Globals followed by every layer
    pub async fn collect<T: ?Sized + EnhancerKind>(
        &self,
        layers: &[&[EnhancerRef<T>]],
        module: &ModuleToken,
        context_id: &ContextId,
    ) -> Result<Vec<Arc<T>>, InjectError> {
        let mut enhancers = self.global::<T>(context_id).await?;
        for layer in layers {
            enhancers.extend(self.resolve(layer, module, context_id).await?);
        }
        Ok(enhancers)
    }

    async fn load<T: ?Sized + EnhancerKind>(
        &self,
        wrapper: Arc<InstanceWrapper>,
        context_id: &ContextId,
    ) -> Result<Option<Arc<T>>, InjectError> {
        if context_id.is_static() && !wrapper.is_dependency_tree_static() {
            warn!(
                "Skipping request scoped enhancer {} outside of a request",
                wrapper.name()
            );
            return Ok(None);
        }
        let instance = self
            .injector
            .load_instance(wrapper, context_id.clone())
            .await?;
        instance
            .downcast::<Arc<T>>()
            .map(|enhancer| Some((*enhancer).clone()))
            .map_err(|actual_type| InjectError::DowncastFailed {
                required_type: type_name::<Arc<T>>(),
                actual_type,
            })
    }
}

#[cfg(test)]
mod tests {
    use venok_di::{DiBuilder, ModuleDefinition, ModuleMetadata};

    use super::*;
    use crate::{
        deferred::Deferred,
        execution_context::ExecutionContext,
        interceptors::CallHandler,
        metadata::{controller_provider, Controller, EnhancerMetadata, HandlerMetadata},
    };

    struct AllowAll;

    impl Guard for AllowAll {
        fn can_activate(&self, _: &ExecutionContext) -> Deferred<bool> {
            Deferred::value(true)
        }
    }

    impl Class for AllowAll {
        type Dependencies = ();

        async fn construct(_: ()) -> Result<Self, DynError> {
            Ok(AllowAll)
        }
    }

    #[test]
    fn class_references_carry_their_provider() {
        let reference = EnhancerRef::<dyn Guard>::class::<AllowAll>();
        let provider = reference.provider().unwrap();
        assert_eq!(provider.token(), &enhancer_token::<dyn Guard, AllowAll>());
        assert_eq!(provider.subtype(), Some(EnhancerSubtype::Guard));
        assert!(EnhancerRef::<dyn Guard>::instance(AllowAll).provider().is_none());
    }

    #[test]
    fn app_enhancers_use_the_app_token() {
        let provider = app_enhancer::<dyn Guard, AllowAll>();
        assert_eq!(provider.token(), &Token::named(venok_di::APP_GUARD));
    }

    /// Guards and intercepts the same handler
    struct Audit;

    impl Guard for Audit {
        fn can_activate(&self, _: &ExecutionContext) -> Deferred<bool> {
            Deferred::value(true)
        }
    }

    impl Interceptor for Audit {
        fn intercept(&self, _: &ExecutionContext, next: CallHandler) -> Deferred<Instance> {
            next.handle()
        }
    }

    impl Class for Audit {
        type Dependencies = ();

        async fn construct(_: ()) -> Result<Self, DynError> {
            Ok(Audit)
        }
    }

    struct AuditedController;

    impl Class for AuditedController {
        type Dependencies = ();

        async fn construct(_: ()) -> Result<Self, DynError> {
            Ok(AuditedController)
        }
    }

    impl Controller for AuditedController {
        fn enhancers() -> EnhancerMetadata {
            EnhancerMetadata::new()
                .guard(EnhancerRef::class::<Audit>())
                .interceptor(EnhancerRef::class::<Audit>())
        }

        fn handlers() -> Vec<HandlerMetadata> {
            Vec::new()
        }
    }

    struct AuditModule;

    impl ModuleDefinition for AuditModule {
        fn metadata() -> ModuleMetadata {
            ModuleMetadata::new().controller(controller_provider::<AuditedController>())
        }
    }

    #[tokio::test]
    async fn one_class_can_serve_several_enhancer_kinds() {
        let app = DiBuilder::new::<AuditModule>().build().await.unwrap();
        let module = app.container().modules_of::<AuditModule>()[0].clone();
        let resolver =
            EnhancerResolver::new(app.container().clone(), Arc::new(ApplicationConfig::new()));
        let enhancers = AuditedController::enhancers();

        let guards = resolver
            .resolve(&enhancers.guards, &module, &ContextId::STATIC)
            .await
            .unwrap();
        let interceptors = resolver
            .resolve(&enhancers.interceptors, &module, &ContextId::STATIC)
            .await
            .unwrap();
        assert_eq!(guards.len(), 1);
        assert_eq!(interceptors.len(), 1);
        assert_ne!(
            enhancer_token::<dyn Guard, Audit>(),
            enhancer_token::<dyn Interceptor, Audit>()
        );
    }
}
