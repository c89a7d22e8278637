use std::{fmt, ops::Deref, sync::Arc};

use futures::FutureExt;
use tracing::debug;
use venok_context::{
    ApplicationConfig, ContextOptions, ContextType, Controller, Exception, ExceptionFilter, Guard,
    HandlerCall, HandlerMetadata, HandlerTarget, Interceptor, ParamsFactory, PipeTransform,
    VenokContextCreator,
};
use venok_di::{
    ApplicationContext, ContextId, InboundRequest, Instance, InstanceWrapper, ModuleToken, Token,
};

use crate::errors::VenokError;

/// A bootstrapped application
///
/// Dereferences to its [ApplicationContext] for `get` / `resolve`. Handlers of
/// controllers are obtained as composed calls running the full enhancer pipeline.
#[derive(Clone)]
pub struct VenokApplication {
    context: ApplicationContext,
    config: Arc<ApplicationConfig>,
    creator: VenokContextCreator,
    params_factory: Arc<dyn ParamsFactory>,
    context_type: ContextType,
}

impl VenokApplication {
    pub(crate) fn new(
        context: ApplicationContext,
        config: Arc<ApplicationConfig>,
        params_factory: Arc<dyn ParamsFactory>,
        context_type: ContextType,
    ) -> Self {
        let creator = VenokContextCreator::new(context.container().clone(), config.clone());
        VenokApplication {
            context,
            config,
            creator,
            params_factory,
            context_type,
        }
    }

    pub fn context(&self) -> &ApplicationContext {
        &self.context
    }

    pub fn config(&self) -> &Arc<ApplicationConfig> {
        &self.config
    }

    pub fn use_global_guards(&self, guards: impl IntoIterator<Item = Arc<dyn Guard>>) -> &Self {
        self.config.use_global_guards(guards);
        self
    }

    pub fn use_global_interceptors(
        &self,
        interceptors: impl IntoIterator<Item = Arc<dyn Interceptor>>,
    ) -> &Self {
        self.config.use_global_interceptors(interceptors);
        self
    }

    pub fn use_global_pipes(&self, pipes: impl IntoIterator<Item = Arc<dyn PipeTransform>>) -> &Self {
        self.config.use_global_pipes(pipes);
        self
    }

    pub fn use_global_filters(
        &self,
        filters: impl IntoIterator<Item = Arc<dyn ExceptionFilter>>,
    ) -> &Self {
        self.config.use_global_filters(filters);
        self
    }

    /// The composed call of `C::method`
    ///
    /// Controllers with a static dependency tree are instantiated once and their call
    /// is built right away. Others get a fresh context on every invocation, which is
    /// released once the call settles.
    pub async fn handler<C: Controller>(
        &self,
        method: &str,
        options: ContextOptions,
    ) -> Result<HandlerCall, VenokError> {
        let (module, wrapper) = self.controller::<C>()?;
        let handler = handler_metadata::<C>(method)?;

        if wrapper.is_dependency_tree_static() {
            let target = self
                .target::<C>(wrapper, handler, module, &ContextId::STATIC)
                .await?;
            let call = self
                .creator
                .create(
                    &target,
                    self.params_factory.clone(),
                    &ContextId::STATIC,
                    options,
                    self.context_type,
                )
                .await?;
            return Ok(call);
        }

        debug!("{} is request scoped, its calls get their own context", wrapper.name());
        let application = self.clone();
        Ok(Arc::new(move |args: Vec<Instance>| {
            let application = application.clone();
            let wrapper = wrapper.clone();
            let handler = handler.clone();
            let module = module.clone();
            let options = options.clone();
            async move {
                let context_id = application.context.create_context_id();
                let result = application
                    .call_in::<C>(wrapper, handler, module, options, &context_id, args)
                    .await;
                application.context.end_request(&context_id);
                result
            }
            .boxed()
        }))
    }

    /// Runs `C::method` for an inbound request
    ///
    /// The request's payload is injectable as `REQUEST` and request scoped providers
    /// live as long as the request's context. Call
    /// [end_request](ApplicationContext::end_request) once the request is done.
    pub async fn handle_request<C: Controller>(
        &self,
        method: &str,
        request: &InboundRequest,
        options: ContextOptions,
        args: Vec<Instance>,
    ) -> Result<Instance, Exception> {
        let (module, wrapper) = self.controller::<C>()?;
        let handler = handler_metadata::<C>(method)?;
        let context_id = self.context.register_request(request);
        self.call_in::<C>(wrapper, handler, module, options, &context_id, args)
            .await
    }

    async fn call_in<C: Controller>(
        &self,
        wrapper: Arc<InstanceWrapper>,
        handler: HandlerMetadata,
        module: ModuleToken,
        options: ContextOptions,
        context_id: &ContextId,
        args: Vec<Instance>,
    ) -> Result<Instance, Exception> {
        let target = self.target::<C>(wrapper, handler, module, context_id).await?;
        let call = self
            .creator
            .create(
                &target,
                self.params_factory.clone(),
                context_id,
                options,
                self.context_type,
            )
            .await?;
        call(args).await
    }

    async fn target<C: Controller>(
        &self,
        wrapper: Arc<InstanceWrapper>,
        handler: HandlerMetadata,
        module: ModuleToken,
        context_id: &ContextId,
    ) -> Result<HandlerTarget, VenokError> {
        let instance = self
            .context
            .injector()
            .load_instance(wrapper, context_id.clone())
            .await?;
        Ok(HandlerTarget::of::<C>(instance, handler, module))
    }

    /// Module declaring `C` and its wrapper
    fn controller<C: Controller>(&self) -> Result<(ModuleToken, Arc<InstanceWrapper>), VenokError> {
        let token = Token::of::<C>();
        self.context
            .container()
            .modules()
            .values()
            .find_map(|module| {
                module
                    .controllers()
                    .get(&token)
                    .map(|wrapper| (module.token().clone(), wrapper.clone()))
            })
            .ok_or(VenokError::UnknownController(std::any::type_name::<C>()))
    }
}

fn handler_metadata<C: Controller>(method: &str) -> Result<HandlerMetadata, VenokError> {
    C::handlers()
        .into_iter()
        .find(|handler| handler.method == method)
        .ok_or_else(|| VenokError::UnknownHandler {
            controller: std::any::type_name::<C>(),
            method: method.to_string(),
        })
}

impl Deref for VenokApplication {
    type Target = ApplicationContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl fmt::Debug for VenokApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VenokApplication")
            .field("context", &self.context)
            .field("context_type", &self.context_type)
            .finish()
    }
}
