use std::{collections::HashMap, fmt, sync::Arc};

use futures::{
    future::{try_join_all, BoxFuture},
    FutureExt,
};
use parking_lot::Mutex;
use tracing::debug;
use venok_di::{Container, ContextId, InjectError, Instance, ModuleToken, TypeInfo};

use crate::{
    application_config::ApplicationConfig,
    enhancer::EnhancerResolver,
    exceptions::{Exception, ForbiddenException},
    execution_context::{ArgumentsHost, ContextType, ExecutionContext, HandlerRef},
    filters::{ContextCallback, ExceptionsProxy, FiltersContextCreator},
    guards::{Guard, GuardsConsumer, GuardsContextCreator},
    interceptors::{CallHandler, Interceptor, InterceptorsConsumer, InterceptorsContextCreator},
    metadata::{Controller, EnhancerMetadata, HandlerCallback, HandlerMetadata, ParamMetadata, ParamType},
    params::ParamsFactory,
    pipes::{ArgumentMetadata, PipeTransform, PipesConsumer, PipesContextCreator},
};

/// A composed handler, called with the raw arguments of one invocation
pub type HandlerCall =
    Arc<dyn Fn(Vec<Instance>) -> BoxFuture<'static, Result<Instance, Exception>> + Send + Sync>;

/// Called with the handler's result and the raw arguments
pub type ResultCallback = Arc<dyn Fn(&Instance, &[Instance]) + Send + Sync>;

/// Stages a transport wants the composed handler to run
#[derive(Clone)]
pub struct ContextOptions {
    pub guards: bool,
    pub interceptors: bool,
    pub filters: bool,
    pub callback: Option<ResultCallback>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            guards: true,
            interceptors: true,
            filters: true,
            callback: None,
        }
    }
}

impl fmt::Debug for ContextOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOptions")
            .field("guards", &self.guards)
            .field("interceptors", &self.interceptors)
            .field("filters", &self.filters)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// The handler a composed call dispatches to
#[derive(Clone)]
pub struct HandlerTarget {
    /// Instance of the declaring class the handler is called on
    pub instance: Instance,
    pub class: TypeInfo,
    pub class_enhancers: EnhancerMetadata,
    pub handler: HandlerMetadata,
    /// Module declaring the class, class based enhancers are looked up in it
    pub module: ModuleToken,
}

impl HandlerTarget {
    pub fn of<C: Controller>(instance: Instance, handler: HandlerMetadata, module: ModuleToken) -> Self {
        HandlerTarget {
            instance,
            class: TypeInfo::of::<C>(),
            class_enhancers: C::enhancers(),
            handler,
            module,
        }
    }

    pub fn handler_ref(&self) -> HandlerRef {
        HandlerRef {
            class: self.class,
            method: self.handler.method,
        }
    }
}

impl fmt::Debug for HandlerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTarget")
            .field("handler", &self.handler_ref())
            .field("module", &self.module)
            .finish()
    }
}

/// What the pipeline needs to know about a handler's parameters
#[derive(Debug)]
struct ParamsMetadata {
    /// Length of the argument list handed to the handler
    arg_count: usize,
    params: Vec<ParamMetadata>,
}

impl ParamsMetadata {
    fn extract(handler: &HandlerMetadata) -> Self {
        let mut params = handler.params.clone();
        params.sort_by_key(|param| param.index);
        let arg_count = params.last().map_or(0, |param| param.index + 1);
        ParamsMetadata { arg_count, params }
    }
}

/// Composes guards, pipes, interceptors, the handler and exception filters into one
/// callable
///
/// Stages run in a fixed order: guards, then the pipes of every parameter, then the
/// interceptor chain around the handler, then the result callback. Any failure goes
/// through the exception filters.
#[derive(Clone)]
pub struct VenokContextCreator {
    guards: GuardsContextCreator,
    interceptors: InterceptorsContextCreator,
    pipes: PipesContextCreator,
    filters: FiltersContextCreator,
    metadata_cache: Arc<Mutex<HashMap<HandlerRef, Arc<ParamsMetadata>>>>,
}

impl VenokContextCreator {
    pub fn new(container: Arc<Container>, config: Arc<ApplicationConfig>) -> Self {
        let resolver = EnhancerResolver::new(container, config);
        VenokContextCreator {
            guards: GuardsContextCreator::new(resolver.clone()),
            interceptors: InterceptorsContextCreator::new(resolver.clone()),
            pipes: PipesContextCreator::new(resolver.clone()),
            filters: FiltersContextCreator::new(resolver),
            metadata_cache: Arc::default(),
        }
    }

    /// Builds the callable of `target` for one context
    ///
    /// Enhancers are resolved against `context_id`, so request scoped ones need the
    /// context of the request the call belongs to.
    pub async fn create(
        &self,
        target: &HandlerTarget,
        params_factory: Arc<dyn ParamsFactory>,
        context_id: &ContextId,
        options: ContextOptions,
        context_type: ContextType,
    ) -> Result<HandlerCall, InjectError> {
        let handler_ref = target.handler_ref();
        let module = &target.module;
        let class = &target.class_enhancers;
        let handler = &target.handler.enhancers;
        let metadata = self.metadata(handler_ref, &target.handler);

        let guards = if options.guards {
            self.guards.create(class, handler, module, context_id).await?
        } else {
            Vec::new()
        };
        let params = self.prepare_params(&metadata, class, handler, module, context_id).await?;
        let interceptors = if options.interceptors {
            self.interceptors.create(class, handler, module, context_id).await?
        } else {
            Vec::new()
        };
        debug!(
            "Created context of {handler_ref}: {} guards, {} params, {} interceptors",
            guards.len(),
            params.len(),
            interceptors.len()
        );

        let pipeline = Arc::new(Pipeline {
            instance: target.instance.clone(),
            handler: target.handler.callback.clone(),
            guards,
            params,
            arg_count: metadata.arg_count,
            params_factory,
            interceptors: interceptors.into(),
            callback: options.callback,
        });
        let mut call: ContextCallback =
            Arc::new(move |context: ExecutionContext| pipeline.clone().run(context).boxed());
        if options.filters {
            let exceptions = self.filters.create(class, handler, module, context_id).await?;
            call = ExceptionsProxy.wrap(call, exceptions);
        }

        let context_id = context_id.clone();
        Ok(Arc::new(move |args: Vec<Instance>| {
            let context = ExecutionContext::new(args, handler_ref)
                .with_type(context_type)
                .with_context_id(context_id.clone());
            call(context)
        }))
    }

    fn metadata(&self, handler_ref: HandlerRef, handler: &HandlerMetadata) -> Arc<ParamsMetadata> {
        self.metadata_cache
            .lock()
            .entry(handler_ref)
            .or_insert_with(|| Arc::new(ParamsMetadata::extract(handler)))
            .clone()
    }

    async fn prepare_params(
        &self,
        metadata: &ParamsMetadata,
        class: &EnhancerMetadata,
        handler: &EnhancerMetadata,
        module: &ModuleToken,
        context_id: &ContextId,
    ) -> Result<Vec<PreparedParam>, InjectError> {
        if metadata.params.is_empty() {
            return Ok(Vec::new());
        }
        let shared = self.pipes.create(class, handler, module, context_id).await?;
        let mut params = Vec::with_capacity(metadata.params.len());
        for param in &metadata.params {
            let mut pipes = self
                .pipes
                .create_for_param(&param.pipes, module, context_id)
                .await?;
            pipes.extend(shared.iter().cloned());
            params.push(PreparedParam {
                argument: ArgumentMetadata {
                    index: param.index,
                    kind: param.param_type.kind(),
                    data: param.data.clone(),
                    metatype: param.metatype,
                },
                param: param.clone(),
                pipes,
            });
        }
        Ok(params)
    }
}

impl fmt::Debug for VenokContextCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VenokContextCreator")
            .field("cached_handlers", &self.metadata_cache.lock().len())
            .finish()
    }
}

struct PreparedParam {
    param: ParamMetadata,
    argument: ArgumentMetadata,
    pipes: Vec<Arc<dyn PipeTransform>>,
}

impl PreparedParam {
    async fn resolve(
        &self,
        factory: &dyn ParamsFactory,
        context: &ExecutionContext,
    ) -> Result<Option<Instance>, Exception> {
        let data = self.param.data.as_deref();
        let value = match &self.param.param_type {
            ParamType::Custom(extract) => extract(data, context),
            param_type => factory.exchange_key_for_value(param_type, data, context.args()),
        };
        PipesConsumer.apply(value, &self.argument, &self.pipes).await
    }
}

/// Everything one composed call runs
struct Pipeline {
    instance: Instance,
    handler: HandlerCallback,
    guards: Vec<Arc<dyn Guard>>,
    params: Vec<PreparedParam>,
    arg_count: usize,
    params_factory: Arc<dyn ParamsFactory>,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    callback: Option<ResultCallback>,
}

impl Pipeline {
    async fn run(self: Arc<Self>, context: ExecutionContext) -> Result<Instance, Exception> {
        if !self.guards.is_empty() && !GuardsConsumer.try_activate(&self.guards, &context).await? {
            return Err(ForbiddenException::new().into());
        }

        let args = self.arguments(&context).await?;
        let pipeline = self.clone();
        let next = CallHandler::new(move || {
            (pipeline.handler)(pipeline.instance.clone(), args.clone()).boxed()
        });
        let result = InterceptorsConsumer
            .intercept(self.interceptors.clone(), context.clone(), next)
            .await?;

        if let Some(callback) = &self.callback {
            callback(&result, context.args());
        }
        Ok(result)
    }

    /// Arguments handed to the handler
    ///
    /// Without declared parameters the raw arguments pass through untouched.
    /// Parameters are independent, so their pipes run concurrently.
    async fn arguments(&self, context: &ExecutionContext) -> Result<Vec<Option<Instance>>, Exception> {
        if self.params.is_empty() {
            return Ok(context.args().iter().cloned().map(Some).collect());
        }
        let values = try_join_all(
            self.params
                .iter()
                .map(|param| param.resolve(self.params_factory.as_ref(), context)),
        )
        .await?;

        let mut args = vec![None; self.arg_count];
        for (param, value) in self.params.iter().zip(values) {
            args[param.argument.index] = value;
        }
        Ok(args)
    }
}
