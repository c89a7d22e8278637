use std::{fmt, sync::Arc};

use venok_di::{Instance, Provider, TypeInfo};

use crate::{
    deferred::Deferred,
    enhancer::EnhancerRef,
    execution_context::ExecutionContext,
    filters::ExceptionFilter,
    guards::Guard,
    interceptors::Interceptor,
    pipes::PipeTransform,
};

/// Guards, interceptors, pipes and filters declared on a class or a handler
#[derive(Clone, Default)]
pub struct EnhancerMetadata {
    pub guards: Vec<EnhancerRef<dyn Guard>>,
    pub interceptors: Vec<EnhancerRef<dyn Interceptor>>,
    pub pipes: Vec<EnhancerRef<dyn PipeTransform>>,
    pub filters: Vec<EnhancerRef<dyn ExceptionFilter>>,
}

impl EnhancerMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(mut self, guard: EnhancerRef<dyn Guard>) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn interceptor(mut self, interceptor: EnhancerRef<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn pipe(mut self, pipe: EnhancerRef<dyn PipeTransform>) -> Self {
        self.pipes.push(pipe);
        self
    }

    pub fn filter(mut self, filter: EnhancerRef<dyn ExceptionFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Injectables to register for every class reference
    pub fn providers(&self) -> Vec<Provider> {
        self.guards
            .iter()
            .filter_map(EnhancerRef::provider)
            .chain(self.interceptors.iter().filter_map(EnhancerRef::provider))
            .chain(self.pipes.iter().filter_map(EnhancerRef::provider))
            .chain(self.filters.iter().filter_map(EnhancerRef::provider))
            .collect()
    }
}

/// Extracts a parameter value from the call
pub type CustomParamFactory =
    Arc<dyn Fn(Option<&str>, &ExecutionContext) -> Option<Instance> + Send + Sync>;

/// Where a handler parameter comes from
#[derive(Clone)]
pub enum ParamType {
    /// Raw call argument at a position
    Arg(usize),
    /// A transport specific kind (`"body"`, `"query"`, ...) the params factory understands
    Key(&'static str),
    /// A custom extractor
    Custom(CustomParamFactory),
}

impl ParamType {
    /// Name pipes see in their [ArgumentMetadata](crate::pipes::ArgumentMetadata)
    pub fn kind(&self) -> &'static str {
        match self {
            ParamType::Arg(_) => "arg",
            ParamType::Key(key) => *key,
            ParamType::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Arg(index) => write!(f, "Arg({index})"),
            ParamType::Key(key) => write!(f, "Key({key})"),
            ParamType::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// One declared handler parameter
#[derive(Clone, Debug)]
pub struct ParamMetadata {
    /// Position in the handler's argument list
    pub index: usize,
    pub param_type: ParamType,
    pub data: Option<String>,
    pub metatype: Option<TypeInfo>,
    pub pipes: Vec<EnhancerRef<dyn PipeTransform>>,
}

impl ParamMetadata {
    pub fn new(index: usize, param_type: ParamType) -> Self {
        ParamMetadata {
            index,
            param_type,
            data: None,
            metatype: None,
            pipes: Vec::new(),
        }
    }

    /// Raw call argument `arg` handed to position `index`
    pub fn arg(index: usize, arg: usize) -> Self {
        Self::new(index, ParamType::Arg(arg))
    }

    pub fn key(index: usize, key: &'static str) -> Self {
        Self::new(index, ParamType::Key(key))
    }

    pub fn custom(
        index: usize,
        factory: impl Fn(Option<&str>, &ExecutionContext) -> Option<Instance> + Send + Sync + 'static,
    ) -> Self {
        Self::new(index, ParamType::Custom(Arc::new(factory)))
    }

    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn metatype<T: 'static>(mut self) -> Self {
        self.metatype = Some(TypeInfo::of::<T>());
        self
    }

    pub fn pipe(mut self, pipe: EnhancerRef<dyn PipeTransform>) -> Self {
        self.pipes.push(pipe);
        self
    }
}

/// Calls the handler on its owning instance with the prepared arguments
pub type HandlerCallback =
    Arc<dyn Fn(Instance, Vec<Option<Instance>>) -> Deferred<Instance> + Send + Sync>;

/// A handler method together with everything declared on it
#[derive(Clone)]
pub struct HandlerMetadata {
    pub method: &'static str,
    pub enhancers: EnhancerMetadata,
    pub params: Vec<ParamMetadata>,
    pub callback: HandlerCallback,
}

impl HandlerMetadata {
    pub fn new(
        method: &'static str,
        callback: impl Fn(Instance, Vec<Option<Instance>>) -> Deferred<Instance> + Send + Sync + 'static,
    ) -> Self {
        HandlerMetadata {
            method,
            enhancers: EnhancerMetadata::default(),
            params: Vec::new(),
            callback: Arc::new(callback),
        }
    }

    pub fn enhancers(mut self, enhancers: EnhancerMetadata) -> Self {
        self.enhancers = enhancers;
        self
    }

    pub fn param(mut self, param: ParamMetadata) -> Self {
        self.params.push(param);
        self
    }

    /// Injectables of the handler, parameter pipes included
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers = self.enhancers.providers();
        providers.extend(
            self.params
                .iter()
                .flat_map(|param| param.pipes.iter().filter_map(EnhancerRef::provider)),
        );
        providers
    }
}

impl fmt::Debug for HandlerMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMetadata")
            .field("method", &self.method)
            .field("params", &self.params)
            .finish()
    }
}

/// A class exposing handlers to the pipeline
///
/// ```ignore
/// impl Controller for CatsController {
///     fn enhancers() -> EnhancerMetadata {
///         EnhancerMetadata::new().guard(EnhancerRef::class::<AuthGuard>())
///     }
///
///     fn handlers() -> Vec<HandlerMetadata> {
///         vec![HandlerMetadata::new("find_one", handler(CatsController::find_one))
///             .param(ParamMetadata::arg(0, 0).pipe(EnhancerRef::instance(ParseIntPipe)))]
///     }
/// }
/// ```
pub trait Controller: venok_di::Class {
    fn enhancers() -> EnhancerMetadata {
        EnhancerMetadata::default()
    }

    fn handlers() -> Vec<HandlerMetadata>;
}

/// Provider of a controller, its enhancer classes are registered as its injectables
pub fn controller_provider<C: Controller>() -> Provider {
    let mut injectables = C::enhancers().providers();
    for handler in C::handlers() {
        injectables.extend(handler.providers());
    }
    Provider::class::<C>().with_injectables(injectables)
}

/// Adapts a typed method into a [HandlerCallback]
///
/// Calls with an instance of another type fail with a runtime exception.
pub fn handler<C, F>(
    method: F,
) -> impl Fn(Instance, Vec<Option<Instance>>) -> Deferred<Instance> + Send + Sync + 'static
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Vec<Option<Instance>>) -> Deferred<Instance> + Send + Sync + 'static,
{
    move |instance, args| match instance.downcast::<C>() {
        Ok(instance) => method(instance, args),
        Err(actual) => Deferred::error(crate::exceptions::RuntimeException::new(format!(
            "handler of {} called on {actual}",
            std::any::type_name::<C>()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::{ArgumentMetadata, PipeTransform};

    struct Trim;

    impl PipeTransform for Trim {
        fn transform(
            &self,
            value: Option<Instance>,
            _: &ArgumentMetadata,
        ) -> Deferred<Option<Instance>> {
            Deferred::value(value)
        }
    }

    #[test]
    fn params_describe_their_kind() {
        let param = ParamMetadata::key(1, "body")
            .data("name")
            .metatype::<String>()
            .pipe(EnhancerRef::instance(Trim));
        assert_eq!(param.param_type.kind(), "body");
        assert_eq!(param.data.as_deref(), Some("name"));
        assert_eq!(param.pipes.len(), 1);
        assert_eq!(ParamMetadata::arg(0, 2).param_type.kind(), "arg");
    }

    #[test]
    fn instances_need_no_injectables() {
        let metadata = EnhancerMetadata::new().pipe(EnhancerRef::instance(Trim));
        assert!(metadata.providers().is_empty());
    }
}
