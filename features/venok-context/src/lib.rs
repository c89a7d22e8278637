//! Call pipeline of venok handlers
//!
//! A [VenokContextCreator] turns a controller method and the enhancers declared on it
//! into one callable a transport can invoke with raw arguments:
//!
//! ```text
//! guards -> pipes -> interceptors -> handler -> result callback
//!                 (exception filters around everything)
//! ```
//!
//! Enhancers are declared per class and per handler through [EnhancerMetadata], or
//! globally through [ApplicationConfig] and the `APP_*` provider tokens.

pub mod application_config;
pub mod context_creator;
pub mod deferred;
pub mod enhancer;
pub mod exceptions;
pub mod execution_context;
pub mod filters;
pub mod guards;
pub mod interceptors;
pub mod metadata;
pub mod params;
pub mod pipes;

pub use application_config::{ApplicationConfig, GlobalEnhancers};
pub use context_creator::{
    ContextOptions, HandlerCall, HandlerTarget, ResultCallback, VenokContextCreator,
};
pub use deferred::Deferred;
pub use enhancer::{
    app_enhancer, enhancer_provider, enhancer_token, EnhancerKind, EnhancerRef, IntoEnhancer,
};
pub use exceptions::{
    EmptySequenceException, Exception, ExceptionType, ForbiddenException, RuntimeException,
    FORBIDDEN_MESSAGE,
};
pub use execution_context::{ArgumentsHost, ContextType, ExecutionContext, HandlerRef};
pub use filters::{ExceptionFilter, ExceptionsHandler};
pub use guards::Guard;
pub use interceptors::{CallHandler, Interceptor};
pub use metadata::{
    controller_provider, handler, Controller, EnhancerMetadata, HandlerMetadata, ParamMetadata,
    ParamType,
};
pub use params::{NativeParamsFactory, ParamsFactory};
pub use pipes::{ArgumentMetadata, PipeTransform};
