mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use thiserror::Error;
use venok::{
    context::{
        app_enhancer, controller_provider, handler, ArgumentMetadata, ArgumentsHost, CallHandler,
        ContextOptions, Controller, Deferred, EnhancerMetadata, EnhancerRef, Exception,
        ExceptionFilter, ExceptionType, ExecutionContext, ForbiddenException, Guard,
        HandlerMetadata, Interceptor, ParamMetadata, PipeTransform,
    },
    di::{
        Class, DynError, InboundRequest, Instance, ModuleDefinition, ModuleMetadata, Provider,
        Request, ScopeOptions,
    },
    VenokFactory,
};

#[derive(Error, Debug)]
#[error("cat {0} not found")]
struct CatNotFound(i64);

struct ParseIntPipe;

impl PipeTransform for ParseIntPipe {
    fn transform(&self, value: Option<Instance>, metadata: &ArgumentMetadata) -> Deferred<Option<Instance>> {
        let raw = value
            .as_ref()
            .and_then(|value| value.downcast_ref::<String>())
            .cloned();
        let index = metadata.index;
        Deferred::future(async move {
            match raw {
                Some(raw) => raw
                    .parse::<i64>()
                    .map(|number| Some(Instance::new(number)))
                    .map_err(|_| Exception::msg(format!("argument {index} is not a number"))),
                None => Ok(value),
            }
        })
    }
}

struct DenyGuard;

impl Guard for DenyGuard {
    fn can_activate(&self, _: &ExecutionContext) -> Deferred<bool> {
        Deferred::value(false)
    }
}

impl Class for DenyGuard {
    type Dependencies = ();

    async fn construct(_: ()) -> Result<Self, DynError> {
        Ok(DenyGuard)
    }
}

struct AllowGuard;

impl Guard for AllowGuard {
    fn can_activate(&self, _: &ExecutionContext) -> Deferred<bool> {
        Deferred::future(async { Ok(true) })
    }
}

impl Class for AllowGuard {
    type Dependencies = ();

    async fn construct(_: ()) -> Result<Self, DynError> {
        Ok(AllowGuard)
    }
}

#[derive(Default)]
struct CountingInterceptor {
    seen: AtomicUsize,
}

impl Interceptor for CountingInterceptor {
    fn intercept(&self, _: &ExecutionContext, next: CallHandler) -> Deferred<Instance> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        next.handle()
    }
}

struct NotFoundFilter;

impl ExceptionFilter for NotFoundFilter {
    fn catches(&self) -> Vec<ExceptionType> {
        vec![ExceptionType::of::<CatNotFound>()]
    }

    fn catch(&self, exception: Exception, host: &dyn ArgumentsHost) -> Deferred<Instance> {
        Deferred::value(Instance::new(format!(
            "{exception} ({} args)",
            host.args().len()
        )))
    }
}

struct CatsService;

impl Class for CatsService {
    type Dependencies = ();

    async fn construct(_: ()) -> Result<Self, DynError> {
        Ok(CatsService)
    }
}

struct CatsController {
    service: Arc<CatsService>,
    calls: AtomicUsize,
}

impl CatsController {
    fn find_one(self: Arc<Self>, args: Vec<Option<Instance>>) -> Deferred<Instance> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = args
            .into_iter()
            .next()
            .flatten()
            .and_then(|id| id.downcast_ref::<i64>().copied());
        match id {
            Some(id) if id > 0 => Deferred::value(Instance::new(id)),
            Some(id) => Deferred::error(CatNotFound(id)),
            None => Deferred::error(Exception::msg("missing id")),
        }
    }

    fn service(self: Arc<Self>, _: Vec<Option<Instance>>) -> Deferred<Instance> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Deferred::value(Instance::from_arc(self.service.clone()))
    }
}

impl Class for CatsController {
    type Dependencies = (Arc<CatsService>,);

    async fn construct((service,): Self::Dependencies) -> Result<Self, DynError> {
        Ok(CatsController {
            service,
            calls: AtomicUsize::new(0),
        })
    }
}

impl Controller for CatsController {
    fn enhancers() -> EnhancerMetadata {
        EnhancerMetadata::new().filter(EnhancerRef::instance(NotFoundFilter))
    }

    fn handlers() -> Vec<HandlerMetadata> {
        vec![
            HandlerMetadata::new("find_one", handler(CatsController::find_one))
                .param(ParamMetadata::arg(0, 0).pipe(EnhancerRef::instance(ParseIntPipe))),
            HandlerMetadata::new("service", handler(CatsController::service)),
            HandlerMetadata::new("admin", handler(CatsController::service)).enhancers(
                EnhancerMetadata::new()
                    .guard(EnhancerRef::class::<AllowGuard>())
                    .guard(EnhancerRef::class::<DenyGuard>()),
            ),
            HandlerMetadata::new("open", handler(CatsController::service))
                .enhancers(EnhancerMetadata::new().guard(EnhancerRef::class::<AllowGuard>())),
        ]
    }
}

struct CatsModule;

impl ModuleDefinition for CatsModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .provider(Provider::class::<CatsService>())
            .controller(controller_provider::<CatsController>())
    }
}

fn text(value: &str) -> Instance {
    Instance::new(value.to_string())
}

#[tokio::test]
async fn pipes_parse_arguments_before_the_handler() {
    common::init_tracing();
    let app = VenokFactory::create::<CatsModule>().build().await.unwrap();
    let find_one = app
        .handler::<CatsController>("find_one", ContextOptions::default())
        .await
        .unwrap();

    let result = find_one(vec![text("5")]).await.unwrap();
    assert_eq!(result.downcast_ref::<i64>(), Some(&5));

    let error = find_one(vec![text("five")]).await.unwrap_err();
    assert_eq!(error.to_string(), "argument 0 is not a number");
}

#[tokio::test]
async fn refusing_guards_stop_the_call() {
    common::init_tracing();
    let app = VenokFactory::create::<CatsModule>().build().await.unwrap();
    let controller = app.get::<CatsController>().unwrap();

    let admin = app
        .handler::<CatsController>("admin", ContextOptions::default())
        .await
        .unwrap();
    let error = admin(Vec::new()).await.unwrap_err();
    assert!(error.is::<ForbiddenException>());
    assert_eq!(controller.calls.load(Ordering::SeqCst), 0);

    let open = app
        .handler::<CatsController>("open", ContextOptions::default())
        .await
        .unwrap();
    assert!(open(Vec::new()).await.is_ok());
    assert_eq!(controller.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn static_handlers_share_their_dependencies() {
    common::init_tracing();
    let app = VenokFactory::create::<CatsModule>().build().await.unwrap();
    let service = app
        .handler::<CatsController>("service", ContextOptions::default())
        .await
        .unwrap();

    let first = service(Vec::new()).await.unwrap();
    let second = service(Vec::new()).await.unwrap();
    assert!(first.ptr_eq(&second));
    assert!(Arc::ptr_eq(
        &first.downcast::<CatsService>().unwrap(),
        &app.get::<CatsService>().unwrap()
    ));
}

#[tokio::test]
async fn interceptors_observe_one_handler_call() {
    common::init_tracing();
    let counting = Arc::new(CountingInterceptor::default());
    let app = VenokFactory::create::<CatsModule>()
        .use_global_interceptors([
            counting.clone() as Arc<dyn Interceptor>,
            counting.clone() as Arc<dyn Interceptor>,
            counting.clone() as Arc<dyn Interceptor>,
        ])
        .build()
        .await
        .unwrap();
    let controller = app.get::<CatsController>().unwrap();

    let find_one = app
        .handler::<CatsController>("find_one", ContextOptions::default())
        .await
        .unwrap();
    find_one(vec![text("2")]).await.unwrap();

    assert_eq!(counting.seen.load(Ordering::SeqCst), 3);
    assert_eq!(controller.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn filters_recover_handler_errors() {
    common::init_tracing();
    let app = VenokFactory::create::<CatsModule>().build().await.unwrap();
    let find_one = app
        .handler::<CatsController>("find_one", ContextOptions::default())
        .await
        .unwrap();

    let result = find_one(vec![text("-3")]).await.unwrap();
    assert_eq!(
        result.downcast_ref::<String>().map(String::as_str),
        Some("cat -3 not found (1 args)")
    );

    let error = find_one(Vec::new()).await.unwrap_err();
    assert_eq!(error.to_string(), "missing id");
}

#[tokio::test]
async fn unknown_handlers_are_reported() {
    common::init_tracing();
    let app = VenokFactory::create::<CatsModule>().build().await.unwrap();
    let error = app
        .handler::<CatsController>("delete", ContextOptions::default())
        .await
        .err()
        .unwrap();
    assert!(error.to_string().contains("\"delete\""), "{error}");
}

struct Tenant(&'static str);

/// Lets only the `acme` tenant through, created for every request
struct TenantGuard {
    tenant: Request<Tenant>,
}

static TENANT_GUARDS: AtomicUsize = AtomicUsize::new(0);

impl Guard for TenantGuard {
    fn can_activate(&self, _: &ExecutionContext) -> Deferred<bool> {
        let Tenant(name) = &*self.tenant;
        Deferred::value(*name == "acme")
    }
}

impl Class for TenantGuard {
    type Dependencies = (Request<Tenant>,);

    fn scope() -> ScopeOptions {
        ScopeOptions::request()
    }

    async fn construct((tenant,): Self::Dependencies) -> Result<Self, DynError> {
        TENANT_GUARDS.fetch_add(1, Ordering::SeqCst);
        Ok(TenantGuard { tenant })
    }
}

struct TenantController;

impl TenantController {
    fn hello(self: Arc<Self>, _: Vec<Option<Instance>>) -> Deferred<Instance> {
        Deferred::value(Instance::new("hello"))
    }
}

impl Class for TenantController {
    type Dependencies = ();

    async fn construct(_: ()) -> Result<Self, DynError> {
        Ok(TenantController)
    }
}

impl Controller for TenantController {
    fn handlers() -> Vec<HandlerMetadata> {
        vec![HandlerMetadata::new("hello", handler(TenantController::hello))]
    }
}

struct TenantModule;

impl ModuleDefinition for TenantModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .provider(app_enhancer::<dyn Guard, TenantGuard>())
            .controller(controller_provider::<TenantController>())
    }
}

#[tokio::test]
async fn request_scoped_global_guards_run_per_request() {
    common::init_tracing();
    let app = VenokFactory::create::<TenantModule>().build().await.unwrap();
    assert_eq!(app.config().scoped_count::<dyn Guard>(), 1);

    let acme = InboundRequest::new(Tenant("acme"));
    let result = app
        .handle_request::<TenantController>("hello", &acme, ContextOptions::default(), Vec::new())
        .await
        .unwrap();
    assert_eq!(result.downcast_ref::<&str>(), Some(&"hello"));

    let intruder = InboundRequest::new(Tenant("intruder"));
    let error = app
        .handle_request::<TenantController>("hello", &intruder, ContextOptions::default(), Vec::new())
        .await
        .unwrap_err();
    assert!(error.is::<ForbiddenException>());
    assert_eq!(TENANT_GUARDS.load(Ordering::SeqCst), 2);
}
