mod common;

use std::sync::Arc;

use venok::{
    config::{Config, ConfigModule, ConfigProvider},
    di::{
        Class, Container, DiBuilder, DynError, DynamicModule, IdMode, InitError, ModuleDefinition,
        ModuleImport, ModuleMetadata, Named, Provider, TokenName,
    },
    VenokFactory,
};

struct CatsModule;

impl ModuleDefinition for CatsModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
    }
}

fn lives(count: u8) -> ModuleImport {
    ModuleImport::Dynamic(DynamicModule::new::<CatsModule>(
        ModuleMetadata::new().provider(Provider::use_value("LIVES", count).fingerprint(&count)),
    ))
}

#[test]
fn static_modules_register_once() {
    let mut container = Container::new(IdMode::Deterministic);
    let first = container.add_module(ModuleImport::of::<CatsModule>()).unwrap();
    let second = container.add_module(ModuleImport::of::<CatsModule>()).unwrap();

    assert_eq!(first, second);
    assert_eq!(container.modules_of::<CatsModule>().len(), 1);
}

#[test]
fn dynamic_metadata_yields_distinct_modules() {
    let mut container = Container::new(IdMode::Deterministic);
    let nine = container.add_module(lives(9)).unwrap();
    let seven = container.add_module(lives(7)).unwrap();
    let nine_again = container.add_module(lives(9)).unwrap();

    assert_ne!(nine, seven);
    assert_eq!(nine, nine_again);
    assert_eq!(container.modules_of::<CatsModule>().len(), 2);
}

struct SharedService;

impl Class for SharedService {
    type Dependencies = ();

    async fn construct(_: ()) -> Result<Self, DynError> {
        Ok(SharedService)
    }
}

struct SharedModule;

impl ModuleDefinition for SharedModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .provider(Provider::class::<SharedService>())
            .export::<SharedService>()
            .global()
    }
}

struct OtherService {
    shared: Arc<SharedService>,
}

impl Class for OtherService {
    type Dependencies = (Arc<SharedService>,);

    async fn construct((shared,): Self::Dependencies) -> Result<Self, DynError> {
        Ok(OtherService { shared })
    }
}

/// Does not import [SharedModule]
struct OtherModule;

impl ModuleDefinition for OtherModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new().provider(Provider::class::<OtherService>())
    }
}

struct RootModule;

impl ModuleDefinition for RootModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .import::<SharedModule>()
            .import::<OtherModule>()
    }
}

#[test]
fn global_modules_are_imported_everywhere() {
    let (container, _) = DiBuilder::new::<RootModule>().scan().unwrap();
    let shared = &container.modules_of::<SharedModule>()[0];
    let other = &container.modules_of::<OtherModule>()[0];

    assert!(container
        .module(other)
        .unwrap()
        .imports()
        .any(|import| import == shared));
}

#[tokio::test]
async fn global_providers_resolve_in_modules_not_importing_them() {
    common::init_tracing();
    let app = VenokFactory::create::<RootModule>().build().await.unwrap();

    let other = app.get::<OtherService>().unwrap();
    let shared = app.get::<SharedService>().unwrap();
    assert!(Arc::ptr_eq(&other.shared, &shared));
}

struct ServiceA {
    _b: Arc<ServiceB>,
}

impl Class for ServiceA {
    type Dependencies = (Arc<ServiceB>,);

    async fn construct((b,): Self::Dependencies) -> Result<Self, DynError> {
        Ok(ServiceA { _b: b })
    }
}

struct ServiceB {
    _a: Option<Arc<ServiceA>>,
}

impl Class for ServiceB {
    type Dependencies = (Arc<ServiceA>,);

    async fn construct((a,): Self::Dependencies) -> Result<Self, DynError> {
        Ok(ServiceB { _a: Some(a) })
    }
}

struct CycleModule;

impl ModuleDefinition for CycleModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .provider(Provider::class::<ServiceA>())
            .provider(Provider::class::<ServiceB>())
    }
}

#[tokio::test]
async fn dependency_cycles_are_rejected() {
    common::init_tracing();
    let error = DiBuilder::new::<CycleModule>().build().await.unwrap_err();

    let InitError::DependencyGraphError(errors) = &error else {
        panic!("unexpected error {error}");
    };
    let cycle = errors.circular_dependencies().next().unwrap().to_string();
    assert!(
        cycle.contains("ServiceA -> ServiceB -> ServiceA"),
        "{cycle}"
    );
}

#[tokio::test]
async fn removing_an_edge_breaks_the_cycle() {
    common::init_tracing();
    let app = DiBuilder::new::<CycleModule>()
        .override_provider(Provider::value(ServiceB { _a: None }))
        .build()
        .await
        .unwrap();

    assert!(app.get::<ServiceA>().is_ok());
}

struct MissingToken;

impl TokenName for MissingToken {
    const NAME: &'static str = "X";
}

struct NeedsX;

impl Class for NeedsX {
    type Dependencies = (Named<MissingToken, u8>,);

    async fn construct(_: Self::Dependencies) -> Result<Self, DynError> {
        Ok(NeedsX)
    }
}

struct NeedyModule;

impl ModuleDefinition for NeedyModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new().provider(Provider::class::<NeedsX>())
    }
}

#[tokio::test]
async fn unknown_dependencies_name_the_token_and_the_requester() {
    common::init_tracing();
    let error = DiBuilder::new::<NeedyModule>().build().await.unwrap_err();

    let InitError::DependencyGraphError(errors) = &error else {
        panic!("unexpected error {error}");
    };
    let message = errors.unknown_dependencies().next().unwrap().to_string();
    assert!(message.contains("NeedsX"), "{message}");
    assert!(message.contains("X"), "{message}");
}

struct Greeting(&'static str);

struct Greeter {
    greeting: Arc<Greeting>,
}

impl Class for Greeter {
    type Dependencies = (Config<Greeting>,);

    async fn construct((greeting,): Self::Dependencies) -> Result<Self, DynError> {
        Ok(Greeter {
            greeting: greeting.into_inner(),
        })
    }
}

struct GreeterModule;

impl ModuleDefinition for GreeterModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new().provider(Provider::class::<Greeter>())
    }
}

struct ConfiguredModule;

impl ModuleDefinition for ConfiguredModule {
    fn metadata() -> ModuleMetadata {
        let mut configs = ConfigProvider::new();
        configs.add_config(Greeting("hello")).unwrap();
        ModuleMetadata::new()
            .import_dynamic(ConfigModule::for_root(configs))
            .import::<GreeterModule>()
    }
}

#[tokio::test]
async fn configs_reach_providers_through_the_global_config_module() {
    common::init_tracing();
    let app = VenokFactory::create::<ConfiguredModule>().build().await.unwrap();
    assert_eq!(app.get::<Greeter>().unwrap().greeting.0, "hello");
}
