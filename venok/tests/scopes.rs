mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use venok::{
    di::{
        Class, DurablePartitions, DynError, IdMode, InboundRequest, InjectError, Instance,
        ModuleDefinition, ModuleMetadata, Provider, Scope, ScopeOptions,
    },
    VenokFactory,
};

struct Singleton;

impl Class for Singleton {
    type Dependencies = ();

    async fn construct(_: ()) -> Result<Self, DynError> {
        Ok(Singleton)
    }
}

struct PerRequest {
    singleton: Arc<Singleton>,
}

impl Class for PerRequest {
    type Dependencies = (Arc<Singleton>,);

    fn scope() -> ScopeOptions {
        ScopeOptions::request()
    }

    async fn construct((singleton,): Self::Dependencies) -> Result<Self, DynError> {
        Ok(PerRequest { singleton })
    }
}

struct PerResolution;

impl Class for PerResolution {
    type Dependencies = ();

    fn scope() -> ScopeOptions {
        ScopeOptions::transient()
    }

    async fn construct(_: ()) -> Result<Self, DynError> {
        Ok(PerResolution)
    }
}

struct ScopesModule;

impl ModuleDefinition for ScopesModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .provider(Provider::class::<Singleton>())
            .provider(Provider::class::<PerRequest>())
            .provider(Provider::class::<PerResolution>())
    }
}

#[tokio::test]
async fn default_providers_are_shared() {
    common::init_tracing();
    let app = VenokFactory::create::<ScopesModule>().build().await.unwrap();

    let first = app.get::<Singleton>().unwrap();
    let second = app.get::<Singleton>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn transient_providers_are_never_reused() {
    common::init_tracing();
    let app = VenokFactory::create::<ScopesModule>().build().await.unwrap();
    let context_id = app.create_context_id();

    let first = app.resolve::<PerResolution>(Some(&context_id)).await.unwrap();
    let second = app.resolve::<PerResolution>(Some(&context_id)).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    assert!(matches!(
        app.get::<PerResolution>(),
        Err(InjectError::InvalidClassScope { .. })
    ));
}

#[tokio::test]
async fn request_providers_live_per_context() {
    common::init_tracing();
    let app = VenokFactory::create::<ScopesModule>().build().await.unwrap();
    let first_context = app.create_context_id();
    let second_context = app.create_context_id();

    let first = app.resolve::<PerRequest>(Some(&first_context)).await.unwrap();
    let again = app.resolve::<PerRequest>(Some(&first_context)).await.unwrap();
    let other = app.resolve::<PerRequest>(Some(&second_context)).await.unwrap();

    assert!(Arc::ptr_eq(&first, &again));
    assert!(!Arc::ptr_eq(&first, &other));
    assert!(Arc::ptr_eq(&first.singleton, &other.singleton));
    assert!(matches!(
        app.get::<PerRequest>(),
        Err(InjectError::InvalidClassScope { .. })
    ));
}

#[tokio::test]
async fn ended_requests_release_their_instances() {
    common::init_tracing();
    let app = VenokFactory::create::<ScopesModule>().build().await.unwrap();
    let context_id = app.create_context_id();

    let first = app.resolve::<PerRequest>(Some(&context_id)).await.unwrap();
    assert!(app.end_request(&context_id) >= 1);
    let second = app.resolve::<PerRequest>(Some(&context_id)).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

static SESSIONS_BUILT: AtomicUsize = AtomicUsize::new(0);

struct SlowSessionModule;

impl ModuleDefinition for SlowSessionModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new().provider(
            Provider::use_factory("SESSION", vec![], |_| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(SESSIONS_BUILT.fetch_add(1, Ordering::SeqCst))
            })
            .scope(Scope::Request),
        )
    }
}

#[tokio::test]
async fn concurrent_resolutions_share_one_construction() {
    common::init_tracing();
    let app = VenokFactory::create::<SlowSessionModule>().build().await.unwrap();
    let context_id = app.create_context_id();

    let (first, second) = tokio::join!(
        app.resolve_token("SESSION", Some(&context_id)),
        app.resolve_token("SESSION", Some(&context_id)),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(SESSIONS_BUILT.load(Ordering::SeqCst), 1);
    assert!(first.ptr_eq(&second));
}

static TENANT_DBS_BUILT: AtomicUsize = AtomicUsize::new(0);

struct TenantDb {
    serial: usize,
}

impl Class for TenantDb {
    type Dependencies = ();

    fn scope() -> ScopeOptions {
        ScopeOptions::request().durable(true)
    }

    async fn construct(_: ()) -> Result<Self, DynError> {
        Ok(TenantDb {
            serial: TENANT_DBS_BUILT.fetch_add(1, Ordering::SeqCst),
        })
    }
}

struct TenantModule;

impl ModuleDefinition for TenantModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new().provider(Provider::class::<TenantDb>())
    }
}

async fn tenant_app() -> venok::VenokApplication {
    let partitions = DurablePartitions::new(IdMode::Deterministic, |request: &Instance| {
        request.downcast_ref::<&'static str>().copied()
    });
    VenokFactory::create::<TenantModule>()
        .id_mode(IdMode::Deterministic)
        .context_id_strategy(Arc::new(partitions))
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn requests_without_a_partition_get_their_own_durable_instance() {
    common::init_tracing();
    let app = tenant_app().await;

    let keyless = app.register_request(&InboundRequest::new(7_u32));
    let tenant = app.register_request(&InboundRequest::new("tenant-a"));

    let keyless_db = app.resolve::<TenantDb>(Some(&keyless)).await.unwrap();
    let tenant_db = app.resolve::<TenantDb>(Some(&tenant)).await.unwrap();
    assert!(!Arc::ptr_eq(&keyless_db, &tenant_db));
    assert_ne!(keyless_db.serial, tenant_db.serial);
}

#[tokio::test]
async fn durable_instances_outlive_ended_requests() {
    common::init_tracing();
    let app = tenant_app().await;

    let first = app.register_request(&InboundRequest::new("tenant-a"));
    let first_db = app.resolve::<TenantDb>(Some(&first)).await.unwrap();
    app.end_request(&first);

    let second = app.register_request(&InboundRequest::new("tenant-a"));
    let second_db = app.resolve::<TenantDb>(Some(&second)).await.unwrap();
    assert!(Arc::ptr_eq(&first_db, &second_db));

    let other = app.register_request(&InboundRequest::new("tenant-b"));
    let other_db = app.resolve::<TenantDb>(Some(&other)).await.unwrap();
    assert!(!Arc::ptr_eq(&first_db, &other_db));
}

#[tokio::test]
async fn resolving_without_a_context_uses_a_fresh_one() {
    common::init_tracing();
    let app = VenokFactory::create::<ScopesModule>().build().await.unwrap();

    let first = app.resolve::<PerRequest>(None).await.unwrap();
    let second = app.resolve::<PerRequest>(None).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(app.resolve_all::<PerRequest>(None).await.unwrap().len(), 1);
}
