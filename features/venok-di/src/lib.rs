//! Venok DI is a module based dependency injection runtime for async Rust.
//!
//! An application is declared as a tree of modules. Every module lists its imports,
//! providers, controllers and exports. Building the application happens in three steps:
//! 1. DependenciesScanner: registers every module and provider in the [Container]
//! 2. DependencyGraph: verifies that every dependency is known and no cycle exists
//! 3. InstanceLoader: instantiates every provider whose dependency tree is static
//!
//! Request scoped and transient providers are resolved later, per [ContextId].
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use venok_di::{Class, DiBuilder, DynError, ModuleDefinition, ModuleMetadata, Provider};
//!
//! struct Database {
//!     url: String,
//! }
//!
//! impl Class for Database {
//!     type Dependencies = ();
//!
//!     async fn construct(_: ()) -> Result<Self, DynError> {
//!         Ok(Database { url: "postgres://localhost".into() })
//!     }
//! }
//!
//! struct UsersService {
//!     database: Arc<Database>,
//! }
//!
//! impl Class for UsersService {
//!     type Dependencies = (Arc<Database>,);
//!
//!     async fn construct((database,): Self::Dependencies) -> Result<Self, DynError> {
//!         Ok(UsersService { database })
//!     }
//! }
//!
//! struct AppModule;
//!
//! impl ModuleDefinition for AppModule {
//!     fn metadata() -> ModuleMetadata {
//!         ModuleMetadata::new()
//!             .provider(Provider::class::<Database>())
//!             .provider(Provider::class::<UsersService>())
//!     }
//! }
//!
//! async fn bootstrap() -> Result<(), Box<dyn std::error::Error>> {
//!     let app = DiBuilder::new::<AppModule>().build().await?;
//!     let users = app.get::<UsersService>()?;
//!     assert_eq!(users.database.url, "postgres://localhost");
//!     Ok(())
//! }
//! ```

pub mod application_context;
pub mod builder;
pub mod container;
pub mod context_id;
pub mod dependency_graph;
pub mod errors;
pub mod factories;
pub mod injector;
pub mod instance_loader;
pub mod instance_resolver;
pub mod instance_wrapper;
pub mod module;
pub mod module_ref;
pub mod provider;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod topology;
pub mod types;

pub use application_context::ApplicationContext;
pub use builder::{ApplicationOptions, DiBuilder};
pub use container::{ApplicationProvider, Container, InternalCoreModule};
pub use context_id::{
    ContextId, ContextIdFactory, ContextIdStrategy, DurablePartitions, HostComponentInfo,
    InboundRequest, DURABLE_CONTEXT_BIT, STATIC_CONTEXT_ID,
};
pub use errors::{ContainerError, DependencyPosition, InitError, InjectError};
pub use factories::{Args, Class};
pub use injector::Injector;
pub use instance_resolver::IntrospectionResult;
pub use instance_wrapper::InstanceWrapper;
pub use module::{DynamicModule, Module, ModuleDefinition, ModuleImport, ModuleMetadata};
pub use module_ref::ModuleRef;
pub use provider::{
    Dependency, EnhancerSubtype, PropertyDependency, Provider, APP_FILTER, APP_GUARD,
    APP_INTERCEPTOR, APP_PIPE, REQUEST,
};
pub use resolver::{
    token::{Named, Request, TokenName},
    ResolveAll, Resolver,
};
pub use token::{IdMode, ModuleToken, Token, TokenFactory};
pub use types::{DynError, Injectable, Instance, Scope, ScopeOptions, TypeInfo};
