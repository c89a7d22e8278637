//! Venok Config provides a global registry of configs that can be injected in the rest of
//! the modules.
//!
//! It is split into three parts:
//! 1. [ConfigProvider]: the registry of all configs, one per type
//! 2. [ConfigModule]: a global module exporting the registry
//! 3. [Config<T>](Config): a dependency resolving a single config
//!
//! # Example
//!
//! ```ignore
//! struct AppModule;
//!
//! impl ModuleDefinition for AppModule {
//!     fn metadata() -> ModuleMetadata {
//!         let mut configs = ConfigProvider::new();
//!         configs.add_config(ServerConfig { port: 8080 }).unwrap();
//!
//!         ModuleMetadata::new()
//!             .import_dynamic(ConfigModule::for_root(configs))
//!             .import::<ServerModule>()
//!     }
//! }
//! ```

pub mod config;
pub mod errors;
pub mod module;
pub mod provider;

pub use config::Config;
pub use errors::ConfigError;
pub use module::ConfigModule;
pub use provider::ConfigProvider;
