//! Venok bootstraps modular applications
//!
//! A root module and everything it imports is scanned into a container, every
//! statically scoped provider is instantiated, and controller handlers become
//! composed calls running guards, pipes, interceptors and exception filters.
//!
//! The building blocks live in their own crates and are re-exported here:
//! * [di]: modules, providers, scopes and the injector
//! * [context]: enhancers and the call pipeline
//! * [config]: the typed config registry

pub mod application;
pub mod errors;
pub mod factory;

pub use venok_config as config;
pub use venok_context as context;
pub use venok_di as di;

pub use application::VenokApplication;
pub use errors::VenokError;
pub use factory::{VenokApplicationBuilder, VenokFactory};
