//! Bootstraps a small application and calls one of its handlers
//!
//! `RUST_LOG=debug cargo run -p venok --example cats`

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use venok::{
    context::{
        controller_provider, handler, ArgumentMetadata, ContextOptions, Controller, Deferred,
        Exception, HandlerMetadata, ParamMetadata, PipeTransform,
    },
    di::{Class, DynError, Instance, ModuleDefinition, ModuleMetadata, Provider},
    VenokFactory,
};

struct CatsService {
    names: Vec<&'static str>,
}

impl Class for CatsService {
    type Dependencies = ();

    async fn construct(_: ()) -> Result<Self, DynError> {
        Ok(CatsService {
            names: vec!["Tom", "Garfield", "Felix"],
        })
    }
}

struct CatsController {
    cats: Arc<CatsService>,
}

impl CatsController {
    fn find_one(self: Arc<Self>, args: Vec<Option<Instance>>) -> Deferred<Instance> {
        let index = args
            .into_iter()
            .next()
            .flatten()
            .and_then(|index| index.downcast_ref::<usize>().copied());
        match index.and_then(|index| self.cats.names.get(index)) {
            Some(name) => Deferred::value(Instance::new(name.to_string())),
            None => Deferred::error(Exception::msg("no such cat")),
        }
    }
}

impl Class for CatsController {
    type Dependencies = (Arc<CatsService>,);

    async fn construct((cats,): Self::Dependencies) -> Result<Self, DynError> {
        Ok(CatsController { cats })
    }
}

impl Controller for CatsController {
    fn handlers() -> Vec<HandlerMetadata> {
        vec![HandlerMetadata::new("find_one", handler(CatsController::find_one))
            .param(ParamMetadata::arg(0, 0))]
    }
}

/// Parses string arguments into indices
struct ParseIndexPipe;

impl PipeTransform for ParseIndexPipe {
    fn transform(&self, value: Option<Instance>, _: &ArgumentMetadata) -> Deferred<Option<Instance>> {
        let parsed = value
            .as_ref()
            .and_then(|value| value.downcast_ref::<String>())
            .map(|raw| raw.parse::<usize>());
        match parsed {
            Some(Ok(index)) => Deferred::value(Some(Instance::new(index))),
            Some(Err(error)) => Deferred::error(error),
            None => Deferred::value(value),
        }
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = VenokFactory::create::<CatsModule>()
        .use_global_pipes([Arc::new(ParseIndexPipe) as Arc<dyn PipeTransform>])
        .build()
        .await?;
    let find_one = app
        .handler::<CatsController>("find_one", ContextOptions::default())
        .await?;

    for raw in ["1", "7", "one"] {
        match find_one(vec![Instance::new(raw.to_string())]).await {
            Ok(name) => info!("cat {raw}: {:?}", name.downcast_ref::<String>()),
            Err(error) => info!("cat {raw}: {error}"),
        }
    }
    Ok(())
}
