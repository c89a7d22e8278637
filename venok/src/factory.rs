use std::{sync::Arc, time::Duration};

use tracing::{debug, error};
use venok_context::{
    ApplicationConfig, ContextType, ExceptionFilter, Guard, Interceptor, NativeParamsFactory,
    ParamsFactory, PipeTransform,
};
use venok_di::{
    ApplicationContext, ApplicationOptions, ContextIdStrategy, DiBuilder, IdMode, InitError,
    Instance, ModuleDefinition, ModuleImport, Provider, Token,
};

use crate::{application::VenokApplication, errors::VenokError};

/// Entry point for bootstrapping applications
///
/// ```ignore
/// let app = VenokFactory::create::<AppModule>()
///     .use_global_pipes([Arc::new(ValidationPipe) as Arc<dyn PipeTransform>])
///     .build()
///     .await?;
/// let find_one = app.handler::<CatsController>("find_one", ContextOptions::default()).await?;
/// ```
pub struct VenokFactory;

impl VenokFactory {
    pub fn create<Root: ModuleDefinition>() -> VenokApplicationBuilder {
        VenokApplicationBuilder::new(DiBuilder::new::<Root>())
    }

    pub fn create_from_import(root: ModuleImport) -> VenokApplicationBuilder {
        VenokApplicationBuilder::new(DiBuilder::from_import(root))
    }

    /// Only the container, without the call pipeline
    pub async fn create_application_context<Root: ModuleDefinition>(
        options: ApplicationOptions,
    ) -> Result<ApplicationContext, InitError> {
        DiBuilder::new::<Root>().options(options).build().await
    }
}

pub struct VenokApplicationBuilder {
    di: DiBuilder,
    config: Arc<ApplicationConfig>,
    params_factory: Arc<dyn ParamsFactory>,
    context_type: ContextType,
}

impl VenokApplicationBuilder {
    fn new(di: DiBuilder) -> Self {
        VenokApplicationBuilder {
            di,
            config: Arc::new(ApplicationConfig::new()),
            params_factory: Arc::new(NativeParamsFactory),
            context_type: ContextType::NATIVE,
        }
    }

    pub fn options(mut self, options: ApplicationOptions) -> Self {
        self.di = self.di.options(options);
        self
    }

    pub fn abort_on_error(mut self, abort_on_error: bool) -> Self {
        self.di = self.di.abort_on_error(abort_on_error);
        self
    }

    pub fn id_mode(mut self, id_mode: IdMode) -> Self {
        self.di = self.di.id_mode(id_mode);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.di = self.di.timeout(timeout);
        self
    }

    pub fn context_id_strategy(mut self, strategy: Arc<dyn ContextIdStrategy>) -> Self {
        self.di = self.di.context_id_strategy(strategy);
        self
    }

    /// Replaces a provider wherever it is registered
    pub fn override_provider(mut self, provider: Provider) -> Self {
        self.di = self.di.override_provider(provider);
        self
    }

    pub fn override_module(mut self, module: ModuleImport, replacement: ModuleImport) -> Self {
        self.di = self.di.override_module(module, replacement);
        self
    }

    /// Extracts handler parameters, native arguments by default
    pub fn params_factory(mut self, params_factory: Arc<dyn ParamsFactory>) -> Self {
        self.params_factory = params_factory;
        self
    }

    pub fn context_type(mut self, context_type: ContextType) -> Self {
        self.context_type = context_type;
        self
    }

    pub fn use_global_guards(self, guards: impl IntoIterator<Item = Arc<dyn Guard>>) -> Self {
        self.config.use_global_guards(guards);
        self
    }

    pub fn use_global_interceptors(
        self,
        interceptors: impl IntoIterator<Item = Arc<dyn Interceptor>>,
    ) -> Self {
        self.config.use_global_interceptors(interceptors);
        self
    }

    pub fn use_global_pipes(self, pipes: impl IntoIterator<Item = Arc<dyn PipeTransform>>) -> Self {
        self.config.use_global_pipes(pipes);
        self
    }

    pub fn use_global_filters(
        self,
        filters: impl IntoIterator<Item = Arc<dyn ExceptionFilter>>,
    ) -> Self {
        self.config.use_global_filters(filters);
        self
    }

    /// Scans and instantiates the module graph, then applies the `APP_*` providers
    pub async fn build(self) -> Result<VenokApplication, VenokError> {
        let VenokApplicationBuilder {
            di,
            config,
            params_factory,
            context_type,
        } = self;

        let context = di
            .core_provider(Provider::instance(
                Token::of::<ApplicationConfig>(),
                Instance::from_arc(config.clone()),
            ))
            .build()
            .await?;

        if let Err(error) = config.apply_application_providers(context.container()) {
            error!("Failed to apply global enhancers: {error}");
            return Err(error.into());
        }
        debug!("Application initialized");

        Ok(VenokApplication::new(
            context,
            config,
            params_factory,
            context_type,
        ))
    }
}
