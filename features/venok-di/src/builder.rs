use std::{fmt, sync::Arc, time::Duration};

use crate::{
    application_context::ApplicationContext,
    container::Container,
    context_id::ContextIdStrategy,
    errors::InitError,
    instance_loader::InstanceLoader,
    module::{ModuleDefinition, ModuleImport, ModuleMetadata},
    provider::Provider,
    scanner::DependenciesScanner,
    token::IdMode,
};

/// Options of an application
#[derive(Clone, Default)]
pub struct ApplicationOptions {
    /// Abort the process instead of returning bootstrap errors
    pub abort_on_error: bool,
    /// How module tokens and context ids are minted
    pub id_mode: IdMode,
    /// Upper bound for instantiating all static providers
    pub timeout: Option<Duration>,
    /// Derives durable contexts from inbound requests
    pub context_id_strategy: Option<Arc<dyn ContextIdStrategy>>,
}

impl fmt::Debug for ApplicationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationOptions")
            .field("abort_on_error", &self.abort_on_error)
            .field("id_mode", &self.id_mode)
            .field("timeout", &self.timeout)
            .field("durable", &self.context_id_strategy.is_some())
            .finish()
    }
}

//////////////////////////////////////////////////////////////////////
///
/// Building an application consists of three parts.
/// 1. The scan, registering every module, provider and enhancer in a [Container]
/// 2. The dependency graph check
/// 3. The instantiation of every provider with a static dependency tree
pub struct DiBuilder {
    root: ModuleImport,
    options: ApplicationOptions,
    core: ModuleMetadata,
    provider_overrides: Vec<Provider>,
    module_overrides: Vec<(ModuleImport, ModuleImport)>,
}

impl DiBuilder {
    pub fn new<Root: ModuleDefinition>() -> Self {
        Self::from_import(ModuleImport::of::<Root>())
    }

    pub fn from_import(root: ModuleImport) -> Self {
        DiBuilder {
            root,
            options: ApplicationOptions::default(),
            core: ModuleMetadata::new(),
            provider_overrides: Vec::new(),
            module_overrides: Vec::new(),
        }
    }
}

impl DiBuilder {
    pub fn options(mut self, options: ApplicationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn abort_on_error(mut self, abort_on_error: bool) -> Self {
        self.options.abort_on_error = abort_on_error;
        self
    }

    pub fn id_mode(mut self, id_mode: IdMode) -> Self {
        self.options.id_mode = id_mode;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn context_id_strategy(mut self, strategy: Arc<dyn ContextIdStrategy>) -> Self {
        self.options.context_id_strategy = Some(strategy);
        self
    }

    /// Registers a provider in the internal core module, visible to every module
    pub fn core_provider(mut self, provider: Provider) -> Self {
        let token = provider.token().clone();
        self.core = self.core.provider(provider).export_token(token);
        self
    }

    /// Replaces every provider registered under the same token
    pub fn override_provider(mut self, provider: Provider) -> Self {
        self.provider_overrides.push(provider);
        self
    }

    pub fn override_module(mut self, module: ModuleImport, replacement: ModuleImport) -> Self {
        self.module_overrides.push((module, replacement));
        self
    }

    /// Registers everything without instantiating anything
    pub fn scan(self) -> Result<(Container, ApplicationOptions), InitError> {
        let DiBuilder {
            root,
            options,
            core,
            provider_overrides,
            module_overrides,
        } = self;

        let mut container = Container::new(options.id_mode);
        if let Some(strategy) = &options.context_id_strategy {
            container.context_ids_mut().apply_strategy(strategy.clone());
        }

        let mut scanner = DependenciesScanner::new(&mut container);
        for provider in provider_overrides {
            scanner = scanner.override_provider(provider);
        }
        for (module, replacement) in module_overrides {
            scanner = scanner.override_module(module, replacement);
        }
        scanner.scan(root, core)?;

        Ok((container, options))
    }

    pub async fn build(self) -> Result<ApplicationContext, InitError> {
        let abort_on_error = self.options.abort_on_error;
        let result = async {
            let (container, options) = self.scan()?;
            let container = Arc::new(container);
            InstanceLoader::new(container.clone())
                .create_instances_of_dependencies(options.timeout)
                .await?;
            Ok(ApplicationContext::new(container))
        }
        .await;

        if let Err(error) = &result {
            tracing::error!("Failed to initiate the application: {error}");
            if abort_on_error {
                std::process::abort();
            }
        }
        result
    }
}
