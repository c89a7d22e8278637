use tracing::debug;
use uuid::Uuid;

use crate::{
    container::{ApplicationProvider, Container, InternalCoreModule},
    errors::ContainerError,
    module::{DynamicModule, ModuleImport, ModuleMetadata},
    provider::{EnhancerSubtype, Provider},
    token::{IdMode, ModuleToken, Token},
    topology::calculate_distances,
    types::Scope,
};

/// Walks the module declarations and fills the container
///
/// After a scan every module, provider, controller, enhancer and export is registered,
/// global modules are bound, distances are assigned and every wrapper knows whether its
/// dependency tree is static.
pub struct DependenciesScanner<'a> {
    container: &'a mut Container,
    app_provider_count: usize,
    provider_overrides: Vec<Provider>,
    module_overrides: Vec<(ModuleImport, ModuleImport)>,
}

impl<'a> DependenciesScanner<'a> {
    pub fn new(container: &'a mut Container) -> Self {
        DependenciesScanner {
            container,
            app_provider_count: 0,
            provider_overrides: Vec::new(),
            module_overrides: Vec::new(),
        }
    }

    /// Replaces every provider registered under the same token
    pub fn override_provider(mut self, provider: Provider) -> Self {
        self.provider_overrides.push(provider);
        self
    }

    /// Replaces the declaration of a module before its providers are registered
    pub fn override_module(mut self, module: ModuleImport, replacement: ModuleImport) -> Self {
        self.module_overrides.push((module, replacement));
        self
    }

    /// Scans the application rooted at `root`
    ///
    /// `core` is merged into the internal core module, its providers are visible to
    /// every module.
    pub fn scan(
        mut self,
        root: ModuleImport,
        core: ModuleMetadata,
    ) -> Result<ModuleToken, ContainerError> {
        let core = self
            .container
            .add_module(DynamicModule::new::<InternalCoreModule>(core).into())?;
        self.container.set_core_module(core)?;

        let root = self.container.add_module(root)?;
        for (module, replacement) in std::mem::take(&mut self.module_overrides) {
            self.container.replace_module(module, replacement)?;
        }
        self.container.check_import_cycles()?;

        let modules = self.container.modules().keys().cloned().collect::<Vec<_>>();
        for module in &modules {
            self.scan_module_dependencies(module)?;
        }
        self.add_scoped_enhancers_metadata();
        for provider in std::mem::take(&mut self.provider_overrides) {
            let token = provider.token().clone();
            if self.container.replace_provider(provider) == 0 {
                debug!("Override of {token} matched no provider");
            }
        }

        calculate_distances(self.container, &root);
        self.container.bind_global_scope();
        self.container.introspect_trees();
        debug!("Scanned {} modules", modules.len());
        Ok(root)
    }

    fn scan_module_dependencies(&mut self, module: &ModuleToken) -> Result<(), ContainerError> {
        let metadata = self.container.module(module)?.metadata.clone();
        for provider in metadata.providers {
            self.insert_provider(provider, module)?;
        }
        for controller in metadata.controllers {
            self.insert_controller(controller, module)?;
        }
        for export in metadata.exports {
            self.container.add_exported_provider(export, module)?;
        }
        Ok(())
    }

    fn insert_provider(
        &mut self,
        provider: Provider,
        module: &ModuleToken,
    ) -> Result<(), ContainerError> {
        let Some(subtype) = EnhancerSubtype::from_app_token(provider.token()) else {
            let token = provider.token().clone();
            let injectables = provider.injectables.clone();
            self.container.add_provider(Some(provider), module)?;
            return self.insert_injectables(injectables, module, &token);
        };

        // Every application provider gets its own token, so several can be registered
        let token = Token::named(format!(
            "{} (UUID: {})",
            provider.token(),
            self.app_provider_id(module)
        ));
        let provider = provider.provide(token.clone());
        let scope = provider.scope_options().scope;
        match scope {
            Scope::Request | Scope::Transient => {
                self.container
                    .add_injectable(provider, module, Some(subtype), None)?;
            }
            Scope::Default => {
                self.container.add_provider(Some(provider), module)?;
            }
        }

        self.container.add_application_provider(ApplicationProvider {
            module: module.clone(),
            token,
            subtype,
            scope,
        });
        Ok(())
    }

    fn insert_controller(
        &mut self,
        controller: Provider,
        module: &ModuleToken,
    ) -> Result<(), ContainerError> {
        let token = controller.token().clone();
        let injectables = controller.injectables.clone();
        self.container.add_controller(controller, module)?;
        self.insert_injectables(injectables, module, &token)
    }

    /// Registers the enhancers referenced by a class, they are part of its dependency tree
    fn insert_injectables(
        &mut self,
        injectables: Vec<Provider>,
        module: &ModuleToken,
        host: &Token,
    ) -> Result<(), ContainerError> {
        for injectable in injectables {
            self.container
                .add_injectable(injectable, module, None, Some(host))?;
        }
        Ok(())
    }

    /// Scoped global enhancers run for every controller, which makes every controller
    /// tree depend on them
    fn add_scoped_enhancers_metadata(&mut self) {
        let scoped = self
            .container
            .application_providers()
            .iter()
            .filter(|provider| provider.scope != Scope::Default)
            .map(|provider| provider.token.clone())
            .collect::<Vec<_>>();
        if scoped.is_empty() {
            return;
        }
        for module in self.container.modules().values() {
            for controller in module.controllers().values() {
                for token in &scoped {
                    controller.add_enhancer(token.clone());
                }
            }
        }
    }

    fn app_provider_id(&mut self, module: &ModuleToken) -> Uuid {
        self.app_provider_count += 1;
        match self.container.id_mode() {
            IdMode::Random => Uuid::new_v4(),
            IdMode::Deterministic => {
                let seed = format!("{module}_{}", self.app_provider_count);
                Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes())
            }
        }
    }
}
