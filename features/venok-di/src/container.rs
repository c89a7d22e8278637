use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, OnceLock},
};

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::{
    context_id::{ContextId, ContextIdFactory, InboundRequest},
    errors::{ContainerError, DependencyPosition, InjectError},
    instance_resolver::InstanceLinksHost,
    instance_wrapper::InstanceWrapper,
    module::{Module, ModuleDefinition, ModuleImport, ModuleMetadata},
    module_ref::ModuleRef,
    provider::{Dependency, EnhancerSubtype, Provider, REQUEST},
    token::{IdMode, ModuleToken, Token, TokenFactory},
    types::{Instance, Scope, TypeInfo},
};

/// Global module holding the providers every module can see
pub struct InternalCoreModule;

impl ModuleDefinition for InternalCoreModule {
    fn metadata() -> ModuleMetadata {
        let request = Provider::use_factory(REQUEST, Vec::new(), |args| {
            let requester = args.requester().to_string();
            async move {
                Err::<(), _>(format!("no request payload is registered for {requester}").into())
            }
        })
        .scope(Scope::Request);

        ModuleMetadata::new()
            .provider(request)
            .export_token(REQUEST)
            .global()
    }
}

/// A provider registered under one of the `APP_*` tokens
#[derive(Debug, Clone)]
pub struct ApplicationProvider {
    pub module: ModuleToken,
    pub token: Token,
    pub subtype: EnhancerSubtype,
    pub scope: Scope,
}

/// Outcome of looking up one dependency of a wrapper
#[derive(Debug, Clone)]
pub(crate) enum DependencyLookup {
    Wrapper(Arc<InstanceWrapper>),
    /// Handle of the requesting module
    ModuleRef,
    /// Optional and not registered
    Missing,
}

/// Owns every module of an application
pub struct Container {
    modules: IndexMap<ModuleToken, Module>,
    global_modules: IndexSet<ModuleToken>,
    module_types: HashMap<TypeInfo, Vec<ModuleToken>>,
    token_factory: TokenFactory,
    context_ids: ContextIdFactory,
    core_module: Option<ModuleToken>,
    application_providers: Vec<ApplicationProvider>,
    links: OnceLock<InstanceLinksHost>,
}

impl Container {
    pub fn new(mode: IdMode) -> Self {
        Container {
            modules: IndexMap::new(),
            global_modules: IndexSet::new(),
            module_types: HashMap::new(),
            token_factory: TokenFactory::new(mode),
            context_ids: ContextIdFactory::new(mode),
            core_module: None,
            application_providers: Vec::new(),
            links: OnceLock::new(),
        }
    }

    /// Index of every wrapper by token, built on first use once the graph is complete
    pub fn instance_links(&self) -> &InstanceLinksHost {
        self.links.get_or_init(|| InstanceLinksHost::new(self))
    }

    pub fn id_mode(&self) -> IdMode {
        self.token_factory.mode()
    }

    pub fn context_ids(&self) -> &ContextIdFactory {
        &self.context_ids
    }

    pub fn context_ids_mut(&mut self) -> &mut ContextIdFactory {
        &mut self.context_ids
    }

    /// Registers a module and, recursively, its imports
    ///
    /// Idempotent by token: registering a module a second time returns the existing
    /// entry, this collapses diamond shaped import graphs into one module.
    pub fn add_module(&mut self, import: ModuleImport) -> Result<ModuleToken, ContainerError> {
        let (info, metadata, fingerprint) = compile(import, "root", 0)?;
        let token = self.token_factory.create(info, fingerprint.as_deref());
        if self.modules.contains_key(&token) {
            return Ok(token);
        }

        debug!("Registering module {} ({})", info, token);
        let imports = metadata.imports.clone();
        let module = Module::new(token.clone(), info, metadata);
        if module.is_global() {
            self.global_modules.insert(token.clone());
        }
        self.modules.insert(token.clone(), module);
        self.module_types.entry(info).or_default().push(token.clone());

        for (index, import) in imports.into_iter().enumerate() {
            let forward = import.is_forward();
            let related = self.add_module_import(import, &info.short_name(), index)?;
            if related == token {
                return Err(ContainerError::InvalidModule {
                    module: info.short_name(),
                    index,
                    reason: "a module cannot import itself",
                });
            }
            self.add_import(&related, &token, forward)?;
        }

        Ok(token)
    }

    fn add_module_import(
        &mut self,
        import: ModuleImport,
        module: &str,
        index: usize,
    ) -> Result<ModuleToken, ContainerError> {
        let import = resolve_forward(import, module, index)?;
        self.add_module(import)
    }

    /// Swaps the declaration of a registered module, keeping its token
    pub fn replace_module(
        &mut self,
        old: ModuleImport,
        new: ModuleImport,
    ) -> Result<ModuleToken, ContainerError> {
        let (old_info, _, fingerprint) = compile(old, "root", 0)?;
        let token = self.token_factory.create(old_info, fingerprint.as_deref());
        let (_, metadata, _) = compile(new, &old_info.short_name(), 0)?;
        let imports = metadata.imports.clone();

        let module = self
            .modules
            .get_mut(&token)
            .ok_or_else(|| ContainerError::UnknownModule(old_info.short_name()))?;
        module.global = metadata.global;
        module.metadata = metadata;
        if module.global {
            self.global_modules.insert(token.clone());
        } else {
            self.global_modules.shift_remove(&token);
        }

        for (index, import) in imports.into_iter().enumerate() {
            let forward = import.is_forward();
            let related = self.add_module_import(import, &old_info.short_name(), index)?;
            self.add_import(&related, &token, forward)?;
        }
        Ok(token)
    }

    /// Marks a registered module as the internal core module
    pub fn set_core_module(&mut self, token: ModuleToken) -> Result<(), ContainerError> {
        if !self.modules.contains_key(&token) {
            return Err(ContainerError::UnknownModule(token.to_string()));
        }
        self.core_module = Some(token);
        Ok(())
    }

    pub fn core_module(&self) -> Option<&ModuleToken> {
        self.core_module.as_ref()
    }

    /// Registers a provider, `None` signals a provider which could not be declared
    pub fn add_provider(
        &mut self,
        provider: Option<Provider>,
        module: &ModuleToken,
    ) -> Result<Arc<InstanceWrapper>, ContainerError> {
        let module_ref = self.module_mut(module)?;
        let Some(provider) = provider else {
            return Err(ContainerError::CircularDependency {
                context: module_ref.name(),
            });
        };

        let wrapper = Arc::new(InstanceWrapper::new(provider, module.clone(), None));
        debug!("Adding provider {} to {}", wrapper.name(), module_ref.name());
        module_ref
            .providers
            .insert(wrapper.token().clone(), wrapper.clone());
        Ok(wrapper)
    }

    /// Replaces the provider registered under the same token in every module
    pub fn replace_provider(&mut self, provider: Provider) -> usize {
        let mut replaced = 0;
        for module in self.modules.values_mut() {
            if module.providers.contains_key(&provider.token) {
                let wrapper = InstanceWrapper::new(provider.clone(), module.token().clone(), None);
                module
                    .providers
                    .insert(provider.token.clone(), Arc::new(wrapper));
                replaced += 1;
            }
        }
        replaced
    }

    /// Registers an enhancer
    ///
    /// With a host, the enhancer becomes part of the host's dependency tree.
    pub fn add_injectable(
        &mut self,
        provider: Provider,
        module: &ModuleToken,
        subtype: Option<EnhancerSubtype>,
        host: Option<&Token>,
    ) -> Result<Arc<InstanceWrapper>, ContainerError> {
        let module_ref = self.module_mut(module)?;
        let token = provider.token.clone();
        let wrapper = match module_ref.injectables.get(&token) {
            Some(existing) => existing.clone(),
            None => {
                let wrapper = Arc::new(InstanceWrapper::new(provider, module.clone(), subtype));
                module_ref.injectables.insert(token.clone(), wrapper.clone());
                wrapper
            }
        };

        if let Some(host) = host {
            if let Some(host) = module_ref
                .providers
                .get(host)
                .or_else(|| module_ref.controllers.get(host))
            {
                host.add_enhancer(token);
            }
        }
        Ok(wrapper)
    }

    pub fn add_controller(
        &mut self,
        controller: Provider,
        module: &ModuleToken,
    ) -> Result<Arc<InstanceWrapper>, ContainerError> {
        let module_ref = self.module_mut(module)?;
        let wrapper = Arc::new(InstanceWrapper::new(controller, module.clone(), None));
        module_ref
            .controllers
            .insert(wrapper.token().clone(), wrapper.clone());
        Ok(wrapper)
    }

    /// Exports a provider, or re-exports an imported module
    pub fn add_exported_provider(
        &mut self,
        token: Token,
        module: &ModuleToken,
    ) -> Result<(), ContainerError> {
        let module_ref = self.module(module)?;
        let is_provider = module_ref.providers.contains_key(&token);
        let is_imported_module = module_ref.imports.iter().any(|import| {
            self.modules
                .get(import)
                .is_some_and(|imported| Token::Type(imported.info()) == token)
        });
        if !is_provider && !is_imported_module {
            return Err(ContainerError::UnknownExport {
                token: token.name(),
                module: module_ref.name(),
            });
        }

        self.module_mut(module)?.exports.insert(token);
        Ok(())
    }

    /// Records that `module` imports `related`
    pub fn add_import(
        &mut self,
        related: &ModuleToken,
        module: &ModuleToken,
        forward: bool,
    ) -> Result<(), ContainerError> {
        if !self.modules.contains_key(related) {
            return Err(ContainerError::UnknownModule(related.to_string()));
        }
        self.module_mut(module)?.add_import(related.clone(), forward);
        Ok(())
    }

    /// Imports every global module into every other module
    pub fn bind_global_scope(&mut self) {
        let globals = self.global_modules.iter().cloned().collect::<Vec<_>>();
        let core = self.core_module.clone();
        for (token, module) in self.modules.iter_mut() {
            if Some(token) == core.as_ref() {
                continue;
            }
            for global in &globals {
                if global != token {
                    module.add_import(global.clone(), false);
                }
            }
        }
    }

    pub fn is_global_module(&self, token: &ModuleToken) -> bool {
        self.global_modules.contains(token)
    }

    pub fn global_modules(&self) -> impl Iterator<Item = &Module> {
        self.global_modules
            .iter()
            .filter_map(|token| self.modules.get(token))
    }

    pub fn modules(&self) -> &IndexMap<ModuleToken, Module> {
        &self.modules
    }

    pub fn module(&self, token: &ModuleToken) -> Result<&Module, ContainerError> {
        self.modules
            .get(token)
            .ok_or_else(|| ContainerError::UnknownModule(token.to_string()))
    }

    fn module_mut(&mut self, token: &ModuleToken) -> Result<&mut Module, ContainerError> {
        self.modules
            .get_mut(token)
            .ok_or_else(|| ContainerError::UnknownModule(token.to_string()))
    }

    /// Every registration of the module type `M`
    pub fn modules_of<M: ModuleDefinition>(&self) -> &[ModuleToken] {
        self.module_types
            .get(&TypeInfo::of::<M>())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn set_distance(&mut self, token: &ModuleToken, distance: usize) {
        if let Some(module) = self.modules.get_mut(token) {
            module.distance = distance;
        }
    }

    pub fn add_application_provider(&mut self, provider: ApplicationProvider) {
        self.application_providers.push(provider);
    }

    pub fn application_providers(&self) -> &[ApplicationProvider] {
        &self.application_providers
    }

    /// Every wrapper of every module
    pub fn wrappers(&self) -> impl Iterator<Item = &Arc<InstanceWrapper>> {
        self.modules.values().flat_map(Module::wrappers)
    }

    /// The context id of an inbound request, created and registered on first use
    ///
    /// A new context gets the request payload as its `REQUEST` value. For durable trees
    /// the payload of the durable parent context is used instead.
    pub fn get_context_id(&self, request: &InboundRequest, is_tree_durable: bool) -> ContextId {
        let (context_id, created) = self.context_ids.get_by_request(request);
        if created {
            let payload = match (is_tree_durable, &context_id.payload) {
                (true, Some(payload)) => payload.clone(),
                _ => request.payload().clone(),
            };
            self.register_request_provider(payload, &context_id);
        }
        context_id
    }

    /// Sets the `REQUEST` value of a context
    pub fn register_request_provider(&self, payload: Instance, context_id: &ContextId) {
        let Some(wrapper) = self
            .core_module
            .as_ref()
            .and_then(|core| self.modules.get(core))
            .and_then(|core| core.providers.get(&Token::named(REQUEST)))
        else {
            return;
        };
        wrapper.set_instance_by_context_id(context_id, payload);
    }

    /// Drops every instance stored for a finished request
    pub fn release_context(&self, context_id: &ContextId) -> usize {
        self.wrappers()
            .filter(|wrapper| wrapper.release(context_id))
            .count()
    }

    /// Finds the wrapper providing `token` as seen from `module`
    ///
    /// The module's own providers win, then exported providers of imported modules.
    /// A provider asking for its own token is never satisfied by itself.
    pub fn lookup_provider(
        &self,
        module: &ModuleToken,
        token: &Token,
        requester: Option<&Token>,
    ) -> Option<Arc<InstanceWrapper>> {
        let module = self.modules.get(module)?;
        debug!("Looking for {} in {}", token, module.name());
        if let Some(wrapper) = module.providers.get(token) {
            if Some(token) == requester {
                return None;
            }
            debug!("Found {} in {}", token, module.name());
            return Some(wrapper.clone());
        }

        let mut registry = vec![module.token().clone()];
        self.lookup_in_imports(module, token, &mut registry, false)
    }

    fn lookup_in_imports(
        &self,
        module: &Module,
        token: &Token,
        registry: &mut Vec<ModuleToken>,
        traversing: bool,
    ) -> Option<Arc<InstanceWrapper>> {
        for related in &module.imports {
            if registry.contains(related) {
                continue;
            }
            let Some(related) = self.modules.get(related) else {
                continue;
            };
            // Only re-exported modules are traversed beyond the first level
            if traversing && !module.exports.contains(&Token::Type(related.info())) {
                continue;
            }

            debug!("Looking for {} in {}", token, related.name());
            registry.push(related.token().clone());
            match related.providers.get(token) {
                Some(wrapper) if related.exports.contains(token) => {
                    debug!("Found {} in {}", token, related.name());
                    return Some(wrapper.clone());
                }
                _ => {
                    if let Some(wrapper) = self.lookup_in_imports(related, token, registry, true) {
                        return Some(wrapper);
                    }
                }
            }
        }
        None
    }

    /// Every dependency of `wrapper`, constructor arguments first
    pub(crate) fn dependencies_of(wrapper: &InstanceWrapper) -> Vec<Dependency> {
        wrapper
            .recipe()
            .map(|recipe| {
                recipe
                    .inject
                    .iter()
                    .cloned()
                    .chain(recipe.properties.iter().map(|p| p.dependency.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn dependency_position(
        wrapper: &InstanceWrapper,
        index: usize,
        dependency: &Dependency,
    ) -> DependencyPosition {
        let name = dependency.display_name();
        match wrapper.recipe() {
            Some(recipe) if index >= recipe.inject.len() => DependencyPosition::Property {
                name,
                key: recipe
                    .properties
                    .get(index - recipe.inject.len())
                    .map(|property| property.key)
                    .unwrap_or_default(),
            },
            _ => DependencyPosition::Argument { name, index },
        }
    }

    /// Looks up the dependency at `index` of `wrapper` in the wrapper's host module
    pub(crate) fn lookup_dependency(
        &self,
        wrapper: &InstanceWrapper,
        index: usize,
        dependency: &Dependency,
    ) -> Result<DependencyLookup, InjectError> {
        let Some(token) = dependency.token() else {
            return Err(InjectError::UndefinedForwardRef {
                requester: wrapper.name().to_string(),
                position: Self::dependency_position(wrapper, index, dependency),
            });
        };
        if token == Token::of::<ModuleRef>() {
            return Ok(DependencyLookup::ModuleRef);
        }

        if let Some(found) = self.lookup_provider(wrapper.host(), &token, Some(wrapper.token())) {
            return Ok(DependencyLookup::Wrapper(found));
        }
        if dependency.is_optional() {
            return Ok(DependencyLookup::Missing);
        }

        let module = self
            .modules
            .get(wrapper.host())
            .map(Module::name)
            .unwrap_or_else(|| wrapper.host().to_string());
        Err(InjectError::UnknownDependency {
            requester: wrapper.name().to_string(),
            signature: wrapper.signature(Some(index)),
            dependency: token.name(),
            position: Self::dependency_position(wrapper, index, dependency),
            module,
        })
    }

    /// Wrappers `wrapper` depends on, enhancers included, unresolvable ones skipped
    pub(crate) fn dependency_wrappers(&self, wrapper: &InstanceWrapper) -> Vec<Arc<InstanceWrapper>> {
        let mut wrappers = Self::dependencies_of(wrapper)
            .iter()
            .enumerate()
            .filter_map(|(index, dependency)| {
                match self.lookup_dependency(wrapper, index, dependency) {
                    Ok(DependencyLookup::Wrapper(found)) => Some(found),
                    _ => None,
                }
            })
            .collect::<Vec<_>>();

        if let Some(host) = self.modules.get(wrapper.host()) {
            wrappers.extend(
                wrapper
                    .enhancers()
                    .iter()
                    .filter_map(|token| {
                        host.injectables
                            .get(token)
                            .cloned()
                            .or_else(|| self.application_injectable(token))
                    }),
            );
        }
        wrappers
    }

    /// Request or transient scoped `APP_*` enhancer registered under `token`
    fn application_injectable(&self, token: &Token) -> Option<Arc<InstanceWrapper>> {
        let provider = self
            .application_providers
            .iter()
            .find(|provider| provider.token == *token)?;
        self.modules
            .get(&provider.module)?
            .injectables
            .get(token)
            .cloned()
    }

    /// Computes the static and durable flags of every wrapper
    pub fn introspect_trees(&self) {
        for wrapper in self.wrappers() {
            self.tree_static(wrapper, &mut HashSet::new());
            self.tree_durable(wrapper, &mut HashSet::new());
        }
    }

    fn tree_static(&self, wrapper: &Arc<InstanceWrapper>, visiting: &mut HashSet<u64>) -> bool {
        if let Some(is_static) = wrapper.tree_static_cell().get() {
            return *is_static;
        }
        if wrapper.scope() == Scope::Request {
            return *wrapper.tree_static_cell().get_or_init(|| false);
        }
        if !visiting.insert(wrapper.id()) {
            return true;
        }

        let is_static = self
            .dependency_wrappers(wrapper)
            .iter()
            .all(|dependency| self.tree_static(dependency, visiting));
        visiting.remove(&wrapper.id());
        *wrapper.tree_static_cell().get_or_init(|| is_static)
    }

    fn tree_durable(&self, wrapper: &Arc<InstanceWrapper>, visiting: &mut HashSet<u64>) -> bool {
        if let Some(is_durable) = wrapper.tree_durable_cell().get() {
            return *is_durable;
        }
        if wrapper.scope() == Scope::Request {
            let durable = wrapper.is_durable().unwrap_or(false);
            return *wrapper.tree_durable_cell().get_or_init(|| durable);
        }
        if self.tree_static(wrapper, &mut HashSet::new()) {
            return *wrapper.tree_durable_cell().get_or_init(|| false);
        }
        if !visiting.insert(wrapper.id()) {
            return true;
        }

        let is_non_durable = self.dependency_wrappers(wrapper).iter().any(|dependency| {
            !self.tree_static(dependency, &mut HashSet::new())
                && !self.tree_durable(dependency, visiting)
        });
        visiting.remove(&wrapper.id());
        *wrapper.tree_durable_cell().get_or_init(|| !is_non_durable)
    }

    /// Fails if modules import each other without a forward reference
    ///
    /// The reported path is deterministic: modules and imports are visited in
    /// registration order.
    pub fn check_import_cycles(&self) -> Result<(), ContainerError> {
        let mut done = HashSet::new();
        for token in self.modules.keys() {
            let mut path = Vec::new();
            if let Some(cycle) = self.find_cycle(token, &mut path, &mut done) {
                let chain = cycle
                    .iter()
                    .filter_map(|token| self.modules.get(token).map(Module::name))
                    .collect::<Vec<_>>();
                return Err(ContainerError::CircularDependency {
                    context: format!("module imports {}", chain.join(" -> ")),
                });
            }
        }
        Ok(())
    }

    fn find_cycle(
        &self,
        token: &ModuleToken,
        path: &mut Vec<ModuleToken>,
        done: &mut HashSet<ModuleToken>,
    ) -> Option<Vec<ModuleToken>> {
        if let Some(start) = path.iter().position(|entry| entry == token) {
            let mut cycle = path[start..].to_vec();
            cycle.push(token.clone());
            return Some(cycle);
        }
        if done.contains(token) {
            return None;
        }

        path.push(token.clone());
        if let Some(module) = self.modules.get(token) {
            for related in &module.imports {
                if module.forward_imports.contains(related) || self.is_global_module(related) {
                    continue;
                }
                if let Some(cycle) = self.find_cycle(related, path, done) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        done.insert(token.clone());
        None
    }
}

fn resolve_forward(
    mut import: ModuleImport,
    module: &str,
    index: usize,
) -> Result<ModuleImport, ContainerError> {
    while let ModuleImport::Forward(target) = import {
        import = target().ok_or_else(|| ContainerError::UndefinedForwardRef {
            module: module.to_string(),
            index,
        })?;
    }
    Ok(import)
}

/// Merged metadata of a module declaration plus its dynamic fingerprint
fn compile(
    import: ModuleImport,
    module: &str,
    index: usize,
) -> Result<(TypeInfo, ModuleMetadata, Option<String>), ContainerError> {
    match resolve_forward(import, module, index)? {
        ModuleImport::Static(module) => Ok((module.info, (module.metadata)(), None)),
        ModuleImport::Dynamic(dynamic) => {
            let fingerprint = dynamic.metadata.fingerprint();
            let mut metadata = (dynamic.module.metadata)();
            metadata.merge(dynamic.metadata);
            Ok((dynamic.module.info, metadata, Some(fingerprint)))
        }
        ModuleImport::Forward(_) => Err(ContainerError::UndefinedForwardRef {
            module: module.to_string(),
            index,
        }),
    }
}
