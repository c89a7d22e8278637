use std::{collections::HashSet, fmt, sync::Arc};

use indexmap::{IndexMap, IndexSet};

use crate::{
    instance_wrapper::InstanceWrapper,
    provider::Provider,
    token::{ModuleToken, Token},
    types::TypeInfo,
};

/// A unit of configuration
///
/// ```ignore
/// struct CatsModule;
///
/// impl ModuleDefinition for CatsModule {
///     fn metadata() -> ModuleMetadata {
///         ModuleMetadata::new()
///             .import::<DatabaseModule>()
///             .provider(Provider::class::<CatsService>())
///             .export::<CatsService>()
///     }
/// }
/// ```
pub trait ModuleDefinition: Send + Sync + 'static {
    fn metadata() -> ModuleMetadata;
}

/// Declared content of a module
#[derive(Clone, Default)]
pub struct ModuleMetadata {
    pub(crate) imports: Vec<ModuleImport>,
    pub(crate) providers: Vec<Provider>,
    pub(crate) controllers: Vec<Provider>,
    pub(crate) exports: Vec<Token>,
    pub(crate) global: bool,
}

impl ModuleMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import<M: ModuleDefinition>(mut self) -> Self {
        self.imports.push(ModuleImport::of::<M>());
        self
    }

    /// Imports a module which (indirectly) imports this one
    pub fn import_forward<M: ModuleDefinition>(mut self) -> Self {
        self.imports
            .push(ModuleImport::forward(|| Some(ModuleImport::of::<M>())));
        self
    }

    pub fn import_dynamic(mut self, module: DynamicModule) -> Self {
        self.imports.push(ModuleImport::Dynamic(module));
        self
    }

    pub fn import_module(mut self, module: ModuleImport) -> Self {
        self.imports.push(module);
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.providers.extend(providers);
        self
    }

    pub fn controller(mut self, controller: Provider) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn export<T: 'static + ?Sized>(self) -> Self {
        self.export_token(Token::of::<T>())
    }

    pub fn export_token(mut self, token: impl Into<Token>) -> Self {
        self.exports.push(token.into());
        self
    }

    /// Re-exports an imported module, its exports become visible to importers of this module
    pub fn export_module<M: ModuleDefinition>(self) -> Self {
        self.export_token(Token::of::<M>())
    }

    /// Makes the providers exported by this module visible everywhere
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub(crate) fn merge(&mut self, other: ModuleMetadata) {
        self.imports.extend(other.imports);
        self.providers.extend(other.providers);
        self.controllers.extend(other.controllers);
        self.exports.extend(other.exports);
        self.global |= other.global;
    }

    /// Content identity used to tell dynamic registrations apart
    pub(crate) fn fingerprint(&self) -> String {
        let imports = self
            .imports
            .iter()
            .map(ModuleImport::fingerprint)
            .collect::<Vec<_>>();
        let providers = self
            .providers
            .iter()
            .chain(&self.controllers)
            .map(Provider::fingerprint_string)
            .collect::<Vec<_>>();
        format!(
            "imports:[{}];providers:[{}];exports:{:?};global:{}",
            imports.join(","),
            providers.join(","),
            self.exports,
            self.global
        )
    }
}

/// Module declaration known at compile time
#[derive(Clone, Copy)]
pub struct StaticModule {
    pub info: TypeInfo,
    pub(crate) metadata: fn() -> ModuleMetadata,
}

impl StaticModule {
    pub fn of<M: ModuleDefinition>() -> Self {
        StaticModule {
            info: TypeInfo::of::<M>(),
            metadata: M::metadata,
        }
    }
}

/// A module extended with metadata computed at runtime, like `ConfigModule::for_root(..)`
#[derive(Clone)]
pub struct DynamicModule {
    pub(crate) module: StaticModule,
    pub(crate) metadata: ModuleMetadata,
}

impl DynamicModule {
    pub fn new<M: ModuleDefinition>(metadata: ModuleMetadata) -> Self {
        DynamicModule {
            module: StaticModule::of::<M>(),
            metadata,
        }
    }

    pub fn info(&self) -> TypeInfo {
        self.module.info
    }
}

/// Entry of a module's import list
#[derive(Clone)]
pub enum ModuleImport {
    Static(StaticModule),
    Dynamic(DynamicModule),
    /// Resolved lazily, breaks compile time recursion between modules importing each other
    Forward(Arc<dyn Fn() -> Option<ModuleImport> + Send + Sync>),
}

impl ModuleImport {
    pub fn of<M: ModuleDefinition>() -> Self {
        ModuleImport::Static(StaticModule::of::<M>())
    }

    pub fn forward(target: impl Fn() -> Option<ModuleImport> + Send + Sync + 'static) -> Self {
        ModuleImport::Forward(Arc::new(target))
    }

    pub(crate) fn is_forward(&self) -> bool {
        matches!(self, ModuleImport::Forward(_))
    }

    fn fingerprint(&self) -> String {
        match self {
            ModuleImport::Static(module) => module.info.type_name.to_string(),
            ModuleImport::Dynamic(module) => format!(
                "{}({})",
                module.module.info.type_name,
                module.metadata.fingerprint()
            ),
            ModuleImport::Forward(target) => format!("forward@{:p}", Arc::as_ptr(target)),
        }
    }
}

impl From<DynamicModule> for ModuleImport {
    fn from(module: DynamicModule) -> Self {
        ModuleImport::Dynamic(module)
    }
}

impl fmt::Debug for ModuleImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleImport::Static(module) => write!(f, "Static({})", module.info),
            ModuleImport::Dynamic(module) => write!(f, "Dynamic({})", module.module.info),
            ModuleImport::Forward(_) => write!(f, "Forward"),
        }
    }
}

/// Registry node of one module
pub struct Module {
    token: ModuleToken,
    info: TypeInfo,
    pub(crate) global: bool,
    pub(crate) distance: usize,
    pub(crate) imports: IndexSet<ModuleToken>,
    pub(crate) forward_imports: HashSet<ModuleToken>,
    pub(crate) providers: IndexMap<Token, Arc<InstanceWrapper>>,
    pub(crate) controllers: IndexMap<Token, Arc<InstanceWrapper>>,
    pub(crate) injectables: IndexMap<Token, Arc<InstanceWrapper>>,
    pub(crate) exports: IndexSet<Token>,
    pub(crate) metadata: ModuleMetadata,
}

impl Module {
    pub(crate) fn new(token: ModuleToken, info: TypeInfo, metadata: ModuleMetadata) -> Self {
        Module {
            token,
            info,
            global: metadata.global,
            distance: 0,
            imports: IndexSet::new(),
            forward_imports: HashSet::new(),
            providers: IndexMap::new(),
            controllers: IndexMap::new(),
            injectables: IndexMap::new(),
            exports: IndexSet::new(),
            metadata,
        }
    }

    pub fn token(&self) -> &ModuleToken {
        &self.token
    }

    pub fn info(&self) -> TypeInfo {
        self.info
    }

    pub fn name(&self) -> String {
        self.info.short_name()
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Depth below the root module, global modules are pinned to `usize::MAX`
    pub fn distance(&self) -> usize {
        self.distance
    }

    pub fn imports(&self) -> impl Iterator<Item = &ModuleToken> {
        self.imports.iter()
    }

    pub fn providers(&self) -> &IndexMap<Token, Arc<InstanceWrapper>> {
        &self.providers
    }

    pub fn controllers(&self) -> &IndexMap<Token, Arc<InstanceWrapper>> {
        &self.controllers
    }

    pub fn injectables(&self) -> &IndexMap<Token, Arc<InstanceWrapper>> {
        &self.injectables
    }

    pub fn exports(&self) -> &IndexSet<Token> {
        &self.exports
    }

    pub fn has_provider(&self, token: &Token) -> bool {
        self.providers.contains_key(token)
    }

    /// Every wrapper owned by this module
    pub fn wrappers(&self) -> impl Iterator<Item = &Arc<InstanceWrapper>> {
        self.providers
            .values()
            .chain(self.controllers.values())
            .chain(self.injectables.values())
    }

    pub(crate) fn add_import(&mut self, module: ModuleToken, forward: bool) {
        if forward {
            self.forward_imports.insert(module.clone());
        }
        self.imports.insert(module);
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name())
            .field("token", &self.token)
            .field("global", &self.global)
            .field("distance", &self.distance)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
