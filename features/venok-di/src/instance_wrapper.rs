use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        OnceLock,
    },
};

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::{
    context_id::{ContextId, HostComponentInfo, STATIC_CONTEXT_ID},
    errors::InjectError,
    provider::{EnhancerSubtype, Provider, ProviderKind, Recipe},
    token::{ModuleToken, Token},
    types::{Instance, Scope, TypeInfo},
};

static NEXT_WRAPPER_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type PendingInstance = Shared<BoxFuture<'static, Result<Instance, InjectError>>>;

/// State of one context slot
#[derive(Clone)]
pub(crate) enum InstanceSlot {
    /// Construction is in flight, later callers await the same future
    Pending(PendingInstance),
    Resolved(Instance),
}

/// Per provider record
///
/// Holds the instances of a provider keyed by context id. Default scoped providers
/// with a static dependency tree only ever fill the static slot.
pub struct InstanceWrapper {
    id: u64,
    token: Token,
    name: String,
    metatype: Option<TypeInfo>,
    host: ModuleToken,
    scope: Scope,
    durable: Option<bool>,
    subtype: Option<EnhancerSubtype>,
    pub(crate) kind: ProviderKind,
    enhancers: Mutex<Vec<Token>>,
    values: Mutex<HashMap<u64, InstanceSlot>>,
    tree_static: OnceLock<bool>,
    tree_durable: OnceLock<bool>,
}

impl InstanceWrapper {
    pub(crate) fn new(provider: Provider, host: ModuleToken, subtype: Option<EnhancerSubtype>) -> Self {
        let metatype = match &provider.kind {
            ProviderKind::Construct(recipe) => recipe.metatype,
            ProviderKind::Value(instance) => Some(instance.info),
        };
        let name = provider.token.name();
        let subtype = subtype.or(provider.subtype);
        let mut values = HashMap::new();
        if let ProviderKind::Value(instance) = &provider.kind {
            values.insert(STATIC_CONTEXT_ID, InstanceSlot::Resolved(instance.clone()));
        }

        InstanceWrapper {
            id: NEXT_WRAPPER_ID.fetch_add(1, Ordering::Relaxed),
            token: provider.token,
            name,
            metatype,
            host,
            scope: provider.scope.scope,
            durable: provider.scope.durable,
            subtype,
            kind: provider.kind,
            enhancers: Mutex::new(Vec::new()),
            values: Mutex::new(values),
            tree_static: OnceLock::new(),
            tree_durable: OnceLock::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metatype(&self) -> Option<TypeInfo> {
        self.metatype
    }

    pub fn host(&self) -> &ModuleToken {
        &self.host
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_transient(&self) -> bool {
        self.scope == Scope::Transient
    }

    pub fn is_durable(&self) -> Option<bool> {
        self.durable
    }

    pub fn subtype(&self) -> Option<EnhancerSubtype> {
        self.subtype
    }

    pub fn is_value(&self) -> bool {
        matches!(self.kind, ProviderKind::Value(_))
    }

    pub(crate) fn recipe(&self) -> Option<&Recipe> {
        match &self.kind {
            ProviderKind::Construct(recipe) => Some(recipe),
            ProviderKind::Value(_) => None,
        }
    }

    /// Enhancers registered for this class, part of its dependency tree
    pub fn enhancers(&self) -> Vec<Token> {
        self.enhancers.lock().clone()
    }

    pub(crate) fn add_enhancer(&self, token: Token) {
        let mut enhancers = self.enhancers.lock();
        if !enhancers.contains(&token) {
            enhancers.push(token);
        }
    }

    /// Signature used in diagnostics, `CatsService (CatsRepository, ?)`
    pub fn signature(&self, missing: Option<usize>) -> String {
        let Some(recipe) = self.recipe() else {
            return String::new();
        };
        recipe
            .inject
            .iter()
            .map(|dependency| dependency.display_name())
            .chain(recipe.properties.iter().map(|property| property.key.to_string()))
            .enumerate()
            .map(|(index, name)| match missing {
                Some(missing) if missing == index => "?".to_string(),
                _ => name,
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// True if no transitive dependency (enhancers included) is request scoped
    ///
    /// Computed once, after the module graph is complete.
    pub fn is_dependency_tree_static(&self) -> bool {
        self.tree_static.get().copied().unwrap_or(self.scope != Scope::Request)
    }

    pub fn is_dependency_tree_durable(&self) -> bool {
        self.tree_durable.get().copied().unwrap_or(false)
    }

    pub(crate) fn tree_static_cell(&self) -> &OnceLock<bool> {
        &self.tree_static
    }

    pub(crate) fn tree_durable_cell(&self) -> &OnceLock<bool> {
        &self.tree_durable
    }

    /// The context an instance for `context_id` is stored under
    pub fn effective_context(&self, context_id: &ContextId) -> ContextId {
        if context_id.is_static() || self.is_dependency_tree_static() {
            return ContextId::STATIC;
        }
        context_id.resolve_for(&HostComponentInfo {
            token: self.token.clone(),
            is_tree_durable: self.is_dependency_tree_durable(),
        })
    }

    pub fn get_instance_by_context_id(&self, context_id: &ContextId) -> Option<Instance> {
        let key = self.effective_context(context_id).id;
        match self.values.lock().get(&key) {
            Some(InstanceSlot::Resolved(instance)) => Some(instance.clone()),
            _ => None,
        }
    }

    /// Static instance, only set once the provider is resolved
    pub fn instance(&self) -> Option<Instance> {
        self.get_instance_by_context_id(&ContextId::STATIC)
    }

    /// Stores a value for a context, used for per request values
    pub fn set_instance_by_context_id(&self, context_id: &ContextId, instance: Instance) {
        self.values
            .lock()
            .insert(context_id.id, InstanceSlot::Resolved(instance));
    }

    pub fn is_resolved(&self, context_id: &ContextId) -> bool {
        self.get_instance_by_context_id(context_id).is_some()
    }

    /// Returns the slot for `key`, or installs the pending future returned by `install`
    ///
    /// The lookup and the installation happen under one lock, so a slot is only ever
    /// constructed once.
    pub(crate) fn slot_or_install(
        &self,
        key: u64,
        install: impl FnOnce() -> PendingInstance,
    ) -> InstanceSlot {
        let mut values = self.values.lock();
        values
            .entry(key)
            .or_insert_with(|| InstanceSlot::Pending(install()))
            .clone()
    }

    /// Stores the outcome of a construction, failed constructions free the slot again
    pub(crate) fn settle(&self, key: u64, result: &Result<Instance, InjectError>) {
        let mut values = self.values.lock();
        match result {
            Ok(instance) => {
                values.insert(key, InstanceSlot::Resolved(instance.clone()));
            }
            Err(_) => {
                if matches!(values.get(&key), Some(InstanceSlot::Pending(_))) {
                    values.remove(&key);
                }
            }
        }
    }

    /// Drops the instance stored for a finished request
    ///
    /// The static slot and durable parent slots outlive every request.
    pub fn release(&self, context_id: &ContextId) -> bool {
        if context_id.is_static() || context_id.is_durable() {
            return false;
        }
        self.values.lock().remove(&context_id.id).is_some()
    }

    pub fn context_count(&self) -> usize {
        self.values.lock().len()
    }
}

impl fmt::Debug for InstanceWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceWrapper")
            .field("id", &self.id)
            .field("token", &self.token)
            .field("scope", &self.scope)
            .field("durable", &self.durable)
            .field("subtype", &self.subtype)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use super::*;
    use crate::{
        context_id::DURABLE_CONTEXT_BIT,
        token::{IdMode, TokenFactory},
    };

    fn host() -> ModuleToken {
        TokenFactory::new(IdMode::Deterministic).create(TypeInfo::of::<()>(), None)
    }

    #[test]
    fn values_are_resolved_at_the_static_context() {
        let wrapper = InstanceWrapper::new(Provider::use_value("PORT", 8080_u16), host(), None);
        let instance = wrapper.instance().unwrap();
        assert_eq!(*instance.downcast::<u16>().unwrap(), 8080);
        assert!(wrapper.is_value());
        assert!(wrapper.is_dependency_tree_static());
    }

    #[test]
    fn request_scoped_slots_are_released() {
        let provider = Provider::use_factory("SESSION", vec![], |_| async { Ok(1_u8) })
            .scope(Scope::Request);
        let wrapper = InstanceWrapper::new(provider, host(), None);
        wrapper.tree_static_cell().set(false).unwrap();
        let context = ContextId::new(7);
        assert!(!wrapper.is_resolved(&context));

        wrapper.set_instance_by_context_id(&context, Instance::new(1_u8));
        assert!(wrapper.is_resolved(&context));
        assert!(!wrapper.is_resolved(&ContextId::new(8)));
        assert!(wrapper.release(&context));
        assert!(!wrapper.is_resolved(&context));
    }

    #[test]
    fn durable_slots_outlive_requests() {
        let provider = Provider::use_factory("TENANT_DB", vec![], |_| async { Ok(1_u8) })
            .scope(Scope::Request);
        let wrapper = InstanceWrapper::new(provider, host(), None);
        let parent = ContextId::new(DURABLE_CONTEXT_BIT | 2);
        wrapper.set_instance_by_context_id(&parent, Instance::new(1_u8));

        assert!(!wrapper.release(&ContextId::new(2)));
        assert!(!wrapper.release(&parent));
        assert_eq!(wrapper.context_count(), 1);
    }

    #[test]
    fn failed_constructions_free_their_slot() {
        let provider = Provider::use_factory("FLAKY", vec![], |_| async { Ok(1_u8) });
        let wrapper = InstanceWrapper::new(provider, host(), None);
        let pending = async { Ok(Instance::new(1_u8)) }.boxed().shared();
        assert!(matches!(
            wrapper.slot_or_install(STATIC_CONTEXT_ID, || pending),
            InstanceSlot::Pending(_)
        ));
        wrapper.settle(
            STATIC_CONTEXT_ID,
            &Err(InjectError::UnknownElement("FLAKY".into())),
        );
        assert_eq!(wrapper.context_count(), 0);
    }
}
