use std::{
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock,
    },
};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::{
    token::{IdMode, Token},
    types::{Injectable, Instance},
};

/// Id of the context without a request
pub const STATIC_CONTEXT_ID: u64 = 1;

/// Set on every durable parent id and never on a request id
pub const DURABLE_CONTEXT_BIT: u64 = 1 << 63;

/// What a [ContextIdResolver] knows about the provider being resolved
#[derive(Debug, Clone)]
pub struct HostComponentInfo {
    pub token: Token,
    pub is_tree_durable: bool,
}

/// Picks the context a provider is actually stored under, `None` keeps the request's own
pub type ContextIdResolver = Arc<dyn Fn(&HostComponentInfo) -> Option<ContextId> + Send + Sync>;

/// Identity of one inbound call
///
/// Request scoped instances are stored per id. A context carrying a resolver may
/// redirect durable providers to a shared parent context.
#[derive(Clone)]
pub struct ContextId {
    pub id: u64,
    pub payload: Option<Instance>,
    resolver: Option<ContextIdResolver>,
}

impl ContextId {
    pub const STATIC: ContextId = ContextId {
        id: STATIC_CONTEXT_ID,
        payload: None,
        resolver: None,
    };

    pub fn new(id: u64) -> Self {
        ContextId {
            id,
            payload: None,
            resolver: None,
        }
    }

    pub fn with_payload(mut self, payload: Instance) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_resolver(mut self, resolver: ContextIdResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn is_static(&self) -> bool {
        self.id == STATIC_CONTEXT_ID
    }

    /// True for the shared parent context of a durable partition
    pub fn is_durable(&self) -> bool {
        self.id & DURABLE_CONTEXT_BIT != 0
    }

    /// The context a provider with the given identity is stored under
    pub fn resolve_for(&self, host: &HostComponentInfo) -> ContextId {
        self.resolver
            .as_ref()
            .and_then(|resolver| resolver(host))
            .unwrap_or_else(|| self.clone())
    }
}

impl PartialEq for ContextId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ContextId {}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextId")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .field("durable", &self.resolver.is_some())
            .finish()
    }
}

/// Derives durable parent contexts from requests
pub trait ContextIdStrategy: Send + Sync {
    /// Returns a resolver for the given request, `None` disables durability for it
    fn attach(&self, context_id: &ContextId, request: &Instance) -> Option<ContextIdResolver>;
}

/// An inbound call as seen by the container
///
/// The context id is minted on first use and reused for every later lookup of the
/// same request.
pub struct InboundRequest {
    payload: Instance,
    context_id: OnceLock<ContextId>,
}

impl InboundRequest {
    pub fn new<T: Injectable>(payload: T) -> Self {
        Self::from_instance(Instance::new(payload))
    }

    pub fn from_instance(payload: Instance) -> Self {
        InboundRequest {
            payload,
            context_id: OnceLock::new(),
        }
    }

    pub fn payload(&self) -> &Instance {
        &self.payload
    }

    pub fn context_id(&self) -> Option<&ContextId> {
        self.context_id.get()
    }
}

/// Mints context ids
///
/// Request ids and durable parent ids come from disjoint ranges, so ending a request
/// never touches a durable slot.
pub struct ContextIdFactory {
    mode: IdMode,
    counter: AtomicU64,
    durable: bool,
    strategy: Option<Arc<dyn ContextIdStrategy>>,
}

impl ContextIdFactory {
    pub fn new(mode: IdMode) -> Self {
        ContextIdFactory {
            mode,
            counter: AtomicU64::new(STATIC_CONTEXT_ID + 1),
            durable: false,
            strategy: None,
        }
    }

    /// Factory of durable parent ids
    fn durable(mode: IdMode) -> Self {
        ContextIdFactory {
            durable: true,
            ..Self::new(mode)
        }
    }

    pub fn apply_strategy(&mut self, strategy: Arc<dyn ContextIdStrategy>) {
        self.strategy = Some(strategy);
    }

    pub fn create(&self) -> ContextId {
        ContextId::new(self.next_id())
    }

    /// The id bound to `request`, created on first call
    ///
    /// The second value is true if the id was created by this call.
    pub fn get_by_request(&self, request: &InboundRequest) -> (ContextId, bool) {
        let mut created = false;
        let context_id = request.context_id.get_or_init(|| {
            created = true;
            let context_id = self.create().with_payload(request.payload.clone());
            match self
                .strategy
                .as_ref()
                .and_then(|strategy| strategy.attach(&context_id, &request.payload))
            {
                Some(resolver) => context_id.with_resolver(resolver),
                None => context_id,
            }
        });
        (context_id.clone(), created)
    }

    fn next_id(&self) -> u64 {
        loop {
            let raw = match self.mode {
                IdMode::Deterministic => self.counter.fetch_add(1, Ordering::Relaxed),
                IdMode::Random => Uuid::new_v4().as_u64_pair().0,
            };
            let id = match self.durable {
                true => raw | DURABLE_CONTEXT_BIT,
                false => raw & !DURABLE_CONTEXT_BIT,
            };
            if id != STATIC_CONTEXT_ID {
                break id;
            }
        }
    }
}

/// Durable strategy sharing one context per partition key, e.g. per tenant
pub struct DurablePartitions<K> {
    key: Box<dyn Fn(&Instance) -> Option<K> + Send + Sync>,
    factory: ContextIdFactory,
    partitions: Mutex<HashMap<K, ContextId>>,
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> DurablePartitions<K> {
    pub fn new(mode: IdMode, key: impl Fn(&Instance) -> Option<K> + Send + Sync + 'static) -> Self {
        DurablePartitions {
            key: Box::new(key),
            factory: ContextIdFactory::durable(mode),
            partitions: Mutex::new(HashMap::new()),
        }
    }

    pub fn partition(&self, key: K, payload: &Instance) -> ContextId {
        self.partitions
            .lock()
            .entry(key)
            .or_insert_with(|| self.factory.create().with_payload(payload.clone()))
            .clone()
    }
}

impl<K: Eq + Hash + Clone + Send + Sync + 'static> ContextIdStrategy for DurablePartitions<K> {
    fn attach(&self, _: &ContextId, request: &Instance) -> Option<ContextIdResolver> {
        let key = (self.key)(request)?;
        let durable = self.partition(key, request);
        Some(Arc::new(move |host: &HostComponentInfo| {
            host.is_tree_durable.then(|| durable.clone())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_keep_their_context_id() {
        let factory = ContextIdFactory::new(IdMode::Deterministic);
        let request = InboundRequest::new("GET /cats");
        let (first, created) = factory.get_by_request(&request);
        let (second, created_again) = factory.get_by_request(&request);
        assert!(created);
        assert!(!created_again);
        assert_eq!(first, second);
        assert!(!first.is_static());
        assert_ne!(first, factory.create());
    }

    #[test]
    fn random_ids_never_collide_with_the_static_id() {
        let factory = ContextIdFactory::new(IdMode::Random);
        for _ in 0..64 {
            assert!(!factory.create().is_static());
        }
    }

    #[test]
    fn durable_partitions_share_a_parent_per_key() {
        let strategy = DurablePartitions::new(IdMode::Deterministic, |request: &Instance| {
            request.downcast_ref::<&str>().map(|tenant| tenant.to_string())
        });
        let mut factory = ContextIdFactory::new(IdMode::Deterministic);
        factory.apply_strategy(Arc::new(strategy));

        let (a, _) = factory.get_by_request(&InboundRequest::new("tenant-a"));
        let (b, _) = factory.get_by_request(&InboundRequest::new("tenant-a"));
        assert_ne!(a, b);

        let durable = HostComponentInfo {
            token: Token::named("TENANT_DB"),
            is_tree_durable: true,
        };
        let plain = HostComponentInfo {
            token: Token::named("REQUEST_LOGGER"),
            is_tree_durable: false,
        };
        assert_eq!(a.resolve_for(&durable), b.resolve_for(&durable));
        assert_eq!(a.resolve_for(&plain), a);
    }

    #[test]
    fn durable_parents_never_share_ids_with_requests() {
        let strategy = DurablePartitions::new(IdMode::Deterministic, |request: &Instance| {
            request.downcast_ref::<&str>().map(|tenant| tenant.to_string())
        });
        let mut factory = ContextIdFactory::new(IdMode::Deterministic);
        factory.apply_strategy(Arc::new(strategy));

        let (tenant, _) = factory.get_by_request(&InboundRequest::new("tenant-a"));
        let keyless = factory.create();
        let durable = HostComponentInfo {
            token: Token::named("TENANT_DB"),
            is_tree_durable: true,
        };
        let parent = tenant.resolve_for(&durable);

        assert!(parent.is_durable());
        assert!(!tenant.is_durable());
        assert!(!keyless.is_durable());
        assert_ne!(parent, keyless);
        assert_ne!(parent, tenant);
        assert_eq!(keyless.resolve_for(&durable), keyless);
    }

    #[test]
    fn random_request_ids_stay_out_of_the_durable_range() {
        let requests = ContextIdFactory::new(IdMode::Random);
        let parents = ContextIdFactory::durable(IdMode::Random);
        for _ in 0..64 {
            assert!(!requests.create().is_durable());
            assert!(parents.create().is_durable());
        }
    }
}
