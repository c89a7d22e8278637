use std::{fmt, sync::Arc};

use venok_di::{ContextId, Instance, TypeInfo};

/// Transport a call comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextType(pub &'static str);

impl ContextType {
    pub const NATIVE: ContextType = ContextType("native");
    pub const HTTP: ContextType = ContextType("http");
    pub const WS: ContextType = ContextType("ws");
    pub const RPC: ContextType = ContextType("rpc");
}

impl Default for ContextType {
    fn default() -> Self {
        ContextType::NATIVE
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The method a call is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRef {
    pub class: TypeInfo,
    pub method: &'static str,
}

impl fmt::Display for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.class.short_name(), self.method)
    }
}

/// Access to the raw arguments of a call
pub trait ArgumentsHost: Send + Sync {
    fn args(&self) -> &[Instance];

    fn arg(&self, index: usize) -> Option<&Instance> {
        self.args().get(index)
    }

    fn context_type(&self) -> ContextType;
}

/// Everything guards, interceptors and filters know about one call
///
/// Cheap to clone, immutable once built.
#[derive(Clone)]
pub struct ExecutionContext {
    args: Arc<[Instance]>,
    handler: HandlerRef,
    context_type: ContextType,
    context_id: ContextId,
}

impl ExecutionContext {
    pub fn new(args: impl Into<Arc<[Instance]>>, handler: HandlerRef) -> Self {
        ExecutionContext {
            args: args.into(),
            handler,
            context_type: ContextType::NATIVE,
            context_id: ContextId::STATIC,
        }
    }

    pub fn with_type(mut self, context_type: ContextType) -> Self {
        self.context_type = context_type;
        self
    }

    pub fn with_context_id(mut self, context_id: ContextId) -> Self {
        self.context_id = context_id;
        self
    }

    /// The class declaring the handler
    pub fn class(&self) -> TypeInfo {
        self.handler.class
    }

    pub fn handler(&self) -> HandlerRef {
        self.handler
    }

    /// Context the request scoped instances of this call live in
    pub fn context_id(&self) -> &ContextId {
        &self.context_id
    }

    /// The argument at `index`, downcast to `T`
    pub fn arg_as<T: Send + Sync + 'static>(&self, index: usize) -> Option<&T> {
        self.arg(index).and_then(Instance::downcast_ref::<T>)
    }
}

impl ArgumentsHost for ExecutionContext {
    fn args(&self) -> &[Instance] {
        &self.args
    }

    fn context_type(&self) -> ContextType {
        self.context_type
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("handler", &self.handler)
            .field("type", &self.context_type)
            .field("args", &self.args.len())
            .field("context_id", &self.context_id.id)
            .finish()
    }
}
