use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

/// All errors must be clone, so boxed errors are shared behind an `Arc` where they are stored
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// We assume that we are using a multithreaded async runtime
/// So anything injectable needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// A type erased, shareable value produced by a provider
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub fn new<ExistingInstance: Injectable>(instance: ExistingInstance) -> Self {
        Instance {
            info: TypeInfo::of::<ExistingInstance>(),
            instance: Arc::new(instance),
        }
    }

    /// Wraps an already shared value without allocating a second time
    pub fn from_arc<ExistingInstance: Injectable>(instance: Arc<ExistingInstance>) -> Self {
        Instance {
            info: TypeInfo::of::<ExistingInstance>(),
            instance,
        }
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }

    pub fn downcast_ref<T: Injectable>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }

    pub fn is<T: Injectable>(&self) -> bool {
        self.instance.is::<T>()
    }

    /// True if both instances point at the same allocation
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Type name with the module paths stripped, `a::b::Cats<c::Dog>` becomes `Cats<Dog>`
    pub fn short_name(&self) -> String {
        let mut out = String::with_capacity(self.type_name.len());
        let mut segment = String::new();
        for ch in self.type_name.chars() {
            match ch {
                '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' => {
                    out.push_str(last_path_segment(&segment));
                    segment.clear();
                    out.push(ch);
                }
                _ => segment.push(ch),
            }
        }
        out.push_str(last_path_segment(&segment));
        out
    }
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Lifetime policy of a provider instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// One instance shared by the whole application
    #[default]
    Default,
    /// One instance per inbound call, keyed by its [ContextId](crate::context_id::ContextId)
    Request,
    /// A new instance for every resolution, never cached
    Transient,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Request => write!(f, "request"),
            Self::Transient => write!(f, "transient"),
        }
    }
}

/// Scope plus durability of a provider
///
/// `durable` only has an effect on request scoped trees. `None` means "inherit from
/// the dependencies", an explicit value overrides that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeOptions {
    pub scope: Scope,
    pub durable: Option<bool>,
}

impl ScopeOptions {
    pub const DEFAULT: ScopeOptions = ScopeOptions {
        scope: Scope::Default,
        durable: None,
    };

    pub const fn new(scope: Scope) -> Self {
        ScopeOptions {
            scope,
            durable: None,
        }
    }

    pub const fn request() -> Self {
        Self::new(Scope::Request)
    }

    pub const fn transient() -> Self {
        Self::new(Scope::Transient)
    }

    pub const fn durable(mut self, durable: bool) -> Self {
        self.durable = Some(durable);
        self
    }
}

impl From<Scope> for ScopeOptions {
    fn from(scope: Scope) -> Self {
        ScopeOptions::new(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod nested {
        pub struct Cats<T>(pub T);
        pub struct Dog;
    }

    #[test]
    fn short_name_strips_paths() {
        let info = TypeInfo::of::<nested::Cats<nested::Dog>>();
        assert_eq!(info.short_name(), "Cats<Dog>");
        assert_eq!(TypeInfo::of::<u32>().to_string(), "u32");
    }

    #[test]
    fn instances_downcast_to_their_type() {
        let instance = Instance::new(42_u64);
        assert_eq!(*instance.downcast::<u64>().unwrap(), 42);
        assert_eq!(instance.downcast::<u32>().unwrap_err(), "u64");
        assert!(instance.ptr_eq(&instance.clone()));
    }
}
