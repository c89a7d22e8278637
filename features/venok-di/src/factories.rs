use std::{any::type_name, future::Future, sync::Arc};

use futures::{future::BoxFuture, FutureExt};

use crate::{
    errors::InjectError,
    provider::{PropertyDependency, Provider},
    resolver::ResolveAll,
    types::{DynError, Injectable, Instance, ScopeOptions},
};

/// Future produced by a type erased constructor
pub type ConstructFuture = BoxFuture<'static, Result<Instance, DynError>>;

/// Type erased constructor, receives the resolved dependencies in declaration order
pub type ConstructFn = Arc<dyn Fn(Args) -> ConstructFuture + Send + Sync>;

/// A type the injector knows how to construct
///
/// The dependencies are declared through [Class::Dependencies], a tuple of
/// [Resolver](crate::resolver::Resolver)s. They are resolved depth first in declaration
/// order and handed to [Class::construct].
///
/// ```ignore
/// struct CatsService {
///     repository: Arc<CatsRepository>,
/// }
///
/// impl Class for CatsService {
///     type Dependencies = (Arc<CatsRepository>,);
///
///     async fn construct((repository,): Self::Dependencies) -> Result<Self, DynError> {
///         Ok(CatsService { repository })
///     }
/// }
/// ```
pub trait Class: Injectable + Sized {
    type Dependencies: ResolveAll;

    /// Scope used when the class is registered without an explicit scope
    fn scope() -> ScopeOptions {
        ScopeOptions::DEFAULT
    }

    /// Dependencies assigned after construction through [Class::inject_property]
    fn properties() -> Vec<PropertyDependency> {
        Vec::new()
    }

    /// Constructs a new instance from its resolved dependencies
    fn construct(
        dependencies: Self::Dependencies,
    ) -> impl Future<Output = Result<Self, DynError>> + Send;

    /// Assigns a property dependency, `None` if an optional property was not found
    fn inject_property(
        &mut self,
        key: &'static str,
        value: Option<Instance>,
    ) -> Result<(), DynError> {
        let _ = (key, value);
        Ok(())
    }

    /// Enhancers (guards, interceptors, ...) referenced by this class
    ///
    /// They are registered as injectables of the module declaring the class.
    fn injectables() -> Vec<Provider> {
        Vec::new()
    }
}

/// Erases the constructor of a [Class]
pub(crate) fn class_constructor<T: Class>() -> ConstructFn {
    Arc::new(|mut args: Args| {
        async move {
            let dependencies = T::Dependencies::from_args(&mut args)?;
            let mut instance = T::construct(dependencies).await?;
            for (key, value) in args.take_properties() {
                instance.inject_property(key, value)?;
            }
            Ok::<_, DynError>(Instance::new(instance))
        }
        .boxed()
    })
}

/// Resolved dependencies of a provider
pub struct Args {
    requester: String,
    values: Vec<Option<Instance>>,
    properties: Vec<(&'static str, Option<Instance>)>,
}

impl Args {
    pub(crate) fn new(
        requester: String,
        values: Vec<Option<Instance>>,
        properties: Vec<(&'static str, Option<Instance>)>,
    ) -> Self {
        Args {
            requester,
            values,
            properties,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Name of the provider the arguments are resolved for
    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn instance(&self, index: usize) -> Option<&Instance> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// The dependency at `index`, downcast to `T`
    pub fn get<T: Injectable>(&self, index: usize) -> Result<Arc<T>, InjectError> {
        self.optional(index)?.ok_or_else(|| {
            InjectError::UnknownElement(format!("argument [{index}] of {}", self.requester))
        })
    }

    /// Like [Args::get], but an unresolved optional dependency is `None`
    pub fn optional<T: Injectable>(&self, index: usize) -> Result<Option<Arc<T>>, InjectError> {
        self.instance(index)
            .map(|instance| {
                instance
                    .downcast::<T>()
                    .map_err(|actual_type| InjectError::DowncastFailed {
                        required_type: type_name::<T>(),
                        actual_type,
                    })
            })
            .transpose()
    }

    pub(crate) fn take(&mut self, index: usize) -> Option<Instance> {
        self.values.get_mut(index).and_then(Option::take)
    }

    pub(crate) fn take_properties(&mut self) -> Vec<(&'static str, Option<Instance>)> {
        std::mem::take(&mut self.properties)
    }
}
