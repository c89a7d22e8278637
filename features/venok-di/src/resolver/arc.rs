use std::{any::type_name, sync::Arc};

use crate::{
    errors::InjectError,
    provider::Dependency,
    resolver::Resolver,
    types::{Injectable, Instance},
};

pub(crate) fn downcast<T: Injectable>(instance: &Instance) -> Result<Arc<T>, InjectError> {
    instance
        .downcast::<T>()
        .map_err(|actual_type| InjectError::DowncastFailed {
            required_type: type_name::<T>(),
            actual_type,
        })
}

pub(crate) fn require(instance: Option<Instance>, name: &str) -> Result<Instance, InjectError> {
    instance.ok_or_else(|| InjectError::UnknownElement(name.to_string()))
}

impl<T: Injectable> Resolver for Arc<T> {
    fn dependency() -> Dependency {
        Dependency::of::<T>()
    }

    fn from_instance(instance: Option<Instance>) -> Result<Self, InjectError> {
        downcast(&require(instance, type_name::<T>())?)
    }
}

impl<Resolvable: Resolver> Resolver for Option<Resolvable> {
    fn dependency() -> Dependency {
        // If the type is not registered Option does not fail
        Resolvable::dependency().optional()
    }

    fn from_instance(instance: Option<Instance>) -> Result<Self, InjectError> {
        match instance {
            Some(instance) => Resolvable::from_instance(Some(instance)).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_arcs_accept_missing_instances() {
        assert!(Option::<Arc<u8>>::dependency().is_optional());
        assert!(Option::<Arc<u8>>::from_instance(None).unwrap().is_none());
        assert!(matches!(
            Arc::<u8>::from_instance(None),
            Err(InjectError::UnknownElement(_))
        ));
        let resolved = Arc::<u8>::from_instance(Some(Instance::new(3_u8))).unwrap();
        assert_eq!(*resolved, 3);
    }
}
