use std::{any::type_name, marker::PhantomData, ops::Deref, sync::Arc};

use crate::{
    errors::InjectError,
    provider::{Dependency, REQUEST},
    resolver::{
        arc::{downcast, require},
        Resolver,
    },
    types::{Injectable, Instance},
};

/// A string token usable at the type level
///
/// ```ignore
/// struct ConfigOptions;
/// impl TokenName for ConfigOptions {
///     const NAME: &'static str = "CONFIG_OPTIONS";
/// }
/// ```
pub trait TokenName: Send + 'static {
    const NAME: &'static str;
}

/// Injects the provider registered under the string token `N::NAME`
pub struct Named<N: TokenName, T: Injectable> {
    value: Arc<T>,
    name: PhantomData<N>,
}

impl<N: TokenName, T: Injectable> Named<N, T> {
    pub fn into_inner(self) -> Arc<T> {
        self.value
    }
}

impl<N: TokenName, T: Injectable> Deref for Named<N, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<N: TokenName, T: Injectable> Resolver for Named<N, T> {
    fn dependency() -> Dependency {
        Dependency::new(N::NAME)
    }

    fn from_instance(instance: Option<Instance>) -> Result<Self, InjectError> {
        Ok(Named {
            value: downcast(&require(instance, N::NAME)?)?,
            name: PhantomData,
        })
    }
}

/// Injects the payload of the current context
///
/// Anything depending on it is request scoped implicitly.
pub struct Request<T: Injectable>(pub Arc<T>);

impl<T: Injectable> Deref for Request<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Injectable> Resolver for Request<T> {
    fn dependency() -> Dependency {
        Dependency::new(REQUEST)
    }

    fn from_instance(instance: Option<Instance>) -> Result<Self, InjectError> {
        let instance = require(instance, REQUEST)?;
        downcast::<T>(&instance).map(Request).map_err(|_| InjectError::DowncastFailed {
            required_type: type_name::<T>(),
            actual_type: instance.info.type_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    struct Options;
    impl TokenName for Options {
        const NAME: &'static str = "OPTIONS";
    }

    #[test]
    fn named_resolvers_point_at_string_tokens() {
        assert_eq!(
            Named::<Options, u8>::dependency().token(),
            Some(Token::named("OPTIONS"))
        );
        let named = Named::<Options, u8>::from_instance(Some(Instance::new(7_u8))).unwrap();
        assert_eq!(*named, 7);
    }

    #[test]
    fn request_resolvers_point_at_the_request_token() {
        assert_eq!(
            Request::<String>::dependency().token(),
            Some(Token::named(REQUEST))
        );
    }
}
