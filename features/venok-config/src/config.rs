use std::{any::type_name, ops::Deref, sync::Arc};

use venok_di::{Dependency, InjectError, Instance, Resolver};

use crate::provider::ConfigProvider;

/// Injects the config of type `T` from the [ConfigProvider]
///
/// ```ignore
/// struct UsersService {
///     database: Arc<DatabaseConfig>,
/// }
///
/// impl Class for UsersService {
///     type Dependencies = (Config<DatabaseConfig>,);
///
///     async fn construct((config,): Self::Dependencies) -> Result<Self, DynError> {
///         Ok(UsersService { database: config.into_inner() })
///     }
/// }
/// ```
///
/// Resolution fails if `ConfigModule::for_root` was not imported or `T` is not registered.
pub struct Config<T> {
    inner: Arc<T>,
}

impl<T> Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Config<T> {
    pub fn inner(&self) -> Arc<T> {
        self.inner.clone()
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T: Send + Sync + 'static> Resolver for Config<T> {
    fn dependency() -> Dependency {
        Dependency::of::<ConfigProvider>()
    }

    fn from_instance(instance: Option<Instance>) -> Result<Self, InjectError> {
        let provider = Arc::<ConfigProvider>::from_instance(instance)?;
        let inner = provider
            .require::<T>()
            .map_err(|error| InjectError::FactoryFailed {
                product: type_name::<Config<T>>().to_string(),
                error: Arc::new(Box::new(error)),
            })?;
        Ok(Config { inner })
    }
}
