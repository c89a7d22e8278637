use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use tracing::debug;
use venok_di::{Injectable, Instance};

use crate::errors::ConfigError;

/// A registry of configs, one per type
///
/// Registered once at startup through
/// [ConfigModule::for_root](crate::module::ConfigModule::for_root) and read by
/// providers through [Config](crate::config::Config).
#[derive(Clone, Default)]
pub struct ConfigProvider {
    configs: HashMap<TypeId, Instance>,
}

impl ConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The config of type `T`, if registered
    pub fn get_config<T: Injectable>(&self) -> Option<Arc<T>> {
        self.configs
            .get(&TypeId::of::<T>())
            .and_then(|config| config.downcast::<T>().ok())
    }

    /// The config of type `T`, failing if it is not registered
    pub fn require<T: Injectable>(&self) -> Result<Arc<T>, ConfigError> {
        self.get_config()
            .ok_or(ConfigError::Missing(type_name::<T>()))
    }

    /// Registers a config, every type can only be registered once
    pub fn add_config<T: Injectable>(&mut self, config: T) -> Result<&mut Self, ConfigError> {
        let type_id = TypeId::of::<T>();
        if self.configs.contains_key(&type_id) {
            return Err(ConfigError::AlreadyRegistered(type_name::<T>()));
        }
        debug!("Registering config {}", type_name::<T>());
        self.configs.insert(type_id, Instance::new(config));
        Ok(self)
    }

    /// Registers `config` if it is `Some`
    pub fn maybe_add_config<T: Injectable>(
        &mut self,
        config: Option<T>,
    ) -> Result<&mut Self, ConfigError> {
        match config {
            Some(config) => self.add_config(config),
            None => Ok(self),
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl fmt::Debug for ConfigProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.configs.values().map(|config| config.info.type_name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct DatabaseConfig {
        url: &'static str,
    }

    #[test]
    fn configs_are_stored_per_type() {
        let mut provider = ConfigProvider::new();
        provider
            .add_config(DatabaseConfig { url: "postgres://" })
            .unwrap()
            .add_config(8080_u16)
            .unwrap()
            .maybe_add_config::<bool>(None)
            .unwrap();

        assert_eq!(provider.len(), 2);
        assert_eq!(provider.get_config::<DatabaseConfig>().unwrap().url, "postgres://");
        assert_eq!(*provider.require::<u16>().unwrap(), 8080);
        assert!(provider.get_config::<bool>().is_none());
        assert_eq!(
            provider.require::<bool>().unwrap_err(),
            ConfigError::Missing("bool")
        );
    }

    #[test]
    fn configs_cannot_be_registered_twice() {
        let mut provider = ConfigProvider::new();
        provider.add_config(1_u8).unwrap();
        assert_eq!(
            provider.add_config(2_u8).unwrap_err(),
            ConfigError::AlreadyRegistered("u8")
        );
        assert_eq!(*provider.require::<u8>().unwrap(), 1);
    }
}
