use std::{any::type_name, sync::Arc};

use parking_lot::RwLock;
use tracing::debug;
use venok_di::{Container, InjectError, InstanceWrapper, Scope};

use crate::{
    enhancer::EnhancerKind, filters::ExceptionFilter, guards::Guard, interceptors::Interceptor,
    pipes::PipeTransform,
};

/// Global enhancers of one kind
pub struct GlobalEnhancers<T: ?Sized> {
    instances: Vec<Arc<T>>,
    /// Request or transient scoped enhancers, resolved for every call
    scoped: Vec<Arc<InstanceWrapper>>,
}

impl<T: ?Sized> GlobalEnhancers<T> {
    pub fn instances(&self) -> &[Arc<T>] {
        &self.instances
    }

    pub fn scoped(&self) -> &[Arc<InstanceWrapper>] {
        &self.scoped
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.scoped.is_empty()
    }
}

impl<T: ?Sized> Default for GlobalEnhancers<T> {
    fn default() -> Self {
        GlobalEnhancers {
            instances: Vec::new(),
            scoped: Vec::new(),
        }
    }
}

/// Application wide settings of the call pipeline
#[derive(Default)]
pub struct ApplicationConfig {
    pub(crate) guards: RwLock<GlobalEnhancers<dyn Guard>>,
    pub(crate) interceptors: RwLock<GlobalEnhancers<dyn Interceptor>>,
    pub(crate) pipes: RwLock<GlobalEnhancers<dyn PipeTransform>>,
    pub(crate) filters: RwLock<GlobalEnhancers<dyn ExceptionFilter>>,
}

impl ApplicationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_global_guards(&self, guards: impl IntoIterator<Item = Arc<dyn Guard>>) {
        self.add_global::<dyn Guard>(guards);
    }

    pub fn use_global_interceptors(
        &self,
        interceptors: impl IntoIterator<Item = Arc<dyn Interceptor>>,
    ) {
        self.add_global::<dyn Interceptor>(interceptors);
    }

    pub fn use_global_pipes(&self, pipes: impl IntoIterator<Item = Arc<dyn PipeTransform>>) {
        self.add_global::<dyn PipeTransform>(pipes);
    }

    pub fn use_global_filters(&self, filters: impl IntoIterator<Item = Arc<dyn ExceptionFilter>>) {
        self.add_global::<dyn ExceptionFilter>(filters);
    }

    pub fn add_global<T: ?Sized + EnhancerKind>(&self, enhancers: impl IntoIterator<Item = Arc<T>>) {
        T::globals(self).write().instances.extend(enhancers);
    }

    /// Registers a scoped enhancer resolved for every call
    pub fn add_global_scoped<T: ?Sized + EnhancerKind>(&self, wrapper: Arc<InstanceWrapper>) {
        T::globals(self).write().scoped.push(wrapper);
    }

    pub fn global_guards(&self) -> Vec<Arc<dyn Guard>> {
        self.guards.read().instances.clone()
    }

    pub fn global_interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        self.interceptors.read().instances.clone()
    }

    pub fn global_pipes(&self) -> Vec<Arc<dyn PipeTransform>> {
        self.pipes.read().instances.clone()
    }

    pub fn global_filters(&self) -> Vec<Arc<dyn ExceptionFilter>> {
        self.filters.read().instances.clone()
    }

    /// Number of scoped global enhancers of kind `T`
    pub fn scoped_count<T: ?Sized + EnhancerKind>(&self) -> usize {
        T::globals(self).read().scoped.len()
    }

    /// Turns the providers registered under the `APP_*` tokens into global enhancers
    ///
    /// Default scoped ones must be instantiated already and are added as instances,
    /// request and transient scoped ones are resolved per call.
    pub fn apply_application_providers(&self, container: &Container) -> Result<(), InjectError> {
        for provider in container.application_providers() {
            let module = container.module(&provider.module)?;
            let wrappers = match provider.scope {
                Scope::Default => module.providers(),
                Scope::Request | Scope::Transient => module.injectables(),
            };
            let wrapper = wrappers
                .get(&provider.token)
                .cloned()
                .ok_or_else(|| InjectError::UnknownElement(provider.token.name()))?;
            debug!("Applying {} as global {:?}", provider.token, provider.subtype);

            match provider.subtype {
                venok_di::EnhancerSubtype::Guard => self.apply_one::<dyn Guard>(wrapper)?,
                venok_di::EnhancerSubtype::Interceptor => {
                    self.apply_one::<dyn Interceptor>(wrapper)?
                }
                venok_di::EnhancerSubtype::Pipe => self.apply_one::<dyn PipeTransform>(wrapper)?,
                venok_di::EnhancerSubtype::Filter => {
                    self.apply_one::<dyn ExceptionFilter>(wrapper)?
                }
            }
        }
        Ok(())
    }

    fn apply_one<T: ?Sized + EnhancerKind>(
        &self,
        wrapper: Arc<InstanceWrapper>,
    ) -> Result<(), InjectError> {
        if wrapper.scope() != Scope::Default || !wrapper.is_dependency_tree_static() {
            self.add_global_scoped::<T>(wrapper);
            return Ok(());
        }
        let instance = wrapper
            .instance()
            .ok_or_else(|| InjectError::UnknownElement(wrapper.name().to_string()))?;
        let enhancer = instance
            .downcast::<Arc<T>>()
            .map_err(|actual_type| InjectError::DowncastFailed {
                required_type: type_name::<Arc<T>>(),
                actual_type,
            })?;
        self.add_global::<T>([(*enhancer).clone()]);
        Ok(())
    }
}
