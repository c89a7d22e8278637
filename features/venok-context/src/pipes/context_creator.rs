use std::sync::Arc;

use venok_di::{ContextId, InjectError, ModuleToken};

use super::PipeTransform;
use crate::{
    enhancer::{EnhancerRef, EnhancerResolver},
    metadata::EnhancerMetadata,
};

/// Collects the pipes of a handler
///
/// Pipes closest to the argument run first: the parameter's own pipes, then the
/// handler's, then the class's, then the global ones.
#[derive(Clone)]
pub struct PipesContextCreator {
    resolver: EnhancerResolver,
}

impl PipesContextCreator {
    pub fn new(resolver: EnhancerResolver) -> Self {
        PipesContextCreator { resolver }
    }

    /// Pipes shared by every parameter of the handler
    pub async fn create(
        &self,
        class: &EnhancerMetadata,
        handler: &EnhancerMetadata,
        module: &ModuleToken,
        context_id: &ContextId,
    ) -> Result<Vec<Arc<dyn PipeTransform>>, InjectError> {
        let mut pipes = self
            .resolver
            .resolve(&handler.pipes, module, context_id)
            .await?;
        pipes.extend(self.resolver.resolve(&class.pipes, module, context_id).await?);
        pipes.extend(
            self.resolver
                .global::<dyn PipeTransform>(context_id)
                .await?,
        );
        Ok(pipes)
    }

    /// Pipes declared on a single parameter
    pub async fn create_for_param(
        &self,
        pipes: &[EnhancerRef<dyn PipeTransform>],
        module: &ModuleToken,
        context_id: &ContextId,
    ) -> Result<Vec<Arc<dyn PipeTransform>>, InjectError> {
        self.resolver.resolve(pipes, module, context_id).await
    }
}
