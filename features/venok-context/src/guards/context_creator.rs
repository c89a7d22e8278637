use std::sync::Arc;

use venok_di::{ContextId, InjectError, ModuleToken};

use super::Guard;
use crate::{enhancer::EnhancerResolver, metadata::EnhancerMetadata};

/// Collects the guards of a handler
///
/// Global guards run first, then the ones declared on the class, then the ones
/// declared on the handler.
#[derive(Clone)]
pub struct GuardsContextCreator {
    resolver: EnhancerResolver,
}

impl GuardsContextCreator {
    pub fn new(resolver: EnhancerResolver) -> Self {
        GuardsContextCreator { resolver }
    }

    pub async fn create(
        &self,
        class: &EnhancerMetadata,
        handler: &EnhancerMetadata,
        module: &ModuleToken,
        context_id: &ContextId,
    ) -> Result<Vec<Arc<dyn Guard>>, InjectError> {
        self.resolver
            .collect(
                &[class.guards.as_slice(), handler.guards.as_slice()],
                module,
                context_id,
            )
            .await
    }
}
