use std::sync::Arc;

use venok_di::{ContextId, InjectError, ModuleToken};

use super::Interceptor;
use crate::{enhancer::EnhancerResolver, metadata::EnhancerMetadata};

/// Collects the interceptors of a handler, global ones wrap the others
#[derive(Clone)]
pub struct InterceptorsContextCreator {
    resolver: EnhancerResolver,
}

impl InterceptorsContextCreator {
    pub fn new(resolver: EnhancerResolver) -> Self {
        InterceptorsContextCreator { resolver }
    }

    pub async fn create(
        &self,
        class: &EnhancerMetadata,
        handler: &EnhancerMetadata,
        module: &ModuleToken,
        context_id: &ContextId,
    ) -> Result<Vec<Arc<dyn Interceptor>>, InjectError> {
        self.resolver
            .collect(
                &[class.interceptors.as_slice(), handler.interceptors.as_slice()],
                module,
                context_id,
            )
            .await
    }
}
