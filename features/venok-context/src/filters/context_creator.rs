use venok_di::{ContextId, InjectError, ModuleToken};

use super::{ExceptionFilter, ExceptionsHandler};
use crate::{enhancer::EnhancerResolver, metadata::EnhancerMetadata};

/// Builds the exceptions handler of a handler
///
/// The nearest filters are tried first: the handler's, then the class's, then the
/// global ones.
#[derive(Clone)]
pub struct FiltersContextCreator {
    resolver: EnhancerResolver,
}

impl FiltersContextCreator {
    pub fn new(resolver: EnhancerResolver) -> Self {
        FiltersContextCreator { resolver }
    }

    pub async fn create(
        &self,
        class: &EnhancerMetadata,
        handler: &EnhancerMetadata,
        module: &ModuleToken,
        context_id: &ContextId,
    ) -> Result<ExceptionsHandler, InjectError> {
        let mut filters = self
            .resolver
            .resolve(&handler.filters, module, context_id)
            .await?;
        filters.extend(self.resolver.resolve(&class.filters, module, context_id).await?);
        filters.extend(
            self.resolver
                .global::<dyn ExceptionFilter>(context_id)
                .await?,
        );
        Ok(ExceptionsHandler::new(filters))
    }
}
