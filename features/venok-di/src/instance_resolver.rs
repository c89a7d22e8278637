use std::sync::Arc;

use futures::future::try_join_all;
use indexmap::IndexMap;

use crate::{
    container::Container,
    context_id::ContextId,
    errors::InjectError,
    injector::Injector,
    instance_wrapper::InstanceWrapper,
    token::{ModuleToken, Token},
    types::{Instance, Scope},
};

/// A wrapper together with the module it is registered in
#[derive(Debug, Clone)]
pub struct InstanceLink {
    pub token: Token,
    pub module: ModuleToken,
    pub wrapper: Arc<InstanceWrapper>,
}

/// Every wrapper of the application indexed by token
///
/// A token registered in several modules has one link per module, in registration
/// order.
pub struct InstanceLinksHost {
    links: IndexMap<Token, Vec<InstanceLink>>,
}

impl InstanceLinksHost {
    pub(crate) fn new(container: &Container) -> Self {
        let mut links: IndexMap<Token, Vec<InstanceLink>> = IndexMap::new();
        for (module_token, module) in container.modules() {
            for (token, wrapper) in module
                .providers()
                .iter()
                .chain(module.controllers())
                .chain(module.injectables())
            {
                links.entry(token.clone()).or_default().push(InstanceLink {
                    token: token.clone(),
                    module: module_token.clone(),
                    wrapper: wrapper.clone(),
                });
            }
        }
        InstanceLinksHost { links }
    }

    /// The last registration of `token`, or the first one inside `module`
    pub fn get(&self, token: &Token, module: Option<&ModuleToken>) -> Result<&InstanceLink, InjectError> {
        let links = self.all(token)?;
        let link = match module {
            Some(module) => links.iter().find(|link| link.module == *module),
            None => links.last(),
        };
        link.ok_or_else(|| InjectError::UnknownElement(token.name()))
    }

    /// Every registration of `token`, restricted to `module` if given
    pub fn get_each(
        &self,
        token: &Token,
        module: Option<&ModuleToken>,
    ) -> Result<Vec<&InstanceLink>, InjectError> {
        let links = self
            .all(token)?
            .iter()
            .filter(|link| module.map_or(true, |module| link.module == *module))
            .collect::<Vec<_>>();
        if links.is_empty() {
            return Err(InjectError::UnknownElement(token.name()));
        }
        Ok(links)
    }

    fn all(&self, token: &Token) -> Result<&[InstanceLink], InjectError> {
        self.links
            .get(token)
            .map(Vec::as_slice)
            .ok_or_else(|| InjectError::UnknownElement(token.name()))
    }
}

/// Scope a token behaves with when resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrospectionResult {
    pub scope: Scope,
}

/// Static instance of a link, fails for providers which have to be resolved per context
fn pluck_static(link: &InstanceLink) -> Result<Instance, InjectError> {
    let wrapper = &link.wrapper;
    if wrapper.scope() != Scope::Default || !wrapper.is_dependency_tree_static() {
        let scope = match wrapper.scope() {
            Scope::Default => Scope::Request,
            scope => scope,
        };
        return Err(InjectError::InvalidClassScope {
            name: link.token.name(),
            scope,
        });
    }
    wrapper
        .instance()
        .ok_or_else(|| InjectError::UnknownElement(link.token.name()))
}

pub(crate) fn find(
    container: &Container,
    token: &Token,
    module: Option<&ModuleToken>,
) -> Result<Instance, InjectError> {
    pluck_static(container.instance_links().get(token, module)?)
}

pub(crate) fn find_each(
    container: &Container,
    token: &Token,
    module: Option<&ModuleToken>,
) -> Result<Vec<Instance>, InjectError> {
    container
        .instance_links()
        .get_each(token, module)?
        .into_iter()
        .map(pluck_static)
        .collect()
}

async fn resolve_link(
    injector: &Injector,
    link: &InstanceLink,
    context_id: &ContextId,
) -> Result<Instance, InjectError> {
    if link.wrapper.is_dependency_tree_static() && !link.wrapper.is_transient() {
        if let Some(instance) = link.wrapper.instance() {
            return Ok(instance);
        }
    }
    injector
        .load_instance(link.wrapper.clone(), context_id.clone())
        .await
}

/// Resolves `token` for a context, static providers short circuit to their instance
pub(crate) async fn resolve_per_context(
    container: &Container,
    injector: &Injector,
    token: &Token,
    module: Option<&ModuleToken>,
    context_id: &ContextId,
) -> Result<Instance, InjectError> {
    let link = container.instance_links().get(token, module)?;
    resolve_link(injector, link, context_id).await
}

pub(crate) async fn resolve_each_per_context(
    container: &Container,
    injector: &Injector,
    token: &Token,
    module: Option<&ModuleToken>,
    context_id: &ContextId,
) -> Result<Vec<Instance>, InjectError> {
    let links = container.instance_links().get_each(token, module)?;
    try_join_all(
        links
            .into_iter()
            .map(|link| resolve_link(injector, link, context_id)),
    )
    .await
}

pub(crate) fn introspect(
    container: &Container,
    token: &Token,
    module: Option<&ModuleToken>,
) -> Result<IntrospectionResult, InjectError> {
    let link = container.instance_links().get(token, module)?;
    let scope = if !link.wrapper.is_dependency_tree_static() {
        Scope::Request
    } else if link.wrapper.is_transient() {
        Scope::Transient
    } else {
        Scope::Default
    };
    Ok(IntrospectionResult { scope })
}
