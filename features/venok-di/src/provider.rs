use std::{fmt, future::Future, sync::Arc};

use futures::FutureExt;

use crate::{
    errors::InjectError,
    factories::{class_constructor, Args, Class, ConstructFn},
    resolver::ResolveAll,
    token::Token,
    types::{DynError, Injectable, Instance, ScopeOptions, TypeInfo},
};

/// Token under which global guards are registered
pub const APP_GUARD: &str = "APP_GUARD";
/// Token under which global interceptors are registered
pub const APP_INTERCEPTOR: &str = "APP_INTERCEPTOR";
/// Token under which global pipes are registered
pub const APP_PIPE: &str = "APP_PIPE";
/// Token under which global exception filters are registered
pub const APP_FILTER: &str = "APP_FILTER";
/// Token of the per context request payload
pub const REQUEST: &str = "REQUEST";

/// Kind of enhancer an injectable is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnhancerSubtype {
    Guard,
    Interceptor,
    Pipe,
    Filter,
}

impl EnhancerSubtype {
    /// The subtype an application provider token stands for
    pub fn from_app_token(token: &Token) -> Option<Self> {
        match token {
            Token::Named(name) => match name.as_ref() {
                APP_GUARD => Some(Self::Guard),
                APP_INTERCEPTOR => Some(Self::Interceptor),
                APP_PIPE => Some(Self::Pipe),
                APP_FILTER => Some(Self::Filter),
                _ => None,
            },
            Token::Type(_) => None,
        }
    }
}

/// What a dependency points at
#[derive(Clone)]
pub enum DependencyTarget {
    Token(Token),
    /// Resolved when the dependency is looked up, `None` is an undefined reference
    Forward(Arc<dyn Fn() -> Option<Token> + Send + Sync>),
}

/// A single dependency of a provider
#[derive(Clone)]
pub struct Dependency {
    target: DependencyTarget,
    optional: bool,
}

impl Dependency {
    pub fn new(token: impl Into<Token>) -> Self {
        Dependency {
            target: DependencyTarget::Token(token.into()),
            optional: false,
        }
    }

    pub fn of<T: 'static + ?Sized>() -> Self {
        Self::new(Token::of::<T>())
    }

    pub fn forward(target: impl Fn() -> Option<Token> + Send + Sync + 'static) -> Self {
        Dependency {
            target: DependencyTarget::Forward(Arc::new(target)),
            optional: false,
        }
    }

    /// An optional dependency resolves to nothing instead of failing when it is unknown
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_forward(&self) -> bool {
        matches!(self.target, DependencyTarget::Forward(_))
    }

    pub fn target(&self) -> &DependencyTarget {
        &self.target
    }

    /// The token this dependency points at, forward references are followed
    pub fn token(&self) -> Option<Token> {
        match &self.target {
            DependencyTarget::Token(token) => Some(token.clone()),
            DependencyTarget::Forward(target) => target(),
        }
    }

    pub fn display_name(&self) -> String {
        match self.token() {
            Some(token) => token.name(),
            None => "undefined".to_string(),
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("token", &self.display_name())
            .field("forward", &self.is_forward())
            .field("optional", &self.optional)
            .finish()
    }
}

/// A dependency assigned after construction
#[derive(Debug, Clone)]
pub struct PropertyDependency {
    pub key: &'static str,
    pub dependency: Dependency,
}

impl PropertyDependency {
    pub fn new(key: &'static str, dependency: Dependency) -> Self {
        PropertyDependency { key, dependency }
    }
}

/// How a provider produces its instance
#[derive(Clone)]
pub(crate) enum ProviderKind {
    Value(Instance),
    Construct(Recipe),
}

#[derive(Clone)]
pub(crate) struct Recipe {
    pub metatype: Option<TypeInfo>,
    pub inject: Vec<Dependency>,
    pub properties: Vec<PropertyDependency>,
    pub construct: ConstructFn,
    pub alias: bool,
}

/// A provider declaration
///
/// Class, value, factory and alias providers are all normalized into a value or a
/// recipe (dependencies plus a type erased constructor).
#[derive(Clone)]
pub struct Provider {
    pub(crate) token: Token,
    pub(crate) scope: ScopeOptions,
    pub(crate) kind: ProviderKind,
    pub(crate) injectables: Vec<Provider>,
    pub(crate) subtype: Option<EnhancerSubtype>,
    fingerprint: Option<String>,
}

impl Provider {
    /// Provides `T` under its own type
    pub fn class<T: Class>() -> Self {
        Self::use_class::<T>(Token::of::<T>())
    }

    /// Provides `T` under another token
    pub fn use_class<T: Class>(token: impl Into<Token>) -> Self {
        Provider {
            token: token.into(),
            scope: T::scope(),
            kind: ProviderKind::Construct(Recipe {
                metatype: Some(TypeInfo::of::<T>()),
                inject: T::Dependencies::dependencies(),
                properties: T::properties(),
                construct: class_constructor::<T>(),
                alias: false,
            }),
            injectables: T::injectables(),
            subtype: None,
            fingerprint: None,
        }
    }

    /// Provides an existing value under its own type
    pub fn value<T: Injectable>(value: T) -> Self {
        Self::use_value(Token::of::<T>(), value)
    }

    pub fn use_value<T: Injectable>(token: impl Into<Token>, value: T) -> Self {
        Self::instance(token, Instance::new(value))
    }

    pub fn instance(token: impl Into<Token>, instance: Instance) -> Self {
        Provider {
            token: token.into(),
            scope: ScopeOptions::DEFAULT,
            kind: ProviderKind::Value(instance),
            injectables: Vec::new(),
            subtype: None,
            fingerprint: None,
        }
    }

    /// Provides the result of an async factory, its dependencies are taken from the
    /// parameter tuple
    pub fn factory<D, T, F, Fut>(token: impl Into<Token>, factory: F) -> Self
    where
        D: ResolveAll,
        T: Injectable,
        F: Fn(D) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DynError>> + Send + 'static,
    {
        let factory = Arc::new(factory);
        let construct: ConstructFn = Arc::new(move |mut args: Args| {
            let factory = factory.clone();
            async move {
                let dependencies = D::from_args(&mut args)?;
                Ok::<_, DynError>(Instance::new(factory(dependencies).await?))
            }
            .boxed()
        });
        Self::recipe(token.into(), D::dependencies(), construct)
    }

    /// Provides the result of an async factory with an explicit `inject` list
    pub fn use_factory<T, F, Fut>(token: impl Into<Token>, inject: Vec<Dependency>, factory: F) -> Self
    where
        T: Injectable,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DynError>> + Send + 'static,
    {
        let factory = Arc::new(factory);
        let construct: ConstructFn = Arc::new(move |args: Args| {
            factory(args).map(|result| result.map(Instance::new)).boxed()
        });
        Self::recipe(token.into(), inject, construct)
    }

    /// Aliases `target`, both tokens share one instance
    pub fn existing(token: impl Into<Token>, target: impl Into<Token>) -> Self {
        let construct: ConstructFn = Arc::new(|mut args: Args| {
            let aliased = args.take(0).ok_or_else(|| {
                InjectError::UnknownElement(format!("aliased provider of {}", args.requester()))
            });
            async move { aliased.map_err(DynError::from) }.boxed()
        });
        let mut provider = Self::recipe(token.into(), vec![Dependency::new(target)], construct);
        if let ProviderKind::Construct(recipe) = &mut provider.kind {
            recipe.alias = true;
        }
        provider
    }

    /// Builds a provider from a raw recipe
    pub fn raw(token: impl Into<Token>, inject: Vec<Dependency>, construct: ConstructFn) -> Self {
        Self::recipe(token.into(), inject, construct)
    }

    fn recipe(token: Token, inject: Vec<Dependency>, construct: ConstructFn) -> Self {
        Provider {
            token,
            scope: ScopeOptions::DEFAULT,
            kind: ProviderKind::Construct(Recipe {
                metatype: None,
                inject,
                properties: Vec::new(),
                construct,
                alias: false,
            }),
            injectables: Vec::new(),
            subtype: None,
            fingerprint: None,
        }
    }

    /// Registers the provider under another token
    pub fn provide(mut self, token: impl Into<Token>) -> Self {
        self.token = token.into();
        self
    }

    pub fn scope(mut self, scope: impl Into<ScopeOptions>) -> Self {
        let durable = self.scope.durable;
        self.scope = scope.into();
        if self.scope.durable.is_none() {
            self.scope.durable = durable;
        }
        self
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.scope.durable = Some(durable);
        self
    }

    /// Overrides the metatype reported in diagnostics
    pub fn metatype(mut self, metatype: TypeInfo) -> Self {
        if let ProviderKind::Construct(recipe) = &mut self.kind {
            recipe.metatype = Some(metatype);
        }
        self
    }

    /// Transforms the produced instance, e.g. to store it behind a trait object
    pub fn map_instance(
        mut self,
        map: impl Fn(Instance) -> Result<Instance, DynError> + Send + Sync + 'static,
    ) -> Self {
        let map = Arc::new(map);
        self.kind = match self.kind {
            ProviderKind::Value(instance) => ProviderKind::Construct(Recipe {
                metatype: Some(instance.info),
                inject: Vec::new(),
                properties: Vec::new(),
                construct: Arc::new(move |_| {
                    let mapped = map(instance.clone());
                    async move { mapped }.boxed()
                }),
                alias: false,
            }),
            ProviderKind::Construct(mut recipe) => {
                let construct = recipe.construct.clone();
                recipe.construct = Arc::new(move |args| {
                    let map = map.clone();
                    let constructed = construct(args);
                    async move { map(constructed.await?) }.boxed()
                });
                ProviderKind::Construct(recipe)
            }
        };
        self
    }

    /// Marks the provider as an enhancer of the given kind
    pub fn enhancer(mut self, subtype: EnhancerSubtype) -> Self {
        self.subtype = Some(subtype);
        self
    }

    pub fn with_injectables(mut self, injectables: Vec<Provider>) -> Self {
        self.injectables.extend(injectables);
        self
    }

    /// Content used to tell dynamic modules apart
    ///
    /// Without a fingerprint values and factories are compared by identity.
    pub fn fingerprint(mut self, fingerprint: &impl fmt::Debug) -> Self {
        self.fingerprint = Some(format!("{fingerprint:?}"));
        self
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn scope_options(&self) -> ScopeOptions {
        self.scope
    }

    pub fn is_value(&self) -> bool {
        matches!(self.kind, ProviderKind::Value(_))
    }

    pub fn subtype(&self) -> Option<EnhancerSubtype> {
        self.subtype
    }

    pub fn injectables(&self) -> &[Provider] {
        &self.injectables
    }

    pub(crate) fn fingerprint_string(&self) -> String {
        let detail = match (&self.fingerprint, &self.kind) {
            (Some(fingerprint), _) => fingerprint.clone(),
            (None, ProviderKind::Value(instance)) => {
                format!("value@{:p}", Arc::as_ptr(&instance.instance))
            }
            (None, ProviderKind::Construct(recipe)) => match recipe.metatype {
                Some(metatype) => format!("class:{}", metatype.type_name),
                None => format!("factory@{:p}", Arc::as_ptr(&recipe.construct)),
            },
        };
        format!("{:?}[{}]={}", self.token, self.scope.scope, detail)
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("token", &self.token)
            .field("scope", &self.scope)
            .field("value", &self.is_value())
            .finish()
    }
}
