use std::{collections::HashMap, fmt, sync::Arc};

use uuid::Uuid;

use crate::types::TypeInfo;

/// Identifies a provider inside a module
///
/// Either the type a provider supplies, or a free form name for providers which
/// are registered under a string key (`"CONFIG_OPTIONS"`, [APP_GUARD](crate::APP_GUARD), ...).
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Type(TypeInfo),
    Named(Arc<str>),
}

impl Token {
    pub fn of<T: 'static + ?Sized>() -> Self {
        Token::Type(TypeInfo::of::<T>())
    }

    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Token::Named(name.into())
    }

    /// Human readable name, used in every diagnostic
    pub fn name(&self) -> String {
        match self {
            Token::Type(info) => info.short_name(),
            Token::Named(name) => name.to_string(),
        }
    }

    pub fn type_info(&self) -> Option<TypeInfo> {
        match self {
            Token::Type(info) => Some(*info),
            Token::Named(_) => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type(info) => write!(f, "Token({})", info.type_name),
            Token::Named(name) => write!(f, "Token({name:?})"),
        }
    }
}

impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Token::named(name)
    }
}

impl From<TypeInfo> for Token {
    fn from(info: TypeInfo) -> Self {
        Token::Type(info)
    }
}

/// Identity of a registered module
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleToken(Arc<str>);

impl ModuleToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ModuleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleToken({})", self.0)
    }
}

/// How ids are minted for module tokens and context ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdMode {
    /// Fresh random ids for every application
    #[default]
    Random,
    /// Ids derived from type names and counters, stable between runs
    Deterministic,
}

/// Derives module tokens
///
/// A module without dynamic metadata is identified by its static id alone. A dynamic
/// module hashes its static id together with the fingerprint of its metadata, so two
/// registrations with equal metadata collapse into one module while differing metadata
/// yields two modules.
pub struct TokenFactory {
    mode: IdMode,
    module_ids: HashMap<TypeInfo, Uuid>,
}

impl TokenFactory {
    pub fn new(mode: IdMode) -> Self {
        TokenFactory {
            mode,
            module_ids: HashMap::new(),
        }
    }

    pub fn mode(&self) -> IdMode {
        self.mode
    }

    pub fn create(&mut self, module: TypeInfo, dynamic_fingerprint: Option<&str>) -> ModuleToken {
        let module_id = self.static_module_id(module);
        let token = match dynamic_fingerprint {
            None => module_id.to_string(),
            Some(fingerprint) => {
                let seed = format!("{module_id}_{fingerprint}");
                Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string()
            }
        };
        ModuleToken(token.into())
    }

    /// Stable per type for the lifetime of this factory
    pub fn static_module_id(&mut self, module: TypeInfo) -> Uuid {
        let mode = self.mode;
        *self
            .module_ids
            .entry(module)
            .or_insert_with(|| match mode {
                IdMode::Random => Uuid::new_v4(),
                IdMode::Deterministic => {
                    Uuid::new_v5(&Uuid::NAMESPACE_OID, module.type_name.as_bytes())
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CatsModule;
    struct DogsModule;

    #[test]
    fn static_tokens_are_stable_per_type() {
        let mut factory = TokenFactory::new(IdMode::Random);
        let first = factory.create(TypeInfo::of::<CatsModule>(), None);
        let second = factory.create(TypeInfo::of::<CatsModule>(), None);
        let other = factory.create(TypeInfo::of::<DogsModule>(), None);
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn dynamic_metadata_changes_the_token() {
        let mut factory = TokenFactory::new(IdMode::Deterministic);
        let info = TypeInfo::of::<CatsModule>();
        let plain = factory.create(info, None);
        let a = factory.create(info, Some("providers:[a]"));
        let a_again = factory.create(info, Some("providers:[a]"));
        let b = factory.create(info, Some("providers:[b]"));
        assert_ne!(plain, a);
        assert_eq!(a, a_again);
        assert_ne!(a, b);
    }

    #[test]
    fn deterministic_mode_is_stable_between_factories() {
        let info = TypeInfo::of::<CatsModule>();
        let one = TokenFactory::new(IdMode::Deterministic).create(info, None);
        let two = TokenFactory::new(IdMode::Deterministic).create(info, None);
        assert_eq!(one, two);
    }

    #[test]
    fn token_names_are_short() {
        assert_eq!(Token::of::<CatsModule>().name(), "CatsModule");
        assert_eq!(Token::named("CONFIG").to_string(), "CONFIG");
    }
}
