/// Errors of the config registry
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No config of the required type is registered
    #[error("Config {0} is not registered")]
    Missing(&'static str),
    /// A config of this type is registered already
    #[error("Config {0} is already registered")]
    AlreadyRegistered(&'static str),
}
