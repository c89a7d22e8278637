use venok_di::{InitError, InjectError};

/// Errors of the application facade
#[derive(thiserror::Error, Debug, Clone)]
pub enum VenokError {
    /// The controller is not registered in any module
    #[error("Controller {0} is not registered in any module")]
    UnknownController(&'static str),
    /// The controller has no handler with that name
    #[error("{controller} has no handler named \"{method}\"")]
    UnknownHandler {
        controller: &'static str,
        method: String,
    },
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Inject(#[from] InjectError),
}
