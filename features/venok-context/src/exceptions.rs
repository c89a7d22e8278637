use std::{error::Error, fmt, sync::Arc};

use thiserror::Error;
use venok_di::DynError;

/// Message of the exception raised when a guard denies access
pub const FORBIDDEN_MESSAGE: &str = "Forbidden resource";

/// Any error raised while handling a call
///
/// Every `std::error::Error` converts into an exception with `?`. Filters match
/// exceptions against their error type and every error in its source chain.
#[derive(Clone)]
pub struct Exception(Arc<dyn Error + Send + Sync>);

impl Exception {
    pub fn new<E: Error + Send + Sync + 'static>(error: E) -> Self {
        Exception(Arc::new(error))
    }

    pub fn from_boxed(error: DynError) -> Self {
        Exception(Arc::from(error))
    }

    /// An exception carrying only a message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(RuntimeException::new(message))
    }

    pub fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.0.as_ref()
    }

    /// The error itself followed by its sources
    pub fn chain(&self) -> impl Iterator<Item = &(dyn Error + 'static)> {
        let first: &(dyn Error + 'static) = self.0.as_ref();
        std::iter::successors(Some(first), |&error| error.source())
    }

    pub fn is<E: Error + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// The first error of type `E` in the chain
    pub fn find<E: Error + 'static>(&self) -> Option<&E> {
        self.chain().find_map(|error| error.downcast_ref::<E>())
    }
}

impl<E: Error + Send + Sync + 'static> From<E> for Exception {
    fn from(error: E) -> Self {
        Exception::new(error)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Base of every exception raised by the pipeline itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RuntimeException {
    message: String,
}

impl RuntimeException {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeException {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A guard denied access to the handler
///
/// Its source is a [RuntimeException], so filters catching runtime exceptions catch
/// forbidden ones too.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ForbiddenException(#[source] RuntimeException);

impl ForbiddenException {
    pub fn new() -> Self {
        Self::with_message(FORBIDDEN_MESSAGE)
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        ForbiddenException(RuntimeException::new(message))
    }
}

impl Default for ForbiddenException {
    fn default() -> Self {
        Self::new()
    }
}

/// A stream result completed without emitting anything
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no elements in sequence")]
pub struct EmptySequenceException;

/// Error types an exception filter handles
#[derive(Clone, Copy)]
pub struct ExceptionType {
    name: &'static str,
    matches: fn(&(dyn Error + 'static)) -> bool,
}

impl ExceptionType {
    pub fn of<E: Error + 'static>() -> Self {
        ExceptionType {
            name: std::any::type_name::<E>(),
            matches: |error| error.is::<E>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True if the exception or one of its sources is of this type
    pub fn matches(&self, exception: &Exception) -> bool {
        exception.chain().any(|error| (self.matches)(error))
    }
}

impl fmt::Debug for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
