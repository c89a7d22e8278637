use std::future::Future;

use futures::{
    future::BoxFuture,
    stream::{BoxStream, Stream},
    FutureExt, StreamExt,
};

use crate::exceptions::{EmptySequenceException, Exception};

/// Result of a guard, interceptor, pipe, filter or handler
///
/// Enhancers may answer right away, with a future, or with a stream. A stream is
/// reduced to the last value it emits before completing.
pub enum Deferred<T> {
    Ready(Result<T, Exception>),
    Future(BoxFuture<'static, Result<T, Exception>>),
    Stream(BoxStream<'static, Result<T, Exception>>),
}

impl<T: Send + 'static> Deferred<T> {
    pub fn value(value: T) -> Self {
        Deferred::Ready(Ok(value))
    }

    pub fn error(exception: impl Into<Exception>) -> Self {
        Deferred::Ready(Err(exception.into()))
    }

    pub fn future(future: impl Future<Output = Result<T, Exception>> + Send + 'static) -> Self {
        Deferred::Future(future.boxed())
    }

    pub fn stream(stream: impl Stream<Item = Result<T, Exception>> + Send + 'static) -> Self {
        Deferred::Stream(stream.boxed())
    }

    /// Settles the result
    ///
    /// Streams fail with the first error they emit, or with [EmptySequenceException]
    /// if they complete without a value.
    pub async fn last(self) -> Result<T, Exception> {
        match self {
            Deferred::Ready(result) => result,
            Deferred::Future(future) => future.await,
            Deferred::Stream(mut stream) => {
                let mut last = None;
                while let Some(item) = stream.next().await {
                    last = Some(item?);
                }
                last.ok_or_else(|| EmptySequenceException.into())
            }
        }
    }

    /// Transforms the settled value
    pub fn map<U: Send + 'static>(
        self,
        map: impl FnOnce(T) -> Result<U, Exception> + Send + 'static,
    ) -> Deferred<U> {
        Deferred::future(async move { map(self.last().await?) })
    }

    pub fn boxed(self) -> BoxFuture<'static, Result<T, Exception>> {
        self.last().boxed()
    }
}

impl<T> From<Result<T, Exception>> for Deferred<T> {
    fn from(result: Result<T, Exception>) -> Self {
        Deferred::Ready(result)
    }
}

#[cfg(test)]
mod tests {
    use futures::{executor::block_on, stream};

    use super::*;
    use crate::exceptions::RuntimeException;

    #[test]
    fn streams_settle_to_their_last_value() {
        let deferred = Deferred::stream(stream::iter([Ok(1), Ok(2), Ok(3)]));
        assert_eq!(block_on(deferred.last()).unwrap(), 3);
    }

    #[test]
    fn empty_streams_fail() {
        let deferred = Deferred::<u8>::stream(stream::empty());
        let error = block_on(deferred.last()).unwrap_err();
        assert!(error.is::<EmptySequenceException>());
    }

    #[test]
    fn stream_errors_stop_the_sequence() {
        let deferred = Deferred::stream(stream::iter([
            Ok(1),
            Err(RuntimeException::new("broken").into()),
            Ok(3),
        ]));
        let error = block_on(deferred.last()).unwrap_err();
        assert_eq!(error.to_string(), "broken");
    }

    #[test]
    fn futures_and_maps_compose() {
        let deferred = Deferred::future(async { Ok(20) }).map(|value| Ok(value + 1));
        assert_eq!(block_on(deferred.last()).unwrap(), 21);
    }
}
