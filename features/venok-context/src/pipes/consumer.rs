use std::sync::Arc;

use venok_di::Instance;

use super::{ArgumentMetadata, PipeTransform};
use crate::exceptions::Exception;

/// Runs pipes over one argument
#[derive(Debug, Clone, Copy, Default)]
pub struct PipesConsumer;

impl PipesConsumer {
    /// Feeds `value` through `pipes` in order, each pipe gets the previous result
    pub async fn apply(
        &self,
        value: Option<Instance>,
        metadata: &ArgumentMetadata,
        pipes: &[Arc<dyn PipeTransform>],
    ) -> Result<Option<Instance>, Exception> {
        let mut value = value;
        for pipe in pipes {
            value = pipe.transform(value, metadata).last().await?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::{deferred::Deferred, exceptions::RuntimeException};

    struct ParseInt;

    impl PipeTransform for ParseInt {
        fn transform(
            &self,
            value: Option<Instance>,
            metadata: &ArgumentMetadata,
        ) -> Deferred<Option<Instance>> {
            let raw = value
                .as_ref()
                .and_then(|value| value.downcast_ref::<String>())
                .cloned();
            let Some(raw) = raw else {
                return Deferred::value(value);
            };
            match raw.parse::<i64>() {
                Ok(parsed) => Deferred::value(Some(Instance::new(parsed))),
                Err(_) => Deferred::error(RuntimeException::new(format!(
                    "argument {} is not a number",
                    metadata.index
                ))),
            }
        }
    }

    struct Increment;

    impl PipeTransform for Increment {
        fn transform(&self, value: Option<Instance>, _: &ArgumentMetadata) -> Deferred<Option<Instance>> {
            let next = value
                .as_ref()
                .and_then(|value| value.downcast_ref::<i64>())
                .map(|number| Instance::new(number + 1));
            Deferred::future(async move { Ok(next) })
        }
    }

    fn metadata() -> ArgumentMetadata {
        ArgumentMetadata {
            index: 0,
            kind: "arg",
            data: None,
            metatype: None,
        }
    }

    #[test]
    fn pipes_run_in_order() {
        let pipes: Vec<Arc<dyn PipeTransform>> = vec![Arc::new(ParseInt), Arc::new(Increment)];
        let value = block_on(PipesConsumer.apply(
            Some(Instance::new("5".to_string())),
            &metadata(),
            &pipes,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&6));
    }

    #[test]
    fn failing_pipes_stop_the_chain() {
        let pipes: Vec<Arc<dyn PipeTransform>> = vec![Arc::new(ParseInt), Arc::new(Increment)];
        let error = block_on(PipesConsumer.apply(
            Some(Instance::new("five".to_string())),
            &metadata(),
            &pipes,
        ))
        .unwrap_err();
        assert_eq!(error.to_string(), "argument 0 is not a number");
    }

    #[test]
    fn without_pipes_the_value_passes_through() {
        let value = block_on(PipesConsumer.apply(Some(Instance::new(1_u8)), &metadata(), &[]))
            .unwrap()
            .unwrap();
        assert_eq!(value.downcast_ref::<u8>(), Some(&1));
    }
}
