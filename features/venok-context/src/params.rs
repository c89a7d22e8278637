use venok_di::Instance;

use crate::metadata::ParamType;

/// Extracts handler arguments from the raw arguments of a call
///
/// Every transport brings its own factory. Custom parameters never reach it, they
/// carry their own extractor.
pub trait ParamsFactory: Send + Sync + 'static {
    fn exchange_key_for_value(
        &self,
        param: &ParamType,
        data: Option<&str>,
        args: &[Instance],
    ) -> Option<Instance>;
}

/// Params factory of native calls
///
/// `Arg(i)` is the raw argument at `i` and the `"args"` key is the full argument list
/// as a `Vec<Instance>`. Other keys have no value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeParamsFactory;

impl ParamsFactory for NativeParamsFactory {
    fn exchange_key_for_value(
        &self,
        param: &ParamType,
        _: Option<&str>,
        args: &[Instance],
    ) -> Option<Instance> {
        match param {
            ParamType::Arg(index) => args.get(*index).cloned(),
            ParamType::Key("args") => Some(Instance::new(args.to_vec())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_params_map_to_positions() {
        let args = [Instance::new(1_u8), Instance::new("two")];
        let factory = NativeParamsFactory;

        let second = factory.exchange_key_for_value(&ParamType::Arg(1), None, &args);
        assert_eq!(second.unwrap().downcast_ref::<&str>(), Some(&"two"));
        assert!(factory
            .exchange_key_for_value(&ParamType::Arg(2), None, &args)
            .is_none());

        let all = factory
            .exchange_key_for_value(&ParamType::Key("args"), None, &args)
            .unwrap();
        assert_eq!(all.downcast_ref::<Vec<Instance>>().map(Vec::len), Some(2));
        assert!(factory
            .exchange_key_for_value(&ParamType::Key("body"), None, &args)
            .is_none());
    }
}
