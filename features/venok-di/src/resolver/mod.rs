use crate::{
    errors::InjectError,
    factories::Args,
    provider::Dependency,
    types::Instance,
};

pub mod arc;
pub mod token;

/// Allows custom behaviour on injection
///
/// A resolver declares which [Dependency] it needs and converts the resolved
/// instance into the value handed to the constructor.
pub trait Resolver: Sized {
    fn dependency() -> Dependency;

    /// `None` if the dependency is optional and could not be found
    fn from_instance(instance: Option<Instance>) -> Result<Self, InjectError>;
}

/// A tuple of [Resolver]s, resolved in declaration order
pub trait ResolveAll: Sized + Send + 'static {
    fn dependencies() -> Vec<Dependency>;

    fn from_args(args: &mut Args) -> Result<Self, InjectError>;
}

impl ResolveAll for () {
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    fn from_args(_: &mut Args) -> Result<Self, InjectError> {
        Ok(())
    }
}

macro_rules! resolve_all_tuple {
    ($($name:ident: $index:tt),+) => {
        impl<$($name),+> ResolveAll for ($($name,)+)
        where
            $($name: Resolver + Send + 'static),+
        {
            fn dependencies() -> Vec<Dependency> {
                vec![$($name::dependency()),+]
            }

            fn from_args(args: &mut Args) -> Result<Self, InjectError> {
                Ok(($($name::from_instance(args.take($index))?,)+))
            }
        }
    };
}

resolve_all_tuple!(A: 0);
resolve_all_tuple!(A: 0, B: 1);
resolve_all_tuple!(A: 0, B: 1, C: 2);
resolve_all_tuple!(A: 0, B: 1, C: 2, D: 3);
resolve_all_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
resolve_all_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
resolve_all_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
resolve_all_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
