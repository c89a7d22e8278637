use venok_di::{DynamicModule, ModuleDefinition, ModuleMetadata, Provider};

use crate::provider::ConfigProvider;

/// Global module exporting the [ConfigProvider]
pub struct ConfigModule;

impl ModuleDefinition for ConfigModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new().global()
    }
}

impl ConfigModule {
    /// Registers `provider` for the whole application, import it once from the root module
    pub fn for_root(provider: ConfigProvider) -> DynamicModule {
        DynamicModule::new::<ConfigModule>(
            ModuleMetadata::new()
                .provider(Provider::value(provider))
                .export::<ConfigProvider>()
                .global(),
        )
    }
}
