use crate::format_loader::{FormatLoader, LoadContext};
use stockpile_base::{LoadResult, ResourceHandle};
use std::sync::Arc;

/// Narrower loader contract for native plugins that don't need the cache, dependency or import
/// queries. Registered through `ResourceManager::add_plugin_loader`, which wraps it in a
/// `PluginLoaderWrapper`.
pub trait ResourceLoaderPlugin: Send + Sync + 'static {
    fn recognized_extensions(&self) -> Vec<String>;

    fn handles_type(
        &self,
        type_name: &str,
    ) -> bool;

    fn resource_type(
        &self,
        path: &str,
    ) -> Option<String>;

    fn load(
        &self,
        path: &str,
        original_path: &str,
    ) -> LoadResult<ResourceHandle>;
}

/// Adapts a `ResourceLoaderPlugin` to the full `FormatLoader` interface
pub struct PluginLoaderWrapper {
    plugin: Arc<dyn ResourceLoaderPlugin>,
}

impl PluginLoaderWrapper {
    pub fn new(plugin: Arc<dyn ResourceLoaderPlugin>) -> Self {
        PluginLoaderWrapper { plugin }
    }
}

impl FormatLoader for PluginLoaderWrapper {
    fn recognized_extensions(&self) -> Vec<String> {
        self.plugin.recognized_extensions()
    }

    fn handles_type(
        &self,
        type_name: &str,
    ) -> bool {
        self.plugin.handles_type(type_name)
    }

    fn load(
        &self,
        _ctx: &LoadContext,
        path: &str,
        original_path: &str,
    ) -> LoadResult<ResourceHandle> {
        self.plugin.load(path, original_path)
    }

    fn resource_type(
        &self,
        _ctx: &LoadContext,
        path: &str,
    ) -> Option<String> {
        self.plugin.resource_type(path).filter(|x| !x.is_empty())
    }
}
