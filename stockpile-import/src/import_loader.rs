use crate::importer_registry::ImporterRegistry;
use stockpile_base::{LoadResult, ResourceHandle};
use stockpile_loader::{FormatLoader, LoadContext};
use std::sync::Arc;

/// Format loader for authoring files. Looks up the `.import` sidecar and loads the internal
/// resource it points at through the manager, so the internal file is handled by whichever
/// loader recognizes its extension. The result is cached under the authoring path.
pub struct ImportFormatLoader {
    registry: Arc<ImporterRegistry>,
}

impl ImportFormatLoader {
    pub fn new(registry: Arc<ImporterRegistry>) -> Self {
        ImportFormatLoader { registry }
    }

    pub fn registry(&self) -> &Arc<ImporterRegistry> {
        &self.registry
    }
}

impl FormatLoader for ImportFormatLoader {
    fn recognized_extensions(&self) -> Vec<String> {
        self.registry.get_recognized_extensions()
    }

    fn handles_type(
        &self,
        type_name: &str,
    ) -> bool {
        self.registry.handles_type(type_name)
    }

    #[profiling::function]
    fn load(
        &self,
        ctx: &LoadContext,
        path: &str,
        original_path: &str,
    ) -> LoadResult<ResourceHandle> {
        let (record, _importer) = self.registry.resolve(path)?;
        log::debug!("Loading imported {} from {}", path, record.path);

        let resource = ctx.manager().load_internal(
            &record.path,
            original_path,
            &record.resource_type,
            ctx.no_cache(),
        )?;
        resource.core().set_import_path(&record.path);
        Ok(resource)
    }

    fn exists(
        &self,
        ctx: &LoadContext,
        path: &str,
    ) -> bool {
        ctx.file_access().exists(path)
    }

    fn resource_type(
        &self,
        _ctx: &LoadContext,
        path: &str,
    ) -> Option<String> {
        self.registry.get_resource_type(path)
    }

    fn dependencies(
        &self,
        _ctx: &LoadContext,
        path: &str,
        add_types: bool,
    ) -> Vec<String> {
        self.registry.get_dependencies(path, add_types)
    }

    fn is_imported(
        &self,
        _ctx: &LoadContext,
        _path: &str,
    ) -> bool {
        true
    }

    fn is_import_valid(
        &self,
        _ctx: &LoadContext,
        path: &str,
    ) -> bool {
        self.registry.is_import_valid(path)
    }

    fn import_order(
        &self,
        _ctx: &LoadContext,
        path: &str,
    ) -> i32 {
        self.registry.get_import_order(path)
    }

    fn import_group_file(
        &self,
        _ctx: &LoadContext,
        path: &str,
    ) -> Option<String> {
        self.registry.get_import_group_file(path)
    }

    fn internal_resource_path(
        &self,
        _ctx: &LoadContext,
        path: &str,
    ) -> Option<String> {
        self.registry.get_internal_resource_path(path)
    }
}
