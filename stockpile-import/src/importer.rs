/// Converts authoring files (ex. .obj, .wav) into runtime resources ahead of time. The registry
/// only needs the metadata below. The conversion itself happens in tooling and leaves an `.import`
/// sidecar next to the authoring file pointing at the converted resource.
pub trait Importer: Send + Sync + 'static {
    /// Unique name, written to the `importer` key of the sidecar
    fn importer_name(&self) -> &str;

    // Used to allow the importer registry to return all importers compatible with a given
    // filename extension
    fn recognized_extensions(&self) -> Vec<String>;

    /// Runtime type of the resources this importer produces, ex. "Mesh"
    fn resource_type(&self) -> &str;

    /// Higher priority importers are preferred when several handle the same extension
    fn priority(&self) -> f32 {
        1.0
    }

    /// Importers with a lower order are run first when reimporting, so that resources other
    /// imports depend on already exist
    fn import_order(&self) -> i32 {
        0
    }

    /// Serialized form of whatever settings affect the importer's output. Changing it invalidates
    /// every import made with the old settings.
    fn import_settings_string(&self) -> String {
        String::default()
    }

    /// False if the import of `path` was made with settings that no longer apply
    fn are_import_settings_valid(
        &self,
        _path: &str,
    ) -> bool {
        true
    }
}
