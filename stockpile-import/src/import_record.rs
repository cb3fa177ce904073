use serde_json::Value;
use stockpile_base::{LoadError, LoadResult};
use stockpile_loader::SidecarDocument;

const REMAP_SECTION: &str = "remap";
const DEPS_SECTION: &str = "deps";
const VARIANT_PATH_PREFIX: &str = "path.";

/// What an `.import` sidecar says about an authoring file
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    // Name of the importer that produced the internal resource
    pub importer: String,

    // Runtime type of the internal resource
    pub resource_type: String,

    // Internal path to load, already resolved against the enabled features
    pub path: String,

    // (feature, path) for every path.<feature> entry, in file order
    pub variant_paths: Vec<(String, String)>,

    // Authoring file that imports this one as part of a group
    pub group_file: Option<String>,

    // Importer-defined data stored alongside the import
    pub metadata: Option<Value>,

    // False when the import was flagged as needing to be redone
    pub valid: bool,

    // Files listed in the [deps] section
    pub dependencies: Vec<String>,
}

impl ImportRecord {
    /// Builds a record from a parsed sidecar. Missing required keys are reported as `NotImported`
    /// since the authoring file can't be loaded through the import in that state.
    ///
    /// # Parameters
    /// * `authoring_path` - the file the sidecar belongs to, for error messages
    /// * `document` - the parsed `.import` file
    /// * `features` - enabled feature tags used to pick between `path.<feature>` entries
    pub fn from_document(
        authoring_path: &str,
        document: &SidecarDocument,
        features: &[String],
    ) -> LoadResult<Self> {
        let required = |key: &str| -> LoadResult<String> {
            match document.get_str(REMAP_SECTION, key) {
                Some(value) if !value.is_empty() => Ok(value.to_string()),
                _ => {
                    log::warn!(
                        "Import file for {} has no '{}' in its [{}] section",
                        authoring_path,
                        key,
                        REMAP_SECTION
                    );
                    Err(LoadError::NotImported(authoring_path.to_string()))
                }
            }
        };

        let importer = required("importer")?;
        let resource_type = required("type")?;

        let mut variant_paths = Vec::default();
        for (key, value) in document.entries(REMAP_SECTION) {
            if let (Some(feature), Some(path)) = (key.strip_prefix(VARIANT_PATH_PREFIX), value.as_str()) {
                variant_paths.push((feature.to_string(), path.to_string()));
            }
        }

        let selected_variant = variant_paths
            .iter()
            .find(|(feature, _)| features.iter().any(|x| x == feature))
            .map(|(_, path)| path.clone());

        let path = match selected_variant {
            Some(path) => path,
            None => required("path")?,
        };

        let group_file = document
            .get_str(REMAP_SECTION, "group_file")
            .filter(|x| !x.is_empty())
            .map(|x| x.to_string());

        let metadata = document
            .get(REMAP_SECTION, "metadata")
            .filter(|x| !x.is_null())
            .cloned();

        let valid = document
            .get(REMAP_SECTION, "valid")
            .and_then(|x| x.as_bool())
            .unwrap_or(true);

        let dependencies = match document.get(DEPS_SECTION, "files") {
            Some(Value::Array(files)) => files
                .iter()
                .filter_map(|x| x.as_str())
                .map(|x| x.to_string())
                .collect(),
            _ => Vec::default(),
        };

        Ok(ImportRecord {
            importer,
            resource_type,
            path,
            variant_paths,
            group_file,
            metadata,
            valid,
            dependencies,
        })
    }

    pub fn parse(
        authoring_path: &str,
        text: &str,
        features: &[String],
    ) -> LoadResult<Self> {
        let document = SidecarDocument::parse(authoring_path, text).map_err(|e| {
            log::warn!("Could not parse import file for {}: {}", authoring_path, e);
            LoadError::NotImported(authoring_path.to_string())
        })?;
        Self::from_document(authoring_path, &document, features)
    }

    /// Every internal path this import produced: the variants, or the single path
    pub fn internal_paths(&self) -> Vec<String> {
        if self.variant_paths.is_empty() {
            vec![self.path.clone()]
        } else {
            self.variant_paths.iter().map(|(_, x)| x.clone()).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_base::ErrorKind;

    const MESH_IMPORT: &str = r#"
[remap]

importer="wavefront_obj"
type="Mesh"
path.s3tc="res://.import/a.obj-1234.s3tc.mesh"
path.etc2="res://.import/a.obj-1234.etc2.mesh"
group_file="res://level.obj"
metadata={ "vertex_count": 3 }

[deps]

files=[ "res://.import/a.obj-1234.s3tc.mesh", "res://.import/a.obj-1234.etc2.mesh" ]
"#;

    #[test]
    fn feature_selects_variant() {
        let record =
            ImportRecord::parse("res://a.obj", MESH_IMPORT, &["etc2".to_string()]).unwrap();
        assert_eq!(record.importer, "wavefront_obj");
        assert_eq!(record.resource_type, "Mesh");
        assert_eq!(record.path, "res://.import/a.obj-1234.etc2.mesh");
        assert_eq!(record.group_file.as_deref(), Some("res://level.obj"));
        assert_eq!(record.metadata.as_ref().unwrap()["vertex_count"], 3);
        assert!(record.valid);
        assert_eq!(record.dependencies.len(), 2);
        assert_eq!(record.internal_paths().len(), 2);
    }

    #[test]
    fn plain_path_and_invalid_flag() {
        let text = "[remap]\nimporter=\"wav\"\ntype=\"AudioStream\"\npath=\"res://.import/a.wav-1.sample\"\nvalid=false\n";
        let record = ImportRecord::parse("res://a.wav", text, &[]).unwrap();
        assert_eq!(record.path, "res://.import/a.wav-1.sample");
        assert!(!record.valid);
        assert_eq!(record.internal_paths(), vec![record.path.clone()]);
        assert!(record.dependencies.is_empty());
    }

    #[test]
    fn variants_without_enabled_feature_need_plain_path() {
        let error = ImportRecord::parse("res://a.obj", MESH_IMPORT, &[]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotImported);
    }

    #[test]
    fn malformed_sidecar_is_not_imported() {
        let error = ImportRecord::parse("res://a.obj", "[remap]\npath=[\"unterminated\n", &[])
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotImported);

        let error = ImportRecord::parse("res://a.obj", "[remap]\npath=\"res://x.mesh\"\n", &[])
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotImported);
    }
}
