use crate::import_record::ImportRecord;
use crate::importer::Importer;
use dashmap::DashMap;
use serde_json::Value;
use stockpile_base::hashing::{stable_hash_128_hex, HashSet};
use stockpile_base::resource_path::{extension, file_name};
use stockpile_base::{LoadError, LoadResult};
use stockpile_loader::FileAccess;
use std::sync::{Arc, RwLock};

/// Directory converted resources are written to
pub const IMPORT_DIR: &str = "res://.import";

pub fn import_file_path(authoring_path: &str) -> String {
    format!("{}.import", authoring_path)
}

/// Keeps track of all known importers and answers questions about imported files by reading their
/// `.import` sidecars. Parsed sidecars are cached per authoring path.
pub struct ImporterRegistry {
    importers: RwLock<Vec<Arc<dyn Importer>>>,
    records: DashMap<String, Arc<ImportRecord>>,
    features: RwLock<Vec<String>>,
    file_access: Arc<dyn FileAccess>,
}

impl ImporterRegistry {
    pub fn new(
        file_access: Arc<dyn FileAccess>,
        features: Vec<String>,
    ) -> Self {
        ImporterRegistry {
            importers: Default::default(),
            records: Default::default(),
            features: RwLock::new(features),
            file_access,
        }
    }

    pub fn features(&self) -> Vec<String> {
        self.features.read().unwrap().clone()
    }

    /// Changing features changes which internal path records select, so cached records are dropped
    pub fn set_features(
        &self,
        features: Vec<String>,
    ) {
        *self.features.write().unwrap() = features;
        self.clear_cache();
    }

    //
    // Registration
    //

    pub fn add_importer(
        &self,
        importer: Arc<dyn Importer>,
    ) -> LoadResult<()> {
        let mut importers = self.importers.write().unwrap();
        if importers
            .iter()
            .any(|x| x.importer_name() == importer.importer_name())
        {
            return Err(LoadError::AlreadyRegistered(
                importer.importer_name().to_string(),
            ));
        }

        log::debug!(
            "Registering importer {} for {:?}",
            importer.importer_name(),
            importer.recognized_extensions()
        );
        importers.push(importer);
        Ok(())
    }

    pub fn remove_importer(
        &self,
        importer: &Arc<dyn Importer>,
    ) -> bool {
        let mut importers = self.importers.write().unwrap();
        let count = importers.len();
        importers.retain(|x| !Arc::ptr_eq(x, importer));
        importers.len() != count
    }

    pub fn importer_count(&self) -> usize {
        self.importers.read().unwrap().len()
    }

    pub fn get_importer_by_name(
        &self,
        name: &str,
    ) -> Option<Arc<dyn Importer>> {
        self.importers
            .read()
            .unwrap()
            .iter()
            .find(|x| x.importer_name() == name)
            .cloned()
    }

    pub fn get_importers_for_extension(
        &self,
        extension: &str,
    ) -> Vec<Arc<dyn Importer>> {
        let extension = extension.to_lowercase();
        self.importers
            .read()
            .unwrap()
            .iter()
            .filter(|x| {
                x.recognized_extensions()
                    .iter()
                    .any(|e| e.to_lowercase() == extension)
            })
            .cloned()
            .collect()
    }

    /// Highest priority importer for the extension. Ties go to the one registered first.
    pub fn get_importer_by_extension(
        &self,
        extension: &str,
    ) -> Option<Arc<dyn Importer>> {
        let mut best: Option<Arc<dyn Importer>> = None;
        for importer in self.get_importers_for_extension(extension) {
            let better = match &best {
                Some(current) => importer.priority() > current.priority(),
                None => true,
            };
            if better {
                best = Some(importer);
            }
        }

        best
    }

    /// Union of every importer's extensions, first occurrence kept
    pub fn get_recognized_extensions(&self) -> Vec<String> {
        let mut seen = HashSet::default();
        let mut extensions = Vec::default();
        for importer in self.importers.read().unwrap().iter() {
            for extension in importer.recognized_extensions() {
                if seen.insert(extension.to_lowercase()) {
                    extensions.push(extension);
                }
            }
        }

        extensions
    }

    pub fn handles_type(
        &self,
        type_name: &str,
    ) -> bool {
        self.importers
            .read()
            .unwrap()
            .iter()
            .any(|x| x.resource_type() == type_name)
    }

    pub fn has_importer_for_path(
        &self,
        path: &str,
    ) -> bool {
        extension(path)
            .map(|x| !self.get_importers_for_extension(x).is_empty())
            .unwrap_or(false)
    }

    //
    // Records
    //

    /// True if the authoring file has an `.import` sidecar
    pub fn recognize_path(
        &self,
        path: &str,
    ) -> bool {
        self.file_access.exists(&import_file_path(path))
    }

    /// Reads (or returns the cached) import record for an authoring file. A missing or malformed
    /// sidecar is `NotImported`.
    #[profiling::function]
    pub fn get_path_and_type(
        &self,
        path: &str,
    ) -> LoadResult<Arc<ImportRecord>> {
        if let Some(record) = self.records.get(path) {
            return Ok(record.value().clone());
        }

        let sidecar_path = import_file_path(path);
        if !self.file_access.exists(&sidecar_path) {
            return Err(LoadError::NotImported(path.to_string()));
        }

        let text = self.file_access.read_to_string(&sidecar_path).map_err(|e| {
            log::warn!("Could not read {}: {}", sidecar_path, e);
            LoadError::NotImported(path.to_string())
        })?;

        let features = self.features();
        let record = Arc::new(ImportRecord::parse(path, &text, &features)?);
        log::trace!(
            "Import record for {}: {} ({}) from {}",
            path,
            record.path,
            record.resource_type,
            record.importer
        );
        self.records.insert(path.to_string(), record.clone());
        Ok(record)
    }

    /// Record plus the importer it names. An unknown importer is `ImporterMissing`.
    pub fn resolve(
        &self,
        path: &str,
    ) -> LoadResult<(Arc<ImportRecord>, Arc<dyn Importer>)> {
        let record = self.get_path_and_type(path)?;
        match self.get_importer_by_name(&record.importer) {
            Some(importer) => Ok((record, importer)),
            None => Err(LoadError::ImporterMissing {
                path: path.to_string(),
                importer: record.importer.clone(),
            }),
        }
    }

    pub fn get_internal_resource_path(
        &self,
        path: &str,
    ) -> Option<String> {
        self.get_path_and_type(path).ok().map(|x| x.path.clone())
    }

    /// Every internal path the import produced, one per variant for multi-target imports
    pub fn get_internal_resource_path_list(
        &self,
        path: &str,
    ) -> Vec<String> {
        self.get_path_and_type(path)
            .map(|x| x.internal_paths())
            .unwrap_or_default()
    }

    pub fn get_import_group_file(
        &self,
        path: &str,
    ) -> Option<String> {
        self.get_path_and_type(path)
            .ok()
            .and_then(|x| x.group_file.clone())
    }

    /// False if the file must be reimported: no usable sidecar, the sidecar was flagged invalid,
    /// the importer is gone, or the importer's settings changed
    pub fn is_import_valid(
        &self,
        path: &str,
    ) -> bool {
        match self.resolve(path) {
            Ok((record, importer)) => record.valid && importer.are_import_settings_valid(path),
            Err(_) => false,
        }
    }

    pub fn get_resource_type(
        &self,
        path: &str,
    ) -> Option<String> {
        self.get_path_and_type(path)
            .ok()
            .map(|x| x.resource_type.clone())
    }

    pub fn get_resource_metadata(
        &self,
        path: &str,
    ) -> Option<Value> {
        self.get_path_and_type(path)
            .ok()
            .and_then(|x| x.metadata.clone())
    }

    /// Files from the sidecar's [deps] section. Entries may carry a "::Type" suffix, which is
    /// stripped unless `add_types` is set.
    pub fn get_dependencies(
        &self,
        path: &str,
        add_types: bool,
    ) -> Vec<String> {
        let record = match self.get_path_and_type(path) {
            Ok(record) => record,
            Err(_) => return Vec::default(),
        };

        record
            .dependencies
            .iter()
            .map(|x| {
                if add_types {
                    x.clone()
                } else {
                    match x.split_once("::") {
                        Some((path, _)) => path.to_string(),
                        None => x.clone(),
                    }
                }
            })
            .collect()
    }

    pub fn get_import_order(
        &self,
        path: &str,
    ) -> i32 {
        self.resolve(path)
            .map(|(_, importer)| importer.import_order())
            .unwrap_or(0)
    }

    pub fn are_import_settings_valid(
        &self,
        path: &str,
    ) -> bool {
        self.resolve(path)
            .map(|(_, importer)| importer.are_import_settings_valid(path))
            .unwrap_or(false)
    }

    /// Digest of every importer's settings. Changes whenever an importer is added, removed or has
    /// its settings changed.
    pub fn get_import_settings_hash(&self) -> String {
        let mut importers = self.importers.read().unwrap().clone();
        importers.sort_by(|a, b| a.importer_name().cmp(b.importer_name()));

        let mut folded = String::default();
        for importer in importers {
            folded.push(':');
            folded.push_str(importer.importer_name());
            folded.push(':');
            folded.push_str(&importer.import_settings_string());
        }

        stable_hash_128_hex(folded.as_bytes())
    }

    /// Where the converted resources of an authoring file go, without extension. Stable across
    /// runs for the same path.
    pub fn get_import_base_path(
        &self,
        path: &str,
    ) -> String {
        format!(
            "{}/{}-{}",
            IMPORT_DIR,
            file_name(path),
            stable_hash_128_hex(path.as_bytes())
        )
    }

    /// Drops the cached record so the sidecar is read again on next use
    pub fn invalidate(
        &self,
        path: &str,
    ) {
        self.records.remove(path);
    }

    pub fn clear_cache(&self) {
        self.records.clear();
    }
}
