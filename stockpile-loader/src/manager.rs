use crate::file_access::{DiskFileAccess, FileAccess};
use crate::format_loader::{FormatLoader, LoadContext};
use crate::interactive::InteractiveLoad;
use crate::loader_list::{LoaderList, DEFAULT_LOADER_CAPACITY};
use crate::loading_map::{LoadingMap, LoadingTicket};
use crate::plugin_loader::ResourceLoaderPlugin;
use crate::project::ProjectSettings;
use crate::remap::{FixedLocale, LocaleSource, RemapResult, ResourceRemapper};
use crate::script_bridge::{ScriptBridge, ScriptedFormatLoader, FORMAT_LOADER_SCRIPT_BASE};
use stockpile_base::hashing::{HashMap, HashSet};
use stockpile_base::{
    normalize_path, LoadError, LoadResult, PathLocalizer, ResourceCache, ResourceHandle,
    SchemeLocalizer,
};
use std::sync::{Arc, RwLock};

/// Called after every successful, non-cached load with the resource and the path the caller used
pub type LoadedCallback = Arc<dyn Fn(&ResourceHandle, &str) + Send + Sync>;

struct ResourceManagerInner {
    cache: Arc<ResourceCache>,
    loading_map: Arc<LoadingMap>,
    loaders: RwLock<LoaderList>,
    remapper: ResourceRemapper,
    localizer: Arc<dyn PathLocalizer>,
    file_access: Arc<dyn FileAccess>,
    script_bridge: RwLock<Option<Arc<dyn ScriptBridge>>>,
    loaded_callback: RwLock<Option<LoadedCallback>>,
    stamp_modified_times: bool,
}

/// Entry point for loading resources. Ties together path normalization, cycle detection, the
/// resource cache, remapping and the registered format loaders.
///
/// Cheap to clone, all clones share the same state.
#[derive(Clone)]
pub struct ResourceManager {
    inner: Arc<ResourceManagerInner>,
}

pub struct ResourceManagerBuilder {
    file_access: Option<Arc<dyn FileAccess>>,
    localizer: Option<Arc<dyn PathLocalizer>>,
    locale_source: Option<Arc<dyn LocaleSource>>,
    cache: Option<Arc<ResourceCache>>,
    loader_capacity: usize,
    stamp_modified_times: bool,
}

impl Default for ResourceManagerBuilder {
    fn default() -> Self {
        ResourceManagerBuilder {
            file_access: None,
            localizer: None,
            locale_source: None,
            cache: None,
            loader_capacity: DEFAULT_LOADER_CAPACITY,
            stamp_modified_times: cfg!(feature = "editor"),
        }
    }
}

impl ResourceManagerBuilder {
    pub fn file_access(
        mut self,
        file_access: Arc<dyn FileAccess>,
    ) -> Self {
        self.file_access = Some(file_access);
        self
    }

    pub fn localizer(
        mut self,
        localizer: Arc<dyn PathLocalizer>,
    ) -> Self {
        self.localizer = Some(localizer);
        self
    }

    pub fn locale_source(
        mut self,
        locale_source: Arc<dyn LocaleSource>,
    ) -> Self {
        self.locale_source = Some(locale_source);
        self
    }

    /// Share a cache between managers. By default every manager gets its own.
    pub fn cache(
        mut self,
        cache: Arc<ResourceCache>,
    ) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn loader_capacity(
        mut self,
        loader_capacity: usize,
    ) -> Self {
        self.loader_capacity = loader_capacity;
        self
    }

    pub fn stamp_modified_times(
        mut self,
        stamp_modified_times: bool,
    ) -> Self {
        self.stamp_modified_times = stamp_modified_times;
        self
    }

    pub fn build(self) -> ResourceManager {
        let file_access = self.file_access.unwrap_or_else(|| {
            let working_dir = std::env::current_dir().unwrap_or_default();
            Arc::new(DiskFileAccess::new(working_dir, None))
        });
        let locale_source = self
            .locale_source
            .unwrap_or_else(|| Arc::new(FixedLocale::new("en")));

        let inner = ResourceManagerInner {
            cache: self.cache.unwrap_or_else(ResourceCache::new),
            loading_map: LoadingMap::new(),
            loaders: RwLock::new(LoaderList::new(self.loader_capacity)),
            remapper: ResourceRemapper::new(locale_source, file_access.clone()),
            localizer: self.localizer.unwrap_or_else(|| Arc::new(SchemeLocalizer)),
            file_access,
            script_bridge: RwLock::new(None),
            loaded_callback: RwLock::new(None),
            stamp_modified_times: self.stamp_modified_times,
        };

        ResourceManager {
            inner: Arc::new(inner),
        }
    }
}

impl ResourceManager {
    pub fn builder() -> ResourceManagerBuilder {
        ResourceManagerBuilder::default()
    }

    /// Manager reading from disk as described by the project settings, with the settings' locale
    /// and remap tables loaded
    pub fn from_project_settings(settings: &ProjectSettings) -> LoadResult<Self> {
        let file_access = Arc::new(DiskFileAccess::new(
            settings.resource_root.clone(),
            settings.user_root.clone(),
        ));
        let locale = if settings.locale.is_empty() {
            "en"
        } else {
            &settings.locale
        };

        let manager = ResourceManager::builder()
            .file_access(file_access)
            .localizer(Arc::new(settings.clone()))
            .locale_source(Arc::new(FixedLocale::new(locale)))
            .loader_capacity(settings.loader_capacity)
            .stamp_modified_times(settings.stamp_modified_times)
            .build();

        manager.load_translation_remaps(settings);
        manager.load_path_remaps(settings)?;
        Ok(manager)
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.inner.cache
    }

    pub fn loading_map(&self) -> &Arc<LoadingMap> {
        &self.inner.loading_map
    }

    pub fn remapper(&self) -> &ResourceRemapper {
        &self.inner.remapper
    }

    pub fn file_access(&self) -> &Arc<dyn FileAccess> {
        &self.inner.file_access
    }

    pub fn locale_source(&self) -> &Arc<dyn LocaleSource> {
        self.inner.remapper.locale_source()
    }

    pub fn normalize(
        &self,
        path: &str,
    ) -> String {
        normalize_path(path, &*self.inner.localizer)
    }

    fn loader_snapshot(&self) -> Vec<Arc<dyn FormatLoader>> {
        self.inner.loaders.read().unwrap().snapshot()
    }

    fn matching_loaders(
        &self,
        path: &str,
        type_hint: &str,
    ) -> Vec<Arc<dyn FormatLoader>> {
        self.inner.loaders.read().unwrap().matching(path, type_hint)
    }

    //
    // Loading
    //

    /// Load with no type hint, using the cache
    pub fn load(
        &self,
        path: &str,
    ) -> LoadResult<ResourceHandle> {
        self.load_with(path, "", false)
    }

    /// Blocking load.
    ///
    /// # Parameters
    /// * `path` - any path form, it is normalized before use
    /// * `type_hint` - restricts which loaders are considered, may be empty
    /// * `no_cache` - bypass the cache: always run a loader and don't register the result
    #[profiling::function]
    pub fn load_with(
        &self,
        path: &str,
        type_hint: &str,
        no_cache: bool,
    ) -> LoadResult<ResourceHandle> {
        if path.is_empty() {
            return Err(LoadError::CantOpen(path.to_string()));
        }

        let local_path = self.normalize(path);

        let ticket = if !no_cache {
            Some(self.acquire_ticket(&local_path)?)
        } else {
            None
        };

        if !no_cache {
            if let Some(resource) = self.inner.cache.get_strong(&local_path) {
                log::debug!("Cache hit for {}", local_path);
                return Ok(resource);
            }
        }

        let remapped = self.remap(&local_path)?;

        log::debug!("Loading resource: {}", remapped.path);
        let resource = self.load_internal(&remapped.path, &local_path, type_hint, no_cache)?;
        let resource = self.complete_load(
            &local_path,
            &remapped.path,
            resource,
            no_cache,
            remapped.translation_remapped,
        );

        drop(ticket);
        self.notify_loaded(&resource, path);
        Ok(resource)
    }

    /// Starts a staged load with no type hint, using the cache
    pub fn load_interactive(
        &self,
        path: &str,
    ) -> LoadResult<InteractiveLoad> {
        self.load_interactive_with(path, "", false)
    }

    /// Same as `load_with`, but returns a job the caller drives with `poll`. If the resource is
    /// cached the job yields it on the first poll.
    #[profiling::function]
    pub fn load_interactive_with(
        &self,
        path: &str,
        type_hint: &str,
        no_cache: bool,
    ) -> LoadResult<InteractiveLoad> {
        if path.is_empty() {
            return Err(LoadError::CantOpen(path.to_string()));
        }

        let local_path = self.normalize(path);

        let ticket = if !no_cache {
            Some(self.acquire_ticket(&local_path)?)
        } else {
            None
        };

        if !no_cache {
            if let Some(resource) = self.inner.cache.get_strong(&local_path) {
                log::debug!("Cache hit for {}", local_path);
                return Ok(InteractiveLoad::from_cache(
                    self.clone(),
                    &local_path,
                    resource,
                ));
            }
        }

        let remapped = self.remap(&local_path)?;

        log::debug!("Loading resource interactively: {}", remapped.path);
        let ctx = LoadContext::new(self, type_hint, no_cache);
        let mut found = false;
        let mut last_error = None;
        for loader in self.matching_loaders(&remapped.path, type_hint) {
            found = true;
            match loader.load_interactive(&ctx, &remapped.path, &local_path) {
                Ok(job) => {
                    return Ok(InteractiveLoad::new(
                        self.clone(),
                        path,
                        &local_path,
                        &remapped.path,
                        job,
                        ticket,
                        no_cache,
                        remapped.translation_remapped,
                    ));
                }
                Err(e) if e.aborts_dispatch() => return Err(e),
                Err(e) => {
                    log::debug!("Loader could not start loading {}: {}", remapped.path, e);
                    last_error = Some(e);
                }
            }
        }

        Err(Self::dispatch_error(&remapped.path, found, last_error))
    }

    /// Runs the format loaders on an already remapped path. Doesn't touch the cache or cycle
    /// detection, used by loaders that redirect to another path (ex. imported resources).
    ///
    /// # Parameters
    /// * `path` - path to read
    /// * `original_path` - canonical path the resource is being loaded for
    #[profiling::function]
    pub fn load_internal(
        &self,
        path: &str,
        original_path: &str,
        type_hint: &str,
        no_cache: bool,
    ) -> LoadResult<ResourceHandle> {
        let ctx = LoadContext::new(self, type_hint, no_cache);
        let mut found = false;
        let mut last_error = None;
        for loader in self.matching_loaders(path, type_hint) {
            found = true;
            match loader.load(&ctx, path, original_path) {
                Ok(resource) => return Ok(resource),
                Err(e) if e.aborts_dispatch() => {
                    log::error!("{}", e);
                    return Err(e);
                }
                Err(e) => {
                    log::debug!("Loader failed on {}: {}", path, e);
                    last_error = Some(e);
                }
            }
        }

        Err(Self::dispatch_error(path, found, last_error))
    }

    fn dispatch_error(
        path: &str,
        found: bool,
        last_error: Option<LoadError>,
    ) -> LoadError {
        if found {
            log::error!(
                "Failed loading resource: {}. Make sure resources have been imported.",
                path
            );
            LoadError::LoadFailed {
                path: path.to_string(),
                cause: last_error.map(Box::new),
            }
        } else {
            log::error!("No loader found for resource: {}", path);
            LoadError::NoLoader(path.to_string())
        }
    }

    fn acquire_ticket(
        &self,
        local_path: &str,
    ) -> LoadResult<LoadingTicket> {
        self.inner.loading_map.try_acquire(local_path).map_err(|e| {
            log::error!("{}", e);
            e
        })
    }

    fn remap(
        &self,
        local_path: &str,
    ) -> LoadResult<RemapResult> {
        let remapped = self.inner.remapper.remap(local_path)?;
        if remapped.path.is_empty() {
            log::error!("Remapping {} produced an empty path", local_path);
            return Err(LoadError::RemapFailed(local_path.to_string()));
        }

        Ok(remapped)
    }

    // Registers a freshly loaded resource and applies the bookkeeping every successful load gets.
    // Returns the resource the caller should hand out, which is the cached one if another thread
    // finished first.
    pub(crate) fn complete_load(
        &self,
        local_path: &str,
        remapped_path: &str,
        resource: ResourceHandle,
        no_cache: bool,
        translation_remapped: bool,
    ) -> ResourceHandle {
        let resource = if !no_cache {
            self.inner.cache.insert(local_path, resource)
        } else {
            resource
        };

        resource
            .core()
            .set_translation_remapped(translation_remapped);

        if self.inner.stamp_modified_times {
            if let Some(modified_time) = self.inner.file_access.modified_time(remapped_path) {
                resource.core().set_last_modified_time(modified_time);
            }
        }

        resource
    }

    pub(crate) fn notify_loaded(
        &self,
        resource: &ResourceHandle,
        path: &str,
    ) {
        let callback = self.inner.loaded_callback.read().unwrap().clone();
        if let Some(callback) = callback {
            (callback)(resource, path);
        }
    }

    pub fn set_loaded_callback(
        &self,
        callback: Option<LoadedCallback>,
    ) {
        *self.inner.loaded_callback.write().unwrap() = callback;
    }

    //
    // Queries
    //

    /// True if the resource is cached or a loader reports that it exists
    pub fn exists(
        &self,
        path: &str,
        type_hint: &str,
    ) -> bool {
        let local_path = self.normalize(path);
        if self.inner.cache.has(&local_path) {
            return true;
        }

        let remapped_path = self.path_remap(&local_path);
        let ctx = LoadContext::new(self, type_hint, false);
        self.matching_loaders(&remapped_path, type_hint)
            .iter()
            .any(|x| x.exists(&ctx, &remapped_path))
    }

    /// Type of the resource without loading it. First loader with an answer wins.
    pub fn get_resource_type(
        &self,
        path: &str,
    ) -> Option<String> {
        let local_path = self.normalize(path);
        let ctx = LoadContext::new(self, "", false);
        self.matching_loaders(&local_path, "")
            .iter()
            .find_map(|x| x.resource_type(&ctx, &local_path))
    }

    /// Paths referenced by the resource, from every loader that recognizes it
    pub fn get_dependencies(
        &self,
        path: &str,
        add_types: bool,
    ) -> Vec<String> {
        let local_path = self.normalize(path);
        let remapped_path = self.path_remap(&local_path);
        let ctx = LoadContext::new(self, "", false);
        let mut dependencies = Vec::default();
        for loader in self.matching_loaders(&remapped_path, "") {
            dependencies.extend(loader.dependencies(&ctx, &remapped_path, add_types));
        }

        dependencies
    }

    /// Rewrites references inside the file. Handled by the first loader that recognizes the path.
    pub fn rename_dependencies(
        &self,
        path: &str,
        renames: &HashMap<String, String>,
    ) -> LoadResult<()> {
        if renames.is_empty() {
            return Ok(());
        }

        let local_path = self.normalize(path);
        let remapped_path = self.path_remap(&local_path);
        let ctx = LoadContext::new(self, "", false);
        match self.matching_loaders(&remapped_path, "").first() {
            Some(loader) => loader.rename_dependencies(&ctx, &remapped_path, renames),
            None => Ok(()),
        }
    }

    fn first_matching<T, F: FnOnce(&dyn FormatLoader, &LoadContext, &str) -> T>(
        &self,
        path: &str,
        default: T,
        f: F,
    ) -> T {
        let local_path = self.normalize(path);
        let remapped_path = self.path_remap(&local_path);
        let ctx = LoadContext::new(self, "", false);
        match self.matching_loaders(&remapped_path, "").first() {
            Some(loader) => f(&**loader, &ctx, &remapped_path),
            None => default,
        }
    }

    pub fn is_imported(
        &self,
        path: &str,
    ) -> bool {
        self.first_matching(path, false, |loader, ctx, path| {
            loader.is_imported(ctx, path)
        })
    }

    pub fn is_import_valid(
        &self,
        path: &str,
    ) -> bool {
        // A path no loader recognizes is never a valid import
        self.first_matching(path, false, |loader, ctx, path| {
            loader.is_import_valid(ctx, path)
        })
    }

    pub fn get_import_order(
        &self,
        path: &str,
    ) -> i32 {
        self.first_matching(path, 0, |loader, ctx, path| loader.import_order(ctx, path))
    }

    pub fn get_import_group_file(
        &self,
        path: &str,
    ) -> Option<String> {
        self.first_matching(path, None, |loader, ctx, path| {
            loader.import_group_file(ctx, path)
        })
    }

    /// Internal path of an imported file, or the path itself if it isn't imported
    pub fn import_remap(
        &self,
        path: &str,
    ) -> String {
        let local_path = self.normalize(path);
        let ctx = LoadContext::new(self, "", false);
        self.matching_loaders(&local_path, "")
            .iter()
            .filter(|x| x.is_imported(&ctx, &local_path))
            .find_map(|x| x.internal_resource_path(&ctx, &local_path))
            .unwrap_or(local_path)
    }

    /// Runs the remap pipeline without loading. Errors leave the path unchanged.
    pub fn path_remap(
        &self,
        path: &str,
    ) -> String {
        match self.inner.remapper.remap(path) {
            Ok(remapped) if !remapped.path.is_empty() => remapped.path,
            _ => path.to_string(),
        }
    }

    /// Union of the extensions every loader can read for the type, in dispatch order
    pub fn get_recognized_extensions_for_type(
        &self,
        type_name: &str,
    ) -> Vec<String> {
        let mut seen = HashSet::default();
        let mut extensions = Vec::default();
        for loader in self.loader_snapshot() {
            for extension in loader.recognized_extensions_for_type(type_name) {
                if seen.insert(extension.to_lowercase()) {
                    extensions.push(extension);
                }
            }
        }

        extensions
    }

    //
    // Loader registration
    //

    pub fn add_format_loader(
        &self,
        loader: Arc<dyn FormatLoader>,
        at_front: bool,
    ) -> LoadResult<()> {
        log::debug!(
            "Adding format loader for {:?} (at_front: {})",
            loader.recognized_extensions(),
            at_front
        );
        self.inner.loaders.write().unwrap().add(loader, at_front)
    }

    pub fn remove_format_loader(
        &self,
        loader: &Arc<dyn FormatLoader>,
    ) -> bool {
        self.inner.loaders.write().unwrap().remove(loader)
    }

    pub fn format_loader_count(&self) -> usize {
        self.inner.loaders.read().unwrap().len()
    }

    pub fn add_plugin_loader(
        &self,
        plugin: Arc<dyn ResourceLoaderPlugin>,
        at_front: bool,
    ) -> LoadResult<()> {
        log::debug!(
            "Adding plugin loader for {:?}",
            plugin.recognized_extensions()
        );
        self.inner
            .loaders
            .write()
            .unwrap()
            .add_plugin(plugin, at_front)
    }

    pub fn remove_plugin_loader(
        &self,
        plugin: &Arc<dyn ResourceLoaderPlugin>,
    ) -> bool {
        self.inner.loaders.write().unwrap().remove_plugin(plugin)
    }

    pub fn set_script_bridge(
        &self,
        script_bridge: Option<Arc<dyn ScriptBridge>>,
    ) {
        *self.inner.script_bridge.write().unwrap() = script_bridge;
    }

    fn script_bridge(&self) -> LoadResult<Arc<dyn ScriptBridge>> {
        self.inner
            .script_bridge
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| LoadError::InvalidScript("No script bridge is set".to_string()))
    }

    /// Instantiates the script and registers it at the front of the loader list
    pub fn add_custom_loader(
        &self,
        script_path: &str,
    ) -> LoadResult<()> {
        let script_bridge = self.script_bridge()?;
        let script = script_bridge.load_script(script_path)?;
        let loader = Arc::new(ScriptedFormatLoader::new(&script)?);
        log::debug!("Adding scripted format loader {}", script_path);
        self.inner
            .loaders
            .write()
            .unwrap()
            .add_scripted(script_path, loader, true)
    }

    pub fn remove_custom_loader(
        &self,
        script_path: &str,
    ) -> bool {
        self.inner
            .loaders
            .write()
            .unwrap()
            .remove_scripted(script_path)
    }

    /// Registers every global script class deriving from the format loader base type. Returns how
    /// many were added.
    pub fn add_custom_loaders(&self) -> LoadResult<usize> {
        let script_bridge = self.script_bridge()?;
        let mut added = 0;
        for class in script_bridge.global_classes() {
            if class.base != FORMAT_LOADER_SCRIPT_BASE {
                continue;
            }

            if self
                .inner
                .loaders
                .read()
                .unwrap()
                .has_scripted(&class.path)
            {
                continue;
            }

            match self.add_custom_loader(&class.path) {
                Ok(()) => added += 1,
                Err(e) => log::error!("Could not add custom loader {}: {}", class.name, e),
            }
        }

        Ok(added)
    }

    pub fn remove_custom_loaders(&self) -> usize {
        self.inner.loaders.write().unwrap().remove_all_scripted()
    }

    //
    // Remaps
    //

    pub fn set_translation_remaps(
        &self,
        remaps: HashMap<String, Vec<String>>,
    ) {
        self.inner.remapper.set_translation_remaps(remaps);
    }

    pub fn set_path_remaps(
        &self,
        remaps: HashMap<String, String>,
    ) {
        self.inner.remapper.set_path_remaps(remaps);
    }

    pub fn clear_translation_remaps(&self) {
        self.inner.remapper.clear_translation_remaps();
    }

    pub fn clear_path_remaps(&self) {
        self.inner.remapper.clear_path_remaps();
    }

    pub fn load_translation_remaps(
        &self,
        settings: &ProjectSettings,
    ) {
        for (path, targets) in &settings.translation_remaps {
            self.inner
                .remapper
                .add_translation_remap(path, targets.clone());
        }
    }

    pub fn load_path_remaps(
        &self,
        settings: &ProjectSettings,
    ) -> LoadResult<()> {
        for (from, to) in &settings.path_remaps {
            self.inner.remapper.add_path_remap(from, to);
        }

        Ok(())
    }

    /// Live cached resources that were loaded through a translation remap. These are the ones to
    /// reload after the locale changes.
    pub fn translation_remapped_resources(&self) -> Vec<ResourceHandle> {
        self.inner
            .cache
            .resources()
            .into_iter()
            .filter(|x| x.core().is_translation_remapped())
            .collect()
    }

    //
    // Teardown
    //

    /// Clears all registrations and the cache. Loads still in flight are reported, they indicate
    /// a thread that exited or a job that leaked while loading.
    pub fn finalize(&self) {
        for pending in self.inner.loading_map.pending() {
            log::error!("Exited while resource is being loaded: {}", pending.path);
        }
        self.inner.loading_map.clear();

        self.inner.loaders.write().unwrap().clear();
        *self.inner.script_bridge.write().unwrap() = None;
        *self.inner.loaded_callback.write().unwrap() = None;
        self.inner.remapper.clear_translation_remaps();
        self.inner.remapper.clear_path_remaps();
        self.inner.cache.clear();
    }
}
