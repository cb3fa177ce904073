use crate::file_access::FileAccess;
use crate::interactive::{CompletedInteractiveLoader, InteractiveLoader};
use crate::manager::ResourceManager;
use stockpile_base::hashing::HashMap;
use stockpile_base::resource_path::extension;
use stockpile_base::{LoadResult, ResourceHandle};
use std::sync::Arc;

/// Type name every resource type derives from. A type hint of this (or an empty hint) matches
/// every loader.
pub const BASE_RESOURCE_TYPE: &str = "Resource";

/// Handed to format loaders for the duration of a call. Gives access to the manager so that a
/// loader can load sub-resources through the normal pipeline.
pub struct LoadContext<'a> {
    manager: &'a ResourceManager,
    type_hint: &'a str,
    no_cache: bool,
}

impl<'a> LoadContext<'a> {
    pub fn new(
        manager: &'a ResourceManager,
        type_hint: &'a str,
        no_cache: bool,
    ) -> Self {
        LoadContext {
            manager,
            type_hint,
            no_cache,
        }
    }

    pub fn manager(&self) -> &'a ResourceManager {
        self.manager
    }

    pub fn file_access(&self) -> &'a Arc<dyn FileAccess> {
        self.manager.file_access()
    }

    /// Type the caller asked for, may be empty
    pub fn type_hint(&self) -> &'a str {
        self.type_hint
    }

    /// True when the caller bypassed the cache. Loaders that load sub-resources should do the same.
    pub fn no_cache(&self) -> bool {
        self.no_cache
    }
}

/// Turns a path into a resource. Registered with the `ResourceManager`, which asks every loader
/// that recognizes a path in registration order until one succeeds.
pub trait FormatLoader: Send + Sync + 'static {
    /// File extensions (without the dot) this loader can read
    fn recognized_extensions(&self) -> Vec<String>;

    /// True if this loader produces resources of the given type
    fn handles_type(
        &self,
        _type_name: &str,
    ) -> bool {
        false
    }

    /// Extensions this loader can read that produce the given type. An empty or base type matches
    /// all of them.
    fn recognized_extensions_for_type(
        &self,
        type_name: &str,
    ) -> Vec<String> {
        if type_name.is_empty() || type_name == BASE_RESOURCE_TYPE || self.handles_type(type_name) {
            self.recognized_extensions()
        } else {
            Vec::default()
        }
    }

    /// Decides by extension alone (case-insensitive). Must not touch the cache or storage.
    ///
    /// # Parameters
    /// * `path` - path after remapping
    /// * `type_hint` - type requested by the caller, may be empty
    fn recognize_path(
        &self,
        path: &str,
        type_hint: &str,
    ) -> bool {
        let extension = match extension(path) {
            Some(extension) => extension.to_lowercase(),
            None => return false,
        };

        self.recognized_extensions_for_type(type_hint)
            .iter()
            .any(|x| x.to_lowercase() == extension)
    }

    /// Blocking load
    ///
    /// # Parameters
    /// * `path` - path to read from, after remapping
    /// * `original_path` - canonical path the caller asked for, the resource will be cached under
    ///   this path
    fn load(
        &self,
        ctx: &LoadContext,
        path: &str,
        original_path: &str,
    ) -> LoadResult<ResourceHandle>;

    /// Starts a staged load. Loaders that can't split their work get a job that performs the
    /// blocking load here and reports it on the first poll.
    fn load_interactive(
        &self,
        ctx: &LoadContext,
        path: &str,
        original_path: &str,
    ) -> LoadResult<Box<dyn InteractiveLoader>> {
        let result = self.load(ctx, path, original_path);
        Ok(Box::new(CompletedInteractiveLoader::new(result)))
    }

    fn exists(
        &self,
        ctx: &LoadContext,
        path: &str,
    ) -> bool {
        ctx.file_access().exists(path)
    }

    /// Type of the resource at `path` without loading it, None if unknown
    fn resource_type(
        &self,
        _ctx: &LoadContext,
        _path: &str,
    ) -> Option<String> {
        None
    }

    /// Paths the resource at `path` references. With `add_types`, entries are "path::Type".
    fn dependencies(
        &self,
        _ctx: &LoadContext,
        _path: &str,
        _add_types: bool,
    ) -> Vec<String> {
        Vec::default()
    }

    /// Rewrites references inside the file at `path` according to `renames` (old path -> new path)
    fn rename_dependencies(
        &self,
        _ctx: &LoadContext,
        _path: &str,
        _renames: &HashMap<String, String>,
    ) -> LoadResult<()> {
        Ok(())
    }

    fn is_imported(
        &self,
        _ctx: &LoadContext,
        _path: &str,
    ) -> bool {
        false
    }

    fn is_import_valid(
        &self,
        _ctx: &LoadContext,
        _path: &str,
    ) -> bool {
        true
    }

    fn import_order(
        &self,
        _ctx: &LoadContext,
        _path: &str,
    ) -> i32 {
        0
    }

    fn import_group_file(
        &self,
        _ctx: &LoadContext,
        _path: &str,
    ) -> Option<String> {
        None
    }

    /// For imported files, the path of the converted resource the loader actually reads
    fn internal_resource_path(
        &self,
        _ctx: &LoadContext,
        _path: &str,
    ) -> Option<String> {
        None
    }
}
