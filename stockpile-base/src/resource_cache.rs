use crate::hashing::HashMap;
use crate::resource::{ResourceHandle, WeakResourceHandle};
use std::sync::{Arc, RwLock, Weak};

/// Maps canonical paths to weak handles of live resources, so that there is at most one live
/// resource per path.
///
/// Entries are removed by the resource itself when its last strong handle drops. A weak handle
/// that fails to promote means the resource is being destroyed right now. Callers treat that as a
/// miss and the slot is cleaned up by the destructor.
#[derive(Default)]
pub struct ResourceCache {
    resources: RwLock<HashMap<String, WeakResourceHandle>>,
}

impl ResourceCache {
    pub fn new() -> Arc<Self> {
        Arc::new(ResourceCache::default())
    }

    /// Returns the weak handle without promoting it
    pub fn get(
        &self,
        path: &str,
    ) -> Option<WeakResourceHandle> {
        self.resources.read().unwrap().get(path).cloned()
    }

    #[profiling::function]
    pub fn get_strong(
        &self,
        path: &str,
    ) -> Option<ResourceHandle> {
        let resources = self.resources.read().unwrap();
        // Promote while the read lock is held so that the entry can't be swapped underneath us
        let resource = resources.get(path).and_then(|x| x.upgrade());
        // The lock must be released before the promoted handle could possibly be dropped, the
        // destructor takes the write side
        drop(resources);
        resource
    }

    /// True if there is an entry for the path whose resource is still alive
    pub fn has(
        &self,
        path: &str,
    ) -> bool {
        self.resources
            .read()
            .unwrap()
            .get(path)
            .map(|x| x.strong_count() > 0)
            .unwrap_or(false)
    }

    /// Registers `resource` under `path` and sets its path. If another live resource is already
    /// registered under the path it wins: the passed-in resource is discarded and the existing one
    /// is returned. Callers must use the returned handle.
    #[profiling::function]
    pub fn insert(
        self: &Arc<Self>,
        path: &str,
        resource: ResourceHandle,
    ) -> ResourceHandle {
        let mut resources = self.resources.write().unwrap();
        let existing = resources.get(path).and_then(|x| x.upgrade());
        if let Some(existing) = existing {
            drop(resources);
            if !Arc::ptr_eq(&existing, &resource) {
                log::debug!(
                    "Resource {} was cached by another load first, discarding duplicate",
                    path
                );
            }
            return existing;
        }

        let previous_path = resource.core().set_path(path);
        resource.core().attach_cache(self);
        resources.insert(path.to_string(), Arc::downgrade(&resource));

        // A resource moved to a new path leaves its old entry
        if !previous_path.is_empty() && previous_path != path {
            let weak = Arc::downgrade(&resource);
            let is_old_entry = resources
                .get(&previous_path)
                .map(|x| Weak::ptr_eq(x, &weak))
                .unwrap_or(false);
            if is_old_entry {
                resources.remove(&previous_path);
            }
        }

        drop(resources);
        resource
    }

    pub fn remove(
        &self,
        path: &str,
    ) {
        self.resources.write().unwrap().remove(path);
    }

    // Called from the resource destructor. The entry may already have been replaced by a new live
    // resource, in which case it must be kept.
    pub(crate) fn remove_if_dead(
        &self,
        path: &str,
    ) {
        let mut resources = self.resources.write().unwrap();
        let is_dead = resources
            .get(path)
            .map(|x| x.strong_count() == 0)
            .unwrap_or(false);
        if is_dead {
            resources.remove(path);
        }
    }

    /// Number of entries, including ones whose resource is being destroyed
    pub fn len(&self) -> usize {
        self.resources.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().unwrap().is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        self.resources.read().unwrap().keys().cloned().collect()
    }

    /// Strong handles to every live cached resource
    pub fn resources(&self) -> Vec<ResourceHandle> {
        let resources = self.resources.read().unwrap();
        let live: Vec<_> = resources.values().filter_map(|x| x.upgrade()).collect();
        drop(resources);
        live
    }

    pub fn clear(&self) {
        let mut resources = self.resources.write().unwrap();
        let live_count = resources.values().filter(|x| x.strong_count() > 0).count();
        if live_count > 0 {
            log::warn!(
                "{} resources still in use while clearing the resource cache",
                live_count
            );
        }
        resources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{is_same_resource, Resource, ResourceCore};
    use crate::{ErrorKind, LoadError, LoadResult};

    #[derive(Default)]
    struct TestResource {
        core: ResourceCore,
    }

    impl Resource for TestResource {
        fn core(&self) -> &ResourceCore {
            &self.core
        }

        fn resource_type(&self) -> &str {
            "TestResource"
        }
    }

    fn new_resource() -> ResourceHandle {
        Arc::new(TestResource::default())
    }

    #[test]
    fn insert_sets_path_and_get_returns_same_object() {
        let cache = ResourceCache::new();
        let resource = cache.insert("res://a.png", new_resource());
        assert_eq!(resource.path(), "res://a.png");

        let cached = cache.get_strong("res://a.png").unwrap();
        assert!(is_same_resource(&resource, &cached));
        assert!(cache.has("res://a.png"));
        assert!(cache.get("res://a.png").is_some());
        assert!(cache.get_strong("res://b.png").is_none());
    }

    #[test]
    fn handles_debug_print_type_and_path() {
        let cache = ResourceCache::new();
        let resource = cache.insert("res://a.png", new_resource());
        let printed = format!("{:?}", resource);
        assert!(printed.contains("TestResource"));
        assert!(printed.contains("res://a.png"));

        let result: LoadResult<ResourceHandle> =
            Err(LoadError::NoLoader("res://b.png".to_string()));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NoLoader);
    }

    #[test]
    fn dropping_last_handle_removes_entry() {
        let cache = ResourceCache::new();
        let resource = cache.insert("res://a.png", new_resource());
        assert_eq!(cache.len(), 1);
        drop(resource);
        assert_eq!(cache.len(), 0);
        assert!(cache.get_strong("res://a.png").is_none());
    }

    #[test]
    fn second_insert_returns_existing_resource() {
        let cache = ResourceCache::new();
        let first = cache.insert("res://a.png", new_resource());
        let duplicate = new_resource();
        let second = cache.insert("res://a.png", duplicate.clone());
        assert!(is_same_resource(&first, &second));
        assert!(!is_same_resource(&duplicate, &second));
        // The duplicate never became part of the cache
        assert_eq!(duplicate.path(), "");

        // Dropping the duplicate must not disturb the live entry
        drop(duplicate);
        assert!(cache.has("res://a.png"));
    }

    #[test]
    fn dead_entry_is_replaced() {
        let cache = ResourceCache::new();
        let weak = {
            let resource = cache.insert("res://a.png", new_resource());
            Arc::downgrade(&resource)
        };
        assert!(weak.upgrade().is_none());
        let replacement = cache.insert("res://a.png", new_resource());
        let cached = cache.get_strong("res://a.png").unwrap();
        assert!(is_same_resource(&replacement, &cached));
    }

    #[test]
    fn moved_resource_leaves_old_entry() {
        let cache = ResourceCache::new();
        let resource = cache.insert("res://old.tres", new_resource());
        let resource = cache.insert("res://new.tres", resource);
        assert_eq!(resource.path(), "res://new.tres");
        assert!(!cache.has("res://old.tres"));
        assert!(cache.has("res://new.tres"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_inserts_agree_on_one_resource() {
        let cache = ResourceCache::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let existing = cache.get_strong("res://shared.png");
                    match existing {
                        Some(existing) => existing,
                        None => cache.insert("res://shared.png", new_resource()),
                    }
                })
            })
            .collect();

        let results: Vec<_> = threads.into_iter().map(|x| x.join().unwrap()).collect();
        for result in &results {
            assert!(is_same_resource(result, &results[0]));
        }
    }

    #[test]
    fn clear_drops_all_entries() {
        let cache = ResourceCache::new();
        let _a = cache.insert("res://a.png", new_resource());
        let _b = cache.insert("res://b.png", new_resource());
        assert_eq!(cache.resources().len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
