use crate::resource_cache::ResourceCache;
use downcast_rs::DowncastSync;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

/// State the registry keeps on every resource. Resource implementations embed one of these and
/// return it from `Resource::core()`.
///
/// Dropping the core (which happens when the last strong handle to the resource goes away)
/// deregisters the resource from the cache it was inserted into.
#[derive(Default)]
pub struct ResourceCore {
    // Canonical path the resource was loaded from, before any remapping. Empty for resources that
    // were never cached
    path: RwLock<String>,

    // Set when a translation remap picked a locale-specific file for this resource
    translation_remapped: AtomicBool,

    // Seconds since unix epoch of the source file, only stamped when the manager is configured to
    // do so (editor builds)
    last_modified_time: AtomicU64,

    // Internal path an importer produced this resource from
    import_path: RwLock<String>,

    // Cache that holds a weak entry for this resource
    cache: Mutex<Weak<ResourceCache>>,
}

impl ResourceCore {
    pub fn path(&self) -> String {
        self.path.read().unwrap().clone()
    }

    pub fn is_translation_remapped(&self) -> bool {
        self.translation_remapped.load(Ordering::Acquire)
    }

    pub fn set_translation_remapped(
        &self,
        translation_remapped: bool,
    ) {
        self.translation_remapped
            .store(translation_remapped, Ordering::Release);
    }

    pub fn last_modified_time(&self) -> u64 {
        self.last_modified_time.load(Ordering::Acquire)
    }

    pub fn set_last_modified_time(
        &self,
        time: u64,
    ) {
        self.last_modified_time.store(time, Ordering::Release);
    }

    pub fn import_path(&self) -> String {
        self.import_path.read().unwrap().clone()
    }

    pub fn set_import_path(
        &self,
        path: &str,
    ) {
        *self.import_path.write().unwrap() = path.to_string();
    }

    // Only the cache assigns paths, it keeps the entry and the path in sync
    pub(crate) fn set_path(
        &self,
        path: &str,
    ) -> String {
        std::mem::replace(&mut *self.path.write().unwrap(), path.to_string())
    }

    pub(crate) fn attach_cache(
        &self,
        cache: &Arc<ResourceCache>,
    ) {
        *self.cache.lock().unwrap() = Arc::downgrade(cache);
    }
}

impl Drop for ResourceCore {
    fn drop(&mut self) {
        let cache = match self.cache.get_mut() {
            Ok(cache) => cache.upgrade(),
            Err(_) => None,
        };

        if let Some(cache) = cache {
            if let Ok(path) = self.path.get_mut() {
                if !path.is_empty() {
                    cache.remove_if_dead(path);
                }
            }
        }
    }
}

impl std::fmt::Debug for ResourceCore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ResourceCore")
            .field("path", &self.path())
            .field("translation_remapped", &self.is_translation_remapped())
            .field("last_modified_time", &self.last_modified_time())
            .finish()
    }
}

/// Anything a format loader can produce. The registry only looks at the embedded `ResourceCore`
/// and the type name, the rest is opaque.
pub trait Resource: DowncastSync {
    fn core(&self) -> &ResourceCore;

    /// Runtime type name, ex. "Texture" or "Mesh"
    fn resource_type(&self) -> &str;

    fn path(&self) -> String {
        self.core().path()
    }
}

downcast_rs::impl_downcast!(sync Resource);

impl std::fmt::Debug for dyn Resource {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("type", &self.resource_type())
            .field("path", &self.path())
            .finish()
    }
}

/// Strong reference to a resource
pub type ResourceHandle = Arc<dyn Resource>;
/// What the cache stores. Promotion fails once the last strong handle is gone.
pub type WeakResourceHandle = Weak<dyn Resource>;

/// Pointer equality, two handles to the same resource object
pub fn is_same_resource(
    a: &ResourceHandle,
    b: &ResourceHandle,
) -> bool {
    Arc::ptr_eq(a, b)
}
