pub mod hashing;

mod load_error;
pub use load_error::{ErrorKind, LoadError, LoadResult};

pub mod resource_path;
pub use resource_path::{normalize_path, PathLocalizer, SchemeLocalizer};

pub mod resource;
pub use resource::{is_same_resource, Resource, ResourceCore, ResourceHandle, WeakResourceHandle};

pub mod resource_cache;
pub use resource_cache::ResourceCache;
