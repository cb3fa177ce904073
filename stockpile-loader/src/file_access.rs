use stockpile_base::hashing::HashMap;
use stockpile_base::resource_path::{scheme, simplify_path, RESOURCE_SCHEME, USER_SCHEME};
use stockpile_base::{LoadError, LoadResult};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::UNIX_EPOCH;

/// Read-only view of the storage resources are loaded from. Paths are canonical resource paths.
pub trait FileAccess: Send + Sync {
    fn exists(
        &self,
        path: &str,
    ) -> bool;

    fn read_to_string(
        &self,
        path: &str,
    ) -> LoadResult<String>;

    /// Seconds since the unix epoch, None if the file doesn't exist or the time isn't available
    fn modified_time(
        &self,
        path: &str,
    ) -> Option<u64>;
}

/// Maps `res://` and `user://` onto directories on disk. Other absolute paths are used as-is.
pub struct DiskFileAccess {
    resource_root: PathBuf,
    user_root: Option<PathBuf>,
}

impl DiskFileAccess {
    pub fn new(
        resource_root: PathBuf,
        user_root: Option<PathBuf>,
    ) -> Self {
        DiskFileAccess {
            resource_root,
            user_root,
        }
    }

    pub fn resource_root(&self) -> &Path {
        &self.resource_root
    }

    /// Returns None for schemes that don't map to a directory, and for `res://` or `user://` paths
    /// that climb above their root
    pub fn resolve(
        &self,
        path: &str,
    ) -> Option<PathBuf> {
        match scheme(path) {
            Some(RESOURCE_SCHEME) => {
                Some(self.resource_root.join(rooted_relative_path(path, RESOURCE_SCHEME)?))
            }
            Some(USER_SCHEME) => {
                let relative = rooted_relative_path(path, USER_SCHEME)?;
                self.user_root.as_ref().map(|x| x.join(relative))
            }
            Some(_) => None,
            None => Some(PathBuf::from(path)),
        }
    }
}

// The part of `path` after `prefix`, simplified. None if it still starts with `..`
fn rooted_relative_path(
    path: &str,
    prefix: &str,
) -> Option<String> {
    let simplified = simplify_path(path);
    let relative = simplified.strip_prefix(prefix)?;
    if relative == ".." || relative.starts_with("../") {
        log::warn!("Path {} points outside of {}", path, prefix);
        return None;
    }

    Some(relative.to_string())
}

impl FileAccess for DiskFileAccess {
    fn exists(
        &self,
        path: &str,
    ) -> bool {
        self.resolve(path).map(|x| x.is_file()).unwrap_or(false)
    }

    fn read_to_string(
        &self,
        path: &str,
    ) -> LoadResult<String> {
        let disk_path = self
            .resolve(path)
            .ok_or_else(|| LoadError::CantOpen(path.to_string()))?;
        log::trace!("Reading {} from {:?}", path, disk_path);
        std::fs::read_to_string(&disk_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoadError::CantOpen(path.to_string())
            } else {
                e.into()
            }
        })
    }

    fn modified_time(
        &self,
        path: &str,
    ) -> Option<u64> {
        let disk_path = self.resolve(path)?;
        let modified = std::fs::metadata(disk_path).ok()?.modified().ok()?;
        modified
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|x| x.as_secs())
    }
}

struct MemoryFile {
    contents: String,
    modified_time: u64,
}

/// File access backed by a map, for tests and for embedders that pack resources in memory
#[derive(Default)]
pub struct MemoryFileAccess {
    files: RwLock<HashMap<String, MemoryFile>>,
}

impl MemoryFileAccess {
    pub fn add_file(
        &self,
        path: &str,
        contents: &str,
    ) {
        self.add_file_with_time(path, contents, 0);
    }

    pub fn add_file_with_time(
        &self,
        path: &str,
        contents: &str,
        modified_time: u64,
    ) {
        self.files.write().unwrap().insert(
            path.to_string(),
            MemoryFile {
                contents: contents.to_string(),
                modified_time,
            },
        );
    }

    pub fn remove_file(
        &self,
        path: &str,
    ) -> bool {
        self.files.write().unwrap().remove(path).is_some()
    }
}

impl FileAccess for MemoryFileAccess {
    fn exists(
        &self,
        path: &str,
    ) -> bool {
        self.files.read().unwrap().contains_key(path)
    }

    fn read_to_string(
        &self,
        path: &str,
    ) -> LoadResult<String> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .map(|x| x.contents.clone())
            .ok_or_else(|| LoadError::CantOpen(path.to_string()))
    }

    fn modified_time(
        &self,
        path: &str,
    ) -> Option<u64> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .map(|x| x.modified_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_base::ErrorKind;

    #[test]
    fn disk_access_maps_schemes() {
        let resource_dir = tempfile::tempdir().unwrap();
        let user_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(resource_dir.path().join("textures")).unwrap();
        std::fs::write(resource_dir.path().join("textures/a.txt"), "hello").unwrap();
        std::fs::write(user_dir.path().join("save.txt"), "saved").unwrap();

        let file_access = DiskFileAccess::new(
            resource_dir.path().to_path_buf(),
            Some(user_dir.path().to_path_buf()),
        );
        assert!(file_access.exists("res://textures/a.txt"));
        assert!(!file_access.exists("res://textures/b.txt"));
        assert_eq!(
            file_access.read_to_string("res://textures/a.txt").unwrap(),
            "hello"
        );
        assert_eq!(file_access.read_to_string("user://save.txt").unwrap(), "saved");
        assert!(file_access.modified_time("res://textures/a.txt").is_some());
        assert!(file_access.resolve("http://example.com/a.txt").is_none());

        let error = file_access.read_to_string("res://missing.txt").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::CantOpen);
    }

    #[test]
    fn disk_access_stays_inside_roots() {
        let parent_dir = tempfile::tempdir().unwrap();
        let resource_root = parent_dir.path().join("res");
        std::fs::create_dir_all(resource_root.join("sub")).unwrap();
        std::fs::write(parent_dir.path().join("secret.txt"), "secret").unwrap();
        std::fs::write(resource_root.join("a.txt"), "a").unwrap();

        let file_access = DiskFileAccess::new(resource_root.clone(), Some(resource_root.clone()));
        assert!(file_access.resolve("res://../secret.txt").is_none());
        assert!(file_access.resolve("res://sub/../../secret.txt").is_none());
        assert!(file_access.resolve("user://../secret.txt").is_none());
        assert!(!file_access.exists("res://../secret.txt"));
        assert_eq!(
            file_access
                .read_to_string("res://../secret.txt")
                .unwrap_err()
                .kind(),
            ErrorKind::CantOpen
        );

        // Climbing back down inside the root is fine
        assert_eq!(
            file_access.resolve("res://sub/../a.txt"),
            Some(resource_root.join("a.txt"))
        );
        assert_eq!(file_access.read_to_string("res://sub/../a.txt").unwrap(), "a");
    }

    #[test]
    fn memory_access() {
        let file_access = MemoryFileAccess::default();
        file_access.add_file_with_time("res://a.txt", "a", 42);
        assert!(file_access.exists("res://a.txt"));
        assert_eq!(file_access.modified_time("res://a.txt"), Some(42));
        assert!(file_access.remove_file("res://a.txt"));
        assert!(!file_access.exists("res://a.txt"));
        assert_eq!(
            file_access.read_to_string("res://a.txt").unwrap_err().kind(),
            ErrorKind::CantOpen
        );
    }
}
