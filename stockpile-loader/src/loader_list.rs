use crate::format_loader::FormatLoader;
use crate::plugin_loader::{PluginLoaderWrapper, ResourceLoaderPlugin};
use stockpile_base::{LoadError, LoadResult};
use std::sync::Arc;

pub const DEFAULT_LOADER_CAPACITY: usize = 64;

// Where a registered loader came from, needed to find it again on removal
#[derive(Clone)]
enum LoaderOrigin {
    Native,
    Plugin(Arc<dyn ResourceLoaderPlugin>),
    Script(String),
}

#[derive(Clone)]
struct LoaderEntry {
    loader: Arc<dyn FormatLoader>,
    origin: LoaderOrigin,
}

/// Ordered format loaders. The first loader that recognizes a path gets to load it, so adding a
/// loader at the front overrides everything registered before it.
pub struct LoaderList {
    entries: Vec<LoaderEntry>,
    capacity: usize,
}

impl Default for LoaderList {
    fn default() -> Self {
        LoaderList::new(DEFAULT_LOADER_CAPACITY)
    }
}

impl LoaderList {
    pub fn new(capacity: usize) -> Self {
        LoaderList {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn insert(
        &mut self,
        entry: LoaderEntry,
        at_front: bool,
    ) -> LoadResult<()> {
        if self.entries.len() >= self.capacity {
            return Err(LoadError::LoaderListFull(self.capacity));
        }

        if at_front {
            self.entries.insert(0, entry);
        } else {
            self.entries.push(entry);
        }

        Ok(())
    }

    pub fn add(
        &mut self,
        loader: Arc<dyn FormatLoader>,
        at_front: bool,
    ) -> LoadResult<()> {
        self.insert(
            LoaderEntry {
                loader,
                origin: LoaderOrigin::Native,
            },
            at_front,
        )
    }

    /// Removes the loader, keeping the order of the others. Returns false if it wasn't registered.
    pub fn remove(
        &mut self,
        loader: &Arc<dyn FormatLoader>,
    ) -> bool {
        let count = self.entries.len();
        self.entries.retain(|x| !Arc::ptr_eq(&x.loader, loader));
        self.entries.len() != count
    }

    pub fn contains(
        &self,
        loader: &Arc<dyn FormatLoader>,
    ) -> bool {
        self.entries.iter().any(|x| Arc::ptr_eq(&x.loader, loader))
    }

    pub fn add_plugin(
        &mut self,
        plugin: Arc<dyn ResourceLoaderPlugin>,
        at_front: bool,
    ) -> LoadResult<()> {
        if self.has_plugin(&plugin) {
            return Err(LoadError::AlreadyRegistered(
                "plugin loader is already wrapped".to_string(),
            ));
        }

        let wrapper = Arc::new(PluginLoaderWrapper::new(plugin.clone()));
        self.insert(
            LoaderEntry {
                loader: wrapper,
                origin: LoaderOrigin::Plugin(plugin),
            },
            at_front,
        )
    }

    pub fn has_plugin(
        &self,
        plugin: &Arc<dyn ResourceLoaderPlugin>,
    ) -> bool {
        self.entries.iter().any(|x| match &x.origin {
            LoaderOrigin::Plugin(existing) => Arc::ptr_eq(existing, plugin),
            _ => false,
        })
    }

    pub fn remove_plugin(
        &mut self,
        plugin: &Arc<dyn ResourceLoaderPlugin>,
    ) -> bool {
        let count = self.entries.len();
        self.entries.retain(|x| match &x.origin {
            LoaderOrigin::Plugin(existing) => !Arc::ptr_eq(existing, plugin),
            _ => true,
        });
        self.entries.len() != count
    }

    pub fn add_scripted(
        &mut self,
        script_path: &str,
        loader: Arc<dyn FormatLoader>,
        at_front: bool,
    ) -> LoadResult<()> {
        if self.has_scripted(script_path) {
            return Err(LoadError::AlreadyRegistered(script_path.to_string()));
        }

        self.insert(
            LoaderEntry {
                loader,
                origin: LoaderOrigin::Script(script_path.to_string()),
            },
            at_front,
        )
    }

    pub fn has_scripted(
        &self,
        script_path: &str,
    ) -> bool {
        self.entries
            .iter()
            .any(|x| matches!(&x.origin, LoaderOrigin::Script(path) if path == script_path))
    }

    /// Drops the loader registered for the script, which releases the script instance
    pub fn remove_scripted(
        &mut self,
        script_path: &str,
    ) -> bool {
        let count = self.entries.len();
        self.entries
            .retain(|x| !matches!(&x.origin, LoaderOrigin::Script(path) if path == script_path));
        self.entries.len() != count
    }

    pub fn remove_all_scripted(&mut self) -> usize {
        let count = self.entries.len();
        self.entries
            .retain(|x| !matches!(x.origin, LoaderOrigin::Script(_)));
        count - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All loaders in dispatch order. Dispatch runs on a snapshot so loaders can be registered
    /// while loads are in progress.
    pub fn snapshot(&self) -> Vec<Arc<dyn FormatLoader>> {
        self.entries.iter().map(|x| x.loader.clone()).collect()
    }

    /// Loaders that recognize the path, in dispatch order
    pub fn matching(
        &self,
        path: &str,
        type_hint: &str,
    ) -> Vec<Arc<dyn FormatLoader>> {
        self.entries
            .iter()
            .filter(|x| x.loader.recognize_path(path, type_hint))
            .map(|x| x.loader.clone())
            .collect()
    }

    pub fn for_each<F: FnMut(&Arc<dyn FormatLoader>)>(
        &self,
        path: &str,
        type_hint: &str,
        mut f: F,
    ) {
        for entry in &self.entries {
            if entry.loader.recognize_path(path, type_hint) {
                f(&entry.loader);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format_loader::LoadContext;
    use stockpile_base::{ErrorKind, ResourceHandle};

    struct ExtensionLoader {
        extensions: Vec<&'static str>,
        handled_type: &'static str,
    }

    impl FormatLoader for ExtensionLoader {
        fn recognized_extensions(&self) -> Vec<String> {
            self.extensions.iter().map(|x| x.to_string()).collect()
        }

        fn handles_type(
            &self,
            type_name: &str,
        ) -> bool {
            type_name == self.handled_type
        }

        fn load(
            &self,
            _ctx: &LoadContext,
            path: &str,
            _original_path: &str,
        ) -> LoadResult<ResourceHandle> {
            Err(LoadError::CantOpen(path.to_string()))
        }
    }

    fn loader(
        extensions: Vec<&'static str>,
        handled_type: &'static str,
    ) -> Arc<dyn FormatLoader> {
        Arc::new(ExtensionLoader {
            extensions,
            handled_type,
        })
    }

    struct TestPlugin;

    impl ResourceLoaderPlugin for TestPlugin {
        fn recognized_extensions(&self) -> Vec<String> {
            vec!["plug".to_string()]
        }

        fn handles_type(
            &self,
            _type_name: &str,
        ) -> bool {
            false
        }

        fn resource_type(
            &self,
            _path: &str,
        ) -> Option<String> {
            None
        }

        fn load(
            &self,
            path: &str,
            _original_path: &str,
        ) -> LoadResult<ResourceHandle> {
            Err(LoadError::CantOpen(path.to_string()))
        }
    }

    #[test]
    fn recognition_is_case_insensitive_and_type_filtered() {
        let png = loader(vec!["png"], "Texture");
        assert!(png.recognize_path("res://a.PNG", ""));
        assert!(png.recognize_path("res://a.png", "Texture"));
        assert!(png.recognize_path("res://a.png", "Resource"));
        assert!(!png.recognize_path("res://a.png", "Mesh"));
        assert!(!png.recognize_path("res://a.jpg", ""));
        assert!(!png.recognize_path("res://png", ""));
    }

    #[test]
    fn front_insertion_overrides_and_removal_restores_order() {
        let mut list = LoaderList::default();
        let first = loader(vec!["png"], "Texture");
        let second = loader(vec!["png", "jpg"], "Texture");
        list.add(first.clone(), false).unwrap();
        list.add(second.clone(), false).unwrap();

        let before: Vec<_> = list.matching("res://a.png", "");
        assert!(Arc::ptr_eq(&before[0], &first));

        let front = loader(vec!["png"], "Texture");
        list.add(front.clone(), true).unwrap();
        assert!(Arc::ptr_eq(&list.matching("res://a.png", "")[0], &front));

        assert!(list.remove(&front));
        assert!(!list.remove(&front));
        let after = list.matching("res://a.png", "");
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(after.iter()) {
            assert!(Arc::ptr_eq(a, b));
        }

        let mut visited = 0;
        list.for_each("res://a.jpg", "", |x| {
            assert!(Arc::ptr_eq(x, &second));
            visited += 1;
        });
        assert_eq!(visited, 1);
    }

    #[test]
    fn full_list_rejects_without_mutating() {
        let mut list = LoaderList::new(2);
        list.add(loader(vec!["a"], ""), false).unwrap();
        list.add(loader(vec!["b"], ""), false).unwrap();
        let snapshot = list.snapshot();

        let error = list.add(loader(vec!["c"], ""), true).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::LoaderListFull);
        assert_eq!(list.len(), 2);
        let after = list.snapshot();
        for (a, b) in snapshot.iter().zip(after.iter()) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[test]
    fn plugin_is_wrapped_once() {
        let mut list = LoaderList::default();
        let plugin: Arc<dyn ResourceLoaderPlugin> = Arc::new(TestPlugin);
        list.add_plugin(plugin.clone(), false).unwrap();
        assert!(list.has_plugin(&plugin));
        assert!(list.matching("res://a.plug", "").len() == 1);

        let error = list.add_plugin(plugin.clone(), true).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AlreadyRegistered);
        assert_eq!(list.len(), 1);

        assert!(list.remove_plugin(&plugin));
        assert!(list.is_empty());
    }

    #[test]
    fn scripted_loaders_are_tracked_by_path() {
        let mut list = LoaderList::default();
        list.add(loader(vec!["png"], ""), false).unwrap();
        list.add_scripted("res://a_loader.gd", loader(vec!["a"], ""), true)
            .unwrap();
        list.add_scripted("res://b_loader.gd", loader(vec!["b"], ""), true)
            .unwrap();
        assert!(list.has_scripted("res://a_loader.gd"));
        assert!(list
            .add_scripted("res://a_loader.gd", loader(vec!["a"], ""), true)
            .is_err());

        assert!(list.remove_scripted("res://a_loader.gd"));
        assert!(!list.has_scripted("res://a_loader.gd"));
        assert_eq!(list.remove_all_scripted(), 1);
        assert_eq!(list.len(), 1);
    }
}
