pub mod file_access;
pub mod format_loader;
pub mod interactive;
pub mod loader_list;
pub mod loading_map;
pub mod manager;
pub mod plugin_loader;
pub mod project;
pub mod remap;
pub mod script_bridge;
pub mod sidecar;

pub use file_access::{DiskFileAccess, FileAccess, MemoryFileAccess};
pub use format_loader::{FormatLoader, LoadContext, BASE_RESOURCE_TYPE};
pub use interactive::{
    CompletedInteractiveLoader, InteractiveLoad, InteractiveLoadState, InteractiveLoader,
    LoadStatus,
};
pub use loader_list::{LoaderList, DEFAULT_LOADER_CAPACITY};
pub use loading_map::{LoadingMap, LoadingTicket};
pub use manager::{LoadedCallback, ResourceManager, ResourceManagerBuilder};
pub use plugin_loader::{PluginLoaderWrapper, ResourceLoaderPlugin};
pub use project::{ProjectSettings, ProjectSettingsJson, PROJECT_FILE_NAME};
pub use remap::{FixedLocale, LocaleSource, RemapResult, ResourceRemapper};
pub use script_bridge::{
    GlobalScriptClass, Script, ScriptBridge, ScriptInstance, ScriptValue, ScriptedFormatLoader,
    FORMAT_LOADER_SCRIPT_BASE,
};
pub use sidecar::{SidecarDocument, SidecarEntry, SidecarReader};


use std::sync::RwLock;

lazy_static::lazy_static! {
    static ref GLOBAL_MANAGER: RwLock<Option<ResourceManager>> = {
        RwLock::new(None)
    };
}

/// Installs the process-wide manager, replacing (and finalizing) any previous one
pub fn initialize(manager: ResourceManager) {
    let previous = GLOBAL_MANAGER.write().unwrap().replace(manager);
    if let Some(previous) = previous {
        log::warn!("Replacing an already initialized resource manager");
        previous.finalize();
    }
}

/// The process-wide manager, if `initialize` was called
pub fn global() -> Option<ResourceManager> {
    GLOBAL_MANAGER.read().unwrap().clone()
}

/// Finalizes and removes the process-wide manager
pub fn finalize() {
    let manager = GLOBAL_MANAGER.write().unwrap().take();
    if let Some(manager) = manager {
        manager.finalize();
    }
}
