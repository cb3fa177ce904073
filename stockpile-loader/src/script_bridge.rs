//! Narrow interface to a scripting runtime, so that format loaders written in a script language
//! can be registered without this crate depending on the runtime.

use crate::format_loader::{FormatLoader, LoadContext};
use stockpile_base::hashing::HashMap;
use stockpile_base::{ErrorKind, LoadError, LoadResult, ResourceHandle};
use std::sync::Arc;

/// Native type a script must inherit from to be registered as a format loader
pub const FORMAT_LOADER_SCRIPT_BASE: &str = "ResourceFormatLoader";

/// Values passed to and returned from script methods
#[derive(Clone)]
pub enum ScriptValue {
    Nil,
    Bool(bool),
    Int(i64),
    String(String),
    StringList(Vec<String>),
    Dictionary(Vec<(String, String)>),
    Resource(ResourceHandle),
}

impl ScriptValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScriptValue::Int(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(x) => Some(x),
            _ => None,
        }
    }

    pub fn into_string_list(self) -> Option<Vec<String>> {
        match self {
            ScriptValue::StringList(x) => Some(x),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ScriptValue {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ScriptValue::Nil => write!(f, "Nil"),
            ScriptValue::Bool(x) => write!(f, "Bool({})", x),
            ScriptValue::Int(x) => write!(f, "Int({})", x),
            ScriptValue::String(x) => write!(f, "String({:?})", x),
            ScriptValue::StringList(x) => write!(f, "StringList({:?})", x),
            ScriptValue::Dictionary(x) => write!(f, "Dictionary({:?})", x),
            ScriptValue::Resource(x) => write!(f, "Resource({})", x.path()),
        }
    }
}

/// A class declared by a script with a global name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalScriptClass {
    pub name: String,
    // Native type the class ultimately derives from
    pub base: String,
    pub path: String,
}

pub trait ScriptBridge: Send + Sync {
    fn load_script(
        &self,
        path: &str,
    ) -> LoadResult<Arc<dyn Script>>;

    fn global_classes(&self) -> Vec<GlobalScriptClass>;
}

pub trait Script: Send + Sync {
    fn path(&self) -> &str;

    /// Native type instances of this script are
    fn instance_base_type(&self) -> String;

    fn inherits(
        &self,
        type_name: &str,
    ) -> bool;

    fn instantiate(&self) -> LoadResult<Box<dyn ScriptInstance>>;
}

pub trait ScriptInstance: Send + Sync {
    fn has_method(
        &self,
        method: &str,
    ) -> bool;

    fn call(
        &self,
        method: &str,
        args: &[ScriptValue],
    ) -> LoadResult<ScriptValue>;
}

/// Format loader implemented by a script instance. Methods the script doesn't define fall back
/// to the `FormatLoader` defaults.
pub struct ScriptedFormatLoader {
    script_path: String,
    instance: Box<dyn ScriptInstance>,
}

impl ScriptedFormatLoader {
    pub fn new(script: &Arc<dyn Script>) -> LoadResult<Self> {
        if !script.inherits(FORMAT_LOADER_SCRIPT_BASE) {
            return Err(LoadError::InvalidScript(format!(
                "{} does not inherit {} (base type is {})",
                script.path(),
                FORMAT_LOADER_SCRIPT_BASE,
                script.instance_base_type()
            )));
        }

        Ok(ScriptedFormatLoader {
            script_path: script.path().to_string(),
            instance: script.instantiate()?,
        })
    }

    pub fn script_path(&self) -> &str {
        &self.script_path
    }

    // None if the method isn't defined or the call failed
    fn call_optional(
        &self,
        method: &str,
        args: &[ScriptValue],
    ) -> Option<ScriptValue> {
        if !self.instance.has_method(method) {
            return None;
        }

        match self.instance.call(method, args) {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("{}: call to {} failed: {}", self.script_path, method, e);
                None
            }
        }
    }
}

impl FormatLoader for ScriptedFormatLoader {
    fn recognized_extensions(&self) -> Vec<String> {
        self.call_optional("get_recognized_extensions", &[])
            .and_then(|x| x.into_string_list())
            .unwrap_or_default()
    }

    fn handles_type(
        &self,
        type_name: &str,
    ) -> bool {
        self.call_optional("handles_type", &[ScriptValue::String(type_name.to_string())])
            .and_then(|x| x.as_bool())
            .unwrap_or(false)
    }

    fn load(
        &self,
        _ctx: &LoadContext,
        path: &str,
        original_path: &str,
    ) -> LoadResult<ResourceHandle> {
        if !self.instance.has_method("load") {
            return Err(LoadError::InvalidScript(format!(
                "{} does not implement load",
                self.script_path
            )));
        }

        let result = self.instance.call(
            "load",
            &[
                ScriptValue::String(path.to_string()),
                ScriptValue::String(original_path.to_string()),
            ],
        )?;

        match result {
            ScriptValue::Resource(resource) => Ok(resource),
            ScriptValue::Int(code) => match ErrorKind::from_code(code) {
                Some(kind) => Err(LoadError::from_kind(kind, path)),
                None => Err(LoadError::LoadFailed {
                    path: path.to_string(),
                    cause: None,
                }),
            },
            _ => Err(LoadError::LoadFailed {
                path: path.to_string(),
                cause: None,
            }),
        }
    }

    fn resource_type(
        &self,
        _ctx: &LoadContext,
        path: &str,
    ) -> Option<String> {
        self.call_optional("get_resource_type", &[ScriptValue::String(path.to_string())])
            .and_then(|x| x.as_str().map(|x| x.to_string()))
            .filter(|x| !x.is_empty())
    }

    fn dependencies(
        &self,
        _ctx: &LoadContext,
        path: &str,
        add_types: bool,
    ) -> Vec<String> {
        self.call_optional(
            "get_dependencies",
            &[
                ScriptValue::String(path.to_string()),
                ScriptValue::Bool(add_types),
            ],
        )
        .and_then(|x| x.into_string_list())
        .unwrap_or_default()
    }

    fn rename_dependencies(
        &self,
        _ctx: &LoadContext,
        path: &str,
        renames: &HashMap<String, String>,
    ) -> LoadResult<()> {
        let mut renames: Vec<_> = renames
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        renames.sort();

        let result = self.call_optional(
            "rename_dependencies",
            &[
                ScriptValue::String(path.to_string()),
                ScriptValue::Dictionary(renames),
            ],
        );

        match result.and_then(|x| x.as_int()).and_then(ErrorKind::from_code) {
            Some(kind) => Err(LoadError::from_kind(kind, path)),
            None => Ok(()),
        }
    }
}
