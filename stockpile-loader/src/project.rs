use crate::loader_list::DEFAULT_LOADER_CAPACITY;
use serde::{Deserialize, Serialize};
use stockpile_base::hashing::HashMap;
use stockpile_base::resource_path::{has_scheme, simplify_path, RESOURCE_SCHEME, USER_SCHEME};
use stockpile_base::{LoadError, LoadResult, PathLocalizer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const PROJECT_FILE_NAME: &str = "stockpile_project.json";

fn default_resource_root() -> String {
    ".".to_string()
}

fn default_loader_capacity() -> usize {
    DEFAULT_LOADER_CAPACITY
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ProjectSettingsJson {
    #[serde(default = "default_resource_root")]
    pub resource_root: String,
    #[serde(default)]
    pub user_root: Option<String>,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub translation_remaps: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub remapped_paths: Vec<String>,
    #[serde(default = "default_loader_capacity")]
    pub loader_capacity: usize,
    #[serde(default)]
    pub stamp_modified_times: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ProjectSettings {
    // Directory res:// paths are resolved against
    pub resource_root: PathBuf,

    // Directory user:// paths are resolved against, if the project has one
    pub user_root: Option<PathBuf>,

    // Locale used for translation remaps until changed at runtime
    pub locale: String,

    // Enabled feature tags, used to pick between path.<feature> entries of import files
    pub features: Vec<String>,

    // res://path -> ["res://path-de:de", ...]
    pub translation_remaps: HashMap<String, Vec<String>>,

    // res://from -> res://to
    pub path_remaps: HashMap<String, String>,

    // Maximum number of format loaders
    pub loader_capacity: usize,

    // Record the source file modification time on every loaded resource
    pub stamp_modified_times: bool,
}

impl ProjectSettings {
    /// Settings for a project rooted at `resource_root`, with nothing else configured
    pub fn new(resource_root: PathBuf) -> Self {
        ProjectSettings {
            resource_root,
            user_root: None,
            locale: String::default(),
            features: Vec::default(),
            translation_remaps: HashMap::default(),
            path_remaps: HashMap::default(),
            loader_capacity: DEFAULT_LOADER_CAPACITY,
            stamp_modified_times: cfg!(feature = "editor"),
        }
    }

    pub fn unverified_absolute_path(
        root_path: &Path,
        json_path: &str,
    ) -> PathBuf {
        if Path::new(json_path).is_absolute() {
            PathBuf::from(json_path)
        } else {
            root_path.join(json_path)
        }
    }

    // root_path is the path the json file is in, json_path is the string in json that is meant
    // to be parsed/converted to a canonicalized path
    pub fn parse_dir_path(
        root_path: &Path,
        json_path: &str,
    ) -> LoadResult<PathBuf> {
        // If it's not an absolute path, join it onto the path containing the project file
        let joined_path = Self::unverified_absolute_path(root_path, json_path);

        // Create the dir (and it's parent dirs) if it doesn't exist
        if !joined_path.exists() {
            std::fs::create_dir_all(&joined_path)?;
        }

        Ok(dunce::canonicalize(&joined_path)?)
    }

    /// Path remaps are stored as a flat [from, to, from, to, ...] list
    pub fn parse_path_remaps(remapped_paths: &[String]) -> LoadResult<HashMap<String, String>> {
        if remapped_paths.len() % 2 != 0 {
            return Err(LoadError::InvalidConfiguration(format!(
                "remapped_paths must have an even number of entries, found {}",
                remapped_paths.len()
            )));
        }

        Ok(remapped_paths
            .chunks(2)
            .map(|x| (x[0].clone(), x[1].clone()))
            .collect())
    }

    pub fn from_json(
        root_path: &Path,
        project_file: ProjectSettingsJson,
    ) -> LoadResult<Self> {
        let resource_root = Self::parse_dir_path(root_path, &project_file.resource_root)?;
        let user_root = match &project_file.user_root {
            Some(user_root) => Some(Self::parse_dir_path(root_path, user_root)?),
            None => None,
        };

        let path_remaps = Self::parse_path_remaps(&project_file.remapped_paths)?;

        if project_file.loader_capacity == 0 {
            return Err(LoadError::InvalidConfiguration(
                "loader_capacity must be at least 1".to_string(),
            ));
        }

        Ok(ProjectSettings {
            resource_root,
            user_root,
            locale: project_file.locale,
            features: project_file.features,
            translation_remaps: project_file.translation_remaps.into_iter().collect(),
            path_remaps,
            loader_capacity: project_file.loader_capacity,
            stamp_modified_times: project_file
                .stamp_modified_times
                .unwrap_or(cfg!(feature = "editor")),
        })
    }

    pub fn read_from_path(path: &Path) -> LoadResult<Self> {
        let parent = path.parent().ok_or_else(|| {
            LoadError::InvalidConfiguration(
                "Parent of project file path could not be found".to_string(),
            )
        })?;
        // An empty parent means the file is in the working directory
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        let root_path = dunce::canonicalize(parent)?;
        let file_contents = std::fs::read_to_string(path)?;
        let project_file: ProjectSettingsJson = serde_json::from_str(&file_contents)?;
        Self::from_json(&root_path, project_file)
    }

    pub fn locate_project_file(search_location: &Path) -> LoadResult<Self> {
        let mut path = Some(search_location.to_path_buf());
        while let Some(p) = path {
            let joined_path = p.join(PROJECT_FILE_NAME);
            if joined_path.exists() {
                log::info!("Using project configuration at {:?}", joined_path);
                return Self::read_from_path(&joined_path);
            }

            path = p.parent().map(|x| x.to_path_buf());
        }

        Err(LoadError::InvalidConfiguration(format!(
            "{} could not be located at {:?} or in any of its parent directories",
            PROJECT_FILE_NAME, search_location
        )))
    }

    fn localize_under(
        root: &Path,
        scheme: &str,
        path: &Path,
    ) -> Option<String> {
        let relative = path.strip_prefix(root).ok()?;
        let relative = relative.to_string_lossy().replace('\\', "/");
        Some(simplify_path(&format!("{}{}", scheme, relative)))
    }
}

impl PathLocalizer for ProjectSettings {
    fn localize_path(
        &self,
        path: &str,
    ) -> String {
        if has_scheme(path) {
            return simplify_path(path);
        }

        let simplified = simplify_path(path);
        let disk_path = Path::new(&simplified);
        if let Some(localized) = Self::localize_under(&self.resource_root, RESOURCE_SCHEME, disk_path) {
            return localized;
        }

        if let Some(user_root) = &self.user_root {
            if let Some(localized) = Self::localize_under(user_root, USER_SCHEME, disk_path) {
                return localized;
            }
        }

        simplified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_base::{normalize_path, ErrorKind};

    #[test]
    fn reads_project_file() {
        let project_dir = tempfile::tempdir().unwrap();
        let json = r#"{
            "resource_root": "data",
            "user_root": "user",
            "locale": "de_DE",
            "features": ["s3tc"],
            "translation_remaps": { "res://t.tres": ["res://t-de.tres:de"] },
            "remapped_paths": ["res://a.png", "res://b.png"]
        }"#;
        std::fs::write(project_dir.path().join(PROJECT_FILE_NAME), json).unwrap();
        std::fs::create_dir_all(project_dir.path().join("nested/deeper")).unwrap();

        let settings =
            ProjectSettings::locate_project_file(&project_dir.path().join("nested/deeper")).unwrap();
        assert!(settings.resource_root.ends_with("data"));
        assert!(settings.resource_root.exists());
        assert!(settings.user_root.as_ref().unwrap().exists());
        assert_eq!(settings.locale, "de_DE");
        assert_eq!(settings.features, vec!["s3tc".to_string()]);
        assert_eq!(settings.translation_remaps["res://t.tres"].len(), 1);
        assert_eq!(settings.path_remaps["res://a.png"], "res://b.png");
        assert_eq!(settings.loader_capacity, DEFAULT_LOADER_CAPACITY);
    }

    #[test]
    fn odd_remapped_paths_are_rejected() {
        let error = ProjectSettings::parse_path_remaps(&["res://a.png".to_string()]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn missing_project_file() {
        let dir = tempfile::tempdir().unwrap();
        // Walks up to the filesystem root, so only assert that nothing panics if some ancestor of
        // the temp dir happens to have a project file
        let _ = ProjectSettings::locate_project_file(dir.path());

        let error = ProjectSettings::read_from_path(&dir.path().join(PROJECT_FILE_NAME)).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Io);
    }

    #[test]
    fn localizes_disk_paths_into_schemes() {
        let mut settings = ProjectSettings::new(PathBuf::from("/projects/game"));
        settings.user_root = Some(PathBuf::from("/home/player/.game"));

        assert_eq!(
            settings.localize_path("/projects/game/textures/a.png"),
            "res://textures/a.png"
        );
        assert_eq!(
            settings.localize_path("/projects/game/x/../b.png"),
            "res://b.png"
        );
        assert_eq!(
            settings.localize_path("/home/player/.game/save.tres"),
            "user://save.tres"
        );
        assert_eq!(settings.localize_path("/elsewhere/c.png"), "/elsewhere/c.png");
        assert_eq!(settings.localize_path("res://a/./b.png"), "res://a/b.png");

        for input in ["/projects/game/a.png", "a.png", "/elsewhere/c.png", "res://d.png"] {
            let once = normalize_path(input, &settings);
            assert_eq!(once, normalize_path(&once, &settings));
        }
    }
}
