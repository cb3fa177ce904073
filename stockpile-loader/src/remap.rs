use crate::file_access::FileAccess;
use crate::sidecar::{SidecarEntry, SidecarReader};
use stockpile_base::hashing::HashMap;
use stockpile_base::{LoadError, LoadResult};
use std::sync::{Arc, RwLock};

/// Supplies the locale used to pick translated resources, ex. "de_DE"
pub trait LocaleSource: Send + Sync {
    fn locale(&self) -> String;
}

/// Locale that only changes when told to
#[derive(Default)]
pub struct FixedLocale {
    locale: RwLock<String>,
}

impl FixedLocale {
    pub fn new(locale: &str) -> Self {
        FixedLocale {
            locale: RwLock::new(locale.to_string()),
        }
    }

    pub fn set_locale(
        &self,
        locale: &str,
    ) {
        *self.locale.write().unwrap() = locale.to_string();
    }
}

impl LocaleSource for FixedLocale {
    fn locale(&self) -> String {
        self.locale.read().unwrap().clone()
    }
}

fn standardize_locale(locale: &str) -> String {
    locale.trim().replace('-', "_")
}

/// 10 for identical locales, 0 if the language differs, otherwise 1 plus the number of matching
/// region/script parts (always below 10).
pub fn compare_locales(
    a: &str,
    b: &str,
) -> i32 {
    let a = standardize_locale(a);
    let b = standardize_locale(b);
    if a == b {
        return 10;
    }

    let a_parts: Vec<&str> = a.split('_').collect();
    let b_parts: Vec<&str> = b.split('_').collect();
    if a_parts[0] != b_parts[0] {
        return 0;
    }

    let mut matching = 1;
    for a_part in &a_parts[1..] {
        for b_part in &b_parts[1..] {
            if a_part == b_part {
                matching += 1;
            }
        }
    }

    matching.min(9)
}

/// Result of running a path through the remap pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapResult {
    pub path: String,
    pub translation_remapped: bool,
}

/// Rewrites canonical paths before they are handed to a format loader:
///
/// 1. Translation remaps pick a locale-specific replacement
/// 2. The path remap table replaces paths one for one
/// 3. If the table had no entry, a `<path>.remap` sidecar file may name a replacement. This also
///    applies to translated paths, an exported translation is usually converted too.
pub struct ResourceRemapper {
    // path -> ["target:locale", ...]
    translation_remaps: RwLock<HashMap<String, Vec<String>>>,
    path_remaps: RwLock<HashMap<String, String>>,
    locale_source: Arc<dyn LocaleSource>,
    file_access: Arc<dyn FileAccess>,
}

impl ResourceRemapper {
    pub fn new(
        locale_source: Arc<dyn LocaleSource>,
        file_access: Arc<dyn FileAccess>,
    ) -> Self {
        ResourceRemapper {
            translation_remaps: Default::default(),
            path_remaps: Default::default(),
            locale_source,
            file_access,
        }
    }

    pub fn locale_source(&self) -> &Arc<dyn LocaleSource> {
        &self.locale_source
    }

    pub fn set_translation_remaps(
        &self,
        remaps: HashMap<String, Vec<String>>,
    ) {
        *self.translation_remaps.write().unwrap() = remaps;
    }

    pub fn add_translation_remap(
        &self,
        path: &str,
        targets: Vec<String>,
    ) {
        self.translation_remaps
            .write()
            .unwrap()
            .insert(path.to_string(), targets);
    }

    pub fn clear_translation_remaps(&self) {
        self.translation_remaps.write().unwrap().clear();
    }

    pub fn set_path_remaps(
        &self,
        remaps: HashMap<String, String>,
    ) {
        *self.path_remaps.write().unwrap() = remaps;
    }

    pub fn add_path_remap(
        &self,
        from: &str,
        to: &str,
    ) {
        self.path_remaps
            .write()
            .unwrap()
            .insert(from.to_string(), to.to_string());
    }

    pub fn clear_path_remaps(&self) {
        self.path_remaps.write().unwrap().clear();
    }

    #[profiling::function]
    pub fn remap(
        &self,
        path: &str,
    ) -> LoadResult<RemapResult> {
        let (mut new_path, translation_remapped) = match self.translate(path)? {
            Some(translated) => (translated, true),
            None => (path.to_string(), false),
        };

        let path_remapped = self.path_remaps.read().unwrap().get(&new_path).cloned();
        if let Some(path_remapped) = path_remapped {
            log::trace!("Path remap {} -> {}", new_path, path_remapped);
            new_path = path_remapped;
        } else if let Some(sidecar_path) = self.sidecar_remap(&new_path) {
            log::trace!("Sidecar remap {} -> {}", new_path, sidecar_path);
            new_path = sidecar_path;
        }

        Ok(RemapResult {
            path: new_path,
            translation_remapped,
        })
    }

    // Returns the locale-specific path, or None if there is no table entry for the path or no
    // entry matches the current locale
    fn translate(
        &self,
        path: &str,
    ) -> LoadResult<Option<String>> {
        let translation_remaps = self.translation_remaps.read().unwrap();
        let targets = match translation_remaps.get(path) {
            Some(targets) => targets,
            None => return Ok(None),
        };

        let locale = self.locale_source.locale();
        if locale.len() < 2 {
            log::error!(
                "Could not remap path '{}' for translation as configured locale '{}' is invalid.",
                path,
                locale
            );
            return Err(LoadError::RemapFailed(path.to_string()));
        }

        let mut best_score = 0;
        let mut best_path = None;
        for target in targets {
            let split = match target.rfind(':') {
                Some(split) => split,
                None => continue,
            };

            let target_locale = target[split + 1..].trim();
            let score = compare_locales(&locale, target_locale);
            // Later entries win ties
            if score > 0 && score >= best_score {
                best_path = Some(&target[..split]);
                best_score = score;
                if score == 10 {
                    break;
                }
            }
        }

        match best_path {
            Some("") => {
                log::error!("Translation remap for '{}' produced an empty path", path);
                Err(LoadError::RemapFailed(path.to_string()))
            }
            Some(best_path) => {
                log::trace!(
                    "Translation remap {} -> {} (locale {})",
                    path,
                    best_path,
                    locale
                );
                Ok(Some(best_path.to_string()))
            }
            None => Ok(None),
        }
    }

    // Reads the `path` out of `<path>.remap`. Parse errors are logged and treated as if there were
    // no sidecar.
    fn sidecar_remap(
        &self,
        path: &str,
    ) -> Option<String> {
        let sidecar_path = format!("{}.remap", path);
        if !self.file_access.exists(&sidecar_path) {
            return None;
        }

        let text = match self.file_access.read_to_string(&sidecar_path) {
            Ok(text) => text,
            Err(e) => {
                log::error!("Could not read {}: {}", sidecar_path, e);
                return None;
            }
        };

        for entry in SidecarReader::new(&sidecar_path, &text) {
            match entry {
                Ok(SidecarEntry::Assign { key, value, .. }) if key == "path" => {
                    return match value.as_str() {
                        Some(remapped) if !remapped.is_empty() => Some(remapped.to_string()),
                        _ => {
                            log::error!("{} has a path that is not a string", sidecar_path);
                            None
                        }
                    };
                }
                Ok(SidecarEntry::Section(name)) if name != "remap" => return None,
                Ok(_) => {}
                Err(e) => {
                    log::error!("{}", e);
                    return None;
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_access::MemoryFileAccess;
    use stockpile_base::ErrorKind;

    fn remapper(locale: &str) -> (ResourceRemapper, Arc<FixedLocale>, Arc<MemoryFileAccess>) {
        let locale = Arc::new(FixedLocale::new(locale));
        let file_access = Arc::new(MemoryFileAccess::default());
        let remapper = ResourceRemapper::new(locale.clone(), file_access.clone());
        (remapper, locale, file_access)
    }

    #[test]
    fn locale_scores() {
        assert_eq!(compare_locales("de_DE", "de_DE"), 10);
        assert_eq!(compare_locales("de-DE", "de_DE"), 10);
        assert_eq!(compare_locales("de_DE", "de"), 1);
        assert_eq!(compare_locales("de_DE", "de_AT"), 1);
        assert_eq!(compare_locales("de_DE", "en"), 0);
        assert_eq!(compare_locales("zh_Hans_CN", "zh_Hans_TW"), 2);
    }

    #[test]
    fn unmapped_path_is_unchanged() {
        let (remapper, _, _) = remapper("en");
        let result = remapper.remap("res://plain.png").unwrap();
        assert_eq!(
            result,
            RemapResult {
                path: "res://plain.png".to_string(),
                translation_remapped: false,
            }
        );
    }

    #[test]
    fn translation_prefers_exact_then_language() {
        let (remapper, locale, _) = remapper("de_DE");
        remapper.add_translation_remap(
            "res://t.tres",
            vec![
                "res://t-de.tres:de".to_string(),
                "res://t-en.tres:en".to_string(),
                "no-locale-entry".to_string(),
            ],
        );

        let result = remapper.remap("res://t.tres").unwrap();
        assert_eq!(result.path, "res://t-de.tres");
        assert!(result.translation_remapped);

        locale.set_locale("en");
        assert_eq!(remapper.remap("res://t.tres").unwrap().path, "res://t-en.tres");

        // No near match falls through to the original path
        locale.set_locale("fr");
        let result = remapper.remap("res://t.tres").unwrap();
        assert_eq!(result.path, "res://t.tres");
        assert!(!result.translation_remapped);
    }

    #[test]
    fn exact_match_beats_language_match() {
        let (remapper, _, _) = remapper("pt_BR");
        remapper.add_translation_remap(
            "res://t.tres",
            vec![
                "res://t-pt.tres:pt".to_string(),
                "res://t-br.tres:pt_BR".to_string(),
                "res://t-pt2.tres:pt".to_string(),
            ],
        );
        assert_eq!(remapper.remap("res://t.tres").unwrap().path, "res://t-br.tres");
    }

    #[test]
    fn invalid_locale_or_empty_target_fails() {
        let (remapper, locale, _) = remapper("");
        remapper.add_translation_remap("res://t.tres", vec!["res://t-de.tres:de".to_string()]);
        let error = remapper.remap("res://t.tres").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::RemapFailed);

        locale.set_locale("de");
        remapper.add_translation_remap("res://u.tres", vec![":de".to_string()]);
        let error = remapper.remap("res://u.tres").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::RemapFailed);

        // Paths without a table entry don't care about the locale
        locale.set_locale("");
        assert!(remapper.remap("res://other.tres").is_ok());
    }

    #[test]
    fn translation_result_goes_through_path_table() {
        let (remapper, _, _) = remapper("de");
        remapper.add_translation_remap("res://t.tres", vec!["res://t-de.tres:de".to_string()]);
        remapper.add_path_remap("res://t-de.tres", "res://t-de.res");
        let result = remapper.remap("res://t.tres").unwrap();
        assert_eq!(result.path, "res://t-de.res");
        assert!(result.translation_remapped);
    }

    #[test]
    fn sidecar_remap() {
        let (remapper, _, file_access) = remapper("en");
        file_access.add_file(
            "res://big.png.remap",
            "[remap]\n\npath=\"res://big_compressed.ctex\"\n",
        );
        assert_eq!(
            remapper.remap("res://big.png").unwrap().path,
            "res://big_compressed.ctex"
        );

        // Path table takes precedence over the sidecar
        remapper.add_path_remap("res://big.png", "res://big_table.ctex");
        assert_eq!(remapper.remap("res://big.png").unwrap().path, "res://big_table.ctex");
    }

    #[test]
    fn translated_path_uses_its_sidecar() {
        let (remapper, _, file_access) = remapper("de");
        remapper.add_translation_remap("res://t.png", vec!["res://t-de.png:de".to_string()]);
        file_access.add_file("res://t-de.png.remap", "[remap]\npath=\"res://t-de.ctex\"\n");
        // The untranslated path's sidecar is not consulted once a translation was picked
        file_access.add_file("res://t.png.remap", "[remap]\npath=\"res://t.ctex\"\n");

        let result = remapper.remap("res://t.png").unwrap();
        assert_eq!(result.path, "res://t-de.ctex");
        assert!(result.translation_remapped);

        // The path table still wins over the sidecar of the translated path
        remapper.add_path_remap("res://t-de.png", "res://t-de-table.ctex");
        assert_eq!(remapper.remap("res://t.png").unwrap().path, "res://t-de-table.ctex");
    }

    #[test]
    fn sidecar_edge_cases() {
        let (remapper, _, file_access) = remapper("en");

        // Pointing at itself is a no-op
        file_access.add_file("res://self.png.remap", "[remap]\npath=\"res://self.png\"\n");
        assert_eq!(remapper.remap("res://self.png").unwrap().path, "res://self.png");

        // Parse errors leave the path unchanged
        file_access.add_file("res://broken.png.remap", "[remap]\nnot an assignment\n");
        assert_eq!(remapper.remap("res://broken.png").unwrap().path, "res://broken.png");

        // Reading stops at the first non-remap section
        file_access.add_file(
            "res://late.png.remap",
            "[other]\npath=\"res://wrong.ctex\"\n",
        );
        assert_eq!(remapper.remap("res://late.png").unwrap().path, "res://late.png");

        // Keys before any section are accepted
        file_access.add_file("res://bare.png.remap", "path=\"res://bare.ctex\"\n");
        assert_eq!(remapper.remap("res://bare.png").unwrap().path, "res://bare.ctex");
    }
}
