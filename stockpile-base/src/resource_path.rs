//! Canonical resource paths.
//!
//! Every path that reaches the cache, the in-flight map or the remap tables has been through
//! `normalize_path` first. A canonical path is either scheme-prefixed (`res://`, `user://`, ...)
//! or a platform absolute path the localizer could not map into a scheme.

pub const RESOURCE_SCHEME: &str = "res://";
pub const USER_SCHEME: &str = "user://";

/// Turns absolute paths into their scheme-prefixed form. Implemented by the project settings,
/// which know which directories `res://` and `user://` are rooted at.
pub trait PathLocalizer: Send + Sync {
    /// Must be idempotent: localizing an already localized path returns it unchanged.
    fn localize_path(
        &self,
        path: &str,
    ) -> String;
}

/// Localizer used when no project is configured. Scheme paths are simplified, everything else is
/// returned as-is.
#[derive(Default, Debug, Copy, Clone)]
pub struct SchemeLocalizer;

impl PathLocalizer for SchemeLocalizer {
    fn localize_path(
        &self,
        path: &str,
    ) -> String {
        simplify_path(path)
    }
}

/// Returns the scheme of a path including the `://`, if there is one
pub fn scheme(path: &str) -> Option<&str> {
    let index = path.find("://")?;
    let name = &path[..index];
    if !name.is_empty() && name.chars().all(|x| x.is_ascii_alphanumeric() || x == '_') {
        Some(&path[..index + 3])
    } else {
        None
    }
}

pub fn has_scheme(path: &str) -> bool {
    scheme(path).is_some()
}

pub fn is_absolute_path(path: &str) -> bool {
    if has_scheme(path) || path.starts_with('/') || path.starts_with('\\') {
        return true;
    }

    // Windows drive letter
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

pub fn is_relative_path(path: &str) -> bool {
    !is_absolute_path(path)
}

/// Removes `.` and empty segments and resolves `..` where possible. The scheme (or leading `/`) is
/// preserved. `..` segments that would climb above the root are kept so that the function stays
/// idempotent.
pub fn simplify_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let (prefix, rest) = match scheme(&path) {
        Some(scheme) => (scheme.to_string(), path[scheme.len()..].to_string()),
        None if path.starts_with('/') => ("/".to_string(), path[1..].to_string()),
        None => (String::default(), path.clone()),
    };

    let mut segments: Vec<&str> = Vec::default();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().map(|x| *x != "..").unwrap_or(false) {
                    segments.pop();
                } else {
                    segments.push(segment);
                }
            }
            _ => segments.push(segment),
        }
    }

    format!("{}{}", prefix, segments.join("/"))
}

/// Canonicalize a user-supplied path. Relative paths are placed under `res://`, anything else is
/// handed to the localizer.
#[profiling::function]
pub fn normalize_path(
    path: &str,
    localizer: &dyn PathLocalizer,
) -> String {
    if is_relative_path(path) {
        simplify_path(&format!("{}{}", RESOURCE_SCHEME, path))
    } else {
        localizer.localize_path(&path.replace('\\', "/"))
    }
}

/// The last path segment
pub fn file_name(path: &str) -> &str {
    let path = scheme(path).map(|x| &path[x.len()..]).unwrap_or(path);
    path.rsplit(|x: char| x == '/' || x == '\\')
        .next()
        .unwrap_or(path)
}

/// Extension of the file name without the leading dot. Case is preserved.
pub fn extension(path: &str) -> Option<&str> {
    let file_name = file_name(path);
    let index = file_name.rfind('.')?;
    Some(&file_name[index + 1..])
}

/// Everything up to the last path segment, without a trailing `/` unless it is the root
pub fn base_dir(path: &str) -> &str {
    let start = scheme(path).map(|x| x.len()).unwrap_or(0);
    match path[start..].rfind('/') {
        Some(0) if start == 0 => "/",
        Some(index) => &path[..start + index],
        None => &path[..start],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_get_resource_scheme() {
        assert_eq!(normalize_path("a.png", &SchemeLocalizer), "res://a.png");
        assert_eq!(normalize_path("dir/./b.png", &SchemeLocalizer), "res://dir/b.png");
        assert_eq!(normalize_path("dir\\c.png", &SchemeLocalizer), "res://dir/c.png");
    }

    #[test]
    fn scheme_paths_are_simplified() {
        assert_eq!(normalize_path("res://a/../b.png", &SchemeLocalizer), "res://b.png");
        assert_eq!(normalize_path("user://save//x.tres", &SchemeLocalizer), "user://save/x.tres");
        assert_eq!(normalize_path("/tmp/x.png", &SchemeLocalizer), "/tmp/x.png");
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            "a.png",
            "res://a.png",
            "../up.png",
            "res://../up.png",
            "./x/../y/z.tres",
            "/abs/path/./file.scn",
            "user://a/b/../c",
            "C:\\data\\file.png",
            "",
        ];
        for input in inputs {
            let once = normalize_path(input, &SchemeLocalizer);
            let twice = normalize_path(&once, &SchemeLocalizer);
            assert_eq!(once, twice, "input {:?}", input);
        }
    }

    #[test]
    fn path_parts() {
        assert_eq!(extension("res://a/b.PNG"), Some("PNG"));
        assert_eq!(extension("res://a.dir/b"), None);
        assert_eq!(extension("res://big.png.remap"), Some("remap"));
        assert_eq!(file_name("res://a/b.png"), "b.png");
        assert_eq!(file_name("res://b.png"), "b.png");
        assert_eq!(base_dir("res://a/b.png"), "res://a");
        assert_eq!(base_dir("res://b.png"), "res://");
        assert_eq!(base_dir("/b.png"), "/");
    }

    #[test]
    fn scheme_detection() {
        assert_eq!(scheme("res://a"), Some("res://"));
        assert_eq!(scheme("user://a"), Some("user://"));
        assert_eq!(scheme("a/res://b"), None);
        assert!(is_relative_path("a/b"));
        assert!(!is_relative_path("/a/b"));
        assert!(!is_relative_path("D:/a"));
    }
}
