//! Reader for the key/value text files that sit next to resources (`.remap` and `.import`).
//!
//! ```text
//! [remap]
//!
//! importer="wavefront_obj"
//! type="Mesh"
//! path="res://.import/a.obj-0123.mesh"
//!
//! [deps]
//!
//! files=[ "res://.import/a.obj-0123.mesh" ]
//! ```
//!
//! Values are JSON-like (strings, numbers, booleans, arrays, dictionaries) and may span several
//! lines while brackets or a string are open. Anything that doesn't parse as JSON and isn't a
//! quoted string is kept verbatim as a string. Lines starting with `;` or `#` are comments.

use serde_json::Value;
use stockpile_base::{LoadError, LoadResult};

#[derive(Debug, Clone, PartialEq)]
pub enum SidecarEntry {
    // A `[name ...]` header. Only the name is kept
    Section(String),
    Assign {
        key: String,
        value: Value,
        line: usize,
    },
}

/// Streams entries out of a sidecar file. Stops after the first error.
pub struct SidecarReader<'a> {
    // Name of the file being read, for error messages
    path: String,
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    finished: bool,
}

impl<'a> SidecarReader<'a> {
    pub fn new(
        path: &str,
        text: &'a str,
    ) -> Self {
        SidecarReader {
            path: path.to_string(),
            lines: text.lines().enumerate(),
            finished: false,
        }
    }

    fn error(
        &mut self,
        line: usize,
        message: String,
    ) -> LoadError {
        self.finished = true;
        LoadError::FileCorrupt {
            path: self.path.clone(),
            line,
            message,
        }
    }
}

impl<'a> Iterator for SidecarReader<'a> {
    type Item = LoadResult<SidecarEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let (index, line) = self.lines.next()?;
            let line_number = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
                continue;
            }

            if trimmed.starts_with('[') {
                if !trimmed.ends_with(']') {
                    return Some(Err(
                        self.error(line_number, "Expected ']' at end of section header".to_string())
                    ));
                }

                let name = trimmed[1..trimmed.len() - 1]
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_string();
                if name.is_empty() {
                    return Some(Err(self.error(line_number, "Empty section name".to_string())));
                }

                return Some(Ok(SidecarEntry::Section(name)));
            }

            let (key, value) = match trimmed.split_once('=') {
                Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
                None => {
                    return Some(Err(
                        self.error(line_number, format!("Expected '=' after key, found '{}'", trimmed))
                    ));
                }
            };

            if key.is_empty() {
                return Some(Err(self.error(line_number, "Empty key".to_string())));
            }

            // Keep pulling lines until brackets and strings are closed
            let mut value = value;
            while !is_value_complete(&value) {
                match self.lines.next() {
                    Some((_, line)) => {
                        value.push('\n');
                        value.push_str(line);
                    }
                    None => {
                        return Some(Err(self.error(
                            line_number,
                            format!("Unterminated value for key '{}'", key),
                        )));
                    }
                }
            }

            return Some(match parse_value(&value) {
                Some(value) => Ok(SidecarEntry::Assign {
                    key,
                    value,
                    line: line_number,
                }),
                None => Err(self.error(line_number, format!("Malformed value for key '{}'", key))),
            });
        }
    }
}

fn is_value_complete(value: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for c in value.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth -= 1,
            _ => {}
        }
    }

    !in_string && depth <= 0
}

fn parse_value(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    if text.starts_with('"') {
        return parse_quoted(text).map(Value::String);
    }

    // Constructor-style values like Vector2( 1, 2 ) are kept as written
    Some(Value::String(text.to_string()))
}

// Strings that JSON rejects, ex. ones holding raw newlines
fn parse_quoted(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                'r' => result.push('\r'),
                other => result.push(other),
            },
            '"' => return None,
            c => result.push(c),
        }
    }

    Some(result)
}

/// A fully read sidecar, grouped by section. Keys assigned before the first header belong to the
/// section named "".
#[derive(Debug, Default, Clone)]
pub struct SidecarDocument {
    sections: Vec<(String, Vec<(String, Value)>)>,
}

impl SidecarDocument {
    pub fn parse(
        path: &str,
        text: &str,
    ) -> LoadResult<Self> {
        let mut sections: Vec<(String, Vec<(String, Value)>)> = Vec::default();
        for entry in SidecarReader::new(path, text) {
            match entry? {
                SidecarEntry::Section(name) => sections.push((name, Vec::default())),
                SidecarEntry::Assign { key, value, .. } => {
                    if sections.is_empty() {
                        sections.push((String::default(), Vec::default()));
                    }
                    // Non-empty, pushed above
                    if let Some((_, values)) = sections.last_mut() {
                        values.push((key, value));
                    }
                }
            }
        }

        Ok(SidecarDocument { sections })
    }

    pub fn has_section(
        &self,
        section: &str,
    ) -> bool {
        self.sections.iter().any(|(name, _)| name == section)
    }

    /// First value assigned to `key` in `section`
    pub fn get(
        &self,
        section: &str,
        key: &str,
    ) -> Option<&Value> {
        self.sections
            .iter()
            .filter(|(name, _)| name == section)
            .flat_map(|(_, values)| values.iter())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_str(
        &self,
        section: &str,
        key: &str,
    ) -> Option<&str> {
        self.get(section, key).and_then(|x| x.as_str())
    }

    /// All assignments in `section`, in file order
    pub fn entries(
        &self,
        section: &str,
    ) -> impl Iterator<Item = (&str, &Value)> + '_ {
        let section = section.to_string();
        self.sections
            .iter()
            .filter(move |(name, _)| *name == section)
            .flat_map(|(_, values)| values.iter())
            .map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_base::ErrorKind;

    const IMPORT_FILE: &str = r#"
; generated
[remap]

importer="wavefront_obj"
type="Mesh"
path.s3tc="res://.import/a.obj-1.s3tc.mesh"
path="res://.import/a.obj-1.mesh"
metadata={ "vram_texture": false }

[deps]

files=[
  "res://.import/a.obj-1.mesh",
  "res://.import/a.obj-1.s3tc.mesh"
]
size=Vector2( 1, 2 )
"#;

    #[test]
    fn reads_sections_and_values() {
        let document = SidecarDocument::parse("res://a.obj.import", IMPORT_FILE).unwrap();
        assert!(document.has_section("remap"));
        assert!(document.has_section("deps"));
        assert_eq!(document.get_str("remap", "importer"), Some("wavefront_obj"));
        assert_eq!(document.get_str("remap", "type"), Some("Mesh"));
        assert_eq!(
            document.get("remap", "metadata").unwrap()["vram_texture"],
            Value::Bool(false)
        );
        let files = document.get("deps", "files").unwrap().as_array().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(document.get_str("deps", "size"), Some("Vector2( 1, 2 )"));

        let keys: Vec<_> = document.entries("remap").map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["importer", "type", "path.s3tc", "path", "metadata"]);
    }

    #[test]
    fn reader_streams_entries_in_order() {
        let text = "[remap]\npath=\"res://b.ctex\"\n[other]\npath=\"res://c.ctex\"\n";
        let entries: Vec<_> = SidecarReader::new("res://b.png.remap", text)
            .collect::<LoadResult<_>>()
            .unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], SidecarEntry::Section("remap".to_string()));
        assert!(matches!(
            &entries[1],
            SidecarEntry::Assign { key, line: 2, .. } if key == "path"
        ));
    }

    #[test]
    fn quoted_strings_with_newlines() {
        let text = "text=\"first\nsecond \\\"quoted\\\"\"\n";
        let document = SidecarDocument::parse("res://t.remap", text).unwrap();
        assert_eq!(document.get_str("", "text"), Some("first\nsecond \"quoted\""));
    }

    #[test]
    fn errors_carry_line_numbers() {
        let text = "[remap]\n\nthis line is wrong\n";
        let error = SidecarDocument::parse("res://x.remap", text).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FileCorrupt);
        match error {
            LoadError::FileCorrupt { line, .. } => assert_eq!(line, 3),
            _ => unreachable!(),
        }

        let text = "[remap]\npath=\"res://unterminated\n";
        let error = SidecarDocument::parse("res://x.remap", text).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::FileCorrupt);

        let mut reader = SidecarReader::new("res://x.remap", "[broken\npath=\"a\"");
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }
}
