//! package.json documents
//!
//! Handles:
//! - dependencies, devDependencies, peerDependencies, optionalDependencies
//! - overrides (npm) and resolutions (yarn)
//!
//! Edits replace only the string value of the edited entries, so key order,
//! whitespace and unrelated content are kept byte for byte.

use crate::domain::{DepSection, Dependency, DependencyKey};
use crate::error::ManifestError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// A parsed package.json with its original text
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    path: PathBuf,
    text: String,
    json: Value,
    dependencies: Vec<Dependency>,
}

impl ManifestDocument {
    /// Parse a document from text
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Result<Self, ManifestError> {
        let path = path.into();
        let text = text.into();
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| ManifestError::json_parse_error(&path, e.to_string()))?;
        if !json.is_object() {
            return Err(ManifestError::json_parse_error(
                &path,
                "top-level value is not an object",
            ));
        }

        let mut dependencies = Vec::new();
        for section in DepSection::all() {
            if let Some(entries) = json.get(section.json_key()).and_then(Value::as_object) {
                for (name, value) in entries {
                    // Nested override objects are not dependency entries
                    if let Some(specifier) = value.as_str() {
                        dependencies.push(Dependency::new(name.clone(), *section, specifier));
                    }
                }
            }
        }

        Ok(Self {
            path,
            text,
            json,
            dependencies,
        })
    }

    /// Read and parse a package.json file
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            return Err(ManifestError::not_found(path));
        }
        let text = fs::read_to_string(path).map_err(|e| ManifestError::read_error(path, e))?;
        Self::parse(path, text)
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the manifest
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Original text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parsed JSON value
    pub fn json(&self) -> &Value {
        &self.json
    }

    /// Package name, if declared
    pub fn name(&self) -> Option<&str> {
        self.json.get("name").and_then(Value::as_str)
    }

    /// Dependency entries in section order, then document order
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Look up an entry
    pub fn get(&self, key: &DependencyKey) -> Option<&Dependency> {
        self.dependencies
            .iter()
            .find(|d| d.section == key.section && d.name == key.name)
    }

    /// Declared `scripts.<name>` command
    pub fn script(&self, name: &str) -> Option<&str> {
        self.json
            .get("scripts")
            .and_then(|scripts| scripts.get(name))
            .and_then(Value::as_str)
    }

    /// Return a new document with the given specifiers replaced
    ///
    /// The receiver is left untouched. Every key must name an existing entry.
    pub fn with_updates(
        &self,
        updates: &BTreeMap<DependencyKey, String>,
    ) -> Result<ManifestDocument, ManifestError> {
        let mut edits: Vec<(Range<usize>, String)> = Vec::with_capacity(updates.len());
        for (key, specifier) in updates {
            let span = locate_entry(&self.text, key.section.json_key(), &key.name).ok_or_else(
                || ManifestError::entry_not_found(&self.path, key.section.json_key(), &key.name),
            )?;
            let literal = serde_json::to_string(specifier)
                .map_err(|e| ManifestError::json_parse_error(&self.path, e.to_string()))?;
            edits.push((span, literal));
        }

        // Apply back to front so earlier spans stay valid
        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        let mut text = self.text.clone();
        for (span, literal) in edits {
            text.replace_range(span, &literal);
        }

        Self::parse(&self.path, text)
    }
}

/// Byte span of the string value of `section.name`, quotes included
fn locate_entry(text: &str, section: &str, name: &str) -> Option<Range<usize>> {
    let scanner = Scanner::new(text);
    let root = scanner.skip_ws(0);
    let section_span = scanner.find_member(root, section)?;
    let value_span = scanner.find_member(section_span.start, name)?;
    (scanner.byte(value_span.start) == Some(b'"')).then_some(value_span)
}

/// Minimal JSON scanner over text already validated by serde_json
struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
        }
    }

    fn byte(&self, i: usize) -> Option<u8> {
        self.bytes.get(i).copied()
    }

    fn skip_ws(&self, mut i: usize) -> usize {
        while matches!(self.byte(i), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            i += 1;
        }
        i
    }

    /// End (exclusive) of the string literal starting at `i`
    fn string_end(&self, i: usize) -> Option<usize> {
        let mut j = i + 1;
        loop {
            match self.byte(j)? {
                b'\\' => j += 2,
                b'"' => return Some(j + 1),
                _ => j += 1,
            }
        }
    }

    /// End (exclusive) of the value starting at `i`
    fn value_end(&self, i: usize) -> Option<usize> {
        match self.byte(i)? {
            b'"' => self.string_end(i),
            b'{' | b'[' => {
                let mut depth = 0usize;
                let mut j = i;
                loop {
                    match self.byte(j)? {
                        b'"' => {
                            j = self.string_end(j)?;
                            continue;
                        }
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => {
                            depth -= 1;
                            if depth == 0 {
                                return Some(j + 1);
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
            }
            _ => {
                let mut j = i;
                while !matches!(
                    self.byte(j),
                    None | Some(b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r')
                ) {
                    j += 1;
                }
                Some(j)
            }
        }
    }

    /// Span of the value of member `key` of the object starting at `start`
    ///
    /// With duplicate keys the last one wins, as in serde_json.
    fn find_member(&self, start: usize, key: &str) -> Option<Range<usize>> {
        if self.byte(start)? != b'{' {
            return None;
        }
        let mut found = None;
        let mut i = self.skip_ws(start + 1);
        if self.byte(i)? == b'}' {
            return None;
        }
        loop {
            let key_end = self.string_end(i)?;
            let member_key: String = serde_json::from_str(&self.text[i..key_end]).ok()?;
            i = self.skip_ws(key_end);
            if self.byte(i)? != b':' {
                return None;
            }
            let value_start = self.skip_ws(i + 1);
            let value_end = self.value_end(value_start)?;
            if member_key == key {
                found = Some(value_start..value_end);
            }
            i = self.skip_ws(value_end);
            match self.byte(i)? {
                b',' => i = self.skip_ws(i + 1),
                _ => return found,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
  "name": "test-package",
  "version": "1.0.0",
  "scripts": { "test": "vitest run" },
  "dependencies": {
    "zod": "^3.0.0",
    "axios": "^1.0.0",
    "lodash": "^4.17.21"
  },
  "devDependencies": {
    "typescript": "~5.0.0",
    "local": "file:../local"
  },
  "peerDependencies": { "react" : ">=17.0.0 <19.0.0" },
  "overrides": {
    "semver": "7.5.4",
    "webpack": { "terser": "5.0.0" }
  }
}
"#;

    fn doc() -> ManifestDocument {
        ManifestDocument::parse("package.json", SAMPLE).unwrap()
    }

    fn updates(entries: &[(DepSection, &str, &str)]) -> BTreeMap<DependencyKey, String> {
        entries
            .iter()
            .map(|(section, name, to)| (DependencyKey::new(*section, *name), to.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_all_sections_in_order() {
        let doc = doc();
        let names: Vec<&str> = doc.dependencies().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["zod", "axios", "lodash", "typescript", "local", "react", "semver"]
        );
        assert_eq!(doc.dependencies()[5].section, DepSection::Peer);
        assert_eq!(doc.dependencies()[6].section, DepSection::Overrides);
    }

    #[test]
    fn test_parse_metadata() {
        let doc = doc();
        assert_eq!(doc.name(), Some("test-package"));
        assert_eq!(doc.script("test"), Some("vitest run"));
        assert_eq!(doc.script("build"), None);
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            ManifestDocument::parse("package.json", "not json"),
            Err(ManifestError::JsonParseError { .. })
        ));
        assert!(ManifestDocument::parse("package.json", "[]").is_err());
    }

    #[test]
    fn test_parse_empty_object() {
        let doc = ManifestDocument::parse("package.json", "{}").unwrap();
        assert!(doc.dependencies().is_empty());
    }

    #[test]
    fn test_with_updates_preserves_everything_else() {
        let original = doc();
        let updated = original
            .with_updates(&updates(&[(DepSection::Prod, "axios", "^1.5.0")]))
            .unwrap();
        assert_eq!(updated.text(), SAMPLE.replace("^1.0.0", "^1.5.0"));
        assert_eq!(original.text(), SAMPLE);
    }

    #[test]
    fn test_with_updates_several_sections() {
        let updated = doc()
            .with_updates(&updates(&[
                (DepSection::Prod, "lodash", "^4.18.0"),
                (DepSection::Dev, "typescript", "~5.4.0"),
                (DepSection::Peer, "react", ">=17.0.0 <20.0.0"),
                (DepSection::Overrides, "semver", "7.6.0"),
            ]))
            .unwrap();
        let expected = SAMPLE
            .replace("^4.17.21", "^4.18.0")
            .replace("~5.0.0", "~5.4.0")
            .replace("<19.0.0", "<20.0.0")
            .replace("7.5.4", "7.6.0");
        assert_eq!(updated.text(), expected);
        let key = DependencyKey::new(DepSection::Dev, "typescript");
        assert_eq!(updated.get(&key).unwrap().specifier, "~5.4.0");
    }

    #[test]
    fn test_with_updates_targets_section() {
        let text = r#"{"dependencies":{"a":"^1.0.0"},"devDependencies":{"a":"^1.0.0"}}"#;
        let doc = ManifestDocument::parse("package.json", text).unwrap();
        let updated = doc
            .with_updates(&updates(&[(DepSection::Dev, "a", "^2.0.0")]))
            .unwrap();
        assert_eq!(
            updated.text(),
            r#"{"dependencies":{"a":"^1.0.0"},"devDependencies":{"a":"^2.0.0"}}"#
        );
    }

    #[test]
    fn test_with_updates_scoped_and_escaped_names() {
        let text = "{\n  \"dependencies\": {\n    \"@types/node\": \"^20.0.0\",\n    \"we\\\"ird\": \"1.0.0\"\n  }\n}";
        let doc = ManifestDocument::parse("package.json", text).unwrap();
        let updated = doc
            .with_updates(&updates(&[
                (DepSection::Prod, "@types/node", "^20.10.0"),
                (DepSection::Prod, "we\"ird", "2.0.0"),
            ]))
            .unwrap();
        assert!(updated.text().contains("\"@types/node\": \"^20.10.0\""));
        assert!(updated.text().contains("\"we\\\"ird\": \"2.0.0\""));
    }

    #[test]
    fn test_with_updates_missing_entry() {
        let result = doc().with_updates(&updates(&[(DepSection::Prod, "missing", "1.0.0")]));
        assert!(matches!(result, Err(ManifestError::EntryNotFound { .. })));
    }

    #[test]
    fn test_with_updates_skips_nested_values() {
        let text = r#"{"dependencies":{"x":{"dependencies":"^9"}, "y": "^1.0.0"}}"#;
        let doc = ManifestDocument::parse("package.json", text).unwrap();
        let updated = doc
            .with_updates(&updates(&[(DepSection::Prod, "y", "^2.0.0")]))
            .unwrap();
        assert_eq!(
            updated.text(),
            r#"{"dependencies":{"x":{"dependencies":"^9"}, "y": "^2.0.0"}}"#
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = ManifestDocument::load(Path::new("/nonexistent/package.json"));
        assert!(matches!(result, Err(ManifestError::NotFound { .. })));
    }
}
