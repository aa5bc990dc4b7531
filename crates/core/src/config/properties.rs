use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Errors raised by a property store
#[derive(Debug, thiserror::Error)]
pub enum PropertyError {
    #[error("Property section not found: {0}")]
    SectionNotFound(String),

    #[error("Property not found: {section}\\{prop}")]
    PropertyNotFound { section: String, prop: String },

    #[error("Unable to read properties from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to parse properties in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Sectioned string properties backed by a JSON file.
///
/// Used both for the project configuration (`.dtf.json`) and the global
/// configuration (`globals.json`). Section names are capitalized on every
/// access, so `info`, `INFO` and `Info` address the same section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Properties {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file(path: &Path) -> Result<Self, PropertyError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PropertyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| PropertyError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), PropertyError> {
        let contents =
            serde_json::to_string_pretty(self).map_err(|source| PropertyError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        std::fs::write(path, contents).map_err(|source| PropertyError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get_prop(&self, section: &str, prop: &str) -> Result<&str, PropertyError> {
        let section = capitalize(section);
        let values = self
            .sections
            .get(&section)
            .ok_or_else(|| PropertyError::SectionNotFound(section.clone()))?;

        values
            .get(prop)
            .map(String::as_str)
            .ok_or(PropertyError::PropertyNotFound {
                section,
                prop: prop.to_string(),
            })
    }

    pub fn set_prop(&mut self, section: &str, prop: &str, value: &str) {
        self.sections
            .entry(capitalize(section))
            .or_default()
            .insert(prop.to_string(), value.to_string());
    }

    /// Remove a property, dropping its section once it is empty.
    pub fn del_prop(&mut self, section: &str, prop: &str) -> Result<(), PropertyError> {
        let section = capitalize(section);
        let values = self
            .sections
            .get_mut(&section)
            .ok_or_else(|| PropertyError::SectionNotFound(section.clone()))?;

        if values.remove(prop).is_none() {
            return Err(PropertyError::PropertyNotFound {
                section,
                prop: prop.to_string(),
            });
        }

        if values.is_empty() {
            self.sections.remove(&section);
        }
        Ok(())
    }

    pub fn test_prop(&self, section: &str, prop: &str) -> bool {
        self.get_prop(section, prop).is_ok()
    }

    pub fn section(&self, section: &str) -> Result<&BTreeMap<String, String>, PropertyError> {
        let section = capitalize(section);
        self.sections
            .get(&section)
            .ok_or(PropertyError::SectionNotFound(section))
    }

    pub fn sections(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, String>)> {
        self.sections.iter()
    }
}

fn capitalize(section: &str) -> String {
    let lower = section.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sections_are_capitalized() {
        let mut props = Properties::new();
        props.set_prop("info", "sdk", "23");

        assert_eq!(props.get_prop("INFO", "sdk").unwrap(), "23");
        assert_eq!(props.get_prop("Info", "sdk").unwrap(), "23");
    }

    #[test]
    fn test_missing_section_and_property() {
        let mut props = Properties::new();
        assert!(matches!(
            props.get_prop("Info", "sdk"),
            Err(PropertyError::SectionNotFound(s)) if s == "Info"
        ));

        props.set_prop("Info", "serial", "emulator-5554");
        assert!(matches!(
            props.get_prop("Info", "sdk"),
            Err(PropertyError::PropertyNotFound { .. })
        ));
        assert!(!props.test_prop("Info", "sdk"));
    }

    #[test]
    fn test_delete_drops_empty_section() {
        let mut props = Properties::new();
        props.set_prop("Local", "diff-data-dir", "/tmp/diff");
        props.del_prop("local", "diff-data-dir").unwrap();

        assert!(props.section("Local").is_err());
        assert!(props.del_prop("Local", "diff-data-dir").is_err());
    }

    #[test]
    fn test_file_round_trip_keeps_json_shape() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".dtf.json");

        let mut props = Properties::new();
        props.set_prop("Info", "sdk", "25");
        props.save_to_file(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Info"]["sdk"], "25");

        let loaded = Properties::load_from_file(&path).unwrap();
        assert_eq!(loaded, props);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".dtf.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Properties::load_from_file(&path),
            Err(PropertyError::Parse { .. })
        ));
    }
}
