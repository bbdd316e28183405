//! Resolution pipeline: reads data files, checks cross-references, builds the
//! type registry and the engine settings.
//!
//! A data directory holds `types.{ron,toml,json}` (required) and
//! `settings.{ron,toml,json}` (optional; defaults apply when absent).

use crate::schema::TypeData;
use log::{debug, info};
use reliquary_core::registry::{RegistryError, TypeDef, TypeRegistry, TypeRegistryBuilder};
use reliquary_core::settings::SaveSettings;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TYPES_FILE: &str = "types";
const SETTINGS_FILE: &str = "settings";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The schemas parsed but the registry rejected them.
    #[error("invalid type schema: {0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for `{base_name}.ron`, `.toml` or `.json`.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = &found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML has no top-level arrays, so for TOML files the
/// array is read from `toml_key` of the top-level table.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }
    let content = std::fs::read_to_string(path)?;
    let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    let array = table
        .get(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
        .clone();
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        return Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        });
    }
    Ok(())
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// Everything an engine needs from a data directory.
#[derive(Debug)]
pub struct SaveData {
    pub settings: SaveSettings,
    pub registry: Arc<TypeRegistry>,
}

/// Load `settings.*` from `dir`, falling back to defaults when there is none.
pub fn load_settings(dir: &Path) -> Result<SaveSettings, DataLoadError> {
    match find_data_file(dir, SETTINGS_FILE)? {
        Some(path) => {
            debug!("loading settings from {}", path.display());
            deserialize_file(&path)
        }
        None => Ok(SaveSettings::default()),
    }
}

/// Load `types.*` from `dir` and freeze it into a registry.
///
/// Names must be unique within the file, and every record or sub-object
/// type a schema names must be declared in the same file.
pub fn load_types(dir: &Path) -> Result<TypeRegistry, DataLoadError> {
    let path = require_data_file(dir, TYPES_FILE)?;
    let types: Vec<TypeData> = deserialize_list(&path, "types")?;

    let mut by_name: HashMap<String, usize> = HashMap::with_capacity(types.len());
    for (i, t) in types.iter().enumerate() {
        check_duplicate(&by_name, &t.name, &path)?;
        by_name.insert(t.name.clone(), i);
    }
    for t in &types {
        if let Some(record) = &t.record {
            resolve_name(&by_name, record, &path, "record type")?;
        }
        for sub in &t.sub_objects {
            resolve_name(&by_name, &sub.type_name, &path, "sub-object type")?;
        }
    }

    let mut builder = TypeRegistryBuilder::new();
    for t in types {
        builder.register(TypeDef::from(t))?;
    }
    info!("loaded {} types from {}", builder.len(), path.display());
    Ok(builder.build()?)
}

/// Load settings and types from a data directory.
pub fn load_save_data(dir: &Path) -> Result<SaveData, DataLoadError> {
    let settings = load_settings(dir)?;
    let registry = Arc::new(load_types(dir)?);
    Ok(SaveData { settings, registry })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reliquary_core::registry::TypeCategory;
    use reliquary_core::value::FieldKind;
    use std::fs;
    use tempfile::TempDir;

    fn data_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    const TYPES_JSON: &str = r#"[
        {"name": "ChestRecord", "fields": [{"name": "gold", "type": "i32"}]},
        {"name": "Chest", "path": "/Game/Chest", "record": "ChestRecord",
         "fields": [{"name": "tint", "type": "str", "persist": true}]}
    ]"#;

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("types.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("types.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("types.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        assert!(matches!(
            detect_format(Path::new("types.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("types")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_found() {
        let dir = data_dir(&[("types.toml", "types = []")]);
        let found = find_data_file(dir.path(), "types").unwrap();
        assert_eq!(found, Some(dir.path().join("types.toml")));
    }

    #[test]
    fn find_data_file_absent() {
        let dir = data_dir(&[]);
        assert_eq!(find_data_file(dir.path(), "types").unwrap(), None);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = data_dir(&[("types.ron", "[]"), ("types.json", "[]")]);
        assert!(matches!(
            find_data_file(dir.path(), "types"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));
    }

    #[test]
    fn require_data_file_missing() {
        let dir = data_dir(&[]);
        let err = require_data_file(dir.path(), "types").unwrap_err();
        assert!(matches!(err, DataLoadError::MissingRequired { ref file, .. } if file == "types"));
    }

    // -----------------------------------------------------------------------
    // deserialize_list
    // -----------------------------------------------------------------------

    #[test]
    fn deserialize_list_toml_reads_key() {
        let dir = data_dir(&[(
            "types.toml",
            r#"
[[types]]
name = "Barrel"

[[types]]
name = "Hero"
category = "agent"
"#,
        )]);
        let types: Vec<TypeData> =
            deserialize_list(&dir.path().join("types.toml"), "types").unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(types[1].name, "Hero");
    }

    #[test]
    fn deserialize_list_toml_missing_key() {
        let dir = data_dir(&[("types.toml", "other = 1")]);
        let r: Result<Vec<TypeData>, _> = deserialize_list(&dir.path().join("types.toml"), "types");
        assert!(matches!(r, Err(DataLoadError::Parse { .. })));
    }

    #[test]
    fn deserialize_list_ron() {
        let dir = data_dir(&[(
            "types.ron",
            r#"[(name: "Barrel", fields: [(name: "dents", type: i32)])]"#,
        )]);
        let types: Vec<TypeData> =
            deserialize_list(&dir.path().join("types.ron"), "types").unwrap();
        assert_eq!(types[0].fields[0].name, "dents");
    }

    #[test]
    fn deserialize_file_parse_error() {
        let dir = data_dir(&[("types.json", "{ not json")]);
        let r: Result<Vec<TypeData>, _> = deserialize_file(&dir.path().join("types.json"));
        assert!(matches!(r, Err(DataLoadError::Parse { .. })));
    }

    // -----------------------------------------------------------------------
    // load_types
    // -----------------------------------------------------------------------

    #[test]
    fn load_types_builds_registry() {
        let dir = data_dir(&[("types.json", TYPES_JSON)]);
        let registry = load_types(dir.path()).unwrap();

        let chest = registry.descriptor("Chest").unwrap();
        assert_eq!(chest.path(), "/Game/Chest");
        assert_eq!(chest.category(), TypeCategory::Ordinary);
        assert_eq!(chest.field("tint").unwrap().kind, FieldKind::Str);
        assert_eq!(chest.record_type(), registry.resolve_type("ChestRecord"));
    }

    #[test]
    fn load_types_rejects_duplicate_names() {
        let dir = data_dir(&[("types.json", r#"[{"name": "A"}, {"name": "A"}]"#)]);
        let err = load_types(dir.path()).unwrap_err();
        assert!(matches!(err, DataLoadError::DuplicateName { ref name, .. } if name == "A"));
    }

    #[test]
    fn load_types_rejects_unknown_record_type() {
        let dir = data_dir(&[("types.json", r#"[{"name": "A", "record": "Missing"}]"#)]);
        let err = load_types(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::UnresolvedRef { expected_kind: "record type", .. }
        ));
    }

    #[test]
    fn load_types_rejects_unknown_sub_object_type() {
        let dir = data_dir(&[(
            "types.json",
            r#"[{"name": "A", "sub_objects": [{"name": "lid", "type": "Lid"}]}]"#,
        )]);
        let err = load_types(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::UnresolvedRef { expected_kind: "sub-object type", .. }
        ));
    }

    #[test]
    fn load_types_surfaces_registry_errors() {
        let dir = data_dir(&[(
            "types.json",
            r#"[{"name": "A", "fields": [
                {"name": "x", "type": "i32"}, {"name": "x", "type": "f32"}
            ]}]"#,
        )]);
        let err = load_types(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::Registry(RegistryError::DuplicateField { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // load_settings / load_save_data
    // -----------------------------------------------------------------------

    #[test]
    fn settings_default_when_absent() {
        let dir = data_dir(&[]);
        assert_eq!(load_settings(dir.path()).unwrap(), SaveSettings::default());
    }

    #[test]
    fn settings_partial_toml_keeps_defaults() {
        let dir = data_dir(&[(
            "settings.toml",
            "async_save = true\nasync_chunk_size = 25\nillegal_type_names = [\"HUD\"]\n",
        )]);
        let s = load_settings(dir.path()).unwrap();
        assert!(s.async_save);
        assert_eq!(s.async_chunk_size, 25);
        assert!(s.is_illegal_type_name("HUD"));
        assert_eq!(s.streaming_timeout_secs, SaveSettings::default().streaming_timeout_secs);
    }

    #[test]
    fn load_save_data_reads_both() {
        let dir = data_dir(&[
            ("types.json", TYPES_JSON),
            ("settings.ron", "(flag_driven_fields: true)"),
        ]);
        let data = load_save_data(dir.path()).unwrap();
        assert!(data.settings.flag_driven_fields);
        assert!(data.registry.descriptor("ChestRecord").is_some());
    }

    #[test]
    fn load_save_data_requires_types() {
        let dir = data_dir(&[("settings.json", "{}")]);
        assert!(matches!(
            load_save_data(dir.path()),
            Err(DataLoadError::MissingRequired { .. })
        ));
    }
}
