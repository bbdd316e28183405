//! File-level layout: version gates, header, grouping table, static blob.
//!
//! ```text
//! i32 format_version
//! host stamp
//! [v>=4] string_list grouping table ("name=True" / "name=False")
//! [v>=6] u8 has_static, [has_static] static blob
//! i32 entity_count (patched after the body)
//! entity records
//! ```

use crate::cursor::{ByteCursor, CursorError};
use crate::object::ObjectData;
use crate::record::{CountWidth, read_record, write_record};
use crate::registry::TypeRegistry;
use crate::selection::is_always_excluded;
use crate::storage::StorageError;
use crate::validation::ValidationError;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// Version written by this crate.
pub const FORMAT_VERSION: i32 = 6;
/// Records carry persistent ids and tags.
pub const VERSION_PERSISTENT_IDS: i32 = 3;
/// Header carries the grouping table; records carry a level group.
pub const VERSION_STREAMING_GROUPS: i32 = 4;
/// Sub-object fields may use the per-sub-object table.
pub const VERSION_SUBOBJECT_TABLE: i32 = 5;
/// Header may carry a static blob.
pub const VERSION_STATIC_DATA: i32 = 6;

/// Name of the root group that is always loaded.
pub const PERSISTENT_GROUP: &str = "PersistentLevel";

/// Level group read from files that predate group recording.
pub const UNKNOWN_GROUP: &str = "<unknown group: re-save to record streaming info>";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("save aborted: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("save buffer error: {0}")]
    Cursor(#[from] CursorError),
    #[error("cannot save while a load is in progress")]
    LoadInProgress,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("malformed save file: {0}")]
    Cursor(#[from] CursorError),
    #[error("file format version {0} is newer than supported version {FORMAT_VERSION}")]
    FutureVersion(i32),
    #[error("file has no static data")]
    NoStaticData,
    #[error("file version {0} predates static data")]
    StaticDataUnsupported(i32),
    #[error("static data type {0:?} not found")]
    StaticTypeNotFound(String),
    #[error("a load is already in progress")]
    LoadInProgress,
}

// ---------------------------------------------------------------------------
// Host stamp
// ---------------------------------------------------------------------------

/// Version of the program that wrote a file. Stored, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostVersion {
    pub package_version: i32,
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub changelist: u32,
    pub branch: String,
}

impl HostVersion {
    /// This crate's own version.
    pub fn current() -> Self {
        Self {
            package_version: 1,
            major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
            changelist: 0,
            branch: env!("CARGO_PKG_NAME").to_string(),
        }
    }

    pub fn write_to(&self, cur: &mut ByteCursor) {
        cur.write_i32(self.package_version);
        cur.write_u16(self.major);
        cur.write_u16(self.minor);
        cur.write_u16(self.patch);
        cur.write_u32(self.changelist);
        cur.write_string(&self.branch);
    }

    pub fn read_from(cur: &mut ByteCursor) -> Result<Self, CursorError> {
        Ok(Self {
            package_version: cur.read_i32()?,
            major: cur.read_u16()?,
            minor: cur.read_u16()?,
            patch: cur.read_u16()?,
            changelist: cur.read_u32()?,
            branch: cur.read_string()?,
        })
    }
}

impl Default for HostVersion {
    fn default() -> Self {
        Self::current()
    }
}

// ---------------------------------------------------------------------------
// Grouping table
// ---------------------------------------------------------------------------

/// Saved visibility of one streaming group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupState {
    pub name: String,
    pub visible: bool,
}

impl GroupState {
    pub fn encode(&self) -> String {
        format!("{}={}", self.name, if self.visible { "True" } else { "False" })
    }

    /// Parse `name=True` / `name=False`. Anything but `True` is hidden.
    pub fn parse(entry: &str) -> Option<Self> {
        let (name, visible) = entry.rsplit_once('=')?;
        Some(Self {
            name: name.to_string(),
            visible: visible == "True",
        })
    }
}

/// Whether a grouping table implies any streaming work.
pub fn needs_streaming(groups: &[GroupState]) -> bool {
    match groups {
        [] => false,
        [only] => only.name != PERSISTENT_GROUP,
        _ => true,
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Everything before the entity records.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    pub version: i32,
    pub host: HostVersion,
    pub groups: Vec<GroupState>,
    pub has_static: bool,
}

/// Write the header and an entity-count placeholder. Returns the
/// placeholder's position.
pub fn write_header(
    cur: &mut ByteCursor,
    host: &HostVersion,
    groups: &[GroupState],
    static_data: Option<&ObjectData>,
    log_static_fields: bool,
) -> Result<u64, CursorError> {
    cur.write_i32(FORMAT_VERSION);
    host.write_to(cur);
    let table: Vec<String> = groups.iter().map(GroupState::encode).collect();
    cur.write_string_list(&table);
    cur.write_bool(static_data.is_some());
    if let Some(data) = static_data {
        write_static_blob(cur, data, log_static_fields)?;
    }
    Ok(cur.reserve_i32())
}

/// Read the header up to (not including) the entity count. A static blob is
/// skipped via its end offset.
pub fn read_header(cur: &mut ByteCursor) -> Result<FileHeader, LoadError> {
    let version = cur.read_i32()?;
    if version > FORMAT_VERSION {
        return Err(LoadError::FutureVersion(version));
    }
    if version < FORMAT_VERSION {
        warn!(
            "save file version {version} is older than {FORMAT_VERSION}; \
             loading in compatibility mode"
        );
    }
    let host = HostVersion::read_from(cur)?;
    let groups = if version >= VERSION_STREAMING_GROUPS {
        cur.read_string_list()?
            .iter()
            .filter_map(|entry| {
                let parsed = GroupState::parse(entry);
                if parsed.is_none() {
                    warn!("ignoring malformed grouping entry {entry:?}");
                }
                parsed
            })
            .collect()
    } else {
        Vec::new()
    };
    let has_static = version >= VERSION_STATIC_DATA && cur.read_u8()? != 0;
    if has_static {
        skip_static_blob(cur)?;
    }
    Ok(FileHeader {
        version,
        host,
        groups,
        has_static,
    })
}

// ---------------------------------------------------------------------------
// Static blob
// ---------------------------------------------------------------------------

pub fn write_static_blob(
    cur: &mut ByteCursor,
    data: &ObjectData,
    log_fields: bool,
) -> Result<(), CursorError> {
    cur.write_string(data.descriptor().path());
    let end_at = cur.reserve_i64();
    write_record(cur, CountWidth::I64, data.field_refs(), |def| {
        let keep = !is_always_excluded(def);
        if keep && log_fields {
            info!("{} ~ saving static data field {}", data.type_name(), def.name);
        }
        keep
    })?;
    let end = cur.tell();
    cur.patch_i64(end_at, end as i64)
}

fn skip_static_blob(cur: &mut ByteCursor) -> Result<(), CursorError> {
    cur.read_string()?;
    let end = cur.read_offset()?;
    cur.seek(end)
}

/// Read a static blob at the cursor into a fresh instance of its type.
/// An unknown type is skipped and reported.
pub fn read_static_blob(
    cur: &mut ByteCursor,
    registry: &TypeRegistry,
) -> Result<ObjectData, LoadError> {
    let type_path = cur.read_string()?;
    let end = cur.read_offset()?;
    let Some(mut data) = registry
        .resolve_type_by_path(&type_path)
        .and_then(|id| registry.instantiate(id))
    else {
        error!("static data type not found, was it renamed or removed? {type_path:?}");
        cur.seek(end)?;
        return Err(LoadError::StaticTypeNotFound(type_path));
    };
    read_record(cur, CountWidth::I64, &mut data)?;
    if cur.tell() != end {
        warn!("static data for {type_path} did not end at its recorded offset");
        cur.seek(end)?;
    }
    Ok(data)
}

/// Position the cursor at a file's static blob and read it.
pub fn read_static_data(
    cur: &mut ByteCursor,
    registry: &TypeRegistry,
) -> Result<ObjectData, LoadError> {
    let version = cur.read_i32()?;
    if version > FORMAT_VERSION {
        return Err(LoadError::FutureVersion(version));
    }
    if version < VERSION_STATIC_DATA {
        return Err(LoadError::StaticDataUnsupported(version));
    }
    HostVersion::read_from(cur)?;
    cur.read_string_list()?;
    if cur.read_u8()? == 0 {
        return Err(LoadError::NoStaticData);
    }
    read_static_blob(cur, registry)
}
