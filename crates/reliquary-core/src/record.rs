//! Count-prefixed lists of self-describing fields.
//!
//! One writer and one reader serve every call site: an entity's own fields,
//! its owner's fields, sub-object fields and the static blob. The writer
//! reserves the count, writes the fields that pass a predicate, then patches
//! the real count. The reader resolves each saved name through a
//! [`FieldSink`] and skips whatever the sink does not recognize.

use crate::cursor::{ByteCursor, CursorError};
use crate::field::{decode_field_payload, read_field_header, skip_field, write_value_field};
use crate::object::{FieldRef, ObjectData};
use crate::registry::FieldDef;
use crate::value::{FieldKind, Value};
use crate::world::SubObject;
use log::warn;

/// Width of a record's count prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountWidth {
    I32,
    I64,
}

impl CountWidth {
    fn reserve(self, cur: &mut ByteCursor) -> u64 {
        match self {
            CountWidth::I32 => cur.reserve_i32(),
            CountWidth::I64 => cur.reserve_i64(),
        }
    }

    fn patch(self, cur: &mut ByteCursor, at: u64, count: usize) -> Result<(), CursorError> {
        match self {
            CountWidth::I32 => cur.patch_i32(at, count as i32),
            CountWidth::I64 => cur.patch_i64(at, count as i64),
        }
    }

    pub fn read(self, cur: &mut ByteCursor) -> Result<usize, CursorError> {
        match self {
            CountWidth::I32 => cur.read_len(),
            CountWidth::I64 => {
                let pos = cur.tell();
                let count = cur.read_i64()?;
                if count < 0 {
                    return Err(CursorError::NegativeLength { pos, len: count });
                }
                Ok(count as usize)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write framed fields with no count prefix. Fields without a persistable
/// payload are dropped. Returns how many were written.
pub fn write_entries<'a, I>(cur: &mut ByteCursor, fields: I) -> Result<usize, CursorError>
where
    I: IntoIterator<Item = FieldRef<'a>>,
{
    let mut count = 0;
    for field in fields {
        if !field.def.kind.is_persistable() {
            continue;
        }
        write_value_field(cur, &field.def.name, field.value)?;
        count += 1;
    }
    Ok(count)
}

/// Write a count-prefixed record of the candidates accepted by `predicate`.
/// The count written is the number of fields actually emitted.
pub fn write_record<'a, I, P>(
    cur: &mut ByteCursor,
    width: CountWidth,
    candidates: I,
    mut predicate: P,
) -> Result<usize, CursorError>
where
    I: IntoIterator<Item = FieldRef<'a>>,
    P: FnMut(&FieldDef) -> bool,
{
    let at = width.reserve(cur);
    let count = write_entries(cur, candidates.into_iter().filter(|f| predicate(f.def)))?;
    width.patch(cur, at, count)?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Where decoded field values land.
pub trait FieldSink {
    /// The live kind of a field, or `None` if the sink has no persistable
    /// field by that name.
    fn field_kind(&self, name: &str) -> Option<FieldKind>;

    /// Store a decoded value. Returns false if it could not be stored.
    fn apply(&mut self, name: &str, value: Value) -> bool;

    /// Human-readable target name for diagnostics.
    fn describe(&self) -> String;
}

impl FieldSink for ObjectData {
    fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.descriptor()
            .field(name)
            .map(|h| h.kind)
            .filter(|k| k.is_persistable())
    }

    fn apply(&mut self, name: &str, value: Value) -> bool {
        self.set(name, value).is_ok()
    }

    fn describe(&self) -> String {
        self.type_name().to_string()
    }
}

/// Legacy pooled namespace over all sub-objects of one entity. A name
/// resolves to the first sub-object declaring it; later ones never see it.
pub struct PooledSink<'a> {
    objects: &'a mut [SubObject],
}

impl<'a> PooledSink<'a> {
    pub fn new(objects: &'a mut [SubObject]) -> Self {
        Self { objects }
    }

    fn owner_of(&self, name: &str) -> Option<usize> {
        self.objects
            .iter()
            .position(|sub| sub.data.field_kind(name).is_some())
    }
}

impl FieldSink for PooledSink<'_> {
    fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.owner_of(name)
            .and_then(|i| self.objects[i].data.field_kind(name))
    }

    fn apply(&mut self, name: &str, value: Value) -> bool {
        match self.owner_of(name) {
            Some(i) => self.objects[i].data.apply(name, value),
            None => false,
        }
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self.objects.iter().map(|s| s.name.as_str()).collect();
        format!("sub-objects [{}]", names.join(", "))
    }
}

/// Tally of one record read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStats {
    /// Fields present in the file.
    pub declared: usize,
    pub applied: usize,
    /// Saved names the live type no longer declares.
    pub stale: usize,
    /// Saved payloads whose width no longer matches the live kind.
    pub mismatched: usize,
}

impl RecordStats {
    pub fn merge(&mut self, other: RecordStats) {
        self.declared += other.declared;
        self.applied += other.applied;
        self.stale += other.stale;
        self.mismatched += other.mismatched;
    }
}

fn read_entry(
    cur: &mut ByteCursor,
    sink: &mut dyn FieldSink,
    stats: &mut RecordStats,
) -> Result<(), CursorError> {
    let header = read_field_header(cur)?;
    stats.declared += 1;
    let Some(kind) = sink.field_kind(&header.name) else {
        warn!(
            "field `{}` in save file but not found in {}; re-save to drop it",
            header.name,
            sink.describe()
        );
        stats.stale += 1;
        return skip_field(cur, &header);
    };
    let applied = match decode_field_payload(cur, &header, kind)? {
        Some(value) => sink.apply(&header.name, value),
        None => false,
    };
    if applied {
        stats.applied += 1;
    } else {
        warn!(
            "field `{}` of {} no longer decodes as {:?}; value discarded",
            header.name,
            sink.describe(),
            kind
        );
        stats.mismatched += 1;
    }
    Ok(())
}

/// Read `count` framed fields into `sink`.
pub fn read_entries(
    cur: &mut ByteCursor,
    count: usize,
    sink: &mut dyn FieldSink,
) -> Result<RecordStats, CursorError> {
    let mut stats = RecordStats::default();
    for _ in 0..count {
        read_entry(cur, sink, &mut stats)?;
    }
    Ok(stats)
}

/// Read a count-prefixed record into `sink`.
pub fn read_record(
    cur: &mut ByteCursor,
    width: CountWidth,
    sink: &mut dyn FieldSink,
) -> Result<RecordStats, CursorError> {
    let count = width.read(cur)?;
    read_entries(cur, count, sink)
}

/// Read past `count` framed fields without applying anything.
pub fn skip_entries(cur: &mut ByteCursor, count: usize) -> Result<(), CursorError> {
    for _ in 0..count {
        let header = read_field_header(cur)?;
        skip_field(cur, &header)?;
    }
    Ok(())
}

/// Read past a count-prefixed record without applying anything.
pub fn skip_record(cur: &mut ByteCursor, width: CountWidth) -> Result<usize, CursorError> {
    let count = width.read(cur)?;
    skip_entries(cur, count)?;
    Ok(count)
}
