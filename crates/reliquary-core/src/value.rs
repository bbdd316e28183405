//! Tagged field values and their payload encodings.
//!
//! A field's payload carries no type tag of its own: the reader decodes it
//! using the kind of the *live* field with the same name. The surrounding
//! field frame (see [`crate::field`]) is what lets a reader detect and skip a
//! payload whose width no longer matches.

use crate::cursor::{ByteCursor, CursorError};
use crate::id::PersistentId;
use crate::math::{Quat, Rotator, Transform, Vec3};
use serde::{Deserialize, Serialize};

/// The declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Bool,
    I32,
    I64,
    F32,
    F64,
    Str,
    Bytes,
    Vec3,
    Rotator,
    Quat,
    Transform,
    StrList,
    Guid,
    /// Reference to another object by asset path.
    ObjectRef,
    /// Event fan-out slot. Has no payload and is never persisted.
    MulticastDelegate,
}

impl FieldKind {
    /// Whether values of this kind have a persistable payload.
    pub fn is_persistable(self) -> bool {
        !matches!(self, FieldKind::MulticastDelegate)
    }
}

/// A field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Vec3(Vec3),
    Rotator(Rotator),
    Quat(Quat),
    Transform(Transform),
    StrList(Vec<String>),
    Guid(PersistentId),
    /// `None` is a null reference.
    ObjectRef(Option<String>),
    MulticastDelegate,
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Bool(_) => FieldKind::Bool,
            Value::I32(_) => FieldKind::I32,
            Value::I64(_) => FieldKind::I64,
            Value::F32(_) => FieldKind::F32,
            Value::F64(_) => FieldKind::F64,
            Value::Str(_) => FieldKind::Str,
            Value::Bytes(_) => FieldKind::Bytes,
            Value::Vec3(_) => FieldKind::Vec3,
            Value::Rotator(_) => FieldKind::Rotator,
            Value::Quat(_) => FieldKind::Quat,
            Value::Transform(_) => FieldKind::Transform,
            Value::StrList(_) => FieldKind::StrList,
            Value::Guid(_) => FieldKind::Guid,
            Value::ObjectRef(_) => FieldKind::ObjectRef,
            Value::MulticastDelegate => FieldKind::MulticastDelegate,
        }
    }

    /// The zero value of a kind, used to initialize fresh instances.
    pub fn default_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Bool => Value::Bool(false),
            FieldKind::I32 => Value::I32(0),
            FieldKind::I64 => Value::I64(0),
            FieldKind::F32 => Value::F32(0.0),
            FieldKind::F64 => Value::F64(0.0),
            FieldKind::Str => Value::Str(String::new()),
            FieldKind::Bytes => Value::Bytes(Vec::new()),
            FieldKind::Vec3 => Value::Vec3(Vec3::ZERO),
            FieldKind::Rotator => Value::Rotator(Rotator::default()),
            FieldKind::Quat => Value::Quat(Quat::IDENTITY),
            FieldKind::Transform => Value::Transform(Transform::IDENTITY),
            FieldKind::StrList => Value::StrList(Vec::new()),
            FieldKind::Guid => Value::Guid(PersistentId::NONE),
            FieldKind::ObjectRef => Value::ObjectRef(None),
            FieldKind::MulticastDelegate => Value::MulticastDelegate,
        }
    }

    /// Emit the raw payload (no name, no frame).
    pub fn encode(&self, cur: &mut ByteCursor) {
        match self {
            Value::Bool(v) => cur.write_bool(*v),
            Value::I32(v) => cur.write_i32(*v),
            Value::I64(v) => cur.write_i64(*v),
            Value::F32(v) => cur.write_f32(*v),
            Value::F64(v) => cur.write_f64(*v),
            Value::Str(v) => cur.write_string(v),
            Value::Bytes(v) => cur.write_bytes(v),
            Value::Vec3(v) => v.write_to(cur),
            Value::Rotator(v) => v.write_to(cur),
            Value::Quat(v) => v.write_to(cur),
            Value::Transform(v) => v.write_to(cur),
            Value::StrList(v) => cur.write_string_list(v),
            Value::Guid(v) => cur.write_guid(*v),
            Value::ObjectRef(v) => cur.write_string(v.as_deref().unwrap_or("")),
            Value::MulticastDelegate => {}
        }
    }

    /// Decode a payload of the given kind.
    pub fn decode(kind: FieldKind, cur: &mut ByteCursor) -> Result<Self, CursorError> {
        Ok(match kind {
            FieldKind::Bool => Value::Bool(cur.read_bool()?),
            FieldKind::I32 => Value::I32(cur.read_i32()?),
            FieldKind::I64 => Value::I64(cur.read_i64()?),
            FieldKind::F32 => Value::F32(cur.read_f32()?),
            FieldKind::F64 => Value::F64(cur.read_f64()?),
            FieldKind::Str => Value::Str(cur.read_string()?),
            FieldKind::Bytes => Value::Bytes(cur.read_bytes()?),
            FieldKind::Vec3 => Value::Vec3(Vec3::read_from(cur)?),
            FieldKind::Rotator => Value::Rotator(Rotator::read_from(cur)?),
            FieldKind::Quat => Value::Quat(Quat::read_from(cur)?),
            FieldKind::Transform => Value::Transform(Transform::read_from(cur)?),
            FieldKind::StrList => Value::StrList(cur.read_string_list()?),
            FieldKind::Guid => Value::Guid(cur.read_guid()?),
            FieldKind::ObjectRef => {
                let path = cur.read_string()?;
                Value::ObjectRef(if path.is_empty() { None } else { Some(path) })
            }
            FieldKind::MulticastDelegate => Value::MulticastDelegate,
        })
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}
