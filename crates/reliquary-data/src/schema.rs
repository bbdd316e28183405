//! Serde data file structs for save type schemas.
//!
//! These describe owner types, record components and sub-object types the
//! way a content author writes them. They are deserialized from RON, JSON or
//! TOML and then resolved into a core [`reliquary_core::registry::TypeRegistry`]
//! by the loader.

use reliquary_core::registry::{FieldDef, SubObjectDef, TypeCategory, TypeDef};
use reliquary_core::value::FieldKind;
use serde::Deserialize;

// ===========================================================================
// Types
// ===========================================================================

/// A type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeData {
    pub name: String,
    /// Full path; the registry derives one from the name when absent.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub category: CategoryData,
    #[serde(default)]
    pub fields: Vec<FieldData>,
    /// Name of the record component type instances carry.
    #[serde(default)]
    pub record: Option<String>,
    #[serde(default)]
    pub sub_objects: Vec<SubObjectData>,
    #[serde(default)]
    pub physics_bodies: Vec<String>,
}

/// Owner category as written in data files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryData {
    #[default]
    Ordinary,
    Agent,
    Controller,
    PlayerState,
    GameState,
    GameMode,
}

/// A declared field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldData {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKindData,
    #[serde(default)]
    pub persist: bool,
}

/// Field kinds as written in data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKindData {
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
    ObjectRef,
    MulticastDelegate,
}

/// A named sub-object slot.
#[derive(Debug, Clone, Deserialize)]
pub struct SubObjectData {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

// ===========================================================================
// Conversion
// ===========================================================================

impl From<CategoryData> for TypeCategory {
    fn from(c: CategoryData) -> Self {
        match c {
            CategoryData::Ordinary => TypeCategory::Ordinary,
            CategoryData::Agent => TypeCategory::Agent,
            CategoryData::Controller => TypeCategory::Controller,
            CategoryData::PlayerState => TypeCategory::PlayerState,
            CategoryData::GameState => TypeCategory::GameState,
            CategoryData::GameMode => TypeCategory::GameMode,
        }
    }
}

impl From<FieldKindData> for FieldKind {
    fn from(k: FieldKindData) -> Self {
        match k {
            FieldKindData::Bool => FieldKind::Bool,
            FieldKindData::I32 => FieldKind::I32,
            FieldKindData::I64 => FieldKind::I64,
            FieldKindData::F32 => FieldKind::F32,
            FieldKindData::F64 => FieldKind::F64,
            FieldKindData::Str => FieldKind::Str,
            FieldKindData::Bytes => FieldKind::Bytes,
            FieldKindData::Vec3 => FieldKind::Vec3,
            FieldKindData::Rotator => FieldKind::Rotator,
            FieldKindData::Quat => FieldKind::Quat,
            FieldKindData::Transform => FieldKind::Transform,
            FieldKindData::StrList => FieldKind::StrList,
            FieldKindData::Guid => FieldKind::Guid,
            FieldKindData::ObjectRef => FieldKind::ObjectRef,
            FieldKindData::MulticastDelegate => FieldKind::MulticastDelegate,
        }
    }
}

impl From<TypeData> for TypeDef {
    fn from(t: TypeData) -> Self {
        TypeDef {
            name: t.name,
            path: t.path.unwrap_or_default(),
            category: t.category.into(),
            fields: t
                .fields
                .into_iter()
                .map(|f| FieldDef {
                    name: f.name,
                    kind: f.kind.into(),
                    persist: f.persist,
                })
                .collect(),
            record: t.record,
            sub_objects: t
                .sub_objects
                .into_iter()
                .map(|s| SubObjectDef {
                    name: s.name,
                    type_name: s.type_name,
                })
                .collect(),
            physics_bodies: t.physics_bodies,
        }
    }
}
