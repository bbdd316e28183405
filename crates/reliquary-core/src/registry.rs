//! Type registry: the explicit, registration-time replacement for runtime
//! reflection.
//!
//! Each [`TypeDescriptor`] maps field names to slots with a declared
//! [`FieldKind`], so a reader can resolve a saved field name to a handle and
//! decode the payload without any dynamic type inspection. Descriptors are
//! registered through [`TypeRegistryBuilder`] and frozen into an immutable
//! [`TypeRegistry`] once all cross-type references resolve.

use crate::id::TypeId;
use crate::object::ObjectData;
use crate::value::FieldKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Definitions (registration input)
// ---------------------------------------------------------------------------

/// Broad category of an owner type. Some categories may never carry a
/// record-bearing component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TypeCategory {
    #[default]
    Ordinary,
    /// A controllable agent with velocity and control rotation.
    Agent,
    Controller,
    PlayerState,
    GameState,
    GameMode,
}

impl TypeCategory {
    /// Global singletons and controllers hold per-session state, not
    /// per-instance state, and are rejected as record owners.
    pub fn is_illegal_owner(self) -> bool {
        matches!(
            self,
            TypeCategory::Controller
                | TypeCategory::PlayerState
                | TypeCategory::GameState
                | TypeCategory::GameMode
        )
    }
}

/// A declared field on a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    /// The "persist" marker honored in flag-driven selection mode.
    #[serde(default)]
    pub persist: bool,
}

impl FieldDef {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            persist: false,
        }
    }

    /// Mark the field with the persist marker.
    pub fn persisted(mut self) -> Self {
        self.persist = true;
        self
    }
}

/// A named sub-object attached to every instance of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubObjectDef {
    pub name: String,
    pub type_name: String,
}

/// Registration input for one type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    /// Full path used as a fallback when the short name does not resolve.
    /// Defaults to `/Types/<name>`.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub category: TypeCategory,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Type name of the record-bearing component instances carry.
    #[serde(default)]
    pub record: Option<String>,
    #[serde(default)]
    pub sub_objects: Vec<SubObjectDef>,
    /// Names of physics bodies an instance owns.
    #[serde(default)]
    pub physics_bodies: Vec<String>,
}

impl TypeDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn category(mut self, category: TypeCategory) -> Self {
        self.category = category;
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn record(mut self, type_name: &str) -> Self {
        self.record = Some(type_name.to_string());
        self
    }

    pub fn sub_object(mut self, name: &str, type_name: &str) -> Self {
        self.sub_objects.push(SubObjectDef {
            name: name.to_string(),
            type_name: type_name.to_string(),
        });
        self
    }

    pub fn physics_body(mut self, name: &str) -> Self {
        self.physics_bodies.push(name.to_string());
        self
    }

    fn effective_path(&self) -> String {
        if self.path.is_empty() {
            format!("/Types/{}", self.name)
        } else {
            self.path.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Frozen descriptors
// ---------------------------------------------------------------------------

/// Resolved handle to one field slot of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHandle {
    pub slot: usize,
    pub kind: FieldKind,
}

/// An immutable, resolved type.
#[derive(Debug)]
pub struct TypeDescriptor {
    id: TypeId,
    name: String,
    path: String,
    category: TypeCategory,
    fields: Vec<FieldDef>,
    field_index: HashMap<String, usize>,
    record: Option<TypeId>,
    sub_objects: Vec<(String, TypeId)>,
    physics_bodies: Vec<String>,
}

impl TypeDescriptor {
    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn category(&self) -> TypeCategory {
        self.category
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<FieldHandle> {
        self.field_index.get(name).map(|&slot| FieldHandle {
            slot,
            kind: self.fields[slot].kind,
        })
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_index.contains_key(name)
    }

    pub fn record_type(&self) -> Option<TypeId> {
        self.record
    }

    pub fn sub_objects(&self) -> &[(String, TypeId)] {
        &self.sub_objects
    }

    pub fn physics_bodies(&self) -> &[String] {
        &self.physics_bodies
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing an immutable [`TypeRegistry`].
/// Two-phase lifecycle: registration/mutation, then finalization.
#[derive(Debug)]
pub struct TypeRegistryBuilder {
    types: Vec<TypeDef>,
    name_to_id: HashMap<String, TypeId>,
}

impl Default for TypeRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistryBuilder {
    pub fn new() -> Self {
        Self {
            types: Vec::new(),
            name_to_id: HashMap::new(),
        }
    }

    /// Register a type. Returns its ID.
    pub fn register(&mut self, def: TypeDef) -> Result<TypeId, RegistryError> {
        if self.name_to_id.contains_key(&def.name) {
            return Err(RegistryError::DuplicateType(def.name));
        }
        let id = TypeId(self.types.len() as u32);
        self.name_to_id.insert(def.name.clone(), id);
        self.types.push(def);
        Ok(id)
    }

    /// Mutate a registered type by name before the registry is frozen.
    pub fn mutate_type<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut TypeDef),
    {
        let id = self
            .name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        let def = &mut self.types[id.0 as usize];
        f(def);
        // Renames are not allowed; the id map is keyed by name.
        def.name = name.to_string();
        Ok(())
    }

    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.name_to_id.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Finalize: validate field names and paths, resolve cross-type refs.
    pub fn build(self) -> Result<TypeRegistry, RegistryError> {
        let mut path_to_id = HashMap::new();
        let mut types = Vec::with_capacity(self.types.len());

        for (index, def) in self.types.into_iter().enumerate() {
            let id = TypeId(index as u32);
            let path = def.effective_path();
            if path_to_id.insert(path.clone(), id).is_some() {
                return Err(RegistryError::DuplicatePath(path));
            }

            let mut field_index = HashMap::with_capacity(def.fields.len());
            for (slot, field) in def.fields.iter().enumerate() {
                if field_index.insert(field.name.clone(), slot).is_some() {
                    return Err(RegistryError::DuplicateField {
                        type_name: def.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }

            let resolve = |type_name: &str| {
                self.name_to_id
                    .get(type_name)
                    .copied()
                    .ok_or_else(|| RegistryError::UnresolvedType {
                        referenced_by: def.name.clone(),
                        name: type_name.to_string(),
                    })
            };
            let record = def.record.as_deref().map(|name| resolve(name)).transpose()?;
            let sub_objects = def
                .sub_objects
                .iter()
                .map(|sub| Ok((sub.name.clone(), resolve(&sub.type_name)?)))
                .collect::<Result<Vec<_>, RegistryError>>()?;

            types.push(Arc::new(TypeDescriptor {
                id,
                name: def.name,
                path,
                category: def.category,
                fields: def.fields,
                field_index,
                record,
                sub_objects,
                physics_bodies: def.physics_bodies,
            }));
        }

        Ok(TypeRegistry {
            types,
            name_to_id: self.name_to_id,
            path_to_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable registry. Frozen after build(). Thread-safe to share.
#[derive(Debug)]
pub struct TypeRegistry {
    types: Vec<Arc<TypeDescriptor>>,
    name_to_id: HashMap<String, TypeId>,
    path_to_id: HashMap<String, TypeId>,
}

impl TypeRegistry {
    pub fn get(&self, id: TypeId) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(id.0 as usize)
    }

    /// Resolve a type by its short name.
    pub fn resolve_type(&self, name: &str) -> Option<TypeId> {
        self.name_to_id.get(name).copied()
    }

    /// Resolve a type by its full path.
    pub fn resolve_type_by_path(&self, path: &str) -> Option<TypeId> {
        self.path_to_id.get(path).copied()
    }

    pub fn descriptor(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.resolve_type(name).and_then(|id| self.get(id))
    }

    /// A fresh instance of a type with every field at its zero value.
    pub fn instantiate(&self, id: TypeId) -> Option<ObjectData> {
        self.get(id).map(|desc| ObjectData::new(Arc::clone(desc)))
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("type not found: {0}")]
    NotFound(String),
    #[error("type registered twice: {0}")]
    DuplicateType(String),
    #[error("two types share the path {0}")]
    DuplicatePath(String),
    #[error("type {type_name} declares field {field} twice")]
    DuplicateField { type_name: String, field: String },
    #[error("type {referenced_by} references unknown type {name}")]
    UnresolvedType { referenced_by: String, name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_builder() -> TypeRegistryBuilder {
        let mut b = TypeRegistryBuilder::new();
        b.register(TypeDef::new("CrateRecord").field(FieldDef::new("opened", FieldKind::Bool)))
            .unwrap();
        b.register(
            TypeDef::new("Crate")
                .path("/Game/Props/Crate")
                .field(FieldDef::new("health", FieldKind::I32))
                .record("CrateRecord"),
        )
        .unwrap();
        b
    }

    #[test]
    fn resolves_by_name_and_path() {
        let reg = sample_builder().build().unwrap();
        let id = reg.resolve_type("Crate").unwrap();
        assert_eq!(reg.resolve_type_by_path("/Game/Props/Crate"), Some(id));
        assert_eq!(
            reg.resolve_type_by_path("/Types/CrateRecord"),
            reg.resolve_type("CrateRecord")
        );
        assert!(reg.resolve_type("Barrel").is_none());
    }

    #[test]
    fn field_lookup_returns_slot_and_kind() {
        let reg = sample_builder().build().unwrap();
        let desc = reg.descriptor("Crate").unwrap();
        let handle = desc.field("health").unwrap();
        assert_eq!(handle.slot, 0);
        assert_eq!(handle.kind, FieldKind::I32);
        assert!(desc.field("mana").is_none());
        assert_eq!(desc.record_type(), reg.resolve_type("CrateRecord"));
    }

    #[test]
    fn duplicate_type_name_rejected() {
        let mut b = sample_builder();
        assert!(matches!(
            b.register(TypeDef::new("Crate")),
            Err(RegistryError::DuplicateType(_))
        ));
    }

    #[test]
    fn duplicate_field_rejected_at_build() {
        let mut b = TypeRegistryBuilder::new();
        b.register(
            TypeDef::new("Twice")
                .field(FieldDef::new("a", FieldKind::I32))
                .field(FieldDef::new("a", FieldKind::Str)),
        )
        .unwrap();
        assert!(matches!(
            b.build(),
            Err(RegistryError::DuplicateField { .. })
        ));
    }

    #[test]
    fn unresolved_record_type_rejected() {
        let mut b = TypeRegistryBuilder::new();
        b.register(TypeDef::new("Orphan").record("Missing")).unwrap();
        assert!(matches!(
            b.build(),
            Err(RegistryError::UnresolvedType { .. })
        ));
    }

    #[test]
    fn mutate_type_adds_field() {
        let mut b = sample_builder();
        b.mutate_type("Crate", |def| {
            def.fields.push(FieldDef::new("label", FieldKind::Str));
        })
        .unwrap();
        let reg = b.build().unwrap();
        assert!(reg.descriptor("Crate").unwrap().has_field("label"));
        assert!(matches!(
            sample_builder().mutate_type("Nope", |_| {}),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn illegal_categories() {
        assert!(TypeCategory::Controller.is_illegal_owner());
        assert!(TypeCategory::GameMode.is_illegal_owner());
        assert!(!TypeCategory::Agent.is_illegal_owner());
        assert!(!TypeCategory::Ordinary.is_illegal_owner());
    }
}
