//! Typed field storage for one instance of a registered type.

use crate::registry::{FieldDef, FieldHandle, TypeDescriptor};
use crate::value::{FieldKind, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("type {type_name} has no field {field}")]
    UnknownField { type_name: String, field: String },
    #[error("field {field} expects {expected:?}, got {found:?}")]
    KindMismatch {
        field: String,
        expected: FieldKind,
        found: FieldKind,
    },
}

/// One instance's field values, slot-aligned with its descriptor.
#[derive(Debug, Clone)]
pub struct ObjectData {
    ty: Arc<TypeDescriptor>,
    values: Vec<Value>,
}

/// A borrowed (definition, value) pair, the unit records iterate over.
#[derive(Debug, Clone, Copy)]
pub struct FieldRef<'a> {
    pub def: &'a FieldDef,
    pub value: &'a Value,
}

impl ObjectData {
    /// A fresh instance with each field at the zero value of its kind.
    pub fn new(ty: Arc<TypeDescriptor>) -> Self {
        let values = ty
            .fields()
            .iter()
            .map(|f| Value::default_for(f.kind))
            .collect();
        Self { ty, values }
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ty.field(name).map(|h| &self.values[h.slot])
    }

    pub fn read(&self, handle: FieldHandle) -> Option<&Value> {
        self.values.get(handle.slot)
    }

    /// Set a field by name. The value's kind must match the declaration.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        let handle = self.ty.field(name).ok_or_else(|| FieldError::UnknownField {
            type_name: self.ty.name().to_string(),
            field: name.to_string(),
        })?;
        self.write(handle, value).map_err(|err| match err {
            FieldError::KindMismatch {
                expected, found, ..
            } => FieldError::KindMismatch {
                field: name.to_string(),
                expected,
                found,
            },
            other => other,
        })
    }

    /// Set a field by handle.
    pub fn write(&mut self, handle: FieldHandle, value: Value) -> Result<(), FieldError> {
        if value.kind() != handle.kind {
            return Err(FieldError::KindMismatch {
                field: format!("#{}", handle.slot),
                expected: handle.kind,
                found: value.kind(),
            });
        }
        match self.values.get_mut(handle.slot) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(FieldError::UnknownField {
                type_name: self.ty.name().to_string(),
                field: format!("#{}", handle.slot),
            }),
        }
    }

    /// Fields in declaration order.
    pub fn field_refs(&self) -> impl Iterator<Item = FieldRef<'_>> {
        self.ty
            .fields()
            .iter()
            .zip(self.values.iter())
            .map(|(def, value)| FieldRef { def, value })
    }
}
