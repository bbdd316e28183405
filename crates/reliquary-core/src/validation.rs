//! Pre-flight checks that abort a save.

use crate::format::PERSISTENT_GROUP;
use crate::id::EntityId;
use crate::query::{in_group, normalize_group_name};
use crate::selection::{is_always_excluded, should_save};
use crate::settings::SaveSettings;
use crate::value::Value;
use crate::world::World;

/// Marker of a level-owned object path. References into a level cannot be
/// restored by path after a reload.
const LEVEL_REFERENCE_MARKER: &str = "PersistentLevel";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(
        "{entity_name}: field `{field}` references level object {path}, which cannot be restored"
    )]
    UnloadableReference {
        entity_name: String,
        field: String,
        path: String,
    },
    #[error("{entity_name} carries {count} record components; exactly one is allowed")]
    MultipleRecordComponents { entity_name: String, count: usize },
    #[error("{entity_name}: type {type_name} may never carry a record component")]
    IllegalOwnerType {
        entity_name: String,
        type_name: String,
    },
    #[error("streaming group {0:?} not found")]
    GroupNotFound(String),
    #[error("streaming group {0:?} is not loaded and visible")]
    GroupNotVisible(String),
}

/// A group-restricted save needs its group present, loaded and visible.
pub fn check_only_group<W: World + ?Sized>(
    world: &W,
    only_group: &str,
) -> Result<(), ValidationError> {
    if only_group.is_empty() || only_group == PERSISTENT_GROUP {
        return Ok(());
    }
    let wanted = normalize_group_name(only_group);
    let group = world
        .streaming_groups()
        .into_iter()
        .find(|g| normalize_group_name(&g.name) == wanted)
        .ok_or_else(|| ValidationError::GroupNotFound(only_group.to_string()))?;
    if group.loaded && group.visible {
        Ok(())
    } else {
        Err(ValidationError::GroupNotVisible(only_group.to_string()))
    }
}

/// Whether an entity takes part in a save at all. Ineligible entities are
/// left out without error.
pub fn is_eligible<W: World + ?Sized>(world: &W, entity: EntityId, only_group: &str) -> bool {
    world.record(entity).is_some_and(|r| r.should_save)
        && (only_group.is_empty() || in_group(world, entity, only_group))
}

fn check_value(entity_name: &str, field: &str, value: &Value) -> Result<(), ValidationError> {
    match value {
        Value::ObjectRef(Some(path)) if path.contains(LEVEL_REFERENCE_MARKER) => {
            Err(ValidationError::UnloadableReference {
                entity_name: entity_name.to_string(),
                field: field.to_string(),
                path: path.clone(),
            })
        }
        _ => Ok(()),
    }
}

/// Reject object references a reload could not restore, in the record's own
/// fields and the owner fields selected for saving.
pub fn check_references<W: World + ?Sized>(
    world: &W,
    entity: EntityId,
    settings: &SaveSettings,
) -> Result<(), ValidationError> {
    let Some(record) = world.record(entity) else {
        return Ok(());
    };
    let name = world.entity_name(entity);
    for field in record.data.field_refs() {
        if !is_always_excluded(field.def) {
            check_value(&name, &field.def.name, field.value)?;
        }
    }
    if let Some(owner) = world.owner(entity) {
        let mode = settings.selection_mode();
        for field in owner.field_refs() {
            if should_save(field.def, &record.owner_fields_to_save, mode) {
                check_value(&name, &field.def.name, field.value)?;
            }
        }
    }
    Ok(())
}

/// Exactly one record component, and an owner type allowed to carry it.
pub fn check_owner<W: World + ?Sized>(
    world: &W,
    entity: EntityId,
    settings: &SaveSettings,
) -> Result<(), ValidationError> {
    let count = world.record_component_count(entity);
    if count > 1 {
        return Err(ValidationError::MultipleRecordComponents {
            entity_name: world.entity_name(entity),
            count,
        });
    }
    if let Some(ty) = world.entity_type(entity)
        && (ty.category().is_illegal_owner() || settings.is_illegal_type_name(ty.name()))
    {
        return Err(ValidationError::IllegalOwnerType {
            entity_name: world.entity_name(entity),
            type_name: ty.name().to_string(),
        });
    }
    Ok(())
}
