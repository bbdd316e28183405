//! Decides what each saved record maps onto in the live world.
//!
//! Every decision here is made from the record header alone, before any
//! field is decoded: filters first ([`admit`]), then reuse-or-spawn
//! ([`resolve`]). A rejected record costs one seek to its end offset.

use crate::format::UNKNOWN_GROUP;
use crate::id::{EntityId, PersistentId};
use crate::math::Transform;
use crate::query::normalize_group_name;
use crate::world::World;
use log::{error, warn};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// The identity portion of an entity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Absolute position of the record's end.
    pub end_offset: u64,
    pub class_name: String,
    pub class_path: String,
    pub persistent_id: PersistentId,
    pub tags: Vec<String>,
    pub level_group: String,
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Caller-supplied load filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadFilter<'a> {
    /// Load only records carrying at least one of these. Empty loads all.
    pub tags: &'a [String],
    /// Load only records saved in this group. Empty loads all.
    pub only_group: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    WrongGroup,
    NoMatchingTag,
}

pub fn admit(header: &RecordHeader, filter: &LoadFilter<'_>) -> Admission {
    if !filter.only_group.is_empty()
        && header.level_group != UNKNOWN_GROUP
        && normalize_group_name(&header.level_group) != normalize_group_name(filter.only_group)
    {
        return Admission::WrongGroup;
    }
    if !filter.tags.is_empty() && !filter.tags.iter().any(|t| header.tags.contains(t)) {
        return Admission::NoMatchingTag;
    }
    Admission::Admit
}

// ---------------------------------------------------------------------------
// Identity index
// ---------------------------------------------------------------------------

/// Persistent id to live entity, built once per load. When several live
/// entities share an id the first in enumeration order wins.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_id: HashMap<PersistentId, EntityId>,
}

impl IdentityIndex {
    pub fn build<W: World + ?Sized>(world: &W) -> Self {
        let mut by_id = HashMap::new();
        for entity in world.entities_with_record() {
            let Some(id) = world.record(entity).map(|r| r.persistent_id) else {
                continue;
            };
            if id.is_none() {
                continue;
            }
            match by_id.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(entity);
                }
                Entry::Occupied(_) => warn!(
                    "persistent id {id} is carried by more than one live entity; {} is ignored",
                    world.entity_name(entity)
                ),
            }
        }
        Self { by_id }
    }

    pub fn get(&self, id: PersistentId) -> Option<EntityId> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Reuse or spawn
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Matched a live entity by persistent id.
    Reused(EntityId),
    Spawned(EntityId),
}

impl Resolution {
    pub fn entity(self) -> EntityId {
        match self {
            Resolution::Reused(e) | Resolution::Spawned(e) => e,
        }
    }
}

/// Why a record could not be mapped onto the world. The record is skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveFailure {
    #[error("no live entity carries persistent id {0}")]
    UnmatchedIdentity(PersistentId),
    #[error("class not found, was it removed? {class_name} ({class_path})")]
    ClassNotFound {
        class_name: String,
        class_path: String,
    },
    #[error("could not spawn {0}")]
    SpawnFailed(String),
    #[error("{0} has no record component")]
    MissingRecordComponent(String),
}

/// Reuse the live entity carrying the record's persistent id, or spawn a
/// fresh instance of its class at the identity transform. A dangling id is
/// never respawned.
pub fn resolve<W: World + ?Sized>(
    world: &mut W,
    index: &IdentityIndex,
    header: &RecordHeader,
) -> Result<Resolution, ResolveFailure> {
    if header.persistent_id.is_some() {
        let entity = index
            .get(header.persistent_id)
            .filter(|&e| world.is_alive(e))
            .ok_or(ResolveFailure::UnmatchedIdentity(header.persistent_id))?;
        if world.record(entity).is_none() {
            return Err(ResolveFailure::MissingRecordComponent(world.entity_name(entity)));
        }
        return Ok(Resolution::Reused(entity));
    }

    let ty = match world.registry().resolve_type(&header.class_name) {
        Some(ty) => ty,
        None => {
            warn!(
                "class {} not found by name, trying full path {}",
                header.class_name, header.class_path
            );
            world
                .registry()
                .resolve_type_by_path(&header.class_path)
                .ok_or_else(|| ResolveFailure::ClassNotFound {
                    class_name: header.class_name.clone(),
                    class_path: header.class_path.clone(),
                })?
        }
    };
    let entity = world
        .spawn(ty, Transform::IDENTITY)
        .ok_or_else(|| ResolveFailure::SpawnFailed(header.class_name.clone()))?;
    if world.record(entity).is_none() {
        error!("spawned {} but it has no record component; destroying it", header.class_name);
        world.destroy(entity);
        return Err(ResolveFailure::MissingRecordComponent(header.class_name.clone()));
    }
    Ok(Resolution::Spawned(entity))
}
