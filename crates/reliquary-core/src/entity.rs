//! One entity as a skippable, length-framed record.
//!
//! ```text
//! i64 end_offset  string class_name  string class_path
//! [v>=3] guid persistent_id  string_list tags
//! [v>=4] string level_group
//! record64 own fields
//! owner block:  i64 count  transform  bool has_agent [agent]  field*
//! physics:      bool present [i32 bodies  i64 end  (bool simulating [body])*]
//! sub-objects:  legacy record64, or table (i32 n, (name end i32 count field*)*)
//! ```
//!
//! Every way a record can fail to apply ends with a seek to `end_offset`, so
//! the next record always starts where the reader expects it.

use crate::cursor::{ByteCursor, CursorError};
use crate::event::{EventBus, SaveEvent};
use crate::format::{
    UNKNOWN_GROUP, VERSION_PERSISTENT_IDS, VERSION_STREAMING_GROUPS, VERSION_SUBOBJECT_TABLE,
};
use crate::id::{EntityId, PersistentId};
use crate::math::{Rotator, Transform, Vec3};
use crate::reconcile::{
    Admission, IdentityIndex, LoadFilter, RecordHeader, ResolveFailure, Resolution, admit, resolve,
};
use crate::record::{
    CountWidth, PooledSink, RecordStats, read_entries, read_record, skip_entries, skip_record,
    write_entries, write_record,
};
use crate::selection::{is_always_excluded, should_save};
use crate::settings::SaveSettings;
use crate::world::{AgentState, RigidBodyState, World};
use log::{error, info, warn};
use std::collections::HashSet;

fn log_field(enabled: bool, entity_name: &str, scope: &str, field: &str) {
    if enabled {
        info!("{entity_name} ~ saving {scope} field {field}");
    }
}

fn player_index<W: World + ?Sized>(world: &W, agent: &AgentState) -> i32 {
    if !agent.is_player {
        return -1;
    }
    world
        .player_controllers()
        .iter()
        .position(|&c| Some(c) == agent.controller)
        .map_or(-1, |i| i as i32)
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Serialize one entity. Returns false (writing nothing) if the entity has
/// no type or no record component.
pub fn write_entity_record<W: World + ?Sized>(
    cur: &mut ByteCursor,
    world: &W,
    entity: EntityId,
    settings: &SaveSettings,
) -> Result<bool, CursorError> {
    let (Some(ty), Some(record)) = (world.entity_type(entity), world.record(entity)) else {
        return Ok(false);
    };
    let mode = settings.selection_mode();
    let log_fields = record.log_saved_fields;
    let name = world.entity_name(entity);

    let end_at = cur.reserve_i64();
    cur.write_string(ty.name());
    cur.write_string(ty.path());
    cur.write_guid(record.persistent_id);
    cur.write_string_list(&record.tags);
    cur.write_string(&record.level_group);

    write_record(cur, CountWidth::I64, record.data.field_refs(), |def| {
        let keep = !is_always_excluded(def);
        if keep {
            log_field(log_fields, &name, "own", &def.name);
        }
        keep
    })?;

    // Owner block
    let count_at = cur.reserve_i64();
    world.transform(entity).unwrap_or_default().write_to(cur);
    let agent = world.agent(entity);
    cur.write_bool(agent.is_some());
    if let Some(agent) = agent {
        cur.write_bool(agent.is_player);
        agent.velocity.write_to(cur);
        agent.control_rotation.write_to(cur);
        cur.write_i32(player_index(world, &agent));
    }
    let owner_count = match world.owner(entity) {
        Some(owner) => write_entries(
            cur,
            owner.field_refs().filter(|f| {
                let keep = should_save(f.def, &record.owner_fields_to_save, mode);
                if keep {
                    log_field(log_fields, &name, "owner", &f.def.name);
                }
                keep
            }),
        )?,
        None => 0,
    };
    cur.patch_i64(count_at, owner_count as i64)?;

    // Physics
    cur.write_bool(record.save_physics);
    if record.save_physics {
        let bodies = world.physics_bodies(entity);
        cur.write_i32(bodies.len() as i32);
        let physics_end_at = cur.reserve_i64();
        for body in &bodies {
            cur.write_bool(body.simulating);
            if body.simulating {
                body.state.write_to(cur);
            }
        }
        let physics_end = cur.tell();
        cur.patch_i64(physics_end_at, physics_end as i64)?;
    }

    // Sub-objects
    let subs = world.sub_objects(entity);
    let include = &record.subobject_fields_to_save;
    if settings.flag_driven_fields {
        cur.write_i32(subs.len() as i32);
        for sub in subs {
            cur.write_string(&sub.name);
            let sub_end_at = cur.reserve_i64();
            let sub_count_at = cur.reserve_i32();
            let written = write_entries(
                cur,
                sub.data
                    .field_refs()
                    .filter(|f| should_save(f.def, include, mode)),
            )?;
            cur.patch_i32(sub_count_at, written as i32)?;
            let sub_end = cur.tell();
            cur.patch_i64(sub_end_at, sub_end as i64)?;
        }
    } else {
        // One namespace across all sub-objects; the first declaring a name wins.
        let mut seen = HashSet::new();
        let pooled_at = cur.reserve_i64();
        let written = write_entries(
            cur,
            subs.iter()
                .flat_map(|sub| sub.data.field_refs())
                .filter(|f| should_save(f.def, include, mode) && seen.insert(f.def.name.as_str())),
        )?;
        cur.patch_i64(pooled_at, written as i64)?;
    }

    let end = cur.tell();
    cur.patch_i64(end_at, end as i64)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read through the identity portion of a record, up to its own fields.
pub fn read_record_header(cur: &mut ByteCursor, version: i32) -> Result<RecordHeader, CursorError> {
    let end_offset = cur.read_offset()?;
    let class_name = cur.read_string()?;
    let class_path = cur.read_string()?;
    let (persistent_id, tags) = if version >= VERSION_PERSISTENT_IDS {
        (cur.read_guid()?, cur.read_string_list()?)
    } else {
        (PersistentId::NONE, Vec::new())
    };
    let level_group = if version >= VERSION_STREAMING_GROUPS {
        cur.read_string()?
    } else {
        UNKNOWN_GROUP.to_string()
    };
    Ok(RecordHeader {
        end_offset,
        class_name,
        class_path,
        persistent_id,
        tags,
        level_group,
    })
}

/// Per-load state threaded through every record read.
pub struct LoadContext<'a> {
    /// Format version of the file being read.
    pub version: i32,
    pub settings: &'a SaveSettings,
    pub filter: LoadFilter<'a>,
    pub dont_load_player_agents: bool,
    pub index: &'a IdentityIndex,
    pub events: &'a mut EventBus,
}

/// A saved rigid-body state waiting to be applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyRestore {
    pub index: usize,
    pub simulating: bool,
    pub state: Option<RigidBodyState>,
}

/// A record that was applied to a live entity.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedEntity {
    pub entity: EntityId,
    pub reused: bool,
    /// Group the record was saved in.
    pub group: String,
    pub physics: Vec<BodyRestore>,
    pub physics_skipped: bool,
    pub stats: RecordStats,
    pub missing_subobjects: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Loaded(LoadedEntity),
    /// Left out by a group or tag filter.
    Filtered(Admission),
    /// A player agent destroyed because player agents are not loaded.
    Discarded,
    Skipped(ResolveFailure),
}

struct SavedAgent {
    is_player: bool,
    velocity: Vec3,
    control_rotation: Rotator,
    player_index: i32,
}

impl SavedAgent {
    fn read_from(cur: &mut ByteCursor) -> Result<Self, CursorError> {
        Ok(Self {
            is_player: cur.read_bool()?,
            velocity: Vec3::read_from(cur)?,
            control_rotation: Rotator::read_from(cur)?,
            player_index: cur.read_i32()?,
        })
    }
}

fn restore_agent<W: World + ?Sized>(
    world: &mut W,
    entity: EntityId,
    saved: &SavedAgent,
    events: &mut EventBus,
) {
    if world.agent(entity).is_none() {
        warn!(
            "{} was saved as an agent but is not one now; agent state ignored",
            world.entity_name(entity)
        );
        return;
    }
    if saved.is_player {
        let controller = usize::try_from(saved.player_index)
            .ok()
            .and_then(|i| world.player_controllers().get(i).copied());
        match controller {
            Some(controller) if world.possess(controller, entity) => {
                if let Some(record) = world.record_mut(entity) {
                    record.run_player_reattached(entity, controller, saved.player_index);
                }
                events.emit(SaveEvent::PlayerReattached {
                    controller,
                    entity,
                    player_index: saved.player_index,
                });
            }
            _ => warn!(
                "no player controller at index {} for {}",
                saved.player_index,
                world.entity_name(entity)
            ),
        }
    } else {
        world.spawn_default_controller(entity);
    }
    world.set_agent_motion(entity, saved.velocity, saved.control_rotation);
}

/// Returns the deferred body states and whether the block was dropped for a
/// body count mismatch.
fn read_physics<W: World + ?Sized>(
    cur: &mut ByteCursor,
    world: &W,
    entity: EntityId,
    wanted: bool,
) -> Result<(Vec<BodyRestore>, bool), CursorError> {
    if !cur.read_bool()? {
        return Ok((Vec::new(), false));
    }
    let count = cur.read_len()?;
    let block_end = cur.read_offset()?;
    if !wanted {
        cur.seek(block_end)?;
        return Ok((Vec::new(), false));
    }
    let live = world.physics_bodies(entity).len();
    if live != count {
        warn!(
            "{}: saved {count} physics bodies but has {live}; physics state not loaded",
            world.entity_name(entity)
        );
        cur.seek(block_end)?;
        return Ok((Vec::new(), true));
    }
    let mut bodies = Vec::with_capacity(count);
    for index in 0..count {
        let simulating = cur.read_bool()?;
        let state = if simulating {
            Some(RigidBodyState::read_from(cur)?)
        } else {
            None
        };
        bodies.push(BodyRestore {
            index,
            simulating,
            state,
        });
    }
    if cur.tell() != block_end {
        cur.seek(block_end)?;
    }
    Ok((bodies, false))
}

/// Read one record and apply it to the world.
///
/// Filtered, discarded and unresolvable records are not errors: the cursor
/// is moved to the record's end and the outcome says why. `Err` means the
/// buffer itself is malformed.
pub fn read_entity_record<W: World + ?Sized>(
    cur: &mut ByteCursor,
    world: &mut W,
    ctx: &mut LoadContext<'_>,
) -> Result<RecordOutcome, CursorError> {
    let header = read_record_header(cur, ctx.version)?;
    let end = header.end_offset;

    let admission = admit(&header, &ctx.filter);
    if admission != Admission::Admit {
        cur.seek(end)?;
        return Ok(RecordOutcome::Filtered(admission));
    }

    let resolution = match resolve(world, ctx.index, &header) {
        Ok(resolution) => resolution,
        Err(failure) => {
            error!("{failure}; record skipped");
            cur.seek(end)?;
            return Ok(RecordOutcome::Skipped(failure));
        }
    };
    let entity = resolution.entity();
    let Some(record) = world.record_mut(entity) else {
        cur.seek(end)?;
        return Ok(RecordOutcome::Skipped(ResolveFailure::MissingRecordComponent(
            header.class_name,
        )));
    };

    record.tags = header.tags.clone();
    record.level_group = header.level_group.clone();
    let verbose = record.verbose_log || ctx.settings.verbose_logging;
    let load_position = record.load_world_position;
    let wants_physics = record.save_physics;
    if record.log_persistent_id && header.persistent_id.is_some() {
        info!("record with persistent id {} found and loaded", header.persistent_id);
    }
    let mut stats = read_record(cur, CountWidth::I64, &mut record.data)?;
    if verbose {
        info!("{} loaded ({resolution:?})", header.class_path);
    }

    // Owner block
    let owner_count = CountWidth::I64.read(cur)?;
    let transform = Transform::read_from(cur)?;
    let saved_agent = if cur.read_bool()? {
        Some(SavedAgent::read_from(cur)?)
    } else {
        None
    };
    if let Some(agent) = &saved_agent
        && agent.is_player
        && ctx.dont_load_player_agents
    {
        world.destroy(entity);
        cur.seek(end)?;
        return Ok(RecordOutcome::Discarded);
    }
    if load_position {
        world.set_transform(entity, transform);
    }
    if let Some(agent) = &saved_agent {
        restore_agent(world, entity, agent, ctx.events);
    }
    match world.owner_mut(entity) {
        Some(owner) => stats.merge(read_entries(cur, owner_count, owner)?),
        None => skip_entries(cur, owner_count)?,
    }

    let (physics, physics_skipped) = read_physics(cur, world, entity, wants_physics)?;

    // Sub-objects
    let mut missing_subobjects = 0;
    if ctx.version >= VERSION_SUBOBJECT_TABLE && ctx.settings.flag_driven_fields {
        let entries = cur.read_len()?;
        for _ in 0..entries {
            let name = cur.read_string()?;
            let sub_end = cur.read_offset()?;
            let count = cur.read_len()?;
            let target = world
                .sub_objects_mut(entity)
                .and_then(|subs| subs.iter_mut().find(|s| s.name == name));
            match target {
                Some(sub) => {
                    stats.merge(read_entries(cur, count, &mut sub.data)?);
                    if cur.tell() != sub_end {
                        cur.seek(sub_end)?;
                    }
                }
                None => {
                    error!(
                        "sub-object {name} of {} not found; its fields are skipped",
                        header.class_name
                    );
                    missing_subobjects += 1;
                    cur.seek(sub_end)?;
                }
            }
        }
    } else {
        match world.sub_objects_mut(entity) {
            Some(subs) => {
                stats.merge(read_record(cur, CountWidth::I64, &mut PooledSink::new(subs))?);
            }
            None => {
                skip_record(cur, CountWidth::I64)?;
            }
        }
    }

    if cur.tell() != end {
        warn!(
            "record for {} did not end at its recorded offset; realigning",
            header.class_name
        );
        cur.seek(end)?;
    }

    Ok(RecordOutcome::Loaded(LoadedEntity {
        entity,
        reused: matches!(resolution, Resolution::Reused(_)),
        group: header.level_group,
        physics,
        physics_skipped,
        stats,
        missing_subobjects,
    }))
}
