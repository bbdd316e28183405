//! Shared fixtures for unit tests, integration tests and benchmarks.

use crate::engine::{SaveEngine, SaveReport};
use crate::format::SaveError;
use crate::id::{EntityId, PersistentId};
use crate::math::Transform;
use crate::memory::MemoryWorld;
use crate::object::ObjectData;
use crate::registry::{FieldDef, TypeCategory, TypeDef, TypeRegistry, TypeRegistryBuilder};
use crate::settings::SaveSettings;
use crate::storage::MemoryStorage;
use crate::value::{FieldKind, Value};
use crate::world::World;
use std::sync::Arc;

/// Step bound for [`drive`]; a worker that never reports trips it.
const MAX_DRIVE_STEPS: usize = 1_000_000;

/// Types used across the test suite:
///
/// - `Crate`: ordinary prop with owner fields `color`, `weight` (persisted),
///   `secret`, sub-objects `lid` and `lock` (both declare `label`), one
///   physics body, record `CrateRecord`.
/// - `Hero`: agent with owner field `stamina` (persisted), record
///   `HeroRecord`.
/// - `Director`: game mode carrying a `CrateRecord`, illegal to save.
/// - `Campaign`: static data object.
pub fn sample_registry() -> Arc<TypeRegistry> {
    let mut b = TypeRegistryBuilder::new();
    b.register(
        TypeDef::new("CrateRecord")
            .field(FieldDef::new("health", FieldKind::I32))
            .field(FieldDef::new("label", FieldKind::Str))
            .field(FieldDef::new("opened", FieldKind::Bool))
            .field(FieldDef::new("on_opened", FieldKind::MulticastDelegate))
            .field(FieldDef::new("__frame", FieldKind::I32)),
    )
    .expect("CrateRecord");
    b.register(
        TypeDef::new("Lid")
            .field(FieldDef::new("hinge_angle", FieldKind::F32).persisted())
            .field(FieldDef::new("label", FieldKind::Str).persisted()),
    )
    .expect("Lid");
    b.register(
        TypeDef::new("Lock")
            .field(FieldDef::new("code", FieldKind::I32).persisted())
            .field(FieldDef::new("label", FieldKind::Str).persisted()),
    )
    .expect("Lock");
    b.register(
        TypeDef::new("Crate")
            .path("/Game/Props/Crate")
            .field(FieldDef::new("color", FieldKind::Str))
            .field(FieldDef::new("weight", FieldKind::F32).persisted())
            .field(FieldDef::new("secret", FieldKind::I32))
            .field(FieldDef::new("home", FieldKind::ObjectRef))
            .record("CrateRecord")
            .sub_object("lid", "Lid")
            .sub_object("lock", "Lock")
            .physics_body("body"),
    )
    .expect("Crate");
    b.register(
        TypeDef::new("HeroRecord")
            .field(FieldDef::new("level", FieldKind::I32))
            .field(FieldDef::new("xp", FieldKind::I64)),
    )
    .expect("HeroRecord");
    b.register(
        TypeDef::new("Hero")
            .path("/Game/Characters/Hero")
            .category(TypeCategory::Agent)
            .field(FieldDef::new("stamina", FieldKind::F32).persisted())
            .record("HeroRecord"),
    )
    .expect("Hero");
    b.register(
        TypeDef::new("Director")
            .category(TypeCategory::GameMode)
            .record("CrateRecord"),
    )
    .expect("Director");
    b.register(
        TypeDef::new("Campaign")
            .path("/Game/Data/Campaign")
            .field(FieldDef::new("chapter", FieldKind::I32))
            .field(FieldDef::new("title", FieldKind::Str))
            .field(FieldDef::new("on_chapter", FieldKind::MulticastDelegate)),
    )
    .expect("Campaign");
    Arc::new(b.build().expect("sample registry"))
}

pub fn sample_world() -> MemoryWorld {
    MemoryWorld::new(sample_registry())
}

/// Add a `Crate` with the given health. `id == 0` leaves it without a
/// persistent id.
pub fn spawn_crate(world: &mut MemoryWorld, id: u128, health: i32) -> EntityId {
    let e = world
        .add_entity("Crate", Transform::IDENTITY)
        .expect("Crate is registered");
    let record = world.record_mut(e).expect("Crate carries a record");
    record.persistent_id = PersistentId::from_u128(id);
    record.data.set("health", Value::I32(health)).expect("health");
    record
        .data
        .set("label", Value::Str(format!("crate {health}")))
        .expect("label");
    e
}

/// Add a `Hero`, possessed by a fresh player controller when `player`.
pub fn spawn_hero(world: &mut MemoryWorld, player: bool) -> EntityId {
    let e = world
        .add_entity("Hero", Transform::IDENTITY)
        .expect("Hero is registered");
    if player {
        let controller = world.add_player_controller();
        world.possess(controller, e);
    }
    e
}

pub fn campaign(registry: &TypeRegistry, chapter: i32) -> ObjectData {
    let id = registry.resolve_type("Campaign").expect("Campaign");
    let mut data = registry.instantiate(id).expect("Campaign instance");
    data.set("chapter", Value::I32(chapter)).expect("chapter");
    data.set("title", Value::Str(format!("Chapter {chapter}")))
        .expect("title");
    data
}

/// `n` crates with persistent ids `1..=n`.
pub fn populate(world: &mut MemoryWorld, n: usize) -> Vec<EntityId> {
    (1..=n)
        .map(|i| spawn_crate(world, i as u128, i as i32))
        .collect()
}

pub fn memory_engine(settings: SaveSettings) -> (SaveEngine, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (SaveEngine::new(settings, storage.clone()), storage)
}

/// Step the engine with one-second ticks until no save is in flight.
pub fn drive<W: World + ?Sized>(
    engine: &mut SaveEngine,
    world: &mut W,
) -> Vec<Result<SaveReport, SaveError>> {
    let mut finished = Vec::new();
    for _ in 0..MAX_DRIVE_STEPS {
        if !engine.is_saving() {
            return finished;
        }
        finished.extend(engine.step(world, 1.0).saves);
        std::thread::yield_now();
    }
    panic!("save did not finish within {MAX_DRIVE_STEPS} steps");
}
