//! Engines configured entirely from a data directory.

use std::fs;
use std::sync::Arc;

use reliquary_core::engine::{SaveEngine, SaveParams};
use reliquary_core::id::PersistentId;
use reliquary_core::load::LoadParams;
use reliquary_core::math::Transform;
use reliquary_core::memory::MemoryWorld;
use reliquary_core::storage::ZlibFileStorage;
use reliquary_core::value::Value;
use reliquary_core::world::World;
use reliquary_data::{SaveData, load_save_data};

const TYPES_TOML: &str = r#"
[[types]]
name = "ShrineRecord"
fields = [
    { name = "offerings", type = "i32" },
    { name = "blessed", type = "bool" },
]

[[types]]
name = "Bell"
fields = [{ name = "tone", type = "f32", persist = true }]

[[types]]
name = "Shrine"
path = "/Game/World/Shrine"
record = "ShrineRecord"
fields = [
    { name = "keeper", type = "str" },
    { name = "visits", type = "i64", persist = true },
]
sub_objects = [{ name = "bell", type = "Bell" }]
"#;

const SETTINGS_TOML: &str = r#"
flag_driven_fields = true
async_chunk_size = 4
"#;

fn data_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("types.toml"), TYPES_TOML).unwrap();
    fs::write(dir.path().join("settings.toml"), SETTINGS_TOML).unwrap();
    dir
}

fn shrine(world: &mut MemoryWorld, id: u128) -> reliquary_core::id::EntityId {
    let e = world.add_entity("Shrine", Transform::IDENTITY).unwrap();
    world.record_mut(e).unwrap().persistent_id = PersistentId::from_u128(id);
    e
}

fn engine(data: &SaveData) -> SaveEngine {
    SaveEngine::new(data.settings.clone(), Arc::new(ZlibFileStorage::new()))
}

#[test]
fn data_directory_configures_engine() {
    let dir = data_dir();
    let data = load_save_data(dir.path()).unwrap();
    assert!(data.settings.flag_driven_fields);
    assert_eq!(data.settings.chunk_size(), 4);

    let shrine = data.registry.descriptor("Shrine").unwrap();
    assert_eq!(shrine.path(), "/Game/World/Shrine");
    assert_eq!(shrine.sub_objects().len(), 1);
}

#[test]
fn flag_driven_save_round_trips_marked_fields() {
    let dir = data_dir();
    let data = load_save_data(dir.path()).unwrap();
    let slot = dir.path().join("saves/shrines.sav");
    let mut engine = engine(&data);

    let mut saved = MemoryWorld::new(data.registry.clone());
    let e = shrine(&mut saved, 0x51);
    {
        let owner = saved.owner_mut(e).unwrap();
        owner.set("keeper", Value::Str("not persisted".into())).unwrap();
        owner.set("visits", Value::I64(12)).unwrap();
    }
    saved.sub_objects_mut(e).unwrap()[0]
        .data
        .set("tone", Value::F32(440.0))
        .unwrap();
    let record = &mut saved.record_mut(e).unwrap().data;
    record.set("offerings", Value::I32(3)).unwrap();
    record.set("blessed", Value::Bool(true)).unwrap();
    engine.save_sync(&mut saved, &SaveParams::new(&slot)).unwrap();

    let mut live = MemoryWorld::new(data.registry.clone());
    let e = shrine(&mut live, 0x51);
    let report = engine.load(&mut live, LoadParams::new(&slot)).unwrap();
    assert_eq!(report.reused, 1);

    let owner = live.owner(e).unwrap();
    assert_eq!(owner.get("visits"), Some(&Value::I64(12)));
    assert_eq!(owner.get("keeper"), Some(&Value::Str(String::new())));
    assert_eq!(
        live.sub_objects(e)[0].data.get("tone"),
        Some(&Value::F32(440.0))
    );
    let record = &live.record(e).unwrap().data;
    assert_eq!(record.get("offerings"), Some(&Value::I32(3)));
    assert_eq!(record.get("blessed"), Some(&Value::Bool(true)));
}

#[test]
fn missing_types_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("settings.toml"), SETTINGS_TOML).unwrap();
    let err = load_save_data(dir.path()).unwrap_err();
    assert!(err.to_string().contains("types"));
}
