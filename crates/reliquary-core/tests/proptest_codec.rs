//! Property-based tests for the record framing.
//!
//! Generates arbitrary entity sets and field layouts, then checks that end
//! offsets always lead to the next record, that unknown fields are stepped
//! over, and that record counts reflect what was actually written.

use proptest::prelude::*;
use reliquary_core::cursor::ByteCursor;
use reliquary_core::entity::{read_record_header, write_entity_record};
use reliquary_core::field::write_value_field;
use reliquary_core::format::FORMAT_VERSION;
use reliquary_core::id::PersistentId;
use reliquary_core::record::{CountWidth, read_record, write_record};
use reliquary_core::registry::{FieldDef, TypeDef, TypeRegistryBuilder};
use reliquary_core::settings::SaveSettings;
use reliquary_core::test_utils::*;
use reliquary_core::value::{FieldKind, Value};
use reliquary_core::world::World;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
struct CrateSpec {
    id: u128,
    health: i32,
    tags: Vec<String>,
    color: String,
}

fn arb_crate() -> impl Strategy<Value = CrateSpec> {
    (
        prop_oneof![Just(0u128), 1..u128::MAX],
        any::<i32>(),
        proptest::collection::vec("[a-z]{1,8}", 0..4),
        "[ -~]{0,24}",
    )
        .prop_map(|(id, health, tags, color)| CrateSpec {
            id,
            health,
            tags,
            color,
        })
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::I32),
        any::<i64>().prop_map(Value::I64),
        "[ -~]{0,32}".prop_map(Value::Str),
        proptest::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
        proptest::collection::vec("[a-z]{0,6}", 0..5).prop_map(Value::StrList),
    ]
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    /// Seeking to each record's end offset lands exactly on the next record
    /// header, and the last one on end of buffer.
    #[test]
    fn end_offsets_chain_through_buffer(
        crates in proptest::collection::vec(arb_crate(), 1..12),
        flag_driven in any::<bool>(),
    ) {
        let mut world = sample_world();
        for spec in &crates {
            let e = spawn_crate(&mut world, spec.id, spec.health);
            world.record_mut(e).unwrap().tags = spec.tags.clone();
            world.owner_mut(e).unwrap().set("color", Value::Str(spec.color.clone())).unwrap();
            world.record_mut(e).unwrap().owner_fields_to_save = vec!["color".into()];
        }
        let settings = SaveSettings { flag_driven_fields: flag_driven, ..SaveSettings::default() };
        let mut cur = ByteCursor::new();
        for e in world.entities_with_record() {
            write_entity_record(&mut cur, &world, e, &settings).unwrap();
        }

        cur.seek(0).unwrap();
        for spec in &crates {
            let header = read_record_header(&mut cur, FORMAT_VERSION).unwrap();
            prop_assert_eq!(header.persistent_id, PersistentId::from_u128(spec.id));
            prop_assert_eq!(&header.tags, &spec.tags);
            cur.seek(header.end_offset).unwrap();
        }
        prop_assert!(cur.is_at_end());
    }

    /// Fields the live type does not declare are consumed through their own
    /// end offsets; every declared field after them still applies.
    #[test]
    fn unknown_fields_are_stepped_over(
        extras in proptest::collection::vec(("[a-z]{3,10}", arb_value()), 0..8),
        health in any::<i32>(),
        label in "[ -~]{0,16}",
    ) {
        let registry = sample_registry();
        let record_type = registry.resolve_type("CrateRecord").unwrap();
        let mut data = registry.instantiate(record_type).unwrap();

        let mut cur = ByteCursor::new();
        let known = [("health", Value::I32(health)), ("label", Value::Str(label.clone()))];
        let unknown: Vec<_> = extras
            .iter()
            .map(|(name, value)| (format!("gone_{name}"), value.clone()))
            .collect();
        cur.write_i64((known.len() + unknown.len()) as i64);
        for (name, value) in &unknown {
            write_value_field(&mut cur, name, value).unwrap();
        }
        for (name, value) in &known {
            write_value_field(&mut cur, name, value).unwrap();
        }
        cur.write_i32(0x5EED);

        cur.seek(0).unwrap();
        let stats = read_record(&mut cur, CountWidth::I64, &mut data).unwrap();
        prop_assert_eq!(stats.stale, unknown.len());
        prop_assert_eq!(stats.applied, 2);
        prop_assert_eq!(data.get("health"), Some(&Value::I32(health)));
        prop_assert_eq!(data.get("label"), Some(&Value::Str(label)));
        prop_assert_eq!(cur.read_i32().unwrap(), 0x5EED);
    }

    /// The count written ahead of a record equals the number of fields the
    /// predicate accepted, not the number of candidates.
    #[test]
    fn record_count_matches_accepted_fields(
        mask in proptest::collection::vec(any::<bool>(), 1..16),
    ) {
        let mut ty = TypeDef::new("Wide");
        for i in 0..mask.len() {
            ty = ty.field(FieldDef::new(&format!("f{i}"), FieldKind::I32));
        }
        let mut b = TypeRegistryBuilder::new();
        let id = b.register(ty).unwrap();
        let registry = b.build().unwrap();
        let data = registry.instantiate(id).unwrap();

        let mut cur = ByteCursor::new();
        let written = write_record(&mut cur, CountWidth::I64, data.field_refs(), |def| {
            let index: usize = def.name[1..].parse().unwrap();
            mask[index]
        })
        .unwrap();

        let accepted = mask.iter().filter(|&&keep| keep).count();
        prop_assert_eq!(written, accepted);
        cur.seek(0).unwrap();
        prop_assert_eq!(cur.read_i64().unwrap(), accepted as i64);
    }

    /// Truncating a buffer anywhere never panics the header reader.
    #[test]
    fn truncated_records_error_cleanly(cut in 0usize..200) {
        let mut world = sample_world();
        spawn_crate(&mut world, 7, 7);
        let mut cur = ByteCursor::new();
        for e in world.entities_with_record() {
            write_entity_record(&mut cur, &world, e, &SaveSettings::default()).unwrap();
        }
        let mut bytes = cur.into_inner();
        let full = bytes.len();
        bytes.truncate(cut.min(full));
        let mut truncated = ByteCursor::from_bytes(bytes);
        let result = read_record_header(&mut truncated, FORMAT_VERSION);
        if cut < full {
            // Either the header itself is cut, or its end offset points past the data.
            prop_assert!(result.is_err() || truncated.seek(result.unwrap().end_offset).is_err());
        } else {
            prop_assert!(result.is_ok());
        }
    }
}
