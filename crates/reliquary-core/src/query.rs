//! Read-only lookups over record-bearing entities, and level clearing.

use crate::id::EntityId;
use crate::world::World;
use log::debug;

/// Reduce a group package path to its bare name: directories up to the last
/// `/` are dropped, and so is an editor play-in-editor prefix
/// (`UEDPIE_<n>_`, single-digit `n`).
pub fn normalize_group_name(name: &str) -> &str {
    let base = name.rsplit_once('/').map_or(name, |(_, rest)| rest);
    if base.contains("UEDPIE") {
        base.get(9..).unwrap_or("")
    } else {
        base
    }
}

/// Whether the entity currently lives in `group` (compared by normalized
/// name).
pub fn in_group<W: World + ?Sized>(world: &W, entity: EntityId, group: &str) -> bool {
    normalize_group_name(&world.level_group(entity)) == normalize_group_name(group)
}

/// Record-bearing entities in `group`, or all of them when `group` is empty.
pub fn entities_in_group<W: World + ?Sized>(world: &W, group: &str) -> Vec<EntityId> {
    world
        .entities_with_record()
        .into_iter()
        .filter(|&e| group.is_empty() || in_group(world, e, group))
        .collect()
}

/// Record-bearing entities carrying any of `tags` (all of them when `tags`
/// is empty), optionally restricted to one group.
pub fn entities_with_tags<W: World + ?Sized>(
    world: &W,
    tags: &[String],
    group: &str,
) -> Vec<EntityId> {
    entities_in_group(world, group)
        .into_iter()
        .filter(|&e| {
            tags.is_empty()
                || world
                    .record(e)
                    .is_some_and(|r| tags.iter().any(|t| r.has_tag(t)))
        })
        .collect()
}

/// Destroy record-bearing entities ahead of a load. Entities with a
/// persistent id survive (the load will match them), and so do player
/// agents when `keep_players` is set. Returns how many were destroyed.
pub fn clear_level<W: World + ?Sized>(
    world: &mut W,
    keep_players: bool,
    only_group: &str,
) -> usize {
    let doomed: Vec<EntityId> = entities_in_group(world, only_group)
        .into_iter()
        .filter(|&e| {
            let Some(record) = world.record(e) else {
                return false;
            };
            if record.persistent_id.is_some() {
                if record.log_persistent_id {
                    debug!(
                        "not destroying {} which has persistent id {}",
                        world.entity_name(e),
                        record.persistent_id
                    );
                }
                return false;
            }
            !(keep_players && world.agent(e).is_some_and(|a| a.is_player))
        })
        .collect();
    doomed.into_iter().filter(|&e| world.destroy(e)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::PersistentId;
    use crate::math::Transform;
    use crate::memory::MemoryWorld;
    use crate::registry::{TypeCategory, TypeDef, TypeRegistryBuilder};
    use std::sync::Arc;

    fn world() -> MemoryWorld {
        let mut b = TypeRegistryBuilder::new();
        b.register(TypeDef::new("Record")).unwrap();
        b.register(TypeDef::new("Crate").record("Record")).unwrap();
        b.register(TypeDef::new("Hero").category(TypeCategory::Agent).record("Record"))
            .unwrap();
        MemoryWorld::new(Arc::new(b.build().unwrap()))
    }

    #[test]
    fn normalizes_paths_and_editor_prefix() {
        assert_eq!(normalize_group_name("/Game/Maps/Docks"), "Docks");
        assert_eq!(normalize_group_name("/Game/Maps/UEDPIE_0_Docks"), "Docks");
        assert_eq!(normalize_group_name("PersistentLevel"), "PersistentLevel");
        assert_eq!(normalize_group_name(""), "");
    }

    #[test]
    fn tag_query_is_any_match() {
        let mut w = world();
        let a = w.add_entity("Crate", Transform::IDENTITY).unwrap();
        let b = w.add_entity("Crate", Transform::IDENTITY).unwrap();
        w.record_mut(a).unwrap().tags = vec!["loot".into(), "red".into()];
        w.record_mut(b).unwrap().tags = vec!["blue".into()];

        let tags = vec!["red".to_string(), "green".to_string()];
        assert_eq!(entities_with_tags(&w, &tags, ""), vec![a]);
        assert_eq!(entities_with_tags(&w, &[], "").len(), 2);
    }

    #[test]
    fn group_query_uses_normalized_names() {
        let mut w = world();
        let a = w.add_entity("Crate", Transform::IDENTITY).unwrap();
        w.add_entity("Crate", Transform::IDENTITY).unwrap();
        w.set_entity_group(a, "/Game/Maps/UEDPIE_0_Docks");
        assert_eq!(entities_in_group(&w, "Docks"), vec![a]);
        assert_eq!(entities_in_group(&w, "").len(), 2);
    }

    #[test]
    fn clear_keeps_identified_and_players() {
        let mut w = world();
        let plain = w.add_entity("Crate", Transform::IDENTITY).unwrap();
        let identified = w.add_entity("Crate", Transform::IDENTITY).unwrap();
        let hero = w.add_entity("Hero", Transform::IDENTITY).unwrap();
        w.record_mut(identified).unwrap().persistent_id = PersistentId::from_u128(7);
        let player = w.add_player_controller();
        w.possess(player, hero);

        assert_eq!(clear_level(&mut w, true, ""), 1);
        assert!(!w.is_alive(plain));
        assert!(w.is_alive(identified));
        assert!(w.is_alive(hero));

        assert_eq!(clear_level(&mut w, false, ""), 1);
        assert!(!w.is_alive(hero));
    }
}
