//! Which declared fields get written.

use crate::registry::FieldDef;
use serde::{Deserialize, Serialize};

/// Names containing this marker belong to the host framework and are never
/// persisted.
pub const RESERVED_FIELD_MARKER: &str = "__";

/// Field selection policy. The two modes produce files that are not
/// guaranteed to load correctly under each other's settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Only names in the owner's include-list are saved.
    #[default]
    ExplicitList,
    /// The include-list plus every field carrying the persist marker.
    FlagDriven,
}

impl SelectionMode {
    pub fn from_flag(flag_driven: bool) -> Self {
        if flag_driven {
            SelectionMode::FlagDriven
        } else {
            SelectionMode::ExplicitList
        }
    }
}

/// Delegate-typed and reserved fields are excluded under every mode.
pub fn is_always_excluded(def: &FieldDef) -> bool {
    !def.kind.is_persistable() || def.name.contains(RESERVED_FIELD_MARKER)
}

pub fn should_save(def: &FieldDef, include_list: &[String], mode: SelectionMode) -> bool {
    if is_always_excluded(def) {
        return false;
    }
    if include_list.iter().any(|name| *name == def.name) {
        return true;
    }
    mode == SelectionMode::FlagDriven && def.persist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldKind;

    fn list(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn explicit_list_ignores_persist_marker() {
        let flagged = FieldDef::new("ammo", FieldKind::I32).persisted();
        assert!(!should_save(&flagged, &[], SelectionMode::ExplicitList));
        assert!(should_save(&flagged, &list(&["ammo"]), SelectionMode::ExplicitList));
    }

    #[test]
    fn flag_driven_adds_marked_fields() {
        let flagged = FieldDef::new("ammo", FieldKind::I32).persisted();
        let plain = FieldDef::new("cache", FieldKind::I32);
        assert!(should_save(&flagged, &[], SelectionMode::FlagDriven));
        assert!(!should_save(&plain, &[], SelectionMode::FlagDriven));
        assert!(should_save(&plain, &list(&["cache"]), SelectionMode::FlagDriven));
    }

    #[test]
    fn delegates_and_reserved_names_never_save() {
        let delegate = FieldDef::new("on_hit", FieldKind::MulticastDelegate).persisted();
        let reserved = FieldDef::new("__uber_graph", FieldKind::I32).persisted();
        for mode in [SelectionMode::ExplicitList, SelectionMode::FlagDriven] {
            assert!(!should_save(&delegate, &list(&["on_hit"]), mode));
            assert!(!should_save(&reserved, &list(&["__uber_graph"]), mode));
        }
    }
}
