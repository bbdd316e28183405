//! Engine configuration, passed by value into the engine.

use crate::format::HostVersion;
use crate::selection::SelectionMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSettings {
    /// Flag-driven field selection. Also writes sub-object fields as a
    /// per-sub-object table instead of one pooled record.
    pub flag_driven_fields: bool,
    /// `SaveEngine::save` runs the chunked path.
    pub async_save: bool,
    /// Seconds between async chunks and between compression polls.
    pub async_tick_interval: f64,
    /// Entities serialized per async chunk. Values below 1 count as 1.
    pub async_chunk_size: usize,
    pub perform_validity_checks: bool,
    pub verbose_logging: bool,
    pub disable_physics_load: bool,
    pub log_static_data_fields: bool,
    pub streaming_timeout_secs: f64,
    pub streaming_poll_interval: f64,
    pub host_version: HostVersion,
    /// Owner type names, beyond the built-in categories, that may never
    /// carry a record component.
    pub illegal_type_names: Vec<String>,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            flag_driven_fields: false,
            async_save: false,
            async_tick_interval: 0.01,
            async_chunk_size: 1,
            perform_validity_checks: true,
            verbose_logging: false,
            disable_physics_load: false,
            log_static_data_fields: false,
            streaming_timeout_secs: 30.0,
            streaming_poll_interval: 0.1,
            host_version: HostVersion::current(),
            illegal_type_names: Vec::new(),
        }
    }
}

impl SaveSettings {
    pub fn selection_mode(&self) -> SelectionMode {
        SelectionMode::from_flag(self.flag_driven_fields)
    }

    pub fn chunk_size(&self) -> usize {
        self.async_chunk_size.max(1)
    }

    pub fn is_illegal_type_name(&self, name: &str) -> bool {
        self.illegal_type_names.iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = SaveSettings::default();
        assert!(s.perform_validity_checks);
        assert_eq!(s.streaming_timeout_secs, 30.0);
        assert_eq!(s.selection_mode(), SelectionMode::ExplicitList);
    }

    #[test]
    fn chunk_size_is_at_least_one() {
        let s = SaveSettings {
            async_chunk_size: 0,
            ..SaveSettings::default()
        };
        assert_eq!(s.chunk_size(), 1);
    }

    #[test]
    fn illegal_names_are_exact() {
        let s = SaveSettings {
            illegal_type_names: vec!["HudManager".into()],
            ..SaveSettings::default()
        };
        assert!(s.is_illegal_type_name("HudManager"));
        assert!(!s.is_illegal_type_name("Hud"));
    }
}
