//! Data-driven configuration for the reliquary save engine.
//!
//! Reads type schemas and engine settings from RON, TOML or JSON files in a
//! data directory and resolves them into a core type registry.

pub mod loader;
pub mod schema;

pub use loader::{
    DataLoadError, Format, SaveData, detect_format, load_save_data, load_settings, load_types,
};
