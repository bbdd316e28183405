//! Reliquary Core -- a self-describing, skip-capable save-file engine.
//!
//! Live entities carrying a [`component::SaveComponent`] are written to a
//! binary file in which every entity record and every field is framed by
//! an absolute end offset. A reader can therefore step over anything it
//! cannot use (a removed class, a renamed field, a missing sub-object)
//! and keep loading the rest, which is what lets old saves survive schema
//! drift.
//!
//! # Load Pipeline
//!
//! [`engine::SaveEngine::load`] and [`engine::SaveEngine::begin_load`] run
//! the state machine in [`load`]:
//!
//! 1. **HeaderRead** -- Format version, host stamp, grouping table, static
//!    blob skipped.
//! 2. **StreamingLevelSync** -- Optional. Bring streaming groups to their
//!    saved visibility, bounded by a timeout.
//! 3. **BodyLoad** -- Each record is filtered, then reused by persistent id
//!    or spawned by class, then has its fields applied.
//! 4. **PostLoadDispatch** -- Deferred physics, then native hook, user hook
//!    and `EntityFullyLoaded`, once per loaded entity.
//!
//! # Saving
//!
//! Synchronous saves validate every entity before writing anything.
//! Asynchronous saves serialize a bounded chunk per tick and hand the
//! finished buffer to a background compression worker.
//!
//! ```rust,ignore
//! let mut engine = SaveEngine::new(settings, Arc::new(ZlibFileStorage::new()));
//! engine.save_sync(&mut world, &SaveParams::new("saves/slot1.sav"))?;
//! let report = engine.load(&mut world, LoadParams::new("saves/slot1.sav"))?;
//! ```
//!
//! # Key Types
//!
//! - [`cursor::ByteCursor`] -- Little-endian positioned buffer with
//!   placeholder patching.
//! - [`registry::TypeRegistry`] -- Frozen per-type field tables that stand in
//!   for runtime reflection.
//! - [`world::World`] -- The host world the engine reads and mutates.
//! - [`memory::MemoryWorld`] -- A complete in-memory `World`.
//! - [`storage::Storage`] -- Compression and whole-file I/O.
//! - [`event::EventBus`] -- Prioritized save/load notifications with history.

pub mod component;
pub mod cursor;
pub mod engine;
pub mod entity;
pub mod event;
pub mod field;
pub mod files;
pub mod format;
pub mod id;
pub mod load;
pub mod math;
pub mod memory;
pub mod object;
pub mod query;
pub mod reconcile;
pub mod record;
pub mod registry;
pub mod selection;
pub mod settings;
pub mod storage;
pub mod validation;
pub mod value;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
