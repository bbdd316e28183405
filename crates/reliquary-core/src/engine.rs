//! The file engine: saving, chunked saving, and driving loads.
//!
//! Everything runs on the caller's thread except compression of a finished
//! async save, which goes to a rayon worker when the `parallel` feature is
//! on and is observed by polling from [`SaveEngine::step`].

use crate::cursor::ByteCursor;
use crate::entity::write_entity_record;
use crate::event::{EventBus, SaveEvent};
use crate::format::{
    GroupState, LoadError, SaveError, read_header, read_static_data, write_header,
};
use crate::id::EntityId;
use crate::load::{LoadParams, LoadPhase, LoadReport, LoadTask};
use crate::object::ObjectData;
use crate::query::normalize_group_name;
use crate::registry::TypeRegistry;
use crate::settings::SaveSettings;
use crate::storage::{Storage, StorageError};
use crate::validation::{
    ValidationError, check_only_group, check_owner, check_references, is_eligible,
};
use crate::world::World;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "parallel")]
use std::sync::mpsc;

/// Smallest streaming poll step [`SaveEngine::load`] advances the world by.
const MIN_POLL_INTERVAL: f64 = 1e-3;

#[derive(Debug, Clone, Default)]
pub struct SaveParams {
    pub file: PathBuf,
    /// Save only entities in this group. Empty saves everything.
    /// `PersistentLevel` skips the group visibility check and saves only
    /// entities in the persistent level.
    pub only_group: String,
    pub static_data: Option<ObjectData>,
}

impl SaveParams {
    pub fn new(file: impl AsRef<Path>) -> Self {
        Self {
            file: file.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn only_group(mut self, group: &str) -> Self {
        self.only_group = group.to_string();
        self
    }

    pub fn static_data(mut self, data: ObjectData) -> Self {
        self.static_data = Some(data);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub file: PathBuf,
    pub entities_saved: usize,
    /// Uncompressed buffer size.
    pub bytes: usize,
}

/// What one [`SaveEngine::step`] finished.
#[derive(Debug, Default)]
pub struct StepOutcome {
    /// Saves whose file write completed or that were aborted this step.
    pub saves: Vec<Result<SaveReport, SaveError>>,
    pub load: Option<Result<LoadReport, LoadError>>,
}

impl StepOutcome {
    pub fn is_empty(&self) -> bool {
        self.saves.is_empty() && self.load.is_none()
    }
}

// ---------------------------------------------------------------------------
// Shared save steps
// ---------------------------------------------------------------------------

fn grouping_table<W: World + ?Sized>(world: &W) -> Vec<GroupState> {
    world
        .streaming_groups()
        .iter()
        .map(|g| GroupState {
            name: normalize_group_name(&g.name).to_string(),
            visible: g.visible,
        })
        .collect()
}

fn eligible_entities<W: World + ?Sized>(world: &W, only_group: &str) -> Vec<EntityId> {
    world
        .entities_with_record()
        .into_iter()
        .filter(|&e| is_eligible(world, e, only_group))
        .collect()
}

/// Reference check, group refresh, pre-save hooks, then owner checks.
fn preflight<W: World + ?Sized>(
    world: &mut W,
    entity: EntityId,
    settings: &SaveSettings,
    events: &mut EventBus,
) -> Result<(), ValidationError> {
    if settings.perform_validity_checks {
        check_references(world, entity, settings)?;
    }
    let group = world.level_group(entity);
    if let Some(record) = world.record_mut(entity) {
        record.level_group = group;
        record.run_pre_save(entity);
    }
    events.emit(SaveEvent::PreSave { entity });
    check_owner(world, entity, settings)
}

fn begin_buffer<W: World + ?Sized>(
    world: &W,
    settings: &SaveSettings,
    params: &SaveParams,
) -> Result<(ByteCursor, u64), SaveError> {
    let mut cur = ByteCursor::new();
    let count_at = write_header(
        &mut cur,
        &settings.host_version,
        &grouping_table(world),
        params.static_data.as_ref(),
        settings.log_static_data_fields,
    )?;
    Ok((cur, count_at))
}

// ---------------------------------------------------------------------------
// Async save state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct AsyncSave {
    file: PathBuf,
    only_group: String,
    cursor: ByteCursor,
    count_at: u64,
    queue: Vec<EntityId>,
    next: usize,
    written: usize,
    since_tick: f64,
}

impl AsyncSave {
    /// Serialize up to one chunk. Returns true once the queue is exhausted.
    fn run_chunk<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        settings: &SaveSettings,
        events: &mut EventBus,
    ) -> Result<bool, SaveError> {
        let end = (self.next + settings.chunk_size()).min(self.queue.len());
        while self.next < end {
            let entity = self.queue[self.next];
            self.next += 1;
            if !world.is_alive(entity) || !is_eligible(world, entity, &self.only_group) {
                continue;
            }
            preflight(world, entity, settings, events)?;
            if write_entity_record(&mut self.cursor, world, entity, settings)? {
                self.written += 1;
            }
        }
        events.emit(SaveEvent::AsyncSaveProgress {
            file: self.file.clone(),
            processed: self.next,
            total: self.queue.len(),
        });
        Ok(self.next >= self.queue.len())
    }
}

#[derive(Debug)]
enum WriteJob {
    #[cfg(feature = "parallel")]
    Worker(mpsc::Receiver<Result<(), StorageError>>),
    #[cfg(not(feature = "parallel"))]
    Inline(Vec<u8>),
}

/// A finished buffer on its way to storage.
#[derive(Debug)]
struct PendingWrite {
    report: SaveReport,
    job: WriteJob,
}

impl PendingWrite {
    #[cfg(feature = "parallel")]
    fn start(storage: &Arc<dyn Storage>, report: SaveReport, bytes: Vec<u8>) -> Self {
        let (tx, rx) = mpsc::channel();
        let storage = Arc::clone(storage);
        let file = report.file.clone();
        rayon::spawn(move || {
            // The receiver is gone only if the engine was dropped.
            let _ = tx.send(storage.compress_and_write(&file, &bytes));
        });
        Self {
            report,
            job: WriteJob::Worker(rx),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn start(_storage: &Arc<dyn Storage>, report: SaveReport, bytes: Vec<u8>) -> Self {
        Self {
            report,
            job: WriteJob::Inline(bytes),
        }
    }

    #[cfg(feature = "parallel")]
    fn poll(&mut self, _storage: &dyn Storage) -> Option<Result<(), StorageError>> {
        let WriteJob::Worker(rx) = &self.job;
        match rx.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(StorageError::WorkerLost)),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn poll(&mut self, storage: &dyn Storage) -> Option<Result<(), StorageError>> {
        let WriteJob::Inline(bytes) = &self.job;
        Some(storage.compress_and_write(&self.report.file, bytes))
    }
}

// ---------------------------------------------------------------------------
// SaveEngine
// ---------------------------------------------------------------------------

/// Owns configuration, storage, the event bus, and at most one async save
/// and one load in flight.
pub struct SaveEngine {
    settings: SaveSettings,
    storage: Arc<dyn Storage>,
    events: EventBus,
    async_save: Option<AsyncSave>,
    writes: Vec<PendingWrite>,
    load: Option<LoadTask>,
}

impl std::fmt::Debug for SaveEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveEngine")
            .field("settings", &self.settings)
            .field("async_save", &self.async_save)
            .field("writes", &self.writes.len())
            .field("load", &self.load)
            .finish_non_exhaustive()
    }
}

impl SaveEngine {
    pub fn new(settings: SaveSettings, storage: Arc<dyn Storage>) -> Self {
        Self {
            settings,
            storage,
            events: EventBus::default(),
            async_save: None,
            writes: Vec::new(),
            load: None,
        }
    }

    pub fn settings(&self) -> &SaveSettings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to or inspect save and load events.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    // -- saving ---------------------------------------------------------------

    /// Save with the configured mode. Returns the report for a synchronous
    /// save, or `None` once an async save has started; its result arrives
    /// through [`Self::step`].
    pub fn save<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        params: SaveParams,
    ) -> Result<Option<SaveReport>, SaveError> {
        if self.settings.async_save {
            self.start_async_save(world, params).map(|()| None)
        } else {
            self.save_sync(world, &params).map(Some)
        }
    }

    /// Validate every eligible entity, then serialize them all and write the
    /// file. Any check failure aborts before a byte is written.
    pub fn save_sync<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        params: &SaveParams,
    ) -> Result<SaveReport, SaveError> {
        self.prepare_save()?;
        check_only_group(world, &params.only_group)?;
        // Header before pre-save hooks, as in the chunked path.
        let (mut cur, count_at) = begin_buffer(world, &self.settings, params)?;
        let entities = eligible_entities(world, &params.only_group);
        for &entity in &entities {
            preflight(world, entity, &self.settings, &mut self.events).inspect_err(|e| {
                error!("save to {} cancelled: {e}", params.file.display());
            })?;
        }

        let mut written = 0;
        for &entity in &entities {
            if world.is_alive(entity)
                && write_entity_record(&mut cur, world, entity, &self.settings)?
            {
                written += 1;
            }
        }
        cur.patch_i32(count_at, written as i32)?;

        self.storage.compress_and_write(&params.file, cur.as_bytes())?;
        if self.settings.verbose_logging {
            info!("saved {written} entities to {}", params.file.display());
        }
        Ok(SaveReport {
            file: params.file.clone(),
            entities_saved: written,
            bytes: cur.len(),
        })
    }

    /// Write the header now and queue every eligible entity for chunked
    /// serialization on later [`Self::step`] calls.
    pub fn start_async_save<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        params: SaveParams,
    ) -> Result<(), SaveError> {
        self.prepare_save()?;
        check_only_group(world, &params.only_group)?;
        let (cursor, count_at) = begin_buffer(world, &self.settings, &params)?;
        let queue = eligible_entities(world, &params.only_group);
        self.events.emit(SaveEvent::AsyncSaveStarted {
            file: params.file.clone(),
            total: queue.len(),
        });
        self.async_save = Some(AsyncSave {
            file: params.file,
            only_group: params.only_group,
            cursor,
            count_at,
            queue,
            next: 0,
            written: 0,
            since_tick: 0.0,
        });
        Ok(())
    }

    /// Drop the in-progress async save buffer. Returns whether one was being
    /// serialized. A save already handed to storage is not affected.
    pub fn cancel_async_save(&mut self) -> bool {
        match self.async_save.take() {
            Some(job) => {
                info!("async save to {} cancelled", job.file.display());
                self.events
                    .emit(SaveEvent::AsyncSaveCancelled { file: job.file });
                true
            }
            None => false,
        }
    }

    /// `(processed, total)` of the async save being serialized.
    pub fn async_progress(&self) -> Option<(usize, usize)> {
        self.async_save.as_ref().map(|job| (job.next, job.queue.len()))
    }

    /// An async save is being serialized or written.
    pub fn is_saving(&self) -> bool {
        self.async_save.is_some() || !self.writes.is_empty()
    }

    fn prepare_save(&mut self) -> Result<(), SaveError> {
        if self.load.is_some() {
            return Err(SaveError::LoadInProgress);
        }
        self.cancel_async_save();
        Ok(())
    }

    // -- loading --------------------------------------------------------------

    /// Start a load; it finishes on a later [`Self::step`].
    pub fn begin_load<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        params: LoadParams,
    ) -> Result<(), LoadError> {
        if self.load.is_some() {
            return Err(LoadError::LoadInProgress);
        }
        self.cancel_async_save();
        self.load = Some(LoadTask::begin(world, self.storage.as_ref(), params)?);
        Ok(())
    }

    /// Load to completion, advancing the world's clock while waiting on
    /// streaming groups.
    pub fn load<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        params: LoadParams,
    ) -> Result<LoadReport, LoadError> {
        if self.load.is_some() {
            return Err(LoadError::LoadInProgress);
        }
        self.cancel_async_save();
        let mut task = LoadTask::begin(world, self.storage.as_ref(), params)?;
        let interval = self.settings.streaming_poll_interval.max(MIN_POLL_INTERVAL);
        let mut dt = 0.0;
        loop {
            if let Some(result) = task.poll(world, &self.settings, &mut self.events, dt) {
                return result;
            }
            world.advance(interval);
            dt = interval;
        }
    }

    pub fn is_loading(&self) -> bool {
        self.load.is_some()
    }

    pub fn load_phase(&self) -> LoadPhase {
        self.load.as_ref().map_or(LoadPhase::Idle, LoadTask::phase)
    }

    /// Read a file's static data object without touching any world.
    pub fn load_static_data(
        &self,
        file: &Path,
        registry: &TypeRegistry,
    ) -> Result<ObjectData, LoadError> {
        let raw = self.storage.read_and_decompress(file)?;
        read_static_data(&mut ByteCursor::from_bytes(raw), registry)
    }

    /// Read a file's grouping table. Files older than the table yield none.
    pub fn load_streaming_state(&self, file: &Path) -> Result<Vec<GroupState>, LoadError> {
        let raw = self.storage.read_and_decompress(file)?;
        Ok(read_header(&mut ByteCursor::from_bytes(raw))?.groups)
    }

    // -- driving --------------------------------------------------------------

    /// Advance async work by `dt` seconds: one async save chunk per elapsed
    /// tick interval, pending file writes, and an in-flight load.
    pub fn step<W: World + ?Sized>(&mut self, world: &mut W, dt: f64) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        if let Some(aborted) = self.step_async_save(world, dt) {
            outcome.saves.push(Err(aborted));
        }
        self.poll_writes(&mut outcome);
        if let Some(mut task) = self.load.take() {
            match task.poll(world, &self.settings, &mut self.events, dt) {
                Some(result) => outcome.load = Some(result),
                None => self.load = Some(task),
            }
        }
        outcome
    }

    /// Returns the error that aborted the save, if any.
    fn step_async_save<W: World + ?Sized>(&mut self, world: &mut W, dt: f64) -> Option<SaveError> {
        let mut job = self.async_save.take()?;
        job.since_tick += dt;
        if job.since_tick < self.settings.async_tick_interval {
            self.async_save = Some(job);
            return None;
        }
        job.since_tick = 0.0;

        match job.run_chunk(world, &self.settings, &mut self.events) {
            Ok(false) => {
                self.async_save = Some(job);
                None
            }
            Ok(true) => {
                if let Err(e) = job.cursor.patch_i32(job.count_at, job.written as i32) {
                    return Some(e.into());
                }
                let report = SaveReport {
                    file: job.file,
                    entities_saved: job.written,
                    bytes: job.cursor.len(),
                };
                self.writes
                    .push(PendingWrite::start(&self.storage, report, job.cursor.into_inner()));
                None
            }
            Err(e) => {
                error!("async save to {} cancelled: {e}", job.file.display());
                self.events
                    .emit(SaveEvent::AsyncSaveCancelled { file: job.file });
                Some(e)
            }
        }
    }

    fn poll_writes(&mut self, outcome: &mut StepOutcome) {
        let mut index = 0;
        while index < self.writes.len() {
            let Some(result) = self.writes[index].poll(self.storage.as_ref()) else {
                index += 1;
                continue;
            };
            let pending = self.writes.remove(index);
            let success = result.is_ok();
            if let Err(e) = &result {
                warn!("writing {} failed: {e}", pending.report.file.display());
            }
            self.events.emit(SaveEvent::AsyncSaveFinished {
                file: pending.report.file.clone(),
                success,
            });
            outcome
                .saves
                .push(result.map(|()| pending.report).map_err(SaveError::from));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SaveEventKind;
    use crate::test_utils::*;
    use crate::value::Value;

    fn file() -> PathBuf {
        PathBuf::from("saves/slot1.sav")
    }

    fn async_settings(chunk: usize) -> SaveSettings {
        SaveSettings {
            async_save: true,
            async_chunk_size: chunk,
            ..SaveSettings::default()
        }
    }

    // -----------------------------------------------------------------------
    // Sync save
    // -----------------------------------------------------------------------

    #[test]
    fn sync_save_counts_only_eligible() {
        let (mut engine, storage) = memory_engine(SaveSettings::default());
        let mut world = sample_world();
        spawn_crate(&mut world, 1, 1);
        let off = spawn_crate(&mut world, 2, 2);
        world.record_mut(off).unwrap().should_save = false;

        let report = engine.save_sync(&mut world, &SaveParams::new(file())).unwrap();
        assert_eq!(report.entities_saved, 1);
        let raw = storage.raw(&file()).unwrap();
        let mut cur = ByteCursor::from_bytes(raw);
        read_header(&mut cur).unwrap();
        assert_eq!(cur.read_i32().unwrap(), 1);
    }

    #[test]
    fn illegal_owner_aborts_whole_save() {
        let (mut engine, storage) = memory_engine(SaveSettings::default());
        let mut world = sample_world();
        spawn_crate(&mut world, 1, 1);
        world.add_entity("Director", Default::default()).unwrap();

        let err = engine.save_sync(&mut world, &SaveParams::new(file())).unwrap_err();
        assert!(matches!(
            err,
            SaveError::Validation(ValidationError::IllegalOwnerType { .. })
        ));
        assert!(!storage.contains(&file()));
    }

    #[test]
    fn level_reference_fails_validity_check() {
        let mut world = sample_world();
        let e = spawn_crate(&mut world, 1, 1);
        world
            .owner_mut(e)
            .unwrap()
            .set("home", Value::ObjectRef(Some("/Game/Maps/Docks.PersistentLevel.Dock_3".into())))
            .unwrap();
        world.record_mut(e).unwrap().owner_fields_to_save = vec!["home".into()];

        let (mut engine, _) = memory_engine(SaveSettings::default());
        assert!(engine.save_sync(&mut world, &SaveParams::new(file())).is_err());

        let (mut unchecked, _) = memory_engine(SaveSettings {
            perform_validity_checks: false,
            ..SaveSettings::default()
        });
        assert!(unchecked.save_sync(&mut world, &SaveParams::new(file())).is_ok());
    }

    #[test]
    fn group_restricted_save_needs_visible_group() {
        let (mut engine, _) = memory_engine(SaveSettings::default());
        let mut world = sample_world();
        world.add_group("/Game/Maps/Docks", true, false, 0.0);
        let params = SaveParams::new(file()).only_group("Docks");
        assert!(matches!(
            engine.save_sync(&mut world, &params),
            Err(SaveError::Validation(ValidationError::GroupNotVisible(_)))
        ));
        let params = SaveParams::new(file()).only_group("Caves");
        assert!(matches!(
            engine.save_sync(&mut world, &params),
            Err(SaveError::Validation(ValidationError::GroupNotFound(_)))
        ));
    }

    #[test]
    fn persistent_level_save_skips_streamed_entities() {
        let (mut engine, _) = memory_engine(SaveSettings::default());
        let mut world = sample_world();
        world.add_group("/Game/Maps/Docks", true, false, 0.0);
        spawn_crate(&mut world, 1, 1);
        let docked = spawn_crate(&mut world, 2, 2);
        world.set_entity_group(docked, "/Game/Maps/Docks");

        let params = SaveParams::new(file()).only_group(crate::format::PERSISTENT_GROUP);
        let report = engine.save_sync(&mut world, &params).unwrap();
        assert_eq!(report.entities_saved, 1);
    }

    // -----------------------------------------------------------------------
    // Async save
    // -----------------------------------------------------------------------

    #[test]
    fn async_save_reports_progress_per_chunk() {
        let (mut engine, storage) = memory_engine(async_settings(2));
        let mut world = sample_world();
        populate(&mut world, 5);

        assert_eq!(engine.save(&mut world, SaveParams::new(file())).unwrap(), None);
        assert_eq!(engine.async_progress(), Some((0, 5)));
        let finished = drive(&mut engine, &mut world);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].as_ref().unwrap().entities_saved, 5);
        assert!(storage.contains(&file()));

        let progress: Vec<usize> = engine
            .events()
            .recent(SaveEventKind::AsyncSaveProgress)
            .iter()
            .filter_map(|e| match e {
                SaveEvent::AsyncSaveProgress { processed, .. } => Some(*processed),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![2, 4, 5]);
        assert_eq!(engine.events().recent(SaveEventKind::AsyncSaveFinished).len(), 1);
    }

    #[test]
    fn chunks_wait_for_tick_interval() {
        let (mut engine, _) = memory_engine(SaveSettings {
            async_tick_interval: 1.0,
            ..async_settings(1)
        });
        let mut world = sample_world();
        populate(&mut world, 3);
        engine.start_async_save(&mut world, SaveParams::new(file())).unwrap();
        engine.step(&mut world, 0.5);
        assert_eq!(engine.async_progress(), Some((0, 3)));
        engine.step(&mut world, 0.5);
        assert_eq!(engine.async_progress(), Some((1, 3)));
    }

    #[test]
    fn cancel_reports_whether_in_flight() {
        let (mut engine, storage) = memory_engine(async_settings(1));
        let mut world = sample_world();
        populate(&mut world, 3);
        assert!(!engine.cancel_async_save());

        engine.start_async_save(&mut world, SaveParams::new(file())).unwrap();
        engine.step(&mut world, 1.0);
        assert!(engine.cancel_async_save());
        assert!(!engine.is_saving());
        assert!(!storage.contains(&file()));
        assert_eq!(engine.events().recent(SaveEventKind::AsyncSaveCancelled).len(), 1);
    }

    #[test]
    fn new_save_replaces_in_flight_one() {
        let (mut engine, _) = memory_engine(async_settings(1));
        let mut world = sample_world();
        populate(&mut world, 3);
        engine.start_async_save(&mut world, SaveParams::new("a.sav")).unwrap();
        engine.start_async_save(&mut world, SaveParams::new("b.sav")).unwrap();
        let finished = drive(&mut engine, &mut world);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].as_ref().unwrap().file, PathBuf::from("b.sav"));
    }

    #[test]
    fn failing_check_mid_async_cancels() {
        let (mut engine, storage) = memory_engine(async_settings(1));
        let mut world = sample_world();
        spawn_crate(&mut world, 1, 1);
        let bad = spawn_crate(&mut world, 2, 2);
        world.set_extra_record_components(bad, 1);

        engine.start_async_save(&mut world, SaveParams::new(file())).unwrap();
        let finished = drive(&mut engine, &mut world);
        assert!(matches!(
            finished.as_slice(),
            [Err(SaveError::Validation(ValidationError::MultipleRecordComponents { .. }))]
        ));
        assert!(!storage.contains(&file()));
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    #[test]
    fn save_refused_during_load() {
        let (mut engine, _) = memory_engine(SaveSettings::default());
        let mut world = sample_world();
        spawn_crate(&mut world, 0, 1);
        engine.save_sync(&mut world, &SaveParams::new(file())).unwrap();

        engine.begin_load(&mut world, LoadParams::new(file())).unwrap();
        assert_eq!(engine.load_phase(), LoadPhase::BodyLoad);
        assert!(matches!(
            engine.save_sync(&mut world, &SaveParams::new(file())),
            Err(SaveError::LoadInProgress)
        ));
        let outcome = engine.step(&mut world, 0.0);
        assert_eq!(outcome.load.unwrap().unwrap().spawned, 1);
        assert!(!engine.is_loading());
    }

    #[test]
    fn load_cancels_async_save() {
        let (mut engine, _) = memory_engine(SaveSettings::default());
        let mut world = sample_world();
        populate(&mut world, 2);
        engine.save_sync(&mut world, &SaveParams::new(file())).unwrap();
        engine.start_async_save(&mut world, SaveParams::new("other.sav")).unwrap();

        engine.load(&mut world, LoadParams::new(file())).unwrap();
        assert!(!engine.is_saving());
    }

    #[test]
    fn missing_file_is_an_error() {
        let (mut engine, _) = memory_engine(SaveSettings::default());
        let mut world = sample_world();
        assert!(matches!(
            engine.load(&mut world, LoadParams::new("nope.sav")),
            Err(LoadError::Storage(StorageError::NotFound(_)))
        ));
    }

    #[test]
    fn static_data_reads_without_world() {
        let (mut engine, _) = memory_engine(SaveSettings::default());
        let mut world = sample_world();
        let registry = sample_registry();
        let params = SaveParams::new(file()).static_data(campaign(&registry, 4));
        engine.save_sync(&mut world, &params).unwrap();

        let data = engine.load_static_data(&file(), &registry).unwrap();
        assert_eq!(data.get("chapter"), Some(&Value::I32(4)));

        engine.save_sync(&mut world, &SaveParams::new(file())).unwrap();
        assert!(matches!(
            engine.load_static_data(&file(), &registry),
            Err(LoadError::NoStaticData)
        ));
    }

    #[test]
    fn streaming_state_lists_groups() {
        let (mut engine, _) = memory_engine(SaveSettings::default());
        let mut world = sample_world();
        world.add_group("/Game/Maps/UEDPIE_0_Docks", true, true, 0.0);
        world.add_group("/Game/Maps/Caves", false, false, 0.0);
        engine.save_sync(&mut world, &SaveParams::new(file())).unwrap();

        let groups = engine.load_streaming_state(&file()).unwrap();
        assert_eq!(
            groups,
            vec![
                GroupState { name: "Docks".into(), visible: true },
                GroupState { name: "Caves".into(), visible: false },
            ]
        );
    }
}
