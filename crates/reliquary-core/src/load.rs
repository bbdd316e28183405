//! The load state machine.
//!
//! `Idle -> HeaderRead -> [StreamingLevelSync] -> BodyLoad -> PostLoadDispatch -> Idle`
//!
//! [`LoadTask::begin`] reads the file and its header and issues streaming
//! requests. [`LoadTask::poll`] waits out the streaming phase (bounded by
//! the configured timeout), then loads every record and dispatches post-load
//! hooks in one call.

use crate::cursor::ByteCursor;
use crate::entity::{LoadContext, LoadedEntity, RecordOutcome, read_entity_record};
use crate::event::{EventBus, SaveEvent};
use crate::format::{FileHeader, LoadError, PERSISTENT_GROUP, needs_streaming, read_header};
use crate::id::EntityId;
use crate::query::{clear_level, normalize_group_name};
use crate::reconcile::{IdentityIndex, LoadFilter};
use crate::settings::SaveSettings;
use crate::storage::Storage;
use crate::world::World;
use log::{info, warn};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadParams {
    pub file: PathBuf,
    /// Load only records carrying one of these tags. Empty loads all.
    pub tags: Vec<String>,
    pub destroy_before_load: bool,
    pub dont_load_player_agents: bool,
    /// Bring streaming groups to their saved visibility before loading.
    pub handle_streaming: bool,
    /// Load only records saved in this group. Empty loads all.
    pub only_group: String,
}

impl LoadParams {
    pub fn new(file: impl AsRef<Path>) -> Self {
        Self {
            file: file.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags = tags.iter().map(|t| t.as_ref().to_string()).collect();
        self
    }

    pub fn destroy_before_load(mut self, enabled: bool) -> Self {
        self.destroy_before_load = enabled;
        self
    }

    pub fn dont_load_player_agents(mut self, enabled: bool) -> Self {
        self.dont_load_player_agents = enabled;
        self
    }

    pub fn handle_streaming(mut self, enabled: bool) -> Self {
        self.handle_streaming = enabled;
        self
    }

    pub fn only_group(mut self, group: &str) -> Self {
        self.only_group = group.to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    HeaderRead,
    StreamingLevelSync,
    BodyLoad,
    PostLoadDispatch,
}

/// What a finished load did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub file: PathBuf,
    pub version: i32,
    /// Entities the file was applied to, in file order.
    pub entities: Vec<EntityId>,
    /// Entities destroyed by `destroy_before_load`.
    pub cleared: usize,
    pub reused: usize,
    pub spawned: usize,
    pub filtered: usize,
    pub skipped: usize,
    pub discarded: usize,
    pub stale_fields: usize,
    pub mismatched_fields: usize,
    pub missing_subobjects: usize,
    pub physics_skipped: usize,
    /// Streaming sync gave up waiting and loaded anyway.
    pub streaming_timed_out: bool,
    /// No record was skipped for a resolution failure.
    pub all_loaded: bool,
}

impl LoadReport {
    fn tally(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Loaded(loaded) => {
                self.entities.push(loaded.entity);
                if loaded.reused {
                    self.reused += 1;
                } else {
                    self.spawned += 1;
                }
                self.stale_fields += loaded.stats.stale;
                self.mismatched_fields += loaded.stats.mismatched;
                self.missing_subobjects += loaded.missing_subobjects;
                self.physics_skipped += usize::from(loaded.physics_skipped);
            }
            RecordOutcome::Filtered(_) => self.filtered += 1,
            RecordOutcome::Discarded => self.discarded += 1,
            RecordOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

/// An in-flight load.
#[derive(Debug)]
pub struct LoadTask {
    params: LoadParams,
    header: FileHeader,
    /// Positioned at the entity count.
    cursor: ByteCursor,
    phase: LoadPhase,
    waiting_on: Vec<String>,
    waited: f64,
    since_poll: f64,
    timed_out: bool,
}

impl LoadTask {
    pub fn begin<W: World + ?Sized>(
        world: &mut W,
        storage: &dyn Storage,
        params: LoadParams,
    ) -> Result<Self, LoadError> {
        let raw = storage.read_and_decompress(&params.file)?;
        let mut cursor = ByteCursor::from_bytes(raw);
        let header = read_header(&mut cursor)?;
        let mut task = Self {
            params,
            header,
            cursor,
            phase: LoadPhase::HeaderRead,
            waiting_on: Vec::new(),
            waited: 0.0,
            since_poll: 0.0,
            timed_out: false,
        };
        let wants_streaming = task.params.handle_streaming
            && task.params.only_group != PERSISTENT_GROUP
            && needs_streaming(&task.header.groups);
        if wants_streaming {
            task.request_groups(world);
        }
        task.phase = if task.waiting_on.is_empty() {
            LoadPhase::BodyLoad
        } else {
            LoadPhase::StreamingLevelSync
        };
        Ok(task)
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn file(&self) -> &Path {
        &self.params.file
    }

    /// Groups saved visible are loaded and shown; groups saved hidden are
    /// hidden, unless the load is restricted to one group. Only groups not
    /// already heading to visible are waited on.
    fn request_groups<W: World + ?Sized>(&mut self, world: &mut W) {
        let only_group = normalize_group_name(&self.params.only_group);
        for live in world.streaming_groups() {
            let name = normalize_group_name(&live.name);
            let Some(saved) = self.header.groups.iter().find(|g| g.name == name) else {
                continue;
            };
            if !only_group.is_empty() && only_group != name {
                continue;
            }
            if saved.visible {
                if !live.should_be_visible || !live.should_be_loaded {
                    self.waiting_on.push(live.name.clone());
                }
                world.request_group_state(&live.name, true, true);
            } else if only_group.is_empty() {
                world.request_group_state(&live.name, live.should_be_loaded, false);
            }
        }
    }

    fn streaming_settled<W: World + ?Sized>(&self, world: &W) -> bool {
        let groups = world.streaming_groups();
        self.waiting_on.iter().all(|name| {
            groups
                .iter()
                .find(|g| &g.name == name)
                .is_none_or(|g| g.loaded && g.visible)
        })
    }

    /// Advance by `dt` seconds. Returns the result once the load is done.
    pub fn poll<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        settings: &SaveSettings,
        events: &mut EventBus,
        dt: f64,
    ) -> Option<Result<LoadReport, LoadError>> {
        if self.phase == LoadPhase::StreamingLevelSync {
            self.waited += dt;
            self.since_poll += dt;
            if self.since_poll < settings.streaming_poll_interval {
                return None;
            }
            self.since_poll = 0.0;
            if !self.streaming_settled(world) {
                if self.waited <= settings.streaming_timeout_secs {
                    return None;
                }
                warn!(
                    "streaming groups {:?} still not loaded after {}s; loading {} anyway",
                    self.waiting_on,
                    settings.streaming_timeout_secs,
                    self.params.file.display()
                );
                self.timed_out = true;
            }
            self.phase = LoadPhase::BodyLoad;
        }
        if self.phase == LoadPhase::Idle {
            return None;
        }
        let result = self.load_body(world, settings, events).map(|(loaded, mut report)| {
            self.phase = LoadPhase::PostLoadDispatch;
            dispatch(world, settings, events, &loaded);
            report.streaming_timed_out = self.timed_out;
            events.emit(SaveEvent::LoadFinished {
                file: self.params.file.clone(),
                all_loaded: report.all_loaded,
            });
            report
        });
        self.phase = LoadPhase::Idle;
        Some(result)
    }

    fn load_body<W: World + ?Sized>(
        &mut self,
        world: &mut W,
        settings: &SaveSettings,
        events: &mut EventBus,
    ) -> Result<(Vec<LoadedEntity>, LoadReport), LoadError> {
        let mut report = LoadReport {
            file: self.params.file.clone(),
            version: self.header.version,
            ..LoadReport::default()
        };
        if self.params.destroy_before_load {
            report.cleared = clear_level(
                world,
                self.params.dont_load_player_agents,
                &self.params.only_group,
            );
        }

        let count = self.cursor.read_i32()?.max(0);
        let index = IdentityIndex::build(world);
        let mut ctx = LoadContext {
            version: self.header.version,
            settings,
            filter: LoadFilter {
                tags: &self.params.tags,
                only_group: &self.params.only_group,
            },
            dont_load_player_agents: self.params.dont_load_player_agents,
            index: &index,
            events,
        };
        let mut loaded = Vec::new();
        for _ in 0..count {
            let outcome = read_entity_record(&mut self.cursor, world, &mut ctx)?;
            report.tally(&outcome);
            if let RecordOutcome::Loaded(entity) = outcome {
                loaded.push(entity);
            }
        }
        report.all_loaded = report.skipped == 0;
        if !report.all_loaded {
            warn!(
                "{} of {count} records in {} were not loaded; was a class removed?",
                report.skipped,
                self.params.file.display()
            );
        }
        if settings.verbose_logging {
            info!(
                "loaded {}: {} reused, {} spawned, {} filtered",
                self.params.file.display(),
                report.reused,
                report.spawned,
                report.filtered
            );
        }
        Ok((loaded, report))
    }
}

/// Deferred physics, then native hook, user hook and broadcast, once per
/// loaded entity, after every record has been read.
fn dispatch<W: World + ?Sized>(
    world: &mut W,
    settings: &SaveSettings,
    events: &mut EventBus,
    loaded: &[LoadedEntity],
) {
    for entry in loaded {
        if !world.is_alive(entry.entity) {
            continue;
        }
        if !settings.disable_physics_load {
            for body in &entry.physics {
                world.apply_physics(entry.entity, body.index, body.simulating, body.state);
            }
        }
        if let Some(record) = world.record_mut(entry.entity) {
            record.run_post_load(entry.entity, &entry.group);
        }
        events.emit(SaveEvent::EntityFullyLoaded {
            entity: entry.entity,
            group: entry.group.clone(),
        });
    }
}
