//! Save/load notifications.
//!
//! Unlike a batched simulation bus, save events are delivered synchronously
//! at the point they are emitted: a post-load listener must run while the
//! loaded entity is still exactly as the engine left it. Every delivered
//! event is also kept in a per-kind [`EventBuffer`] ring so callers and tests
//! can inspect recent history without subscribing.

use crate::id::{ControllerId, EntityId};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveEvent {
    /// Broadcast once per saved entity after its pre-save hooks.
    PreSave { entity: EntityId },
    AsyncSaveStarted {
        file: PathBuf,
        total: usize,
    },
    /// Emitted after each chunk is processed.
    AsyncSaveProgress {
        file: PathBuf,
        processed: usize,
        total: usize,
    },
    AsyncSaveFinished {
        file: PathBuf,
        success: bool,
    },
    AsyncSaveCancelled {
        file: PathBuf,
    },
    /// Emitted once per loaded entity after its post-load hooks.
    EntityFullyLoaded {
        entity: EntityId,
        group: String,
    },
    PlayerReattached {
        controller: ControllerId,
        entity: EntityId,
        player_index: i32,
    },
    LoadFinished {
        file: PathBuf,
        all_loaded: bool,
    },
}

/// Discriminant tag for save events, used for subscription and history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveEventKind {
    PreSave,
    AsyncSaveStarted,
    AsyncSaveProgress,
    AsyncSaveFinished,
    AsyncSaveCancelled,
    EntityFullyLoaded,
    PlayerReattached,
    LoadFinished,
}

const EVENT_KIND_COUNT: usize = 8;

impl SaveEvent {
    pub fn kind(&self) -> SaveEventKind {
        match self {
            SaveEvent::PreSave { .. } => SaveEventKind::PreSave,
            SaveEvent::AsyncSaveStarted { .. } => SaveEventKind::AsyncSaveStarted,
            SaveEvent::AsyncSaveProgress { .. } => SaveEventKind::AsyncSaveProgress,
            SaveEvent::AsyncSaveFinished { .. } => SaveEventKind::AsyncSaveFinished,
            SaveEvent::AsyncSaveCancelled { .. } => SaveEventKind::AsyncSaveCancelled,
            SaveEvent::EntityFullyLoaded { .. } => SaveEventKind::EntityFullyLoaded,
            SaveEvent::PlayerReattached { .. } => SaveEventKind::PlayerReattached,
            SaveEvent::LoadFinished { .. } => SaveEventKind::LoadFinished,
        }
    }
}

impl SaveEventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer (history ring)
// ---------------------------------------------------------------------------

/// Fixed-capacity ring of recent events. When full, the oldest is dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<SaveEvent>>,
    /// Next write position.
    head: usize,
    len: usize,
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: SaveEvent) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total events written since creation, including dropped ones.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> EventBufferIter<'_> {
        let start = if self.len < self.capacity() {
            0
        } else {
            self.head
        };
        EventBufferIter {
            buffer: self,
            index: start,
            remaining: self.len,
        }
    }
}

pub struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = &'a SaveEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

pub type PassiveListener = Box<dyn FnMut(&SaveEvent)>;

/// Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

pub type EventFilter = Box<dyn Fn(&SaveEvent) -> bool>;

struct SubscriberEntry {
    listener: PassiveListener,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("priority", &self.priority)
            .field(
                "filter",
                &if self.filter.is_some() {
                    "Some(<fn>)"
                } else {
                    "None"
                },
            )
            .field("insertion_order", &self.insertion_order)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

pub struct EventBus {
    history: [Option<EventBuffer>; EVENT_KIND_COUNT],
    /// Kept sorted by `(priority, insertion_order)`.
    subscribers: [Vec<SubscriberEntry>; EVENT_KIND_COUNT],
    history_capacity: usize,
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("history", &self.history)
            .field("history_capacity", &self.history_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// `history_capacity` is the ring size kept per event kind.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history: Default::default(),
            subscribers: Default::default(),
            history_capacity,
            next_insertion_order: 0,
        }
    }

    /// Deliver an event to its subscribers now, then record it.
    pub fn emit(&mut self, event: SaveEvent) {
        let idx = event.kind().index();
        for entry in &mut self.subscribers[idx] {
            if let Some(ref filter) = entry.filter
                && !filter(&event)
            {
                continue;
            }
            (entry.listener)(&event);
        }

        let capacity = self.history_capacity;
        self.history[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Subscribe with Normal priority and no filter.
    pub fn on(&mut self, kind: SaveEventKind, listener: PassiveListener) {
        self.on_filtered(kind, SubscriberPriority::Normal, None, listener);
    }

    pub fn on_filtered(
        &mut self,
        kind: SaveEventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        let list = &mut self.subscribers[kind.index()];
        list.push(SubscriberEntry {
            listener,
            priority,
            filter,
            insertion_order: order,
        });
        list.sort_by_key(|entry| (entry.priority, entry.insertion_order));
    }

    pub fn history(&self, kind: SaveEventKind) -> Option<&EventBuffer> {
        self.history[kind.index()].as_ref()
    }

    /// Recorded events of one kind, oldest first.
    pub fn recent(&self, kind: SaveEventKind) -> Vec<&SaveEvent> {
        self.history(kind)
            .map(|b| b.iter().collect())
            .unwrap_or_default()
    }

    pub fn total_emitted(&self, kind: SaveEventKind) -> u64 {
        self.history[kind.index()]
            .as_ref()
            .map(|b| b.total_written())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
