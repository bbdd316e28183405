//! The record-bearing component attached to a persisted entity.

use crate::id::{ControllerId, EntityId, PersistentId};
use crate::object::ObjectData;
use std::fmt;

/// State a hook may inspect or change.
pub struct HookContext<'a> {
    pub entity: EntityId,
    pub fields: &'a mut ObjectData,
    pub tags: &'a mut Vec<String>,
}

/// Application callbacks around save and load. Every method defaults to a
/// no-op. Within each phase the native hook runs before the user hook.
pub trait RecordHooks {
    fn pre_save_native(&mut self, _ctx: &mut HookContext<'_>) {}

    fn pre_save(&mut self, _ctx: &mut HookContext<'_>) {}

    /// Runs once per entity, after every record in the file was read.
    fn post_load_native(&mut self, _ctx: &mut HookContext<'_>, _group: &str) {}

    fn post_load(&mut self, _ctx: &mut HookContext<'_>, _group: &str) {}

    fn player_reattached(
        &mut self,
        _ctx: &mut HookContext<'_>,
        _controller: ControllerId,
        _player_index: i32,
    ) {
    }
}

/// Per-entity save configuration, runtime state and persisted fields.
pub struct SaveComponent {
    pub persistent_id: PersistentId,
    pub tags: Vec<String>,
    /// False makes the entity ineligible; it is left out of the save.
    pub should_save: bool,
    /// Apply the saved transform on load.
    pub load_world_position: bool,
    /// Write the physics block contents.
    pub save_physics: bool,
    /// Owner field include-list.
    pub owner_fields_to_save: Vec<String>,
    /// Sub-object field include-list.
    pub subobject_fields_to_save: Vec<String>,
    pub verbose_log: bool,
    pub log_persistent_id: bool,
    pub log_saved_fields: bool,
    /// Streaming group the owner was last seen in. Refreshed at every save.
    pub level_group: String,
    pub data: ObjectData,
    pub hooks: Option<Box<dyn RecordHooks>>,
}

impl SaveComponent {
    pub fn new(data: ObjectData) -> Self {
        Self {
            persistent_id: PersistentId::NONE,
            tags: Vec::new(),
            should_save: true,
            load_world_position: true,
            save_physics: false,
            owner_fields_to_save: Vec::new(),
            subobject_fields_to_save: Vec::new(),
            verbose_log: false,
            log_persistent_id: false,
            log_saved_fields: false,
            level_group: String::new(),
            data,
            hooks: None,
        }
    }

    pub fn with_persistent_id(mut self, id: PersistentId) -> Self {
        self.persistent_id = id;
        self
    }

    pub fn with_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags = tags.iter().map(|t| t.as_ref().to_string()).collect();
        self
    }

    pub fn with_owner_fields<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.owner_fields_to_save = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    pub fn with_subobject_fields<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.subobject_fields_to_save = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }

    pub fn with_hooks(mut self, hooks: Box<dyn RecordHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn run_pre_save(&mut self, entity: EntityId) {
        if let Some(hooks) = self.hooks.as_mut() {
            let mut ctx = HookContext {
                entity,
                fields: &mut self.data,
                tags: &mut self.tags,
            };
            hooks.pre_save_native(&mut ctx);
            hooks.pre_save(&mut ctx);
        }
    }

    pub fn run_post_load(&mut self, entity: EntityId, group: &str) {
        if let Some(hooks) = self.hooks.as_mut() {
            let mut ctx = HookContext {
                entity,
                fields: &mut self.data,
                tags: &mut self.tags,
            };
            hooks.post_load_native(&mut ctx, group);
            hooks.post_load(&mut ctx, group);
        }
    }

    pub fn run_player_reattached(
        &mut self,
        entity: EntityId,
        controller: ControllerId,
        index: i32,
    ) {
        if let Some(hooks) = self.hooks.as_mut() {
            let mut ctx = HookContext {
                entity,
                fields: &mut self.data,
                tags: &mut self.tags,
            };
            hooks.player_reattached(&mut ctx, controller, index);
        }
    }
}

impl fmt::Debug for SaveComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveComponent")
            .field("persistent_id", &self.persistent_id)
            .field("tags", &self.tags)
            .field("should_save", &self.should_save)
            .field("level_group", &self.level_group)
            .field("type", &self.data.type_name())
            .field("has_hooks", &self.hooks.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldDef, TypeDef, TypeRegistryBuilder};
    use crate::value::{FieldKind, Value};
    use slotmap::KeyData;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl RecordHooks for Recorder {
        fn pre_save_native(&mut self, _ctx: &mut HookContext<'_>) {
            self.0.borrow_mut().push("native".into());
        }

        fn pre_save(&mut self, ctx: &mut HookContext<'_>) {
            self.0.borrow_mut().push("user".into());
            ctx.fields.set("count", Value::I32(5)).unwrap();
        }

        fn post_load(&mut self, _ctx: &mut HookContext<'_>, group: &str) {
            self.0.borrow_mut().push(format!("loaded in {group}"));
        }
    }

    fn component() -> SaveComponent {
        let mut b = TypeRegistryBuilder::new();
        let id = b
            .register(TypeDef::new("Counter").field(FieldDef::new("count", FieldKind::I32)))
            .unwrap();
        SaveComponent::new(b.build().unwrap().instantiate(id).unwrap())
    }

    #[test]
    fn defaults_are_eligible_and_positional() {
        let c = component();
        assert!(c.should_save);
        assert!(c.load_world_position);
        assert!(!c.save_physics);
        assert!(c.persistent_id.is_none());
    }

    #[test]
    fn pre_save_runs_native_then_user() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut c = component().with_hooks(Box::new(Recorder(Rc::clone(&log))));
        let entity = EntityId::from(KeyData::from_ffi(1));
        c.run_pre_save(entity);
        assert_eq!(*log.borrow(), ["native", "user"]);
        assert_eq!(c.data.get("count").and_then(Value::as_i32), Some(5));

        c.run_post_load(entity, "Docks");
        assert_eq!(log.borrow().last().map(String::as_str), Some("loaded in Docks"));
    }

    #[test]
    fn hooks_are_optional() {
        let mut c = component().with_tags(&["crate"]);
        c.run_pre_save(EntityId::default());
        assert!(c.has_tag("crate"));
        assert!(!c.has_tag("barrel"));
    }
}
