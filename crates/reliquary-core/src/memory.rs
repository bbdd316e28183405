//! In-memory reference [`World`].
//!
//! Entities live in a slotmap with a separate order vector so enumeration
//! order is insertion order. Streaming groups change state after a per-group
//! latency measured in [`World::advance`] time, which lets the load state
//! machine be driven deterministically.

use crate::component::{RecordHooks, SaveComponent};
use crate::format::PERSISTENT_GROUP;
use crate::id::{ControllerId, EntityId, PersistentId, TypeId};
use crate::math::{Rotator, Transform, Vec3};
use crate::object::ObjectData;
use crate::registry::{TypeCategory, TypeDescriptor, TypeRegistry};
use crate::world::{AgentState, PhysicsBody, RigidBodyState, StreamingGroup, SubObject, World};
use slotmap::SlotMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type HookFactory = Box<dyn Fn() -> Box<dyn RecordHooks>>;

#[derive(Debug)]
struct EntityEntry {
    ty: Arc<TypeDescriptor>,
    name: String,
    owner: ObjectData,
    record: Option<SaveComponent>,
    extra_records: usize,
    sub_objects: Vec<SubObject>,
    transform: Transform,
    group: String,
    agent: Option<AgentState>,
    bodies: Vec<PhysicsBody>,
}

#[derive(Debug, Clone, Copy)]
struct ControllerEntry {
    pawn: Option<EntityId>,
    is_player: bool,
}

#[derive(Debug, Clone)]
struct GroupEntry {
    state: StreamingGroup,
    latency: f64,
    waited: f64,
}

pub struct MemoryWorld {
    registry: Arc<TypeRegistry>,
    entities: SlotMap<EntityId, EntityEntry>,
    order: Vec<EntityId>,
    controllers: SlotMap<ControllerId, ControllerEntry>,
    players: Vec<ControllerId>,
    groups: Vec<GroupEntry>,
    hook_factories: HashMap<TypeId, HookFactory>,
    next_serial: u64,
    spawn_count: usize,
    destroy_count: usize,
    elapsed: f64,
}

impl MemoryWorld {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            entities: SlotMap::with_key(),
            order: Vec::new(),
            controllers: SlotMap::with_key(),
            players: Vec::new(),
            groups: Vec::new(),
            hook_factories: HashMap::new(),
            next_serial: 0,
            spawn_count: 0,
            destroy_count: 0,
            elapsed: 0.0,
        }
    }

    pub fn registry_arc(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Attach hooks built by `factory` to the record component of every
    /// entity of `type_name` spawned from now on.
    pub fn register_hooks<F>(&mut self, type_name: &str, factory: F) -> bool
    where
        F: Fn() -> Box<dyn RecordHooks> + 'static,
    {
        match self.registry.resolve_type(type_name) {
            Some(id) => {
                self.hook_factories.insert(id, Box::new(factory));
                true
            }
            None => false,
        }
    }

    /// Spawn by type name. Does not count towards [`Self::spawn_count`].
    pub fn add_entity(&mut self, type_name: &str, at: Transform) -> Option<EntityId> {
        let ty = self.registry.resolve_type(type_name)?;
        self.insert_entity(ty, at)
    }

    fn insert_entity(&mut self, ty: TypeId, at: Transform) -> Option<EntityId> {
        let desc = Arc::clone(self.registry.get(ty)?);
        let owner = ObjectData::new(Arc::clone(&desc));
        let record = desc
            .record_type()
            .and_then(|rt| self.registry.instantiate(rt))
            .map(|data| {
                let mut component = SaveComponent::new(data);
                component.hooks = self.hook_factories.get(&ty).map(|make| make());
                component
            });
        let sub_objects = desc
            .sub_objects()
            .iter()
            .filter_map(|(name, sub_ty)| {
                self.registry
                    .instantiate(*sub_ty)
                    .map(|data| SubObject::new(name, data))
            })
            .collect();
        let bodies = desc
            .physics_bodies()
            .iter()
            .map(|name| PhysicsBody {
                name: name.clone(),
                simulating: true,
                state: RigidBodyState::default(),
            })
            .collect();
        let agent = (desc.category() == TypeCategory::Agent).then(AgentState::default);

        self.next_serial += 1;
        let entry = EntityEntry {
            name: format!("{}_{}", desc.name(), self.next_serial),
            ty: desc,
            owner,
            record,
            extra_records: 0,
            sub_objects,
            transform: at,
            group: PERSISTENT_GROUP.to_string(),
            agent,
            bodies,
        };
        let id = self.entities.insert(entry);
        self.order.push(id);
        Some(id)
    }

    pub fn entity_count(&self) -> usize {
        self.order.len()
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.order
    }

    /// Spawns requested through [`World::spawn`].
    pub fn spawn_count(&self) -> usize {
        self.spawn_count
    }

    pub fn destroy_count(&self) -> usize {
        self.destroy_count
    }

    pub fn reset_counters(&mut self) {
        self.spawn_count = 0;
        self.destroy_count = 0;
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn find_by_persistent_id(&self, id: PersistentId) -> Option<EntityId> {
        self.order.iter().copied().find(|&e| {
            self.entities[e]
                .record
                .as_ref()
                .is_some_and(|r| r.persistent_id == id)
        })
    }

    pub fn set_entity_group(&mut self, entity: EntityId, group: &str) {
        if let Some(entry) = self.entities.get_mut(entity) {
            entry.group = group.to_string();
        }
    }

    /// Pretend the entity carries `extra` record components beyond its first.
    pub fn set_extra_record_components(&mut self, entity: EntityId, extra: usize) {
        if let Some(entry) = self.entities.get_mut(entity) {
            entry.extra_records = extra;
        }
    }

    pub fn agent_mut(&mut self, entity: EntityId) -> Option<&mut AgentState> {
        self.entities.get_mut(entity)?.agent.as_mut()
    }

    pub fn bodies_mut(&mut self, entity: EntityId) -> Option<&mut Vec<PhysicsBody>> {
        self.entities.get_mut(entity).map(|e| &mut e.bodies)
    }

    // -- controllers ----------------------------------------------------------

    pub fn add_player_controller(&mut self) -> ControllerId {
        let id = self.controllers.insert(ControllerEntry {
            pawn: None,
            is_player: true,
        });
        self.players.push(id);
        id
    }

    pub fn controller_pawn(&self, controller: ControllerId) -> Option<EntityId> {
        self.controllers.get(controller).and_then(|c| c.pawn)
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    // -- streaming ------------------------------------------------------------

    /// Add a streaming group. `latency` is how much advanced time a
    /// requested state change takes; `f64::INFINITY` never settles.
    pub fn add_group(&mut self, name: &str, loaded: bool, visible: bool, latency: f64) {
        self.groups.push(GroupEntry {
            state: StreamingGroup {
                name: name.to_string(),
                should_be_loaded: loaded,
                should_be_visible: visible,
                loaded,
                visible,
            },
            latency,
            waited: 0.0,
        });
    }

    pub fn group(&self, name: &str) -> Option<&StreamingGroup> {
        self.groups.iter().find(|g| g.state.name == name).map(|g| &g.state)
    }
}

impl World for MemoryWorld {
    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn entities_with_record(&self) -> Vec<EntityId> {
        self.order
            .iter()
            .copied()
            .filter(|&e| self.entities[e].record.is_some())
            .collect()
    }

    fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    fn entity_type(&self, entity: EntityId) -> Option<&Arc<TypeDescriptor>> {
        self.entities.get(entity).map(|e| &e.ty)
    }

    fn entity_name(&self, entity: EntityId) -> String {
        self.entities
            .get(entity)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| "<destroyed>".to_string())
    }

    fn record_component_count(&self, entity: EntityId) -> usize {
        self.entities
            .get(entity)
            .map_or(0, |e| usize::from(e.record.is_some()) + e.extra_records)
    }

    fn record(&self, entity: EntityId) -> Option<&SaveComponent> {
        self.entities.get(entity)?.record.as_ref()
    }

    fn record_mut(&mut self, entity: EntityId) -> Option<&mut SaveComponent> {
        self.entities.get_mut(entity)?.record.as_mut()
    }

    fn owner(&self, entity: EntityId) -> Option<&ObjectData> {
        self.entities.get(entity).map(|e| &e.owner)
    }

    fn owner_mut(&mut self, entity: EntityId) -> Option<&mut ObjectData> {
        self.entities.get_mut(entity).map(|e| &mut e.owner)
    }

    fn sub_objects(&self, entity: EntityId) -> &[SubObject] {
        self.entities
            .get(entity)
            .map(|e| e.sub_objects.as_slice())
            .unwrap_or(&[])
    }

    fn sub_objects_mut(&mut self, entity: EntityId) -> Option<&mut [SubObject]> {
        self.entities
            .get_mut(entity)
            .map(|e| e.sub_objects.as_mut_slice())
    }

    fn transform(&self, entity: EntityId) -> Option<Transform> {
        self.entities.get(entity).map(|e| e.transform)
    }

    fn set_transform(&mut self, entity: EntityId, transform: Transform) {
        if let Some(entry) = self.entities.get_mut(entity) {
            entry.transform = transform;
        }
    }

    fn level_group(&self, entity: EntityId) -> String {
        self.entities
            .get(entity)
            .map(|e| e.group.clone())
            .unwrap_or_default()
    }

    fn spawn(&mut self, ty: TypeId, at: Transform) -> Option<EntityId> {
        let id = self.insert_entity(ty, at)?;
        self.spawn_count += 1;
        Some(id)
    }

    fn destroy(&mut self, entity: EntityId) -> bool {
        let Some(entry) = self.entities.remove(entity) else {
            return false;
        };
        self.order.retain(|&e| e != entity);
        if let Some(controller) = entry.agent.and_then(|a| a.controller) {
            if let Some(c) = self.controllers.get_mut(controller) {
                c.pawn = None;
            }
        }
        self.destroy_count += 1;
        true
    }

    fn agent(&self, entity: EntityId) -> Option<AgentState> {
        self.entities.get(entity)?.agent
    }

    fn set_agent_motion(&mut self, entity: EntityId, velocity: Vec3, control_rotation: Rotator) {
        if let Some(agent) = self.agent_mut(entity) {
            agent.velocity = velocity;
            agent.control_rotation = control_rotation;
        }
    }

    fn player_controllers(&self) -> Vec<ControllerId> {
        self.players.clone()
    }

    fn possess(&mut self, controller: ControllerId, entity: EntityId) -> bool {
        let Some(is_player) = self.controllers.get(controller).map(|c| c.is_player) else {
            return false;
        };
        if !self.entities.get(entity).is_some_and(|e| e.agent.is_some()) {
            return false;
        }
        // Release whatever the controller held before.
        if let Some(previous) = self.controllers[controller].pawn.take() {
            if let Some(agent) = self.agent_mut(previous) {
                agent.controller = None;
                agent.is_player = false;
            }
        }
        self.controllers[controller].pawn = Some(entity);
        if let Some(agent) = self.agent_mut(entity) {
            agent.controller = Some(controller);
            agent.is_player = is_player;
        }
        true
    }

    fn spawn_default_controller(&mut self, entity: EntityId) -> Option<ControllerId> {
        if self.agent(entity)?.controller.is_some() {
            return None;
        }
        let id = self.controllers.insert(ControllerEntry {
            pawn: None,
            is_player: false,
        });
        self.possess(id, entity);
        Some(id)
    }

    fn physics_bodies(&self, entity: EntityId) -> Vec<PhysicsBody> {
        self.entities
            .get(entity)
            .map(|e| e.bodies.clone())
            .unwrap_or_default()
    }

    fn apply_physics(
        &mut self,
        entity: EntityId,
        index: usize,
        simulating: bool,
        state: Option<RigidBodyState>,
    ) {
        let Some(body) = self
            .entities
            .get_mut(entity)
            .and_then(|e| e.bodies.get_mut(index))
        else {
            return;
        };
        body.simulating = simulating;
        if let Some(state) = state {
            body.state = state;
        }
    }

    fn streaming_groups(&self) -> Vec<StreamingGroup> {
        self.groups.iter().map(|g| g.state.clone()).collect()
    }

    fn request_group_state(&mut self, name: &str, loaded: bool, visible: bool) {
        if let Some(group) = self.groups.iter_mut().find(|g| g.state.name == name) {
            group.state.should_be_loaded = loaded;
            group.state.should_be_visible = visible;
            group.waited = 0.0;
            if group.latency <= 0.0 {
                group.state.loaded = loaded;
                group.state.visible = visible;
            }
        }
    }

    fn advance(&mut self, dt: f64) {
        self.elapsed += dt;
        for group in &mut self.groups {
            if group.state.is_settled() {
                continue;
            }
            group.waited += dt;
            if group.waited >= group.latency {
                group.state.loaded = group.state.should_be_loaded;
                group.state.visible = group.state.should_be_visible;
            }
        }
    }
}

impl fmt::Debug for MemoryWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWorld")
            .field("entities", &self.order.len())
            .field("controllers", &self.controllers.len())
            .field("groups", &self.groups.len())
            .field("hook_factories", &self.hook_factories.len())
            .finish()
    }
}
