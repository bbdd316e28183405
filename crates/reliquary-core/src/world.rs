//! The host interface the engine saves from and loads into.
//!
//! The engine never owns entities. Everything it needs from the host (type
//! resolution, spawning, component access, physics, controllers and level
//! streaming) goes through [`World`]. Capabilities a host may lack have
//! default implementations that report "nothing there".

use crate::component::SaveComponent;
use crate::cursor::{ByteCursor, CursorError};
use crate::id::{ControllerId, EntityId, TypeId};
use crate::math::{Quat, Rotator, Transform, Vec3};
use crate::object::ObjectData;
use crate::registry::{TypeDescriptor, TypeRegistry};
use std::sync::Arc;

/// A named object attached to an entity with its own field set.
#[derive(Debug, Clone)]
pub struct SubObject {
    pub name: String,
    pub data: ObjectData,
}

impl SubObject {
    pub fn new(name: &str, data: ObjectData) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }
}

/// Locomotion and control state of an agent owner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AgentState {
    pub controller: Option<ControllerId>,
    /// Possessed by a player controller.
    pub is_player: bool,
    pub velocity: Vec3,
    pub control_rotation: Rotator,
}

/// Dynamic state of one rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RigidBodyState {
    pub location: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl RigidBodyState {
    pub fn write_to(&self, cur: &mut ByteCursor) {
        self.location.write_to(cur);
        self.rotation.write_to(cur);
        self.linear_velocity.write_to(cur);
        self.angular_velocity.write_to(cur);
    }

    pub fn read_from(cur: &mut ByteCursor) -> Result<Self, CursorError> {
        Ok(Self {
            location: Vec3::read_from(cur)?,
            rotation: Quat::read_from(cur)?,
            linear_velocity: Vec3::read_from(cur)?,
            angular_velocity: Vec3::read_from(cur)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsBody {
    pub name: String,
    pub simulating: bool,
    pub state: RigidBodyState,
}

/// One streamable level group as the host currently sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingGroup {
    pub name: String,
    pub should_be_loaded: bool,
    pub should_be_visible: bool,
    pub loaded: bool,
    pub visible: bool,
}

impl StreamingGroup {
    /// Whether the current state has caught up with the requested one.
    pub fn is_settled(&self) -> bool {
        self.loaded == self.should_be_loaded && self.visible == self.should_be_visible
    }
}

pub trait World {
    fn registry(&self) -> &TypeRegistry;

    /// Live entities that carry at least one record component, in stable
    /// enumeration order.
    fn entities_with_record(&self) -> Vec<EntityId>;

    fn is_alive(&self, entity: EntityId) -> bool;

    fn entity_type(&self, entity: EntityId) -> Option<&Arc<TypeDescriptor>>;

    fn entity_name(&self, entity: EntityId) -> String;

    /// How many record components the entity carries. A saved owner must
    /// carry exactly one.
    fn record_component_count(&self, entity: EntityId) -> usize;

    fn record(&self, entity: EntityId) -> Option<&SaveComponent>;

    fn record_mut(&mut self, entity: EntityId) -> Option<&mut SaveComponent>;

    /// The owner's own field set.
    fn owner(&self, entity: EntityId) -> Option<&ObjectData>;

    fn owner_mut(&mut self, entity: EntityId) -> Option<&mut ObjectData>;

    fn sub_objects(&self, entity: EntityId) -> &[SubObject];

    fn sub_objects_mut(&mut self, entity: EntityId) -> Option<&mut [SubObject]>;

    fn transform(&self, entity: EntityId) -> Option<Transform>;

    fn set_transform(&mut self, entity: EntityId, transform: Transform);

    /// Name of the streaming group the entity currently lives in.
    fn level_group(&self, entity: EntityId) -> String;

    fn spawn(&mut self, ty: TypeId, at: Transform) -> Option<EntityId>;

    fn destroy(&mut self, entity: EntityId) -> bool;

    // -- agents and controllers ---------------------------------------------

    fn agent(&self, _entity: EntityId) -> Option<AgentState> {
        None
    }

    fn set_agent_motion(
        &mut self,
        _entity: EntityId,
        _velocity: Vec3,
        _control_rotation: Rotator,
    ) {
    }

    /// Player controllers in player-index order.
    fn player_controllers(&self) -> Vec<ControllerId> {
        Vec::new()
    }

    fn possess(&mut self, _controller: ControllerId, _entity: EntityId) -> bool {
        false
    }

    fn spawn_default_controller(&mut self, _entity: EntityId) -> Option<ControllerId> {
        None
    }

    // -- physics --------------------------------------------------------------

    fn physics_bodies(&self, _entity: EntityId) -> Vec<PhysicsBody> {
        Vec::new()
    }

    /// Restore one body. `state` is `None` for bodies saved at rest.
    fn apply_physics(
        &mut self,
        _entity: EntityId,
        _index: usize,
        _simulating: bool,
        _state: Option<RigidBodyState>,
    ) {
    }

    // -- level streaming ----------------------------------------------------

    fn streaming_groups(&self) -> Vec<StreamingGroup> {
        Vec::new()
    }

    fn request_group_state(&mut self, _name: &str, _loaded: bool, _visible: bool) {}

    /// Let host time pass. Blocking loads call this between polls.
    fn advance(&mut self, _dt: f64) {}
}
