//! Interactive placement of phantom structures.
//!
//! A [`PlacementSession`] tracks at most one phantom (an unplaced, movable
//! structure) and turns per-frame pointer input into placement:
//!
//! ```text
//! Idle --prepare--> Placing --press (valid, affordable)--> Rotating
//!   ^                  |                                      |
//!   +----cancel--------+-------------release (valid)----------+
//! ```
//!
//! The session is an explicit service object: create it with
//! [`PlacementSession::new`] against the simulation's event bus and tear it
//! down with [`PlacementSession::shutdown`].

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::blueprint::StructureBlueprint;
use crate::error::{GameError, Result};
use crate::events::{EventBus, EventKind, GameEvent, SubscriptionId};
use crate::math::{signed_yaw_degrees, Vec2Fixed, Vec3Fixed};
use crate::placement::{ColliderKind, PlacementStatus};
use crate::services::{AgentId, GameServices, LayerMask};
use crate::simulation::Simulation;
use crate::structure::{PlayerId, Pose, Structure, StructureId};

/// Ray from the camera through the pointer, in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointerRay {
    /// Ray origin.
    pub origin: Vec3Fixed,
    /// Ray direction.
    pub direction: Vec3Fixed,
}

/// Input sampled for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputFrame {
    /// Pointer position in screen pixels.
    pub pointer_screen: Vec2Fixed,
    /// World ray under the pointer.
    pub pointer_ray: PointerRay,
    /// Primary button went down this frame.
    pub primary_pressed: bool,
    /// Primary button went up this frame.
    pub primary_released: bool,
    /// Secondary button went up this frame.
    pub secondary_released: bool,
    /// Pointer is over a UI element.
    pub pointer_over_ui: bool,
}

/// Coarse session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No phantom.
    Idle,
    /// Phantom follows the pointer.
    Placing,
    /// Primary button held; pointer drags set the yaw.
    Rotating,
}

/// Outcome of a session tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The phantom was placed.
    Placed(StructureId),
    /// The phantom was discarded.
    Canceled,
    /// A confirmation was attempted but refused; the session keeps placing.
    ConfirmRejected(GameError),
}

/// The placement workflow.
#[derive(Debug)]
pub struct PlacementSession {
    phantom: Option<Structure>,
    status: PlacementStatus,
    builder: Option<AgentId>,
    rotating: bool,
    rotation_anchor: Vec2Fixed,
    past_threshold: bool,
    last_valid_position: Vec3Fixed,
    just_canceled: bool,
    destroyed_agents: Rc<RefCell<Vec<AgentId>>>,
    subscription: Option<SubscriptionId>,
}

impl PlacementSession {
    /// Create a session listening for agent deaths on `bus`.
    pub fn new(bus: &mut EventBus) -> Self {
        let destroyed_agents = Rc::new(RefCell::new(Vec::new()));
        let inbox = Rc::clone(&destroyed_agents);
        let subscription = bus.subscribe(
            EventKind::AgentDestroyed,
            Box::new(move |event| {
                if let GameEvent::AgentDestroyed { agent } = event {
                    inbox.borrow_mut().push(*agent);
                }
            }),
        );

        Self {
            phantom: None,
            status: PlacementStatus::Invalid,
            builder: None,
            rotating: false,
            rotation_anchor: Vec2Fixed::ZERO,
            past_threshold: false,
            last_valid_position: Vec3Fixed::ZERO,
            just_canceled: false,
            destroyed_agents,
            subscription: Some(subscription),
        }
    }

    /// Stop listening for events and drop any phantom.
    pub fn shutdown(&mut self, bus: &mut EventBus) {
        if let Some(id) = self.subscription.take() {
            bus.unsubscribe(id);
        }
        self.phantom = None;
        self.builder = None;
        self.rotating = false;
        self.destroyed_agents.borrow_mut().clear();
    }

    /// Current coarse state.
    ///
    /// A builder death reported on the bus counts immediately, even before
    /// the next tick applies the cancel.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.builder_lost() {
            return SessionState::Idle;
        }
        match (&self.phantom, self.rotating) {
            (None, _) => SessionState::Idle,
            (Some(_), false) => SessionState::Placing,
            (Some(_), true) => SessionState::Rotating,
        }
    }

    /// The phantom being placed.
    #[must_use]
    pub fn phantom(&self) -> Option<&Structure> {
        if self.builder_lost() {
            return None;
        }
        self.phantom.as_ref()
    }

    /// Result of the latest validation.
    #[must_use]
    pub const fn status(&self) -> PlacementStatus {
        self.status
    }

    /// Agent that requested the placement.
    #[must_use]
    pub const fn builder(&self) -> Option<AgentId> {
        self.builder
    }

    /// Whether a placement was cancelled during the latest tick.
    #[must_use]
    pub const fn just_canceled(&self) -> bool {
        self.just_canceled
    }

    /// Start placing a new phantom.
    ///
    /// An unplaced previous phantom is discarded. The builder is only
    /// replaced when one is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the blueprint fails validation.
    pub fn prepare(
        &mut self,
        blueprint: &StructureBlueprint,
        owner: PlayerId,
        builder: Option<AgentId>,
        services: &mut dyn GameServices,
    ) -> Result<()> {
        self.apply_agent_deaths(services);
        let phantom = Structure::new(blueprint, owner)?;
        services.range_indicators(true);

        if self.phantom.take().is_some() {
            debug!("previous phantom discarded");
        }
        self.phantom = Some(phantom);
        if builder.is_some() {
            self.builder = builder;
        }
        self.rotating = false;
        self.past_threshold = false;
        self.status = PlacementStatus::Invalid;

        debug!(blueprint = %blueprint.id, owner = owner.0, ?builder, "placement prepared");
        Ok(())
    }

    /// A collider started overlapping the phantom.
    pub fn phantom_overlap_begin(&mut self, kind: ColliderKind) {
        if let Some(phantom) = self.phantom.as_mut() {
            phantom.overlap_begin(kind);
        }
    }

    /// A collider stopped overlapping the phantom.
    pub fn phantom_overlap_end(&mut self, kind: ColliderKind) {
        if let Some(phantom) = self.phantom.as_mut() {
            phantom.overlap_end(kind);
        }
    }

    /// Process one frame of input.
    ///
    /// Order: pending builder deaths, cancel, move or rotate, press, release.
    pub fn tick(
        &mut self,
        sim: &mut Simulation,
        input: &InputFrame,
        services: &mut dyn GameServices,
    ) -> Option<SessionEvent> {
        self.just_canceled = false;

        if let Some(event) = self.apply_agent_deaths(services) {
            return Some(event);
        }

        if self.phantom.is_none() {
            return None;
        }

        if input.secondary_released {
            self.cancel(services);
            return Some(SessionEvent::Canceled);
        }

        if self.rotating {
            if !self.past_threshold {
                let moved = self.rotation_anchor.chebyshev_distance(input.pointer_screen);
                self.past_threshold = moved > sim.config().rotation_threshold_px;
            }
            if self.past_threshold {
                self.rotate_towards_pointer(sim, &input.pointer_ray, services);
            }
        } else {
            self.follow_pointer(sim, &input.pointer_ray, services);
        }

        if input.primary_pressed
            && self.status.is_valid()
            && !input.pointer_over_ui
            && self.can_afford(sim, services)
        {
            self.rotating = true;
            self.rotation_anchor = input.pointer_screen;
            self.past_threshold = false;
        }

        if self.rotating && input.primary_released && !input.pointer_over_ui {
            return Some(match self.confirm(sim, services) {
                Ok(id) => SessionEvent::Placed(id),
                Err(err) => {
                    debug!(%err, "confirmation rejected");
                    SessionEvent::ConfirmRejected(err)
                }
            });
        }

        None
    }

    /// React to an agent's destruction.
    ///
    /// Cancels the placement if the agent was the builder.
    pub fn on_agent_destroyed(
        &mut self,
        agent: AgentId,
        services: &mut dyn GameServices,
    ) -> Option<SessionEvent> {
        if self.builder != Some(agent) {
            return None;
        }
        if self.cancel(services) {
            debug!(builder = agent, "builder destroyed, placement cancelled");
            Some(SessionEvent::Canceled)
        } else {
            self.builder = None;
            None
        }
    }

    /// Place the phantom at its current pose.
    ///
    /// Charges the cost (when resources are required), fixes the structure
    /// and gives the builder a task to construct it.
    ///
    /// # Errors
    ///
    /// - [`GameError::NoActivePlacement`] without a phantom
    /// - [`GameError::InvalidPlacement`] if the last validation was not valid
    /// - [`GameError::InsufficientResources`] if the owner cannot pay
    pub fn confirm(
        &mut self,
        sim: &mut Simulation,
        services: &mut dyn GameServices,
    ) -> Result<StructureId> {
        self.apply_agent_deaths(services);
        let phantom = self.phantom.as_ref().ok_or(GameError::NoActivePlacement)?;
        if !self.status.is_valid() {
            return Err(GameError::InvalidPlacement(self.status));
        }
        let (owner, cost) = (phantom.owner(), phantom.blueprint().cost);
        if !self.can_afford(sim, services) {
            return Err(GameError::InsufficientResources { cost });
        }

        let phantom = self.phantom.take().ok_or(GameError::NoActivePlacement)?;
        let id = sim.place_structure(phantom, services)?;
        if sim.config().require_resources {
            services.deduct(owner, cost);
        }
        if let Some(builder) = self.builder.take() {
            services.queue_build_task(builder, id);
        }

        self.rotating = false;
        self.past_threshold = false;
        services.range_indicators(false);
        Ok(id)
    }

    /// Discard the phantom. Returns whether there was one.
    pub fn cancel(&mut self, services: &mut dyn GameServices) -> bool {
        if self.phantom.take().is_none() {
            return false;
        }
        self.builder = None;
        self.rotating = false;
        self.past_threshold = false;
        self.just_canceled = true;
        services.range_indicators(false);
        debug!("placement cancelled");
        true
    }

    /// Place a structure directly, bypassing pointer input and validation.
    ///
    /// Only affordability is checked. The phantom currently being placed,
    /// if any, and its builder are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the blueprint fails validation or the owner
    /// cannot pay.
    pub fn spawn_structure(
        &mut self,
        sim: &mut Simulation,
        blueprint: &StructureBlueprint,
        owner: PlayerId,
        pose: Pose,
        services: &mut dyn GameServices,
    ) -> Result<StructureId> {
        self.apply_agent_deaths(services);
        let mut structure = Structure::new(blueprint, owner)?;
        structure.set_pose(pose);

        let charge = sim.config().require_resources;
        if charge && !services.can_afford(owner, blueprint.cost) {
            warn!(blueprint = %blueprint.id, owner = owner.0, "cannot afford programmatic placement");
            return Err(GameError::InsufficientResources {
                cost: blueprint.cost,
            });
        }

        let id = sim.place_structure(structure, services)?;
        if charge {
            services.deduct(owner, blueprint.cost);
        }
        Ok(id)
    }

    /// Apply agent deaths queued by the bus handler.
    fn apply_agent_deaths(&mut self, services: &mut dyn GameServices) -> Option<SessionEvent> {
        let destroyed: Vec<AgentId> = self.destroyed_agents.borrow_mut().drain(..).collect();
        let mut outcome = None;
        for agent in destroyed {
            if let Some(event) = self.on_agent_destroyed(agent, services) {
                outcome = Some(event);
            }
        }
        outcome
    }

    fn builder_lost(&self) -> bool {
        self.phantom.is_some()
            && self
                .builder
                .is_some_and(|builder| self.destroyed_agents.borrow().contains(&builder))
    }

    fn can_afford(&self, sim: &Simulation, services: &dyn GameServices) -> bool {
        if !sim.config().require_resources {
            return true;
        }
        self.phantom
            .as_ref()
            .is_some_and(|p| services.can_afford(p.owner(), p.blueprint().cost))
    }

    fn follow_pointer(
        &mut self,
        sim: &Simulation,
        ray: &PointerRay,
        services: &mut dyn GameServices,
    ) {
        let hit = services.query_ray(
            ray.origin,
            ray.direction,
            sim.config().max_ray_distance,
            LayerMask::TERRAIN,
        );
        let Some(phantom) = self.phantom.as_mut() else {
            return;
        };
        match hit {
            Some(point) => {
                phantom.set_pose(Pose::new(point, phantom.pose().yaw));
                self.last_valid_position = point;
                self.status = sim.evaluate_placement(phantom, services);
            }
            None => services.placement_status(self.status),
        }
    }

    fn rotate_towards_pointer(
        &mut self,
        sim: &Simulation,
        ray: &PointerRay,
        services: &mut dyn GameServices,
    ) {
        let Some(point) = services.query_ray(
            ray.origin,
            ray.direction,
            sim.config().max_ray_distance,
            LayerMask::TERRAIN,
        ) else {
            return;
        };
        let Some(phantom) = self.phantom.as_mut() else {
            return;
        };
        let yaw = signed_yaw_degrees(point - self.last_valid_position);
        phantom.set_pose(Pose::new(phantom.pose().position, yaw));
        self.status = sim.evaluate_placement(phantom, services);
    }
}
