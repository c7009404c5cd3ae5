use std::time::Duration;

use tracing::debug;

use super::collision::{follow_portal, probe_cell, CellProbe};
use super::surface::SurfaceProbe;
use super::{LocomotionConfig, LocomotionStrategy};
use crate::app::combat::{try_trigger, TriggerPolicy};
use crate::app::context::SimContext;
use crate::app::input::InputSnapshot;
use crate::app::math::Vec3;
use crate::app::scene::{SceneWorld, PLAYER_HOVER_HEIGHT};
use crate::content::MovementMode;

pub const FREE_HAZARD_RADIUS: f32 = 1.0;
/// Ground probes start this far above the player.
const PROBE_HEADROOM: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeTuning {
    /// World units per second.
    pub speed: f32,
    /// Radians per second while a turn action is held.
    pub turn_rate: f32,
    /// Extra distance the collision probe is pushed along the move direction.
    pub collision_margin: f32,
    pub step_height: f32,
    pub hover_height: f32,
    /// World units per second while no ground is found.
    pub fall_rate: f32,
    pub stick_dead_zone: f32,
}

impl Default for FreeTuning {
    fn default() -> Self {
        Self {
            speed: 3.0,
            turn_rate: 2.5,
            collision_margin: 0.3,
            step_height: 0.5,
            hover_height: PLAYER_HOVER_HEIGHT,
            fall_rate: 4.0,
            stick_dead_zone: 0.2,
        }
    }
}

/// Continuous movement with ground following.
pub struct FreeLocomotion {
    tuning: FreeTuning,
    surfaces: Box<dyn SurfaceProbe>,
    last_safe_position: Vec3,
    last_ground: Option<f32>,
}

impl FreeLocomotion {
    pub fn new(surfaces: Box<dyn SurfaceProbe>) -> Self {
        Self {
            tuning: FreeTuning::default(),
            surfaces,
            last_safe_position: Vec3::ZERO,
            last_ground: None,
        }
    }

    /// Local-frame direction, analog stick first when it leaves the dead
    /// zone. Length is at most one.
    fn local_direction(&self, input: &InputSnapshot) -> Vec3 {
        if let Some((right, forward)) = input.analog_stick() {
            let stick = Vec3::new(right, 0.0, -forward);
            let magnitude = stick.length();
            if magnitude > self.tuning.stick_dead_zone {
                return stick * (magnitude.min(1.0) / magnitude);
            }
        }
        input.move_axis().normalized_or_zero()
    }

    fn follow_ground(&mut self, world: &SceneWorld, mut next: Vec3, dt_seconds: f32) -> Vec3 {
        let origin = Vec3::new(next.x, next.y + PROBE_HEADROOM, next.z);
        match self.surfaces.surface_below(world, origin) {
            Some(ground)
                if self
                    .last_ground
                    .is_some_and(|previous| ground - previous > self.tuning.step_height) =>
            {
                debug!(ground, "step_too_high");
                self.last_safe_position
            }
            Some(ground) => {
                next.y = ground + self.tuning.hover_height;
                self.last_ground = Some(ground);
                self.last_safe_position = next;
                next
            }
            None => {
                next.y -= self.tuning.fall_rate * dt_seconds;
                next
            }
        }
    }
}

impl LocomotionStrategy for FreeLocomotion {
    fn mode(&self) -> MovementMode {
        MovementMode::Free
    }

    fn on_attach(&mut self, _ctx: &mut SimContext, world: &mut SceneWorld) {
        let position = world.player().position();
        let origin = Vec3::new(position.x, position.y + PROBE_HEADROOM, position.z);
        self.last_ground = self.surfaces.surface_below(world, origin);
        self.last_safe_position = position;
    }

    fn on_config_change(&mut self, config: &LocomotionConfig) {
        self.tuning = config.free;
    }

    fn on_tick(
        &mut self,
        dt: Duration,
        input: &InputSnapshot,
        ctx: &mut SimContext,
        world: &mut SceneWorld,
    ) {
        if ctx.movement_lock.is_locked() {
            return;
        }
        let dt_seconds = dt.as_secs_f32();

        let turn = input.turn_axis();
        if turn != 0.0 {
            world.player_mut().transform.yaw_radians += turn * self.tuning.turn_rate * dt_seconds;
        }

        let transform = world.player().transform;
        let mut next = transform.position;
        let direction = self.local_direction(input).rotate_yaw(transform.yaw_radians);
        if direction != Vec3::ZERO {
            let heading = direction.normalized_or_zero();
            let candidate = next + direction * (self.tuning.speed * dt_seconds);
            let engaged = try_trigger(
                ctx,
                world,
                next,
                FREE_HAZARD_RADIUS,
                TriggerPolicy::Cone { direction: heading },
            );

            let probe_point = candidate + heading * self.tuning.collision_margin;
            let probe_target = world.geometry().map(|geometry| geometry.cell_at(probe_point));
            let probe = match probe_target {
                Some(cell) => probe_cell(world, cell),
                None => CellProbe::OutOfBounds,
            };
            let engaged = engaged
                .and_then(|id| world.find_entity(id))
                .is_some_and(|hazard| Some(hazard.cell) == probe_target);
            if follow_portal(ctx, &probe) {
                return;
            }
            if probe == CellProbe::Passable && !engaged {
                next = candidate;
            }
        }

        let settled = self.follow_ground(world, next, dt_seconds);
        world.player_mut().transform.position = settled;
    }
}
