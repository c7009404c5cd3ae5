use std::f32::consts::{FRAC_PI_2, TAU};
use std::time::Duration;

use tracing::debug;

use super::collision::{follow_portal, probe_cell, CellProbe};
use super::{LocomotionConfig, LocomotionStrategy};
use crate::app::clock::{GRID_MOVE_COOLDOWN, TURN_COOLDOWN};
use crate::app::combat::{try_trigger, TriggerPolicy};
use crate::app::context::SimContext;
use crate::app::input::InputSnapshot;
use crate::app::math::{GridCell, Vec3};
use crate::app::scene::SceneWorld;
use crate::content::MovementMode;

/// Reaches the eight neighbouring cells.
pub const GRID_HAZARD_RADIUS: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridState {
    #[default]
    Idle,
    Cooldown {
        until: Duration,
    },
}

/// One tile per pulse, relative to facing. Pulses arriving during the
/// cooldown are dropped.
#[derive(Debug, Default)]
pub struct GridLocomotion {
    state: GridState,
}

impl GridLocomotion {
    pub fn state(&self) -> GridState {
        self.state
    }
}

/// Picks one cardinal step from the local input axis and rotates it by yaw.
/// Forward/back wins over strafing.
fn grid_step(axis: Vec3, yaw_radians: f32) -> Option<(i64, i64)> {
    let local = if axis.z != 0.0 {
        Vec3::new(0.0, 0.0, axis.z.signum())
    } else if axis.x != 0.0 {
        Vec3::new(axis.x.signum(), 0.0, 0.0)
    } else {
        return None;
    };
    let world = local.rotate_yaw(yaw_radians);
    let step = (world.x.round() as i64, world.z.round() as i64);
    (step != (0, 0)).then_some(step)
}

fn wrap_yaw(yaw_radians: f32) -> f32 {
    yaw_radians.rem_euclid(TAU)
}

impl LocomotionStrategy for GridLocomotion {
    fn mode(&self) -> MovementMode {
        MovementMode::Grid
    }

    fn on_attach(&mut self, _ctx: &mut SimContext, world: &mut SceneWorld) {
        self.state = GridState::Idle;
        let Some(geometry) = world.geometry() else {
            return;
        };
        // Steps are whole cells from a cell centre.
        let player = world.player_mut();
        let cell = geometry.cell_at(player.transform.position);
        let center = geometry.cell_center(cell.x, cell.z);
        player.transform.position.x = center.x;
        player.transform.position.z = center.z;
    }

    fn on_config_change(&mut self, _config: &LocomotionConfig) {}

    fn on_tick(
        &mut self,
        _dt: Duration,
        input: &InputSnapshot,
        ctx: &mut SimContext,
        world: &mut SceneWorld,
    ) {
        if ctx.movement_lock.is_locked() {
            return;
        }
        let now = ctx.now();
        if let GridState::Cooldown { until } = self.state {
            if now < until {
                return;
            }
            self.state = GridState::Idle;
        }

        let turn = input.turn_axis();
        if turn != 0.0 {
            let transform = &mut world.player_mut().transform;
            transform.yaw_radians = wrap_yaw(transform.yaw_radians + turn * FRAC_PI_2);
            self.state = GridState::Cooldown {
                until: now + TURN_COOLDOWN,
            };
            return;
        }

        let yaw = world.player().transform.yaw_radians;
        let Some((dx, dz)) = grid_step(input.move_axis(), yaw) else {
            return;
        };
        self.state = GridState::Cooldown {
            until: now + GRID_MOVE_COOLDOWN,
        };
        let Some(geometry) = world.geometry() else {
            return;
        };

        let position = world.player().position();
        let from = geometry.cell_at(position);
        let target = GridCell {
            x: from.x + dx,
            z: from.z + dz,
        };
        let direction = Vec3::new(dx as f32, 0.0, dz as f32);
        // Only a hazard standing on the target cell holds the move back.
        let engaged = try_trigger(
            ctx,
            world,
            position,
            GRID_HAZARD_RADIUS,
            TriggerPolicy::Cone { direction },
        )
        .and_then(|id| world.find_entity(id))
        .is_some_and(|hazard| hazard.cell == target);

        let probe = probe_cell(world, target);
        if follow_portal(ctx, &probe) {
            return;
        }
        if probe == CellProbe::Passable && !engaged {
            let center = geometry.cell_center(target.x, target.z);
            let player = world.player_mut();
            player.transform.position.x = center.x;
            player.transform.position.z = center.z;
        } else {
            debug!(x = target.x, z = target.z, probe = ?probe, engaged, "grid_move_blocked");
        }
    }
}
