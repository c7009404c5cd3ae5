use std::time::Duration;

use tracing::info;

use super::surface::SurfaceProbe;
use super::{LocomotionConfig, LocomotionStrategy};
use crate::app::clock::AR_ALIGNMENT_DELAY;
use crate::app::combat::{try_trigger, TriggerPolicy};
use crate::app::context::SimContext;
use crate::app::input::InputSnapshot;
use crate::app::math::Vec3;
use crate::app::scene::{SceneCommand, SceneWorld, PLAYER_HOVER_HEIGHT};
use crate::content::{MovementMode, DEFAULT_AR_PLAYER_SCALE};

pub const AR_HAZARD_RADIUS: f32 = 0.9;
pub const AR_PORTAL_RADIUS: f32 = 0.6;
const PROBE_HEADROOM: f32 = 2.0;

/// Passthrough mode: the body never translates; the tracked head does the
/// interacting.
pub struct ArLocomotion {
    surfaces: Box<dyn SurfaceProbe>,
    player_scale: f32,
    align_at: Duration,
    aligned: bool,
}

impl ArLocomotion {
    pub fn new(surfaces: Box<dyn SurfaceProbe>) -> Self {
        Self {
            surfaces,
            player_scale: DEFAULT_AR_PLAYER_SCALE,
            align_at: AR_ALIGNMENT_DELAY,
            aligned: false,
        }
    }

    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    /// Rig position plus the scaled head offset, flattened onto the floor.
    pub fn head_position(&self, world: &SceneWorld, input: &InputSnapshot) -> Vec3 {
        let rig = world.player().position();
        (rig + input.head_offset() * self.player_scale).planar()
    }

    fn align(&mut self, world: &mut SceneWorld) {
        let rig = world.player().position();
        let origin = Vec3::new(rig.x, rig.y + PROBE_HEADROOM, rig.z);
        let ground = self.surfaces.surface_below(world, origin).unwrap_or(0.0);
        world.player_mut().transform.position.y = ground + PLAYER_HOVER_HEIGHT;
        self.aligned = true;
        info!(ground, "ar_alignment_applied");
    }
}

impl LocomotionStrategy for ArLocomotion {
    fn mode(&self) -> MovementMode {
        MovementMode::Ar
    }

    fn on_attach(&mut self, ctx: &mut SimContext, _world: &mut SceneWorld) {
        self.aligned = false;
        self.align_at = ctx.now() + AR_ALIGNMENT_DELAY;
    }

    fn on_config_change(&mut self, config: &LocomotionConfig) {
        self.player_scale = if config.ar_player_scale.is_finite() && config.ar_player_scale > 0.0 {
            config.ar_player_scale
        } else {
            DEFAULT_AR_PLAYER_SCALE
        };
    }

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
        if !self.aligned && ctx.now() >= self.align_at {
            self.align(world);
        }

        let head = self.head_position(world, input);
        try_trigger(ctx, world, head, AR_HAZARD_RADIUS, TriggerPolicy::Radius);

        let portal = world
            .entities_within(head, AR_PORTAL_RADIUS)
            .into_iter()
            .find_map(|entity| entity.change_scene.clone());
        if let Some(target) = portal {
            info!(target_scene = %target, "scene_change_triggered");
            ctx.request(SceneCommand::LoadScene(target));
        }
    }
}
