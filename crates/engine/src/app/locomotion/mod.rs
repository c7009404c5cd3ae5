mod ar;
mod collision;
mod free;
mod grid;
mod surface;

use std::time::Duration;

use tracing::info;

use super::context::SimContext;
use super::input::InputSnapshot;
use super::scene::SceneWorld;
use crate::content::{MovementMode, DEFAULT_AR_PLAYER_SCALE};

pub use ar::{ArLocomotion, AR_HAZARD_RADIUS, AR_PORTAL_RADIUS};
pub use collision::{probe_cell, CellProbe};
pub use free::{FreeLocomotion, FreeTuning, FREE_HAZARD_RADIUS};
pub use grid::{GridLocomotion, GridState, GRID_HAZARD_RADIUS};
pub use surface::{BlockSurfaceProbe, SurfaceProbe};

/// Per-scene settings pushed into the active strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocomotionConfig {
    pub ar_player_scale: f32,
    pub free: FreeTuning,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            ar_player_scale: DEFAULT_AR_PLAYER_SCALE,
            free: FreeTuning::default(),
        }
    }
}

/// One movement algorithm for the player. Every variant checks the movement
/// lock before doing anything else in `on_tick`.
pub trait LocomotionStrategy {
    fn mode(&self) -> MovementMode;
    fn on_attach(&mut self, ctx: &mut SimContext, world: &mut SceneWorld);
    fn on_config_change(&mut self, config: &LocomotionConfig);
    fn on_tick(
        &mut self,
        dt: Duration,
        input: &InputSnapshot,
        ctx: &mut SimContext,
        world: &mut SceneWorld,
    );
    fn on_detach(&mut self, _ctx: &mut SimContext, _world: &mut SceneWorld) {}
}

pub fn strategy_for(mode: MovementMode) -> Box<dyn LocomotionStrategy> {
    match mode {
        MovementMode::Grid => Box::new(GridLocomotion::default()),
        MovementMode::Free => Box::new(FreeLocomotion::new(Box::new(BlockSurfaceProbe))),
        MovementMode::Ar => Box::new(ArLocomotion::new(Box::new(BlockSurfaceProbe))),
    }
}

/// Holds the strategy attached to the current player, if any.
#[derive(Default)]
pub struct LocomotionComponent {
    strategy: Option<Box<dyn LocomotionStrategy>>,
}

impl LocomotionComponent {
    pub fn mode(&self) -> Option<MovementMode> {
        self.strategy.as_ref().map(|strategy| strategy.mode())
    }

    pub fn attach(
        &mut self,
        mode: MovementMode,
        config: &LocomotionConfig,
        ctx: &mut SimContext,
        world: &mut SceneWorld,
    ) {
        self.detach(ctx, world);
        let mut strategy = strategy_for(mode);
        strategy.on_config_change(config);
        strategy.on_attach(ctx, world);
        info!(movement_mode = mode.as_token(), "locomotion_attached");
        self.strategy = Some(strategy);
    }

    pub fn reconfigure(&mut self, config: &LocomotionConfig) {
        if let Some(strategy) = self.strategy.as_mut() {
            strategy.on_config_change(config);
        }
    }

    pub fn detach(&mut self, ctx: &mut SimContext, world: &mut SceneWorld) {
        if let Some(mut strategy) = self.strategy.take() {
            strategy.on_detach(ctx, world);
        }
    }

    pub fn tick(
        &mut self,
        dt: Duration,
        input: &InputSnapshot,
        ctx: &mut SimContext,
        world: &mut SceneWorld,
    ) {
        if let Some(strategy) = self.strategy.as_mut() {
            strategy.on_tick(dt, input, ctx, world);
        }
    }
}
