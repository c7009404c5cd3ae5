use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::{DeferredAction, SCENE_CHANGED_DELAY};
use super::context::SimContext;
use super::locomotion::{FreeTuning, LocomotionComponent, LocomotionConfig};
use super::math::{GridGeometry, Transform};
use super::scene::{
    CollisionCell, CollisionGrid, CollisionGridError, Environment, Player, SceneWorld,
    PLAYER_HOVER_HEIGHT,
};
use super::spawner::{border_ring, Spawner};
use crate::content::{CellRead, MovementMode, SceneDef, SpriteCatalog, WorldDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unloaded,
    Loading,
    Active,
    Unloading,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("scene `{scene_id}` does not exist in the world document")]
    SceneNotFound { scene_id: String },
    #[error("no scene is loaded")]
    NoActiveScene,
    #[error("the world document has no scenes")]
    EmptyWorld,
    #[error("scene `{scene_id}` has an unusable collision layer: {source}")]
    CollisionLayer {
        scene_id: String,
        #[source]
        source: CollisionGridError,
    },
}

/// Delivered 300 ms after a scene finished loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneChanged {
    pub scene_id: String,
    pub epoch: u64,
}

pub trait SceneObserver {
    fn on_scene_changed(&mut self, event: &SceneChanged);
}

/// Everything a scene build touches. The world document is only read.
pub(crate) struct SceneEnv<'a> {
    pub document: &'a WorldDocument,
    pub catalog: &'a SpriteCatalog,
    pub world: &'a mut SceneWorld,
    pub ctx: &'a mut SimContext,
    pub locomotion: &'a mut LocomotionComponent,
    pub movement_override: Option<MovementMode>,
    pub free_tuning: FreeTuning,
}

pub struct SceneLifecycle {
    state: LifecycleState,
    current_scene: Option<String>,
    observers: Vec<Box<dyn SceneObserver>>,
}

impl Default for SceneLifecycle {
    fn default() -> Self {
        Self {
            state: LifecycleState::Unloaded,
            current_scene: None,
            observers: Vec::new(),
        }
    }
}

impl SceneLifecycle {
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn current_scene_id(&self) -> Option<&str> {
        self.current_scene.as_deref()
    }

    pub fn add_observer(&mut self, observer: Box<dyn SceneObserver>) {
        self.observers.push(observer);
    }

    /// Tears down the live scene and builds `scene_id` in its place. An
    /// unknown id leaves the current scene untouched.
    pub(crate) fn load_scene(
        &mut self,
        scene_id: &str,
        env: SceneEnv<'_>,
    ) -> Result<(), LifecycleError> {
        let Some(scene) = env.document.scene(scene_id) else {
            warn!(scene_id, "scene_not_found");
            return Err(LifecycleError::SceneNotFound {
                scene_id: scene_id.to_string(),
            });
        };
        let geometry = GridGeometry::new(scene.size.max(1));
        let grid = collision_grid_for(scene, geometry).map_err(|source| {
            LifecycleError::CollisionLayer {
                scene_id: scene_id.to_string(),
                source,
            }
        })?;

        self.teardown(env.ctx, env.world, env.locomotion);
        self.state = LifecycleState::Loading;

        env.world.set_collision_grid(grid);
        let mut spawn = geometry.cell_center(
            i64::from(scene.player_spawn.x),
            i64::from(scene.player_spawn.z),
        );
        spawn.y = PLAYER_HOVER_HEIGHT;
        env.world.reset_player(Player::at(Transform {
            position: spawn,
            yaw_radians: 0.0,
        }));
        env.world.set_environment(Environment {
            background_color: scene.background_color.clone(),
            fog: scene.fog,
        });

        let spawner = Spawner::new(env.catalog, geometry);
        let size = i64::from(geometry.size);
        let mut spawned = 0usize;
        for layer in scene.layers_by_index() {
            for (x, z, sprite_id) in layer.occupied_cells() {
                let (x, z) = (x as i64, z as i64);
                if x >= size || z >= size {
                    continue;
                }
                let render_kind = env
                    .catalog
                    .get(sprite_id)
                    .map(|sprite| sprite.render_kind)
                    .unwrap_or_default();
                if spawner
                    .spawn(env.world, x, layer.index, z, sprite_id, render_kind)
                    .is_some()
                {
                    spawned += 1;
                }
            }
        }
        if scene.enable_borders {
            for (x, z) in border_ring(geometry.size) {
                spawner.spawn_border_marker(env.world, x, z);
            }
        }
        env.world.apply_pending();

        env.ctx.movement_lock.release_all("scene_loaded");
        let mode = env.movement_override.unwrap_or(scene.movement_mode);
        let config = LocomotionConfig {
            ar_player_scale: scene.ar_player_scale,
            free: env.free_tuning,
        };
        env.locomotion.attach(mode, &config, env.ctx, env.world);

        self.state = LifecycleState::Active;
        self.current_scene = Some(scene.id.clone());
        env.ctx.schedule(
            SCENE_CHANGED_DELAY,
            DeferredAction::NotifySceneChanged {
                scene_id: scene.id.clone(),
                epoch: env.world.epoch(),
            },
        );
        info!(
            scene = %scene.id,
            size = scene.size,
            entity_count = env.world.entity_count(),
            spawned,
            movement_mode = mode.as_token(),
            "scene_loaded"
        );
        Ok(())
    }

    /// Active → Unloading → Unloaded.
    pub(crate) fn unload(
        &mut self,
        ctx: &mut SimContext,
        world: &mut SceneWorld,
        locomotion: &mut LocomotionComponent,
    ) {
        let Some(scene_id) = self.current_scene.clone() else {
            return;
        };
        self.teardown(ctx, world, locomotion);
        self.state = LifecycleState::Unloaded;
        info!(scene = %scene_id, "scene_unloaded");
    }

    fn teardown(
        &mut self,
        ctx: &mut SimContext,
        world: &mut SceneWorld,
        locomotion: &mut LocomotionComponent,
    ) {
        if self.state == LifecycleState::Active {
            self.state = LifecycleState::Unloading;
        }
        locomotion.detach(ctx, world);
        world.clear();
        self.current_scene = None;
    }

    /// Hands a scene-changed notice to every observer unless another load
    /// happened since it was scheduled.
    pub(crate) fn dispatch_scene_changed(&mut self, current_epoch: u64, event: &SceneChanged) {
        if event.epoch != current_epoch {
            debug!(
                scene = %event.scene_id,
                epoch = event.epoch,
                current_epoch,
                "scene_changed_dropped_stale"
            );
            return;
        }
        for observer in &mut self.observers {
            observer.on_scene_changed(event);
        }
        info!(
            scene = %event.scene_id,
            observer_count = self.observers.len(),
            "scene_changed_dispatched"
        );
    }
}

/// Reads layer 0 cell by cell. Cells missing from a malformed layer become
/// unreadable, which blocks movement.
fn collision_grid_for(
    scene: &SceneDef,
    geometry: GridGeometry,
) -> Result<CollisionGrid, CollisionGridError> {
    let size = i64::from(geometry.size);
    let layer = scene.collision_layer();
    let mut cells = Vec::with_capacity((size * size) as usize);
    for z in 0..size {
        for x in 0..size {
            let cell = match layer.map(|layer| layer.cell(x, z)) {
                Some(CellRead::OutOfRange) => CollisionCell::Unreadable,
                _ => CollisionCell::Open,
            };
            cells.push(cell);
        }
    }
    CollisionGrid::new(geometry, cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::math::GridCell;
    use crate::content::LayerDef;

    #[test]
    fn short_rows_become_unreadable_cells() {
        let mut scene = SceneDef::new("S", 3);
        scene.layers = vec![LayerDef {
            index: 0,
            grid: vec![vec![None, None, None], vec![None], vec![None, None, None]],
        }];
        let grid = collision_grid_for(&scene, GridGeometry::new(3)).expect("grid");
        assert_eq!(grid.cell(GridCell { x: 0, z: 1 }), Some(CollisionCell::Open));
        assert_eq!(grid.cell(GridCell { x: 1, z: 1 }), Some(CollisionCell::Unreadable));
        assert_eq!(grid.cell(GridCell { x: 2, z: 2 }), Some(CollisionCell::Open));
    }

    #[test]
    fn missing_collision_layer_is_open() {
        let mut scene = SceneDef::new("S", 2);
        scene.layers.clear();
        let grid = collision_grid_for(&scene, GridGeometry::new(2)).expect("grid");
        for z in 0..2 {
            for x in 0..2 {
                assert_eq!(grid.cell(GridCell { x, z }), Some(CollisionCell::Open));
            }
        }
    }
}
