use tracing::info;

use crate::app::context::SimContext;
use crate::app::math::GridCell;
use crate::app::scene::{CollisionCell, SceneCommand, SceneWorld};

/// Result of testing one cell of the collision layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellProbe {
    OutOfBounds,
    Blocked,
    /// Always transitions, and blocks the move in the current scene.
    Portal(String),
    Passable,
}

pub fn probe_cell(world: &SceneWorld, cell: GridCell) -> CellProbe {
    let Some(grid) = world.collision_grid() else {
        return CellProbe::OutOfBounds;
    };
    match grid.cell(cell) {
        None => CellProbe::OutOfBounds,
        Some(CollisionCell::Unreadable) => CellProbe::Blocked,
        Some(CollisionCell::Open) => CellProbe::Passable,
        Some(CollisionCell::Occupied(id)) => match world.find_entity(id) {
            Some(entity) => match &entity.change_scene {
                Some(target) => CellProbe::Portal(target.clone()),
                None if entity.collision => CellProbe::Blocked,
                None => CellProbe::Passable,
            },
            None => CellProbe::Passable,
        },
    }
}

/// Queues the transition for a portal probe. Returns true when the probe was
/// a portal.
pub(crate) fn follow_portal(ctx: &mut SimContext, probe: &CellProbe) -> bool {
    let CellProbe::Portal(target) = probe else {
        return false;
    };
    info!(target_scene = %target, "scene_change_triggered");
    ctx.request(SceneCommand::LoadScene(target.clone()));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::math::{GridGeometry, Transform};
    use crate::app::scene::{CollisionGrid, Entity, RenderableDesc, RenderableKind};

    fn world_with(cells: Vec<CollisionCell>, size: u32) -> SceneWorld {
        let mut world = SceneWorld::default();
        world.set_collision_grid(CollisionGrid::new(GridGeometry::new(size), cells).expect("grid"));
        world
    }

    fn stage(world: &mut SceneWorld, cell: GridCell, collision: bool, change_scene: Option<&str>) {
        world.stage_spawn(|id| Entity {
            id,
            transform: Transform::default(),
            renderable: RenderableDesc {
                kind: RenderableKind::SolidBlock,
                scale: 1.0,
                asset: None,
                attack_asset: None,
                showing_attack: false,
            },
            sprite_id: "tile".to_string(),
            cell,
            layer_index: 0,
            collision,
            change_scene: change_scene.map(ToString::to_string),
            interactive: true,
            life: None,
            health_bar: None,
            texts: Vec::new(),
        });
    }

    #[test]
    fn classifies_cells() {
        let mut world = world_with(vec![CollisionCell::Open; 4], 2);
        stage(&mut world, GridCell { x: 1, z: 0 }, true, None);
        stage(&mut world, GridCell { x: 0, z: 1 }, true, Some("T"));
        world.apply_pending();

        assert_eq!(probe_cell(&world, GridCell { x: 0, z: 0 }), CellProbe::Passable);
        assert_eq!(probe_cell(&world, GridCell { x: 1, z: 0 }), CellProbe::Blocked);
        assert_eq!(
            probe_cell(&world, GridCell { x: 0, z: 1 }),
            CellProbe::Portal("T".to_string())
        );
        assert_eq!(probe_cell(&world, GridCell { x: 2, z: 0 }), CellProbe::OutOfBounds);
    }

    #[test]
    fn unreadable_cells_block() {
        let mut cells = vec![CollisionCell::Open; 4];
        cells[3] = CollisionCell::Unreadable;
        let world = world_with(cells, 2);
        assert_eq!(probe_cell(&world, GridCell { x: 1, z: 1 }), CellProbe::Blocked);
    }

    #[test]
    fn no_scene_means_everything_is_out_of_bounds() {
        let world = SceneWorld::default();
        assert_eq!(probe_cell(&world, GridCell::default()), CellProbe::OutOfBounds);
    }
}
