use std::time::Duration;

use thiserror::Error;

use super::math::{GridCell, GridGeometry, Transform, Vec3};
use crate::content::{FogSettings, RenderKind, COLLISION_LAYER_INDEX, DEFAULT_BACKGROUND_COLOR};

pub const PLAYER_MAX_HEALTH: i32 = 100;
/// Height of the player origin above the ground it stands on.
pub const PLAYER_HOVER_HEIGHT: f32 = 0.5;

/// Transition requested during a tick; applied once the tick has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneCommand {
    LoadScene(String),
    ReloadCurrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// An entity id pinned to the container epoch it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    pub epoch: u64,
    pub id: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderableKind {
    SolidBlock,
    Billboard,
    PointCloud { point_count: usize },
    Mesh,
    BorderMarker,
}

impl RenderableKind {
    pub fn is_solid(self) -> bool {
        matches!(self, Self::SolidBlock | Self::Mesh)
    }

    pub fn render_kind(self) -> Option<RenderKind> {
        match self {
            Self::SolidBlock => Some(RenderKind::SolidBlock),
            Self::Billboard => Some(RenderKind::Billboard),
            Self::PointCloud { .. } => Some(RenderKind::PointCloud),
            Self::Mesh => Some(RenderKind::Mesh),
            Self::BorderMarker => None,
        }
    }
}

/// Positioned, scaled visual primitive handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableDesc {
    pub kind: RenderableKind,
    pub scale: f32,
    pub asset: Option<String>,
    pub attack_asset: Option<String>,
    pub showing_attack: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardState {
    Alive,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifeState {
    pub max_life: i32,
    pub current_life: i32,
    pub last_damage_time: Option<Duration>,
    pub state: HazardState,
}

impl LifeState {
    pub fn new(max_life: i32) -> Self {
        Self {
            max_life,
            current_life: max_life,
            last_damage_time: None,
            state: HazardState::Alive,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state == HazardState::Alive
    }

    pub fn fraction(&self) -> f32 {
        if self.max_life <= 0 {
            return 0.0;
        }
        (self.current_life as f32 / self.max_life as f32).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthBar {
    pub fraction: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPlacement {
    World,
    Hud,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProximityText {
    pub text: String,
    pub distance: f32,
    pub placement: TextPlacement,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub transform: Transform,
    pub renderable: RenderableDesc,
    pub sprite_id: String,
    pub cell: GridCell,
    pub layer_index: i32,
    pub collision: bool,
    pub change_scene: Option<String>,
    /// Border markers are scenery only and never take part in queries.
    pub interactive: bool,
    pub life: Option<LifeState>,
    pub health_bar: Option<HealthBar>,
    pub texts: Vec<ProximityText>,
}

impl Entity {
    pub fn is_live_hazard(&self) -> bool {
        self.interactive && self.life.as_ref().is_some_and(LifeState::is_alive)
    }

    /// Top face height, used as a walkable surface.
    pub fn top(&self) -> f32 {
        self.transform.position.y + self.renderable.scale / 2.0
    }

    pub fn covers_point(&self, point: Vec3) -> bool {
        let half = self.renderable.scale / 2.0;
        (point.x - self.transform.position.x).abs() <= half
            && (point.z - self.transform.position.z).abs() <= half
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Player {
    pub transform: Transform,
    pub health: i32,
    pub max_health: i32,
}

impl Player {
    pub fn at(transform: Transform) -> Self {
        Self {
            transform,
            health: PLAYER_MAX_HEALTH,
            max_health: PLAYER_MAX_HEALTH,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::at(Transform::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub background_color: String,
    pub fog: FogSettings,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            fog: FogSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionCell {
    /// The authored layer had no cell here (short row or missing row).
    Unreadable,
    Open,
    Occupied(EntityId),
}

/// Occupancy of the collision layer, indexed `z * size + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionGrid {
    geometry: GridGeometry,
    cells: Vec<CollisionCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CollisionGridError {
    #[error("cell count mismatch: expected {expected}, got {actual}")]
    CellCountMismatch { expected: usize, actual: usize },
}

impl CollisionGrid {
    pub fn new(geometry: GridGeometry, cells: Vec<CollisionCell>) -> Result<Self, CollisionGridError> {
        let expected = geometry.size as usize * geometry.size as usize;
        let actual = cells.len();
        if expected != actual {
            return Err(CollisionGridError::CellCountMismatch { expected, actual });
        }
        Ok(Self { geometry, cells })
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn index_of(&self, cell: GridCell) -> Option<usize> {
        if !self.geometry.contains(cell) {
            return None;
        }
        Some(cell.z as usize * self.geometry.size as usize + cell.x as usize)
    }

    /// `None` means outside the grid.
    pub fn cell(&self, cell: GridCell) -> Option<CollisionCell> {
        self.index_of(cell)
            .and_then(|index| self.cells.get(index).copied())
    }

    fn occupy(&mut self, cell: GridCell, id: EntityId) {
        if let Some(slot) = self.index_of(cell).and_then(|index| self.cells.get_mut(index)) {
            if *slot == CollisionCell::Open {
                *slot = CollisionCell::Occupied(id);
            }
        }
    }

    fn vacate(&mut self, id: EntityId) {
        for slot in &mut self.cells {
            if *slot == CollisionCell::Occupied(id) {
                *slot = CollisionCell::Open;
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Live container for the active scene. Spawns and despawns are staged and
/// only become visible after `apply_pending`.
#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    epoch: u64,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    player: Player,
    environment: Environment,
    collision: Option<CollisionGrid>,
}

impl SceneWorld {
    pub(crate) fn stage_spawn(&mut self, build: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(build(id));
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_spawns.is_empty() {
            for entity in self.pending_spawns.drain(..) {
                if let Some(grid) = self.collision.as_mut() {
                    if entity.interactive && entity.layer_index == COLLISION_LAYER_INDEX {
                        grid.occupy(entity.cell, entity.id);
                    }
                }
                self.entities.push(entity);
            }
        }

        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            if let Some(grid) = self.collision.as_mut() {
                for id in pending {
                    grid.vacate(*id);
                }
            }
            self.pending_despawns.clear();
        }
    }

    /// Drops every entity and bumps the epoch, invalidating outstanding
    /// handles.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.player = Player::default();
        self.environment = Environment::default();
        self.collision = None;
        self.epoch = self.epoch.saturating_add(1);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn handle(&self, id: EntityId) -> EntityHandle {
        EntityHandle {
            epoch: self.epoch,
            id,
        }
    }

    pub fn resolve(&self, handle: EntityHandle) -> Option<&Entity> {
        if handle.epoch != self.epoch {
            return None;
        }
        self.find_entity(handle.id)
    }

    pub fn resolve_mut(&mut self, handle: EntityHandle) -> Option<&mut Entity> {
        if handle.epoch != self.epoch {
            return None;
        }
        self.find_entity_mut(handle.id)
    }

    pub fn set_collision_grid(&mut self, grid: CollisionGrid) {
        self.collision = Some(grid);
    }

    pub fn collision_grid(&self) -> Option<&CollisionGrid> {
        self.collision.as_ref()
    }

    pub fn geometry(&self) -> Option<GridGeometry> {
        self.collision.as_ref().map(CollisionGrid::geometry)
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn reset_player(&mut self, player: Player) {
        self.player = player;
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = environment;
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    /// Interactive layer-0 entities whose planar distance to `center` is at
    /// most `radius`, nearest first. Other layers are scenery.
    pub fn entities_within(&self, center: Vec3, radius: f32) -> Vec<&Entity> {
        let mut found: Vec<(f32, &Entity)> = self
            .entities
            .iter()
            .filter(|entity| entity.interactive && entity.layer_index == COLLISION_LAYER_INDEX)
            .map(|entity| (center.planar_distance(entity.transform.position), entity))
            .filter(|(distance, _)| *distance <= radius)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found.into_iter().map(|(_, entity)| entity).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: EntityId, cell: GridCell, collision: bool) -> Entity {
        Entity {
            id,
            transform: Transform::default(),
            renderable: RenderableDesc {
                kind: RenderableKind::SolidBlock,
                scale: 1.0,
                asset: None,
                attack_asset: None,
                showing_attack: false,
            },
            sprite_id: "wall".to_string(),
            cell,
            layer_index: 0,
            collision,
            change_scene: None,
            interactive: true,
            life: None,
            health_bar: None,
            texts: Vec::new(),
        }
    }

    fn open_grid(size: u32) -> CollisionGrid {
        let count = size as usize * size as usize;
        CollisionGrid::new(GridGeometry::new(size), vec![CollisionCell::Open; count])
            .expect("valid grid")
    }

    #[test]
    fn collision_grid_rejects_wrong_cell_count() {
        let result = CollisionGrid::new(GridGeometry::new(3), vec![CollisionCell::Open; 8]);
        assert_eq!(
            result,
            Err(CollisionGridError::CellCountMismatch {
                expected: 9,
                actual: 8
            })
        );
    }

    #[test]
    fn out_of_range_cells_read_as_none() {
        let grid = open_grid(3);
        assert_eq!(grid.cell(GridCell { x: 3, z: 0 }), None);
        assert_eq!(grid.cell(GridCell { x: 0, z: -1 }), None);
        assert_eq!(grid.cell(GridCell { x: 2, z: 2 }), Some(CollisionCell::Open));
    }

    #[test]
    fn staged_entities_appear_after_apply_pending_and_occupy_cells() {
        let mut world = SceneWorld::default();
        world.set_collision_grid(open_grid(4));
        let cell = GridCell { x: 1, z: 2 };
        let id = world.stage_spawn(|id| entity(id, cell, true));
        assert_eq!(world.entity_count(), 0);

        world.apply_pending();
        assert_eq!(world.entity_count(), 1);
        let grid = world.collision_grid().expect("grid");
        assert_eq!(grid.cell(cell), Some(CollisionCell::Occupied(id)));

        assert!(world.despawn(id));
        world.apply_pending();
        assert_eq!(world.entity_count(), 0);
        let grid = world.collision_grid().expect("grid");
        assert_eq!(grid.cell(cell), Some(CollisionCell::Open));
    }

    #[test]
    fn clear_invalidates_handles_from_previous_epoch() {
        let mut world = SceneWorld::default();
        let id = world.stage_spawn(|id| entity(id, GridCell::default(), false));
        world.apply_pending();
        let handle = world.handle(id);
        assert!(world.resolve(handle).is_some());

        world.clear();
        let id_again = world.stage_spawn(|id| entity(id, GridCell::default(), false));
        world.apply_pending();
        assert!(world.resolve(handle).is_none());
        assert!(world.resolve(world.handle(id_again)).is_some());
    }

    #[test]
    fn entities_within_sorts_nearest_first_and_skips_scenery_and_other_layers() {
        let mut world = SceneWorld::default();
        let far = world.stage_spawn(|id| {
            let mut e = entity(id, GridCell::default(), false);
            e.transform.position = Vec3::new(2.0, 0.0, 0.0);
            e
        });
        let near = world.stage_spawn(|id| {
            let mut e = entity(id, GridCell::default(), false);
            e.transform.position = Vec3::new(0.5, 3.0, 0.0);
            e
        });
        world.stage_spawn(|id| {
            let mut e = entity(id, GridCell::default(), false);
            e.interactive = false;
            e
        });
        world.stage_spawn(|id| {
            let mut e = entity(id, GridCell::default(), false);
            e.layer_index = -1;
            e
        });
        world.apply_pending();

        let ids: Vec<EntityId> = world
            .entities_within(Vec3::ZERO, 2.5)
            .into_iter()
            .map(|entity| entity.id)
            .collect();
        assert_eq!(ids, vec![near, far]);
    }
}
