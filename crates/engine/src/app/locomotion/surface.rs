use crate::app::math::Vec3;
use crate::app::scene::SceneWorld;

/// Answers "what is the highest walkable surface at or below this point".
pub trait SurfaceProbe {
    fn surface_below(&self, world: &SceneWorld, point: Vec3) -> Option<f32>;
}

/// Uses the top faces of solid entities (blocks and meshes). The player is
/// not an entity, so it never hits itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockSurfaceProbe;

impl SurfaceProbe for BlockSurfaceProbe {
    fn surface_below(&self, world: &SceneWorld, point: Vec3) -> Option<f32> {
        world
            .entities()
            .iter()
            .filter(|entity| entity.renderable.kind.is_solid())
            .filter(|entity| entity.covers_point(point))
            .map(|entity| entity.top())
            .filter(|top| *top <= point.y + 1e-4)
            .max_by(f32::total_cmp)
    }
}
