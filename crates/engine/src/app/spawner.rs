use tracing::{debug, warn};

use super::capabilities::attach_capabilities;
use super::math::{GridCell, GridGeometry, Transform};
use super::scene::{Entity, EntityId, RenderableDesc, RenderableKind, SceneWorld};
use crate::content::{NamedSize, RenderKind, SpriteCatalog, SpriteDef, SpriteSize};

/// Uniform scale plus the vertical shift that keeps the base on the layer
/// floor, both in tile units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeTransform {
    pub scale: f32,
    pub offset: f32,
}

pub fn size_transform(size: SpriteSize) -> SizeTransform {
    match size {
        SpriteSize::Named(NamedSize::Small) => SizeTransform {
            scale: 0.5,
            offset: -0.25,
        },
        SpriteSize::Named(NamedSize::Normal) => SizeTransform {
            scale: 1.0,
            offset: 0.0,
        },
        SpriteSize::Named(NamedSize::Big) => SizeTransform {
            scale: 2.0,
            offset: 0.5,
        },
        SpriteSize::Explicit(scale) if scale.is_finite() && scale > 0.0 => SizeTransform {
            scale,
            offset: (scale - 1.0) / 2.0,
        },
        SpriteSize::Explicit(scale) => {
            warn!(scale, "sprite_size_invalid_using_normal");
            size_transform(SpriteSize::Named(NamedSize::Normal))
        }
    }
}

type RenderStrategy = fn(&SpriteDef, f32) -> RenderableDesc;

fn render_strategy(kind: RenderKind) -> RenderStrategy {
    match kind {
        RenderKind::SolidBlock => solid_block,
        RenderKind::Billboard => billboard,
        RenderKind::PointCloud => point_cloud,
        RenderKind::Mesh => mesh,
    }
}

fn textured(kind: RenderableKind, sprite: &SpriteDef, scale: f32) -> RenderableDesc {
    RenderableDesc {
        kind,
        scale,
        asset: sprite.texture.clone(),
        attack_asset: sprite.attack_texture.clone(),
        showing_attack: false,
    }
}

fn solid_block(sprite: &SpriteDef, scale: f32) -> RenderableDesc {
    textured(RenderableKind::SolidBlock, sprite, scale)
}

fn billboard(sprite: &SpriteDef, scale: f32) -> RenderableDesc {
    textured(RenderableKind::Billboard, sprite, scale)
}

fn point_cloud(sprite: &SpriteDef, scale: f32) -> RenderableDesc {
    let point_count = sprite
        .pixels
        .iter()
        .flatten()
        .flatten()
        .filter(|color| !color.is_empty())
        .count();
    textured(RenderableKind::PointCloud { point_count }, sprite, scale)
}

fn mesh(sprite: &SpriteDef, scale: f32) -> RenderableDesc {
    textured(RenderableKind::Mesh, sprite, scale)
}

/// Turns catalog entries into live entities for one scene.
pub struct Spawner<'a> {
    catalog: &'a SpriteCatalog,
    geometry: GridGeometry,
}

impl<'a> Spawner<'a> {
    pub fn new(catalog: &'a SpriteCatalog, geometry: GridGeometry) -> Self {
        Self { catalog, geometry }
    }

    /// Stages one entity. A sprite id missing from the catalog is logged and
    /// yields `None`.
    pub fn spawn(
        &self,
        world: &mut SceneWorld,
        grid_x: i64,
        layer_index: i32,
        grid_z: i64,
        sprite_id: &str,
        render_kind: RenderKind,
    ) -> Option<EntityId> {
        let Some(sprite) = self.catalog.get(sprite_id) else {
            warn!(sprite_id, grid_x, grid_z, layer_index, "sprite_missing");
            return None;
        };

        let size = size_transform(sprite.size);
        let tile = self.geometry.tile_size;
        let mut position = self.geometry.cell_center(grid_x, grid_z);
        position.y = self.geometry.layer_center_y(layer_index) + size.offset * tile;
        let renderable = render_strategy(render_kind)(sprite, size.scale);

        let id = world.stage_spawn(|id| {
            let mut entity = Entity {
                id,
                transform: Transform {
                    position,
                    yaw_radians: 0.0,
                },
                renderable,
                sprite_id: sprite.id.clone(),
                cell: GridCell {
                    x: grid_x,
                    z: grid_z,
                },
                layer_index,
                collision: sprite.collision,
                change_scene: sprite.change_scene.clone(),
                interactive: true,
                life: None,
                health_bar: None,
                texts: Vec::new(),
            };
            attach_capabilities(sprite, &mut entity);
            entity
        });
        debug!(entity_id = id.0, sprite_id, grid_x, grid_z, layer_index, "entity_spawned");
        Some(id)
    }

    /// Scenery ring piece outside the playable grid. Never collides, never
    /// takes part in proximity queries.
    pub fn spawn_border_marker(&self, world: &mut SceneWorld, grid_x: i64, grid_z: i64) -> EntityId {
        let mut position = self.geometry.cell_center(grid_x, grid_z);
        position.y = self.geometry.layer_center_y(0);
        world.stage_spawn(|id| Entity {
            id,
            transform: Transform {
                position,
                yaw_radians: 0.0,
            },
            renderable: RenderableDesc {
                kind: RenderableKind::BorderMarker,
                scale: 1.0,
                asset: None,
                attack_asset: None,
                showing_attack: false,
            },
            sprite_id: String::new(),
            cell: GridCell {
                x: grid_x,
                z: grid_z,
            },
            layer_index: 0,
            collision: false,
            change_scene: None,
            interactive: false,
            life: None,
            health_bar: None,
            texts: Vec::new(),
        })
    }
}

/// Cells of the one-tile ring around a `size × size` grid.
pub fn border_ring(size: u32) -> impl Iterator<Item = (i64, i64)> {
    let last = size as i64;
    (-1..=last).flat_map(move |x| {
        (-1..=last).filter_map(move |z| {
            let on_ring = x == -1 || z == -1 || x == last || z == last;
            on_ring.then_some((x, z))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::SpriteDef;

    fn catalog() -> SpriteCatalog {
        SpriteCatalog::from_sprites(&[
            SpriteDef::new("block", RenderKind::SolidBlock),
            SpriteDef::new("tiny", RenderKind::Billboard)
                .with_size(SpriteSize::Named(NamedSize::Small)),
            SpriteDef::new("giant", RenderKind::Mesh).with_size(SpriteSize::Named(NamedSize::Big)),
            SpriteDef::new("triple", RenderKind::SolidBlock).with_size(SpriteSize::Explicit(3.0)),
            SpriteDef {
                pixels: Some(vec![
                    vec!["#ff0000".to_string(), String::new()],
                    vec!["#00ff00".to_string(), "#0000ff".to_string()],
                ]),
                ..SpriteDef::new("cloud", RenderKind::PointCloud)
            },
        ])
    }

    fn spawn_one(sprite_id: &str, layer: i32) -> Entity {
        let catalog = catalog();
        let spawner = Spawner::new(&catalog, GridGeometry::new(4));
        let mut world = SceneWorld::default();
        let kind = catalog.get(sprite_id).expect("sprite").render_kind;
        let id = spawner
            .spawn(&mut world, 1, layer, 2, sprite_id, kind)
            .expect("spawned");
        world.apply_pending();
        world.find_entity(id).expect("entity").clone()
    }

    fn bottom(entity: &Entity) -> f32 {
        entity.transform.position.y - entity.renderable.scale / 2.0
    }

    #[test]
    fn every_size_variant_stays_floor_aligned() {
        for sprite_id in ["block", "tiny", "giant", "triple"] {
            let entity = spawn_one(sprite_id, 0);
            assert!(
                bottom(&entity).abs() < 1e-5,
                "{sprite_id} bottom at {}",
                bottom(&entity)
            );
        }
        let raised = spawn_one("giant", 2);
        assert!((bottom(&raised) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn size_transform_matches_named_presets() {
        assert_eq!(
            size_transform(SpriteSize::Named(NamedSize::Small)),
            SizeTransform {
                scale: 0.5,
                offset: -0.25
            }
        );
        assert_eq!(
            size_transform(SpriteSize::Explicit(-1.0)),
            SizeTransform {
                scale: 1.0,
                offset: 0.0
            }
        );
    }

    #[test]
    fn render_kind_selects_primitive() {
        assert_eq!(
            spawn_one("cloud", 0).renderable.kind,
            RenderableKind::PointCloud { point_count: 3 }
        );
        assert_eq!(spawn_one("giant", 0).renderable.kind, RenderableKind::Mesh);
        assert_eq!(spawn_one("tiny", 0).renderable.kind, RenderableKind::Billboard);
    }

    #[test]
    fn missing_sprite_is_a_no_op() {
        let catalog = catalog();
        let spawner = Spawner::new(&catalog, GridGeometry::new(4));
        let mut world = SceneWorld::default();
        let spawned = spawner.spawn(&mut world, 0, 0, 0, "ghost", RenderKind::SolidBlock);
        world.apply_pending();
        assert_eq!(spawned, None);
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn border_ring_surrounds_grid() {
        let ring: Vec<_> = border_ring(2).collect();
        assert_eq!(ring.len(), 12);
        assert!(ring.contains(&(-1, -1)));
        assert!(ring.contains(&(2, 0)));
        assert!(!ring.contains(&(0, 0)));
    }
}
