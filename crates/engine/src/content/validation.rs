use std::collections::HashSet;

use thiserror::Error;

use super::types::WorldDocument;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldIssue {
    #[error("world has no scenes")]
    EmptySceneList,
    #[error("duplicate scene id '{scene_id}'")]
    DuplicateSceneId { scene_id: String },
    #[error("duplicate sprite id '{sprite_id}'")]
    DuplicateSpriteId { sprite_id: String },
    #[error("scene '{scene_id}' has size 0")]
    ZeroSize { scene_id: String },
    #[error("scene '{scene_id}' layer {layer_index} is not {size}x{size}")]
    LayerShapeMismatch {
        scene_id: String,
        layer_index: i32,
        size: u32,
    },
    #[error("scene '{scene_id}' has more than one layer with index {layer_index}")]
    DuplicateLayerIndex { scene_id: String, layer_index: i32 },
    #[error("scene '{scene_id}' spawn ({x}, {z}) is outside the grid")]
    SpawnOutOfRange { scene_id: String, x: i32, z: i32 },
    #[error("scene '{scene_id}' references unknown sprite '{sprite_id}'")]
    UnknownSpriteReference { scene_id: String, sprite_id: String },
    #[error("sprite '{sprite_id}' changes to unknown scene '{target}'")]
    UnknownChangeSceneTarget { sprite_id: String, target: String },
}

impl WorldIssue {
    /// Fatal issues make an import fail; the rest are logged and tolerated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DuplicateSceneId { .. } | Self::DuplicateSpriteId { .. } | Self::ZeroSize { .. }
        )
    }
}

impl WorldDocument {
    pub fn validate(&self) -> Vec<WorldIssue> {
        let mut issues = Vec::new();
        if self.scenes.is_empty() {
            issues.push(WorldIssue::EmptySceneList);
        }

        let mut sprite_ids = HashSet::new();
        for sprite in &self.sprites {
            if !sprite_ids.insert(sprite.id.as_str()) {
                issues.push(WorldIssue::DuplicateSpriteId {
                    sprite_id: sprite.id.clone(),
                });
            }
        }

        let mut scene_ids = HashSet::new();
        for scene in &self.scenes {
            if !scene_ids.insert(scene.id.as_str()) {
                issues.push(WorldIssue::DuplicateSceneId {
                    scene_id: scene.id.clone(),
                });
            }
            if scene.size == 0 {
                issues.push(WorldIssue::ZeroSize {
                    scene_id: scene.id.clone(),
                });
            } else if !scene.spawn_in_range() {
                issues.push(WorldIssue::SpawnOutOfRange {
                    scene_id: scene.id.clone(),
                    x: scene.player_spawn.x,
                    z: scene.player_spawn.z,
                });
            }

            let mut layer_indices = HashSet::new();
            let mut reported_unknown = HashSet::new();
            for layer in &scene.layers {
                if !layer_indices.insert(layer.index) {
                    issues.push(WorldIssue::DuplicateLayerIndex {
                        scene_id: scene.id.clone(),
                        layer_index: layer.index,
                    });
                }
                if !layer.has_shape(scene.size) {
                    issues.push(WorldIssue::LayerShapeMismatch {
                        scene_id: scene.id.clone(),
                        layer_index: layer.index,
                        size: scene.size,
                    });
                }
                for (_, _, sprite_id) in layer.occupied_cells() {
                    if !sprite_ids.contains(sprite_id) && reported_unknown.insert(sprite_id) {
                        issues.push(WorldIssue::UnknownSpriteReference {
                            scene_id: scene.id.clone(),
                            sprite_id: sprite_id.to_string(),
                        });
                    }
                }
            }
        }

        for sprite in &self.sprites {
            if let Some(target) = &sprite.change_scene {
                if !scene_ids.contains(target.as_str()) {
                    issues.push(WorldIssue::UnknownChangeSceneTarget {
                        sprite_id: sprite.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        issues
    }
}
