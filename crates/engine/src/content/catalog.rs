use std::collections::HashMap;

use tracing::warn;

use super::types::SpriteDef;

/// Read-only lookup of sprite definitions by id.
///
/// Layers hold sprite ids only; a lookup miss is an ordinary outcome that
/// callers degrade to "empty, no collision".
#[derive(Debug, Default, Clone)]
pub struct SpriteCatalog {
    sprites: Vec<SpriteDef>,
    index_by_id: HashMap<String, usize>,
}

impl SpriteCatalog {
    pub fn from_sprites(sprites: &[SpriteDef]) -> Self {
        let mut catalog = Self {
            sprites: Vec::with_capacity(sprites.len()),
            index_by_id: HashMap::with_capacity(sprites.len()),
        };
        for sprite in sprites {
            if catalog.index_by_id.contains_key(&sprite.id) {
                warn!(sprite_id = %sprite.id, "sprite_duplicate_ignored");
                continue;
            }
            catalog
                .index_by_id
                .insert(sprite.id.clone(), catalog.sprites.len());
            catalog.sprites.push(sprite.clone());
        }
        catalog
    }

    pub fn get(&self, sprite_id: &str) -> Option<&SpriteDef> {
        self.index_by_id
            .get(sprite_id)
            .and_then(|index| self.sprites.get(*index))
    }

    pub fn contains(&self, sprite_id: &str) -> bool {
        self.index_by_id.contains_key(sprite_id)
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn sprites(&self) -> &[SpriteDef] {
        &self.sprites
    }
}
