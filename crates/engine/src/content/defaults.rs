use super::types::{LayerDef, NamedSize, RenderKind, SceneDef, SpriteDef, SpriteSize};

const STARTER_SCENE_ID: &str = "start";
const STARTER_SCENE_SIZE: u32 = 8;

pub(crate) fn builtin_sprites() -> Vec<SpriteDef> {
    vec![
        SpriteDef {
            texture: Some("textures/grass.png".to_string()),
            ..SpriteDef::new("grass", RenderKind::SolidBlock)
        },
        SpriteDef {
            texture: Some("textures/stone.png".to_string()),
            ..SpriteDef::new("stone_wall", RenderKind::SolidBlock).with_collision(true)
        },
        SpriteDef::new("flower", RenderKind::Billboard)
            .with_size(SpriteSize::Named(NamedSize::Small))
            .with_text_near("A quiet meadow.", 1.5),
    ]
}

pub(crate) fn builtin_scenes() -> Vec<SceneDef> {
    let size = STARTER_SCENE_SIZE;
    let mut scene = SceneDef::new(STARTER_SCENE_ID, size);
    scene.background_color = "#87ceeb".to_string();
    scene.player_spawn.x = (size / 2) as i32;
    scene.player_spawn.z = (size / 2) as i32;

    let mut floor = LayerDef::filled(-1, size);
    for z in 0..size as usize {
        for x in 0..size as usize {
            floor.set(x, z, Some("grass"));
        }
    }
    scene.layers.insert(0, floor);

    if let Some(collision) = scene.layer_mut(0) {
        let last = size as usize - 1;
        for i in 0..size as usize {
            collision.set(i, 0, Some("stone_wall"));
            collision.set(i, last, Some("stone_wall"));
            collision.set(0, i, Some("stone_wall"));
            collision.set(last, i, Some("stone_wall"));
        }
        collision.set(2, 2, Some("flower"));
    }

    vec![scene]
}
