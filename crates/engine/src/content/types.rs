use serde::{Deserialize, Serialize};

use super::defaults::{builtin_scenes, builtin_sprites};

pub const DEFAULT_BACKGROUND_COLOR: &str = "#000000";
pub const DEFAULT_FOG_DISTANCE: f32 = 20.0;
pub const DEFAULT_AR_PLAYER_SCALE: f32 = 1.0;
pub const COLLISION_LAYER_INDEX: i32 = 0;

/// The persisted world: `{ sprites, scenes }`.
///
/// Absent top-level keys fall back to the built-in default world, so a
/// partial document on disk is merged over the defaults when read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldDocument {
    #[serde(default = "builtin_sprites")]
    pub sprites: Vec<SpriteDef>,
    #[serde(default = "builtin_scenes")]
    pub scenes: Vec<SceneDef>,
}

impl WorldDocument {
    pub fn builtin() -> Self {
        Self {
            sprites: builtin_sprites(),
            scenes: builtin_scenes(),
        }
    }

    pub fn empty() -> Self {
        Self {
            sprites: Vec::new(),
            scenes: Vec::new(),
        }
    }

    pub fn scene(&self, scene_id: &str) -> Option<&SceneDef> {
        self.scenes.iter().find(|scene| scene.id == scene_id)
    }

    pub fn scene_mut(&mut self, scene_id: &str) -> Option<&mut SceneDef> {
        self.scenes.iter_mut().find(|scene| scene.id == scene_id)
    }

    pub fn sprite(&self, sprite_id: &str) -> Option<&SpriteDef> {
        self.sprites.iter().find(|sprite| sprite.id == sprite_id)
    }

    pub fn first_scene_id(&self) -> Option<&str> {
        self.scenes.first().map(|scene| scene.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderKind {
    #[default]
    SolidBlock,
    Billboard,
    PointCloud,
    Mesh,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamedSize {
    Small,
    #[default]
    Normal,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpriteSize {
    Named(NamedSize),
    Explicit(f32),
}

impl Default for SpriteSize {
    fn default() -> Self {
        Self::Named(NamedSize::Normal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifeSystemConfig {
    pub max_life: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNearConfig {
    pub text: String,
    pub distance: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Optional behaviour attached to a sprite. Each field is one capability tag;
/// the spawner walks them through a fixed registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpriteCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life_system: Option<LifeSystemConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_text_near: Option<TextNearConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_hud_text: Option<TextNearConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityTag {
    LifeSystem,
    ShowTextNear,
    ShowHudText,
}

impl CapabilityTag {
    pub const ALL: [CapabilityTag; 3] = [
        CapabilityTag::LifeSystem,
        CapabilityTag::ShowTextNear,
        CapabilityTag::ShowHudText,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LifeSystem => "life-system",
            Self::ShowTextNear => "show-text-near",
            Self::ShowHudText => "show-hud-text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capability<'a> {
    LifeSystem(&'a LifeSystemConfig),
    ShowTextNear(&'a TextNearConfig),
    ShowHudText(&'a TextNearConfig),
}

impl SpriteCapabilities {
    pub fn get(&self, tag: CapabilityTag) -> Option<Capability<'_>> {
        match tag {
            CapabilityTag::LifeSystem => self.life_system.as_ref().map(Capability::LifeSystem),
            CapabilityTag::ShowTextNear => {
                self.show_text_near.as_ref().map(Capability::ShowTextNear)
            }
            CapabilityTag::ShowHudText => self.show_hud_text.as_ref().map(Capability::ShowHudText),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpriteDef {
    pub id: String,
    #[serde(default)]
    pub render_kind: RenderKind,
    #[serde(default)]
    pub collision: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_scene: Option<String>,
    #[serde(default)]
    pub size: SpriteSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_texture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixels: Option<Vec<Vec<String>>>,
    #[serde(flatten)]
    pub capabilities: SpriteCapabilities,
}

impl SpriteDef {
    pub fn new(id: impl Into<String>, render_kind: RenderKind) -> Self {
        Self {
            id: id.into(),
            render_kind,
            collision: false,
            change_scene: None,
            size: SpriteSize::default(),
            texture: None,
            attack_texture: None,
            pixels: None,
            capabilities: SpriteCapabilities::default(),
        }
    }

    pub fn with_collision(mut self, collision: bool) -> Self {
        self.collision = collision;
        self
    }

    pub fn with_change_scene(mut self, scene_id: impl Into<String>) -> Self {
        self.change_scene = Some(scene_id.into());
        self
    }

    pub fn with_size(mut self, size: SpriteSize) -> Self {
        self.size = size;
        self
    }

    pub fn with_life(mut self, max_life: i32) -> Self {
        self.capabilities.life_system = Some(LifeSystemConfig {
            max_life,
            enabled: None,
        });
        self
    }

    pub fn with_text_near(mut self, text: impl Into<String>, distance: f32) -> Self {
        self.capabilities.show_text_near = Some(TextNearConfig {
            text: text.into(),
            distance,
            enabled: None,
        });
        self
    }

    /// Asset paths this sprite pulls in at runtime.
    pub fn referenced_assets(&self) -> impl Iterator<Item = &str> {
        self.texture
            .as_deref()
            .into_iter()
            .chain(self.attack_texture.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i32,
    pub z: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FogSettings {
    pub enabled: bool,
    pub distance: f32,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            distance: DEFAULT_FOG_DISTANCE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementMode {
    #[default]
    Grid,
    Free,
    Ar,
}

impl MovementMode {
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Free => "free",
            Self::Ar => "ar",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "grid" => Some(Self::Grid),
            "free" => Some(Self::Free),
            "ar" => Some(Self::Ar),
            _ => None,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Grid => Self::Free,
            Self::Free => Self::Ar,
            Self::Ar => Self::Grid,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XrMode {
    #[default]
    Vr,
    Ar,
}

/// One read of a layer cell. Rows are indexed by `z`, columns by `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRead<'a> {
    OutOfRange,
    Empty,
    Sprite(&'a str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDef {
    pub index: i32,
    pub grid: Vec<Vec<Option<String>>>,
}

impl LayerDef {
    pub fn filled(index: i32, size: u32) -> Self {
        let size = size as usize;
        Self {
            index,
            grid: vec![vec![None; size]; size],
        }
    }

    pub fn set(&mut self, x: usize, z: usize, sprite_id: Option<&str>) -> bool {
        let Some(cell) = self.grid.get_mut(z).and_then(|row| row.get_mut(x)) else {
            return false;
        };
        *cell = sprite_id.map(ToString::to_string);
        true
    }

    pub fn cell(&self, x: i64, z: i64) -> CellRead<'_> {
        if x < 0 || z < 0 {
            return CellRead::OutOfRange;
        }
        match self
            .grid
            .get(z as usize)
            .and_then(|row| row.get(x as usize))
        {
            None => CellRead::OutOfRange,
            Some(None) => CellRead::Empty,
            Some(Some(id)) if id.is_empty() => CellRead::Empty,
            Some(Some(id)) => CellRead::Sprite(id.as_str()),
        }
    }

    /// Non-empty cells as `(x, z, sprite_id)`, row by row.
    pub fn occupied_cells(&self) -> impl Iterator<Item = (usize, usize, &str)> {
        self.grid.iter().enumerate().flat_map(|(z, row)| {
            row.iter().enumerate().filter_map(move |(x, cell)| match cell {
                Some(id) if !id.is_empty() => Some((x, z, id.as_str())),
                _ => None,
            })
        })
    }

    pub fn has_shape(&self, size: u32) -> bool {
        let size = size as usize;
        self.grid.len() == size && self.grid.iter().all(|row| row.len() == size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDef {
    pub id: String,
    pub size: u32,
    #[serde(default)]
    pub layers: Vec<LayerDef>,
    #[serde(default)]
    pub player_spawn: GridPoint,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default)]
    pub fog: FogSettings,
    #[serde(default)]
    pub movement_mode: MovementMode,
    #[serde(default)]
    pub xr_mode: XrMode,
    #[serde(default)]
    pub enable_borders: bool,
    #[serde(default = "default_ar_player_scale")]
    pub ar_player_scale: f32,
}

impl SceneDef {
    /// An empty scene with one blank collision layer.
    pub fn new(id: impl Into<String>, size: u32) -> Self {
        Self {
            id: id.into(),
            size,
            layers: vec![LayerDef::filled(COLLISION_LAYER_INDEX, size)],
            player_spawn: GridPoint::default(),
            background_color: default_background_color(),
            fog: FogSettings::default(),
            movement_mode: MovementMode::default(),
            xr_mode: XrMode::default(),
            enable_borders: false,
            ar_player_scale: DEFAULT_AR_PLAYER_SCALE,
        }
    }

    pub fn layer(&self, index: i32) -> Option<&LayerDef> {
        self.layers.iter().find(|layer| layer.index == index)
    }

    pub fn layer_mut(&mut self, index: i32) -> Option<&mut LayerDef> {
        self.layers.iter_mut().find(|layer| layer.index == index)
    }

    pub fn collision_layer(&self) -> Option<&LayerDef> {
        self.layer(COLLISION_LAYER_INDEX)
    }

    /// Layers ordered by index; equal indices keep document order.
    pub fn layers_by_index(&self) -> Vec<&LayerDef> {
        let mut layers: Vec<&LayerDef> = self.layers.iter().collect();
        layers.sort_by_key(|layer| layer.index);
        layers
    }

    pub fn spawn_in_range(&self) -> bool {
        let size = self.size as i64;
        let spawn = self.player_spawn;
        (0..size).contains(&(spawn.x as i64)) && (0..size).contains(&(spawn.z as i64))
    }
}

fn default_background_color() -> String {
    DEFAULT_BACKGROUND_COLOR.to_string()
}

fn default_ar_player_scale() -> f32 {
    DEFAULT_AR_PLAYER_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_fields_default_when_absent() {
        let scene: SceneDef =
            serde_json::from_str(r#"{ "id": "S", "size": 4 }"#).expect("scene parses");
        assert_eq!(scene.background_color, DEFAULT_BACKGROUND_COLOR);
        assert_eq!(scene.movement_mode, MovementMode::Grid);
        assert_eq!(scene.ar_player_scale, DEFAULT_AR_PLAYER_SCALE);
        assert!(!scene.fog.enabled);
        assert!(scene.layers.is_empty());
    }

    #[test]
    fn sprite_size_accepts_names_and_numbers() {
        let named: SpriteDef =
            serde_json::from_str(r#"{ "id": "a", "size": "big" }"#).expect("named size");
        assert_eq!(named.size, SpriteSize::Named(NamedSize::Big));
        let explicit: SpriteDef =
            serde_json::from_str(r#"{ "id": "b", "size": 1.5 }"#).expect("explicit size");
        assert_eq!(explicit.size, SpriteSize::Explicit(1.5));
    }

    #[test]
    fn capabilities_are_flattened_into_sprite() {
        let sprite: SpriteDef = serde_json::from_str(
            r#"{ "id": "slime", "renderKind": "billboard", "lifeSystem": { "maxLife": 30 },
                 "showTextNear": { "text": "grr", "distance": 2.0 } }"#,
        )
        .expect("sprite parses");
        assert_eq!(sprite.render_kind, RenderKind::Billboard);
        assert_eq!(
            sprite.capabilities.get(CapabilityTag::LifeSystem),
            Some(Capability::LifeSystem(&LifeSystemConfig {
                max_life: 30,
                enabled: None
            }))
        );
        assert!(sprite.capabilities.get(CapabilityTag::ShowHudText).is_none());
    }

    #[test]
    fn cell_reads_treat_blank_and_missing_differently() {
        let layer = LayerDef {
            index: 0,
            grid: vec![
                vec![Some("wall".to_string()), Some(String::new())],
                vec![None],
            ],
        };
        assert_eq!(layer.cell(0, 0), CellRead::Sprite("wall"));
        assert_eq!(layer.cell(1, 0), CellRead::Empty);
        assert_eq!(layer.cell(0, 1), CellRead::Empty);
        assert_eq!(layer.cell(1, 1), CellRead::OutOfRange);
        assert_eq!(layer.cell(-1, 0), CellRead::OutOfRange);
        assert!(!layer.has_shape(2));
    }

    #[test]
    fn missing_top_level_keys_fall_back_to_builtin() {
        let document: WorldDocument =
            serde_json::from_str(r#"{ "sprites": [] }"#).expect("document parses");
        assert!(document.sprites.is_empty());
        assert_eq!(document.scenes, WorldDocument::builtin().scenes);
    }

    #[test]
    fn layers_by_index_orders_below_ground_first() {
        let mut scene = SceneDef::new("S", 2);
        scene.layers.push(LayerDef::filled(-1, 2));
        scene.layers.push(LayerDef::filled(2, 2));
        let order: Vec<i32> = scene
            .layers_by_index()
            .iter()
            .map(|layer| layer.index)
            .collect();
        assert_eq!(order, vec![-1, 0, 2]);
    }
}
