use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use super::transform::{pixels_per_world_for, world_to_screen, Viewport};
use super::PLAYER_HALF_SIZE_PX;
use crate::app::math::Vec3;
use crate::app::runtime::WorldRuntime;
use crate::app::scene::{Entity, RenderableKind, SceneWorld};

const FALLBACK_CLEAR_COLOR: [u8; 4] = [20, 22, 28, 255];
const GRID_LINE_COLOR: [u8; 4] = [52, 58, 70, 255];
const SOLID_BLOCK_COLOR: [u8; 4] = [128, 128, 136, 255];
const FLOOR_BLOCK_COLOR: [u8; 4] = [74, 112, 56, 255];
const BILLBOARD_COLOR: [u8; 4] = [230, 200, 90, 255];
const POINT_CLOUD_COLOR: [u8; 4] = [120, 200, 230, 255];
const MESH_COLOR: [u8; 4] = [170, 130, 210, 255];
const BORDER_MARKER_COLOR: [u8; 4] = [90, 40, 40, 255];
const PORTAL_COLOR: [u8; 4] = [160, 80, 240, 255];
const HAZARD_COLOR: [u8; 4] = [210, 70, 60, 255];
const ATTACK_FLASH_COLOR: [u8; 4] = [255, 240, 240, 255];
const HEALTH_BAR_BACK_COLOR: [u8; 4] = [40, 10, 10, 255];
const HEALTH_BAR_FILL_COLOR: [u8; 4] = [80, 220, 90, 255];
const PLAYER_COLOR: [u8; 4] = [80, 220, 255, 255];
const PLAYER_LOCKED_COLOR: [u8; 4] = [255, 210, 70, 255];

/// Top-down debug view of the live scene drawn into a `pixels` framebuffer.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(window: Arc<Window>, width: u32, height: u32) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub fn render(&mut self, runtime: &WorldRuntime) -> Result<(), Error> {
        let viewport = self.viewport;
        draw_scene(
            self.pixels.frame_mut(),
            viewport,
            runtime.world(),
            runtime.movement_locked(),
        );
        self.pixels.render()
    }
}

/// `#rrggbb` (leading `#` optional) to opaque RGBA.
pub fn parse_hex_color(value: &str) -> Option<[u8; 4]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255])
}

fn draw_scene(frame: &mut [u8], viewport: Viewport, world: &SceneWorld, locked: bool) {
    let clear = parse_hex_color(&world.environment().background_color)
        .unwrap_or(FALLBACK_CLEAR_COLOR);
    for pixel in frame.chunks_exact_mut(4) {
        pixel.copy_from_slice(&clear);
    }
    let Some(geometry) = world.geometry() else {
        return;
    };
    let ppw = pixels_per_world_for(geometry.size, viewport);
    let tile_px = (ppw * geometry.tile_size).round() as i32;

    let mut order: Vec<&Entity> = world.entities().iter().collect();
    order.sort_by_key(|entity| entity.layer_index);
    let player = world.player().position();
    let fog = world.environment().fog;
    for entity in order {
        let (cx, cy) = world_to_screen(entity.transform.position, viewport, ppw);
        let half = ((tile_px as f32 * entity.renderable.scale.min(1.0)) / 2.0).round() as i32;
        let mut color = entity_color(entity);
        if fog.enabled && fog.distance > 0.0 {
            let depth = player.planar_distance(entity.transform.position) / fog.distance;
            color = blend(color, clear, depth.clamp(0.0, 1.0));
        }
        match entity.renderable.kind {
            RenderableKind::Billboard | RenderableKind::PointCloud { .. } => {
                draw_square_outline(frame, viewport, cx, cy, half.max(2) - 1, color);
                draw_square(frame, viewport, cx, cy, (half / 2).max(1), color);
            }
            _ => draw_square(frame, viewport, cx, cy, half.max(1) - 1, color),
        }
        if let Some(bar) = entity.health_bar {
            draw_health_bar(frame, viewport, cx, cy - half - 4, half.max(4), bar.fraction);
        }
    }

    draw_grid_lines(frame, viewport, world, ppw);
    draw_player(frame, viewport, world, ppw, locked);
}

fn entity_color(entity: &Entity) -> [u8; 4] {
    if entity.renderable.showing_attack {
        return ATTACK_FLASH_COLOR;
    }
    if entity.change_scene.is_some() {
        return PORTAL_COLOR;
    }
    if entity.is_live_hazard() {
        return HAZARD_COLOR;
    }
    match entity.renderable.kind {
        RenderableKind::SolidBlock if entity.layer_index < 0 => FLOOR_BLOCK_COLOR,
        RenderableKind::SolidBlock => SOLID_BLOCK_COLOR,
        RenderableKind::Billboard => BILLBOARD_COLOR,
        RenderableKind::PointCloud { .. } => POINT_CLOUD_COLOR,
        RenderableKind::Mesh => MESH_COLOR,
        RenderableKind::BorderMarker => BORDER_MARKER_COLOR,
    }
}

fn blend(from: [u8; 4], to: [u8; 4], t: f32) -> [u8; 4] {
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    [mix(from[0], to[0]), mix(from[1], to[1]), mix(from[2], to[2]), 255]
}

fn draw_grid_lines(frame: &mut [u8], viewport: Viewport, world: &SceneWorld, ppw: f32) {
    let Some(geometry) = world.geometry() else {
        return;
    };
    let size = i64::from(geometry.size);
    let half_tile = geometry.tile_size / 2.0;
    let first = geometry.cell_center(0, 0);
    let last = geometry.cell_center(size - 1, size - 1);
    let (left, top) = world_to_screen(
        Vec3::new(first.x - half_tile, 0.0, first.z - half_tile),
        viewport,
        ppw,
    );
    let (right, bottom) = world_to_screen(
        Vec3::new(last.x + half_tile, 0.0, last.z + half_tile),
        viewport,
        ppw,
    );
    for i in 0..=size {
        let edge = geometry.cell_center(i, i);
        let (x, y) = world_to_screen(
            Vec3::new(edge.x - half_tile, 0.0, edge.z - half_tile),
            viewport,
            ppw,
        );
        for yy in top..=bottom {
            write_pixel_rgba_clipped(frame, viewport, x, yy, GRID_LINE_COLOR);
        }
        for xx in left..=right {
            write_pixel_rgba_clipped(frame, viewport, xx, y, GRID_LINE_COLOR);
        }
    }
}

fn draw_player(frame: &mut [u8], viewport: Viewport, world: &SceneWorld, ppw: f32, locked: bool) {
    let transform = world.player().transform;
    let (cx, cy) = world_to_screen(transform.position, viewport, ppw);
    let color = if locked {
        PLAYER_LOCKED_COLOR
    } else {
        PLAYER_COLOR
    };
    draw_square(frame, viewport, cx, cy, PLAYER_HALF_SIZE_PX, color);

    // Heading tick; forward at yaw 0 is -z.
    let forward = Vec3::new(0.0, 0.0, -1.0).rotate_yaw(transform.yaw_radians);
    for step in 0..=PLAYER_HALF_SIZE_PX * 3 {
        let t = step as f32;
        let x = cx + (forward.x * t).round() as i32;
        let y = cy + (forward.z * t).round() as i32;
        write_pixel_rgba_clipped(frame, viewport, x, y, color);
    }
}

fn draw_health_bar(
    frame: &mut [u8],
    viewport: Viewport,
    cx: i32,
    y: i32,
    half_width: i32,
    fraction: f32,
) {
    let left = cx - half_width;
    let filled = ((2 * half_width) as f32 * fraction.clamp(0.0, 1.0)).round() as i32;
    for row in y..y + 2 {
        for x in left..=cx + half_width {
            let color = if x - left < filled {
                HEALTH_BAR_FILL_COLOR
            } else {
                HEALTH_BAR_BACK_COLOR
            };
            write_pixel_rgba_clipped(frame, viewport, x, row, color);
        }
    }
}

fn write_pixel_rgba_clipped(frame: &mut [u8], viewport: Viewport, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x >= viewport.width as i32 || y >= viewport.height as i32 {
        return;
    }
    let Some(offset) = (y as usize)
        .checked_mul(viewport.width as usize)
        .and_then(|row| row.checked_add(x as usize))
        .and_then(|pixel| pixel.checked_mul(4))
    else {
        return;
    };
    if let Some(target) = frame.get_mut(offset..offset + 4) {
        target.copy_from_slice(&color);
    }
}

fn draw_square(
    frame: &mut [u8],
    viewport: Viewport,
    cx: i32,
    cy: i32,
    half_size: i32,
    color: [u8; 4],
) {
    for y in (cy - half_size)..=(cy + half_size) {
        for x in (cx - half_size)..=(cx + half_size) {
            write_pixel_rgba_clipped(frame, viewport, x, y, color);
        }
    }
}

fn draw_square_outline(
    frame: &mut [u8],
    viewport: Viewport,
    cx: i32,
    cy: i32,
    half_size: i32,
    color: [u8; 4],
) {
    let (left, right) = (cx - half_size, cx + half_size);
    let (top, bottom) = (cy - half_size, cy + half_size);
    for x in left..=right {
        write_pixel_rgba_clipped(frame, viewport, x, top, color);
        write_pixel_rgba_clipped(frame, viewport, x, bottom, color);
    }
    for y in top..=bottom {
        write_pixel_rgba_clipped(frame, viewport, left, y, color);
        write_pixel_rgba_clipped(frame, viewport, right, y, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::runtime::RuntimeConfig;
    use crate::content::WorldDocument;

    const VIEWPORT: Viewport = Viewport {
        width: 120,
        height: 90,
    };

    fn pixel_at(frame: &[u8], viewport: Viewport, x: i32, y: i32) -> [u8; 4] {
        let offset = (y as usize * viewport.width as usize + x as usize) * 4;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    #[test]
    fn hex_colors_parse_with_or_without_hash() {
        assert_eq!(parse_hex_color("#87ceeb"), Some([0x87, 0xce, 0xeb, 255]));
        assert_eq!(parse_hex_color("000000"), Some([0, 0, 0, 255]));
        assert_eq!(parse_hex_color("#abc"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn clipped_writes_ignore_out_of_frame_pixels() {
        let mut frame = vec![0u8; (VIEWPORT.width * VIEWPORT.height * 4) as usize];
        write_pixel_rgba_clipped(&mut frame, VIEWPORT, -1, 4, PLAYER_COLOR);
        write_pixel_rgba_clipped(&mut frame, VIEWPORT, 120, 4, PLAYER_COLOR);
        write_pixel_rgba_clipped(&mut frame, VIEWPORT, 4, 90, PLAYER_COLOR);
        assert!(frame.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn empty_world_clears_to_background() {
        let mut frame = vec![0u8; (VIEWPORT.width * VIEWPORT.height * 4) as usize];
        draw_scene(&mut frame, VIEWPORT, &SceneWorld::default(), false);
        assert_eq!(pixel_at(&frame, VIEWPORT, 0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn player_is_drawn_at_its_projected_position() {
        let mut runtime = WorldRuntime::new(WorldDocument::builtin(), RuntimeConfig::default());
        runtime.start().expect("start");
        let mut frame = vec![0u8; (VIEWPORT.width * VIEWPORT.height * 4) as usize];
        draw_scene(&mut frame, VIEWPORT, runtime.world(), false);

        let ppw = pixels_per_world_for(8, VIEWPORT);
        let (x, y) = world_to_screen(runtime.player().position(), VIEWPORT, ppw);
        assert_eq!(pixel_at(&frame, VIEWPORT, x, y), PLAYER_COLOR);
        assert_eq!(pixel_at(&frame, VIEWPORT, 0, 0), [0x87, 0xce, 0xeb, 255]);
    }

    #[test]
    fn fog_fades_toward_background() {
        assert_eq!(blend([0, 0, 0, 255], [200, 100, 50, 255], 0.5), [100, 50, 25, 255]);
        assert_eq!(blend([10, 20, 30, 255], [0, 0, 0, 255], 0.0), [10, 20, 30, 255]);
    }
}
