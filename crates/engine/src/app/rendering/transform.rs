use crate::app::math::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Top-down projection of the floor plane. The grid is centred on the world
/// origin, so the origin maps to the viewport centre and `-z` points up.
pub fn world_to_screen(point: Vec3, viewport: Viewport, pixels_per_world: f32) -> (i32, i32) {
    let x = point.x * pixels_per_world + viewport.width as f32 * 0.5;
    let y = point.z * pixels_per_world + viewport.height as f32 * 0.5;
    (x.round() as i32, y.round() as i32)
}

/// Scale that fits the grid plus its border ring inside the shorter side.
pub fn pixels_per_world_for(grid_size: u32, viewport: Viewport) -> f32 {
    let shortest = viewport.width.min(viewport.height) as f32;
    let tiles = grid_size.max(1) as f32 + 2.0;
    (shortest * 0.9 / tiles).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Viewport = Viewport {
        width: 800,
        height: 600,
    };

    #[test]
    fn origin_maps_to_viewport_center() {
        assert_eq!(world_to_screen(Vec3::ZERO, VIEWPORT, 32.0), (400, 300));
    }

    #[test]
    fn forward_is_up_the_screen() {
        let (x, y) = world_to_screen(Vec3::new(2.0, 5.0, -1.0), VIEWPORT, 10.0);
        assert_eq!((x, y), (420, 290));
    }

    #[test]
    fn scale_fits_grid_and_border() {
        assert!((pixels_per_world_for(10, VIEWPORT) - 45.0).abs() < 1e-4);
        assert_eq!(pixels_per_world_for(10_000, VIEWPORT), 1.0);
    }
}
