use std::ops::{Add, AddAssign, Mul, Sub};

pub const TILE_SIZE: f32 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn planar(self) -> Vec3 {
        Vec3::new(self.x, 0.0, self.z)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn planar_distance(self, other: Vec3) -> f32 {
        let dx = other.x - self.x;
        let dz = other.z - self.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn normalized_or_zero(self) -> Vec3 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vec3::ZERO
        } else {
            self * len.recip()
        }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Rotates around the vertical axis. Positive yaw turns left when looking
    /// down `-z`.
    pub fn rotate_yaw(self, yaw_radians: f32) -> Vec3 {
        let (sin, cos) = yaw_radians.sin_cos();
        Vec3::new(
            self.x * cos + self.z * sin,
            self.y,
            -self.x * sin + self.z * cos,
        )
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub yaw_radians: f32,
}

/// Integer grid cell on the collision plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub x: i64,
    pub z: i64,
}

/// Grid origin convention:
/// - the grid is centred on the world origin,
/// - the centre of cell `(x, z)` is `((x - size/2) * tile, (z - size/2) * tile)`,
/// - layer `L` puts an entity centre at `y = L * tile + tile/2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub size: u32,
    pub tile_size: f32,
}

impl GridGeometry {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            tile_size: TILE_SIZE,
        }
    }

    fn half_extent(&self) -> f32 {
        self.size as f32 / 2.0
    }

    pub fn cell_center(&self, x: i64, z: i64) -> Vec3 {
        Vec3::new(
            (x as f32 - self.half_extent()) * self.tile_size,
            0.0,
            (z as f32 - self.half_extent()) * self.tile_size,
        )
    }

    pub fn layer_center_y(&self, layer_index: i32) -> f32 {
        layer_index as f32 * self.tile_size + self.tile_size / 2.0
    }

    /// `round(pos / tile + size/2)` on both planar axes.
    pub fn cell_at(&self, position: Vec3) -> GridCell {
        GridCell {
            x: (position.x / self.tile_size + self.half_extent()).round() as i64,
            z: (position.z / self.tile_size + self.half_extent()).round() as i64,
        }
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        let size = self.size as i64;
        (0..size).contains(&cell.x) && (0..size).contains(&cell.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn cell_center_and_cell_at_are_inverse() {
        for size in [1u32, 4, 5, 10] {
            let geometry = GridGeometry::new(size);
            for z in 0..size as i64 {
                for x in 0..size as i64 {
                    let center = geometry.cell_center(x, z);
                    assert_eq!(geometry.cell_at(center), GridCell { x, z });
                }
            }
        }
    }

    #[test]
    fn spawn_in_ten_grid_maps_to_origin() {
        let geometry = GridGeometry::new(10);
        let center = geometry.cell_center(5, 5);
        assert!(approx(center.x, 0.0) && approx(center.z, 0.0));
        assert!(!geometry.contains(GridCell { x: 10, z: 0 }));
        assert!(!geometry.contains(GridCell { x: -1, z: 3 }));
    }

    #[test]
    fn rotate_yaw_quarter_turn_maps_forward_to_left() {
        let forward = Vec3::new(0.0, 0.0, -1.0);
        let turned = forward.rotate_yaw(FRAC_PI_2);
        assert!(approx(turned.x, -1.0));
        assert!(approx(turned.z, 0.0));
    }

    #[test]
    fn layer_zero_sits_on_the_floor_plane() {
        let geometry = GridGeometry::new(4);
        assert!(approx(geometry.layer_center_y(0), 0.5));
        assert!(approx(geometry.layer_center_y(-1), -0.5));
    }
}
