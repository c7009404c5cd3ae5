mod renderer;
mod transform;

pub use renderer::{parse_hex_color, Renderer};
pub use transform::{pixels_per_world_for, world_to_screen, Viewport};

pub const PLAYER_HALF_SIZE_PX: i32 = 5;
