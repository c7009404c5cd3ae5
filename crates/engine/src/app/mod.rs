mod capabilities;
mod clock;
mod combat;
mod context;
mod input;
mod lifecycle;
pub mod locomotion;
mod loop_runner;
mod math;
mod metrics;
mod rendering;
mod runtime;
mod scene;
mod spawner;

pub use capabilities::{attach_capabilities, update_proximity_texts, visible_texts};
pub use clock::{
    DeferredAction, DeferredQueue, AR_ALIGNMENT_DELAY, ATTACK_TEXTURE_DURATION,
    COMBAT_RESOLUTION_DELAY, GRID_MOVE_COOLDOWN, HAZARD_DAMAGE_COOLDOWN, SCENE_CHANGED_DELAY,
    TURN_COOLDOWN,
};
pub use combat::{
    take_damage, try_trigger, within_cone, CombatEffects, CombatError, CombatSystem,
    DamageOutcome, TriggerPolicy, WidgetEffects, COUNTER_ATTACK_DAMAGE, COUNTER_ATTACK_RANGE,
    PLAYER_ATTACK_DAMAGE, TRIGGER_CONE_HALF_ANGLE_DEGREES,
};
pub use context::{MovementLock, SimContext};
pub use input::{InputAction, InputSnapshot};
pub use lifecycle::{LifecycleError, LifecycleState, SceneChanged, SceneObserver};
pub use loop_runner::{
    run_app, run_app_with_metrics, AppError, LoopConfig, NoHooks, SessionHooks, SLOW_FRAME_ENV_VAR,
};
pub use math::{GridCell, GridGeometry, Transform, Vec3, TILE_SIZE};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{parse_hex_color, pixels_per_world_for, world_to_screen, Renderer, Viewport};
pub use runtime::{RuntimeConfig, RuntimeError, WorldRuntime};
pub use scene::{
    CollisionCell, CollisionGrid, CollisionGridError, Entity, EntityHandle, EntityId,
    Environment, HazardState, HealthBar, LifeState, Player, ProximityText, RenderableDesc,
    RenderableKind, SceneCommand, SceneWorld, TextPlacement, PLAYER_HOVER_HEIGHT,
    PLAYER_MAX_HEALTH,
};
pub use spawner::{border_ring, size_transform, SizeTransform, Spawner};
