use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::{
    DeferredAction, ATTACK_TEXTURE_DURATION, COMBAT_RESOLUTION_DELAY, HAZARD_DAMAGE_COOLDOWN,
};
use super::context::SimContext;
use super::math::Vec3;
use super::scene::{Entity, EntityHandle, EntityId, HazardState, HealthBar, SceneCommand, SceneWorld};

/// Damage the player deals when walking into a hazard.
pub const PLAYER_ATTACK_DAMAGE: i32 = 10;
pub const COUNTER_ATTACK_DAMAGE: RangeInclusive<i32> = 5..=15;
/// Planar distance within which a counter-attack reaches the player.
pub const COUNTER_ATTACK_RANGE: f32 = 2.0;
pub const TRIGGER_CONE_HALF_ANGLE_DEGREES: f32 = 45.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("entity {entity_id} has no {resource} to update")]
    ResourceUnavailable {
        entity_id: u64,
        resource: &'static str,
    },
}

/// Visual feedback of the combat loop. Failures are reported, never fatal.
pub trait CombatEffects {
    fn refresh_health_bar(&mut self, entity: &mut Entity) -> Result<(), CombatError>;
    fn show_attack(&mut self, entity: &mut Entity) -> Result<(), CombatError>;
    fn restore_texture(&mut self, entity: &mut Entity) -> Result<(), CombatError>;
}

/// Writes the entity's health-bar widget and attack flag.
#[derive(Debug, Default)]
pub struct WidgetEffects;

impl CombatEffects for WidgetEffects {
    fn refresh_health_bar(&mut self, entity: &mut Entity) -> Result<(), CombatError> {
        let fraction = entity
            .life
            .map(|life| life.fraction())
            .ok_or(CombatError::ResourceUnavailable {
                entity_id: entity.id.0,
                resource: "life state",
            })?;
        match entity.health_bar.as_mut() {
            Some(bar) => bar.fraction = fraction,
            None => {
                debug!(entity_id = entity.id.0, "health_bar_recreated");
                entity.health_bar = Some(HealthBar { fraction });
            }
        }
        Ok(())
    }

    fn show_attack(&mut self, entity: &mut Entity) -> Result<(), CombatError> {
        if entity.renderable.attack_asset.is_none() {
            return Err(CombatError::ResourceUnavailable {
                entity_id: entity.id.0,
                resource: "attack texture",
            });
        }
        entity.renderable.showing_attack = true;
        Ok(())
    }

    fn restore_texture(&mut self, entity: &mut Entity) -> Result<(), CombatError> {
        entity.renderable.showing_attack = false;
        Ok(())
    }
}

pub struct CombatSystem {
    rng: StdRng,
    effects: Box<dyn CombatEffects>,
}

impl CombatSystem {
    pub fn new(rng: StdRng, effects: Box<dyn CombatEffects>) -> Self {
        Self { rng, effects }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed), Box::new(WidgetEffects))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy(), Box::new(WidgetEffects))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Target missing, stale or already dead.
    Ignored,
    Wounded { remaining: i32 },
    Killed,
}

/// How a proximity trigger decides whether the player is engaging a hazard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerPolicy {
    /// The movement direction must point at the hazard.
    Cone { direction: Vec3 },
    /// Being within the radius is enough.
    Radius,
}

pub fn within_cone(direction: Vec3, to_target: Vec3) -> bool {
    let direction = direction.planar().normalized_or_zero();
    if direction == Vec3::ZERO {
        return false;
    }
    let to_target = to_target.planar().normalized_or_zero();
    if to_target == Vec3::ZERO {
        return true;
    }
    // Strictly inside: a diagonal neighbour of a cardinal step sits on the
    // boundary and is not engaged.
    let threshold = TRIGGER_CONE_HALF_ANGLE_DEGREES.to_radians().cos();
    direction.dot(to_target) > threshold + 1e-4
}

/// Applies damage to a hazard. Direct calls bypass the trigger cooldown.
pub fn take_damage(
    ctx: &mut SimContext,
    world: &mut SceneWorld,
    hazard: EntityHandle,
    amount: i32,
) -> DamageOutcome {
    let now = ctx.now();
    let Some(entity) = world.resolve_mut(hazard) else {
        warn!(entity_id = hazard.id.0, "hazard_not_found");
        return DamageOutcome::Ignored;
    };
    let Some(life) = entity.life.as_mut().filter(|life| life.is_alive()) else {
        debug!(entity_id = hazard.id.0, "damage_ignored_not_alive");
        return DamageOutcome::Ignored;
    };

    life.current_life = (life.current_life - amount.max(0)).max(0);
    life.last_damage_time = Some(now);
    if life.current_life == 0 {
        life.state = HazardState::Dead;
    }
    let remaining = life.current_life;
    let max_life = life.max_life;

    if let Err(error) = ctx.combat.effects.refresh_health_bar(entity) {
        warn!(error = %error, "health_bar_refresh_failed");
    }
    info!(
        entity_id = hazard.id.0,
        sprite_id = %entity.sprite_id,
        amount,
        remaining,
        max_life,
        "combat_hit"
    );

    if remaining == 0 {
        ctx.schedule(
            COMBAT_RESOLUTION_DELAY,
            DeferredAction::RemoveEntity { entity: hazard },
        );
        ctx.movement_lock.release_hazard(hazard, "hazard_defeated");
        DamageOutcome::Killed
    } else {
        ctx.movement_lock.engage(hazard, "combat");
        ctx.schedule(
            COMBAT_RESOLUTION_DELAY,
            DeferredAction::CounterAttack { hazard },
        );
        DamageOutcome::Wounded { remaining }
    }
}

/// Proximity trigger used by locomotion: the nearest live hazard within
/// `radius` of `origin` that passes `policy` and is off cooldown takes
/// [`PLAYER_ATTACK_DAMAGE`].
pub fn try_trigger(
    ctx: &mut SimContext,
    world: &mut SceneWorld,
    origin: Vec3,
    radius: f32,
    policy: TriggerPolicy,
) -> Option<EntityId> {
    let now = ctx.now();
    let target = world
        .entities_within(origin, radius)
        .into_iter()
        .filter(|entity| entity.is_live_hazard())
        .filter(|entity| match policy {
            TriggerPolicy::Cone { direction } => {
                within_cone(direction, entity.transform.position - origin)
            }
            TriggerPolicy::Radius => true,
        })
        .find(|entity| {
            let cooled_down = entity
                .life
                .and_then(|life| life.last_damage_time)
                .map_or(true, |last| now.saturating_sub(last) >= HAZARD_DAMAGE_COOLDOWN);
            if !cooled_down {
                debug!(entity_id = entity.id.0, "hazard_trigger_cooling_down");
            }
            cooled_down
        })
        .map(|entity| entity.id)?;

    let handle = world.handle(target);
    take_damage(ctx, world, handle, PLAYER_ATTACK_DAMAGE);
    Some(target)
}

enum CounterOutcome {
    Struck,
    Skipped(&'static str),
}

/// Deferred half of a combat exchange. The movement lock is released on
/// every path: later when the hazard struck, immediately otherwise.
pub(crate) fn counter_attack(ctx: &mut SimContext, world: &mut SceneWorld, hazard: EntityHandle) {
    match strike_player(ctx, world, hazard) {
        CounterOutcome::Struck => {
            ctx.schedule(COMBAT_RESOLUTION_DELAY, DeferredAction::UnlockMovement { hazard });
        }
        CounterOutcome::Skipped(reason) => {
            debug!(entity_id = hazard.id.0, reason, "counter_attack_skipped");
            ctx.movement_lock.release(hazard, reason);
        }
    }
}

fn strike_player(ctx: &mut SimContext, world: &mut SceneWorld, hazard: EntityHandle) -> CounterOutcome {
    let player_position = world.player().position();
    let Some(entity) = world.resolve_mut(hazard) else {
        return CounterOutcome::Skipped("hazard_gone");
    };
    if !entity.is_live_hazard() {
        return CounterOutcome::Skipped("hazard_dead");
    }
    if player_position.planar_distance(entity.transform.position) > COUNTER_ATTACK_RANGE {
        return CounterOutcome::Skipped("player_out_of_range");
    }

    match ctx.combat.effects.show_attack(entity) {
        Ok(()) => {
            ctx.schedule(
                ATTACK_TEXTURE_DURATION,
                DeferredAction::RestoreTexture { entity: hazard },
            );
        }
        Err(error) => warn!(error = %error, "attack_effect_failed"),
    }

    let damage = ctx.combat.rng.gen_range(COUNTER_ATTACK_DAMAGE);
    let player = world.player_mut();
    player.health = (player.health - damage).max(0);
    info!(
        entity_id = hazard.id.0,
        damage,
        player_health = player.health,
        "player_hit"
    );
    if player.health == 0 {
        warn!(entity_id = hazard.id.0, "player_defeated");
        ctx.request(SceneCommand::ReloadCurrent);
    }
    CounterOutcome::Struck
}

pub(crate) fn restore_texture(ctx: &mut SimContext, world: &mut SceneWorld, entity: EntityHandle) {
    let Some(entity) = world.resolve_mut(entity) else {
        return;
    };
    if let Err(error) = ctx.combat.effects.restore_texture(entity) {
        warn!(error = %error, "attack_effect_restore_failed");
    }
}

pub(crate) fn remove_hazard(world: &mut SceneWorld, entity: EntityHandle) {
    if world.resolve(entity).is_none() {
        debug!(entity_id = entity.id.0, "hazard_removal_stale");
        return;
    }
    if world.despawn(entity.id) {
        info!(entity_id = entity.id.0, "hazard_removed");
    }
}
