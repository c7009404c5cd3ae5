use tracing::debug;

use super::scene::{Entity, HealthBar, LifeState, ProximityText, SceneWorld, TextPlacement};
use crate::content::{Capability, CapabilityTag, LifeSystemConfig, SpriteDef, TextNearConfig};

type AttachFn = fn(Capability<'_>, &mut Entity) -> bool;

/// Fixed dispatch table, one entry per capability tag.
const REGISTRY: [(CapabilityTag, AttachFn); 3] = [
    (CapabilityTag::LifeSystem, attach_life_system),
    (CapabilityTag::ShowTextNear, attach_text_near),
    (CapabilityTag::ShowHudText, attach_hud_text),
];

/// Attaches every enabled, non-trivial capability of `sprite`. Returns how
/// many were attached.
pub fn attach_capabilities(sprite: &SpriteDef, entity: &mut Entity) -> usize {
    let mut attached = 0;
    for (tag, attach) in REGISTRY {
        let Some(capability) = sprite.capabilities.get(tag) else {
            continue;
        };
        if attach(capability, entity) {
            attached += 1;
        } else {
            debug!(sprite_id = %sprite.id, capability = tag.as_str(), "capability_skipped");
        }
    }
    attached
}

fn life_config_usable(config: &LifeSystemConfig) -> bool {
    config.enabled != Some(false) && config.max_life > 0
}

fn text_config_usable(config: &TextNearConfig) -> bool {
    config.enabled != Some(false)
        && !config.text.trim().is_empty()
        && config.distance.is_finite()
        && config.distance > 0.0
}

fn attach_life_system(capability: Capability<'_>, entity: &mut Entity) -> bool {
    let Capability::LifeSystem(config) = capability else {
        return false;
    };
    if !life_config_usable(config) {
        return false;
    }
    let life = LifeState::new(config.max_life);
    entity.health_bar = Some(HealthBar {
        fraction: life.fraction(),
    });
    entity.life = Some(life);
    true
}

fn attach_text(config: &TextNearConfig, placement: TextPlacement, entity: &mut Entity) -> bool {
    if !text_config_usable(config) {
        return false;
    }
    entity.texts.push(ProximityText {
        text: config.text.clone(),
        distance: config.distance,
        placement,
        visible: false,
    });
    true
}

fn attach_text_near(capability: Capability<'_>, entity: &mut Entity) -> bool {
    match capability {
        Capability::ShowTextNear(config) => attach_text(config, TextPlacement::World, entity),
        _ => false,
    }
}

fn attach_hud_text(capability: Capability<'_>, entity: &mut Entity) -> bool {
    match capability {
        Capability::ShowHudText(config) => attach_text(config, TextPlacement::Hud, entity),
        _ => false,
    }
}

/// Per-tick pass: proximity texts are shown while the player is within their
/// distance.
pub fn update_proximity_texts(world: &mut SceneWorld) {
    let player = world.player().position();
    for entity in world.entities_mut() {
        if entity.texts.is_empty() {
            continue;
        }
        let distance = player.planar_distance(entity.transform.position);
        for text in &mut entity.texts {
            text.visible = distance <= text.distance;
        }
    }
}

/// Texts currently visible, in entity order.
pub fn visible_texts(world: &SceneWorld, placement: TextPlacement) -> Vec<&str> {
    world
        .entities()
        .iter()
        .flat_map(|entity| entity.texts.iter())
        .filter(|text| text.visible && text.placement == placement)
        .map(|text| text.text.as_str())
        .collect()
}
