use std::collections::HashMap;
use std::time::Duration;

use tracing::info;

use super::clock::{DeferredAction, DeferredQueue};
use super::combat::CombatSystem;
use super::scene::{EntityHandle, SceneCommand};

/// Gate checked first by every locomotion variant while combat resolves.
/// Each hazard with an exchange in flight holds it; movement resumes once
/// every hold is released.
#[derive(Debug, Default)]
pub struct MovementLock {
    holds: HashMap<EntityHandle, u32>,
}

impl MovementLock {
    pub fn is_locked(&self) -> bool {
        !self.holds.is_empty()
    }

    pub fn engage(&mut self, hazard: EntityHandle, reason: &'static str) {
        if self.holds.is_empty() {
            info!(reason, entity_id = hazard.id.0, "movement_locked");
        }
        *self.holds.entry(hazard).or_insert(0) += 1;
    }

    /// Drops one hold taken by `hazard`.
    pub fn release(&mut self, hazard: EntityHandle, reason: &'static str) {
        let Some(count) = self.holds.get_mut(&hazard) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.holds.remove(&hazard);
        }
        self.log_if_free(reason);
    }

    /// Drops every hold taken by `hazard`.
    pub fn release_hazard(&mut self, hazard: EntityHandle, reason: &'static str) {
        if self.holds.remove(&hazard).is_some() {
            self.log_if_free(reason);
        }
    }

    pub fn release_all(&mut self, reason: &'static str) {
        if !self.holds.is_empty() {
            self.holds.clear();
            self.log_if_free(reason);
        }
    }

    fn log_if_free(&self, reason: &'static str) {
        if self.holds.is_empty() {
            info!(reason, "movement_unlocked");
        }
    }
}

/// State shared by the locomotion strategies, the combat system and the
/// deferred actions of one runtime.
pub struct SimContext {
    now: Duration,
    pub movement_lock: MovementLock,
    pub deferred: DeferredQueue,
    pub combat: CombatSystem,
    commands: Vec<SceneCommand>,
}

impl SimContext {
    pub fn new(combat: CombatSystem) -> Self {
        Self {
            now: Duration::ZERO,
            movement_lock: MovementLock::default(),
            deferred: DeferredQueue::default(),
            combat,
            commands: Vec::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub(crate) fn advance(&mut self, dt: Duration) {
        self.now = self.now.saturating_add(dt);
    }

    pub fn schedule(&mut self, delay: Duration, action: DeferredAction) -> Duration {
        self.deferred.schedule(self.now, delay, action)
    }

    /// Queues a transition for after the current tick.
    pub fn request(&mut self, command: SceneCommand) {
        self.commands.push(command);
    }

    pub fn pending_commands(&self) -> &[SceneCommand] {
        &self.commands
    }

    pub(crate) fn take_commands(&mut self) -> Vec<SceneCommand> {
        std::mem::take(&mut self.commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::scene::EntityId;

    fn hazard(id: u64) -> EntityHandle {
        EntityHandle {
            epoch: 1,
            id: EntityId(id),
        }
    }

    #[test]
    fn lock_holds_until_every_exchange_resolves() {
        let mut lock = MovementLock::default();
        lock.engage(hazard(1), "combat");
        lock.engage(hazard(1), "combat");
        lock.engage(hazard(2), "combat");

        lock.release(hazard(1), "combat_resolved");
        assert!(lock.is_locked());
        lock.release(hazard(2), "combat_resolved");
        assert!(lock.is_locked());
        lock.release(hazard(1), "combat_resolved");
        assert!(!lock.is_locked());
    }

    #[test]
    fn releasing_a_hazard_drops_all_of_its_holds_only() {
        let mut lock = MovementLock::default();
        lock.engage(hazard(1), "combat");
        lock.engage(hazard(1), "combat");
        lock.engage(hazard(2), "combat");
        lock.release_hazard(hazard(1), "hazard_defeated");
        assert!(lock.is_locked());
        lock.release(hazard(1), "hazard_dead");
        assert!(lock.is_locked());
        lock.release_all("scene_loaded");
        assert!(!lock.is_locked());
    }
}
