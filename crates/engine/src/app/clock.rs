use std::collections::BTreeMap;
use std::time::Duration;

use super::scene::EntityHandle;

pub const GRID_MOVE_COOLDOWN: Duration = Duration::from_millis(250);
pub const TURN_COOLDOWN: Duration = Duration::from_millis(500);
pub const AR_ALIGNMENT_DELAY: Duration = Duration::from_millis(500);
pub const ATTACK_TEXTURE_DURATION: Duration = Duration::from_millis(800);
pub const HAZARD_DAMAGE_COOLDOWN: Duration = Duration::from_millis(1000);
pub const COMBAT_RESOLUTION_DELAY: Duration = Duration::from_millis(1000);
pub const SCENE_CHANGED_DELAY: Duration = Duration::from_millis(300);

/// Work scheduled for a later tick. Entity targets carry the epoch they were
/// scheduled in and must be re-validated before use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    CounterAttack { hazard: EntityHandle },
    RemoveEntity { entity: EntityHandle },
    UnlockMovement { hazard: EntityHandle },
    RestoreTexture { entity: EntityHandle },
    NotifySceneChanged { scene_id: String, epoch: u64 },
}

/// Deadline-ordered queue. Entries due at the same instant fire in the order
/// they were scheduled.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    entries: BTreeMap<(Duration, u64), DeferredAction>,
    next_sequence: u64,
}

impl DeferredQueue {
    pub fn schedule(&mut self, now: Duration, delay: Duration, action: DeferredAction) -> Duration {
        let due = now.saturating_add(delay);
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        self.entries.insert((due, sequence), action);
        due
    }

    pub fn pop_due(&mut self, now: Duration) -> Option<DeferredAction> {
        let key = *self.entries.keys().next()?;
        if key.0 > now {
            return None;
        }
        self.entries.remove(&key)
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.entries.keys().next().map(|(due, _)| *due)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Duration, &DeferredAction)> {
        self.entries.iter().map(|((due, _), action)| (*due, action))
    }
}
