use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

/// Loop rates over the last interval plus the world load at its end.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub entity_count: usize,
    pub pending_actions: usize,
}

/// Shared read side of the loop metrics. Cloning shares the same slot.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                poisoned.into_inner()
            }
        };
        *guard = snapshot;
    }
}

/// Counters that restart with every interval.
#[derive(Debug, Default)]
struct IntervalCounts {
    frames: u32,
    ticks: u32,
    frame_time_sum: Duration,
}

/// World load sampled by the loop. Survives interval boundaries so a quiet
/// interval still reports the last known load.
#[derive(Debug, Default, Clone, Copy)]
struct WorldLoad {
    entity_count: usize,
    pending_actions: usize,
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    counts: IntervalCounts,
    load: WorldLoad,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval_start: Instant::now(),
            interval,
            counts: IntervalCounts::default(),
            load: WorldLoad::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.counts.frames = self.counts.frames.saturating_add(1);
        self.counts.frame_time_sum = self.counts.frame_time_sum.saturating_add(frame_dt);
    }

    pub(crate) fn record_tick(&mut self) {
        self.counts.ticks = self.counts.ticks.saturating_add(1);
    }

    /// Last writer wins.
    pub(crate) fn record_world(&mut self, entity_count: usize, pending_actions: usize) {
        self.load = WorldLoad {
            entity_count,
            pending_actions,
        };
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let counts = std::mem::take(&mut self.counts);
        self.interval_start = now;

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match counts.frames {
            0 => 0.0,
            frames => counts.frame_time_sum.as_secs_f32() * 1000.0 / frames as f32,
        };
        Some(LoopMetricsSnapshot {
            fps: counts.frames as f32 / elapsed_seconds,
            tps: counts.ticks as f32 / elapsed_seconds,
            frame_time_ms,
            entity_count: self.load.entity_count,
            pending_actions: self.load.pending_actions,
        })
    }
}
