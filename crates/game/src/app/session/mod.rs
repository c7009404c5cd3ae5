mod snapshot;

use std::path::PathBuf;

use engine::{InputSnapshot, SceneChanged, SceneObserver, SessionHooks, WorldRuntime};
use tracing::{info, warn};

pub(crate) use snapshot::save_file_path;
use snapshot::{apply_snapshot, capture_snapshot, read_snapshot, write_snapshot};

/// Quick save on F5, quick load on F9. Both act between ticks.
pub(crate) struct GameSession {
    save_path: PathBuf,
    saves_written: u32,
    loads_applied: u32,
}

impl GameSession {
    pub(crate) fn new(save_path: PathBuf) -> Self {
        Self {
            save_path,
            saves_written: 0,
            loads_applied: 0,
        }
    }

    fn save(&mut self, runtime: &WorldRuntime) {
        let result = capture_snapshot(runtime)
            .and_then(|snapshot| write_snapshot(&self.save_path, &snapshot).map(|_| snapshot));
        match result {
            Ok(snapshot) => {
                self.saves_written += 1;
                info!(
                    path = %self.save_path.display(),
                    scene = %snapshot.scene_id,
                    movement_mode = snapshot.movement_mode.as_token(),
                    "save_written"
                );
            }
            Err(err) => warn!(path = %self.save_path.display(), error = %err, "save_failed"),
        }
    }

    fn load(&mut self, runtime: &mut WorldRuntime) {
        let result = read_snapshot(&self.save_path)
            .and_then(|snapshot| apply_snapshot(runtime, &snapshot).map(|_| snapshot));
        match result {
            Ok(snapshot) => {
                self.loads_applied += 1;
                info!(
                    path = %self.save_path.display(),
                    scene = %snapshot.scene_id,
                    health = snapshot.player_health,
                    "save_loaded"
                );
            }
            Err(err) => warn!(path = %self.save_path.display(), error = %err, "load_failed"),
        }
    }
}

impl SessionHooks for GameSession {
    fn before_tick(&mut self, runtime: &mut WorldRuntime, input: &InputSnapshot) {
        if input.save_pressed() {
            self.save(runtime);
        }
        if input.load_pressed() {
            self.load(runtime);
        }
    }

    fn on_shutdown(&mut self, runtime: &mut WorldRuntime) {
        info!(
            saves_written = self.saves_written,
            loads_applied = self.loads_applied,
            scene = runtime.current_scene().map(|scene| scene.id.as_str()).unwrap_or("<none>"),
            "session_ended"
        );
    }
}

#[derive(Default)]
pub(crate) struct SceneLogObserver;

impl SceneObserver for SceneLogObserver {
    fn on_scene_changed(&mut self, event: &SceneChanged) {
        info!(scene = %event.scene_id, epoch = event.epoch, "scene_changed");
    }
}
