use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{MovementMode, Vec3, WorldDocument, WorldRuntime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) const SAVE_VERSION: u32 = 1;
pub(crate) const RUNTIME_SAVE_FILE: &str = "runtime.save.json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct SavedPosition {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) z: f32,
}

/// Where the player was, in which scene, under which movement mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RuntimeSnapshot {
    pub(crate) save_version: u32,
    pub(crate) scene_id: String,
    pub(crate) player_position: SavedPosition,
    pub(crate) player_yaw_radians: f32,
    pub(crate) player_health: i32,
    pub(crate) movement_mode: MovementMode,
}

#[derive(Debug, Error)]
pub(crate) enum SnapshotError {
    #[error("no scene is loaded; nothing to save")]
    NoActiveScene,
    #[error("encode snapshot json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("create save directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write save file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read save file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse save json at {location}: {message}")]
    Parse { location: String, message: String },
    #[error("validation failed at {field}: expected {expected}, got {actual}")]
    Validation {
        field: &'static str,
        expected: String,
        actual: String,
    },
    #[error("restore scene: {0}")]
    Restore(#[from] engine::LifecycleError),
}

pub(crate) fn save_file_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("saves").join(RUNTIME_SAVE_FILE)
}

pub(crate) fn capture_snapshot(runtime: &WorldRuntime) -> Result<RuntimeSnapshot, SnapshotError> {
    let scene = runtime.current_scene().ok_or(SnapshotError::NoActiveScene)?;
    let player = runtime.player();
    let position = player.transform.position;
    Ok(RuntimeSnapshot {
        save_version: SAVE_VERSION,
        scene_id: scene.id.clone(),
        player_position: SavedPosition {
            x: position.x,
            y: position.y,
            z: position.z,
        },
        player_yaw_radians: player.transform.yaw_radians,
        player_health: player.health,
        movement_mode: runtime.movement_mode().unwrap_or(scene.movement_mode),
    })
}

pub(crate) fn write_snapshot(path: &Path, snapshot: &RuntimeSnapshot) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SnapshotError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(snapshot).map_err(SnapshotError::Encode)?;
    fs::write(path, json).map_err(|source| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_snapshot(path: &Path) -> Result<RuntimeSnapshot, SnapshotError> {
    let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_snapshot_json(&raw)
}

pub(crate) fn parse_snapshot_json(raw: &str) -> Result<RuntimeSnapshot, SnapshotError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let location = match error.path().to_string() {
            path if path.is_empty() || path == "." => "$".to_string(),
            path => path,
        };
        SnapshotError::Parse {
            location,
            message: error.into_inner().to_string(),
        }
    })
}

/// Rejects a snapshot the current world can no longer honour.
pub(crate) fn validate_snapshot(
    snapshot: &RuntimeSnapshot,
    document: &WorldDocument,
) -> Result<(), SnapshotError> {
    if snapshot.save_version != SAVE_VERSION {
        return Err(validation(
            "save_version",
            SAVE_VERSION.to_string(),
            snapshot.save_version.to_string(),
        ));
    }
    if document.scene(&snapshot.scene_id).is_none() {
        return Err(validation(
            "scene_id",
            "a scene in the world document".to_string(),
            format!("`{}`", snapshot.scene_id),
        ));
    }
    let position = snapshot.player_position;
    for (field, value) in [
        ("player_position.x", position.x),
        ("player_position.y", position.y),
        ("player_position.z", position.z),
        ("player_yaw_radians", snapshot.player_yaw_radians),
    ] {
        if !value.is_finite() {
            return Err(validation(field, "finite value".to_string(), value.to_string()));
        }
    }
    if snapshot.player_health <= 0 {
        return Err(validation(
            "player_health",
            "> 0".to_string(),
            snapshot.player_health.to_string(),
        ));
    }
    Ok(())
}

/// Loads the saved scene, then puts the player back. Nothing changes when
/// validation fails.
pub(crate) fn apply_snapshot(
    runtime: &mut WorldRuntime,
    snapshot: &RuntimeSnapshot,
) -> Result<(), SnapshotError> {
    validate_snapshot(snapshot, runtime.document())?;
    runtime.load_scene(&snapshot.scene_id)?;
    if runtime.movement_mode() != Some(snapshot.movement_mode) {
        runtime.set_movement_mode(snapshot.movement_mode);
    }
    let position = snapshot.player_position;
    runtime.restore_player(
        Vec3 {
            x: position.x,
            y: position.y,
            z: position.z,
        },
        snapshot.player_yaw_radians,
        snapshot.player_health,
    );
    Ok(())
}

fn validation(field: &'static str, expected: String, actual: String) -> SnapshotError {
    SnapshotError::Validation {
        field,
        expected,
        actual,
    }
}
