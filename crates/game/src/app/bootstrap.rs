use std::path::PathBuf;

use engine::{
    load_world_document, resolve_app_paths, AppPaths, LoopConfig, MovementMode, RuntimeConfig,
    SessionHooks, StartupError, WorldLoadError, WorldRuntime,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::session::{save_file_path, GameSession, SceneLogObserver};

const WORLD_PATH_ENV_VAR: &str = "TILEWORLD_WORLD";
const START_SCENE_ENV_VAR: &str = "TILEWORLD_START_SCENE";
const MOVEMENT_MODE_ENV_VAR: &str = "TILEWORLD_MOVEMENT_MODE";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) runtime: WorldRuntime,
    pub(crate) hooks: Box<dyn SessionHooks>,
    pub(crate) paths: AppPaths,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    WorldLoad(#[from] WorldLoadError),
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Tile World Startup ===");

    let paths = resolve_app_paths()?;
    let lookup = |name: &str| std::env::var(name).ok();
    let world_path = world_path_from(&paths, lookup);
    let document = load_world_document(&world_path)?;
    let runtime_config = runtime_config_from(lookup);
    info!(
        world = %world_path.display(),
        scenes = document.scenes.len(),
        sprites = document.sprites.len(),
        start_scene = runtime_config.start_scene.as_deref().unwrap_or("<first>"),
        "world_document_loaded"
    );

    let mut runtime = WorldRuntime::new(document, runtime_config).with_store_path(world_path);
    runtime.add_observer(Box::new(SceneLogObserver));
    let hooks = Box::new(GameSession::new(save_file_path(&paths.cache_dir)));

    Ok(AppWiring {
        config: LoopConfig::default(),
        runtime,
        hooks,
        paths,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn world_path_from(paths: &AppPaths, lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    lookup(WORLD_PATH_ENV_VAR)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.world_path.clone())
}

fn runtime_config_from(lookup: impl Fn(&str) -> Option<String>) -> RuntimeConfig {
    let start_scene = lookup(START_SCENE_ENV_VAR)
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty());
    let movement_override = lookup(MOVEMENT_MODE_ENV_VAR).and_then(|raw| {
        let mode = MovementMode::from_token(&raw);
        if mode.is_none() {
            warn!(
                var = MOVEMENT_MODE_ENV_VAR,
                value = %raw,
                "movement_mode_override_ignored"
            );
        }
        mode
    });

    RuntimeConfig {
        movement_override,
        start_scene,
        ..RuntimeConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| vars.get(name).cloned()
    }

    fn paths_in(root: &std::path::Path) -> AppPaths {
        AppPaths {
            root: root.to_path_buf(),
            assets_dir: root.join("assets"),
            world_path: root.join("assets").join("world.json"),
            cache_dir: root.join("cache"),
            export_dir: root.join("cache").join("export"),
        }
    }

    #[test]
    fn empty_environment_uses_scene_defaults() {
        let config = runtime_config_from(env_of(&[]));
        assert_eq!(config.start_scene, None);
        assert_eq!(config.movement_override, None);
    }

    #[test]
    fn start_scene_and_mode_come_from_environment() {
        let config = runtime_config_from(env_of(&[
            (START_SCENE_ENV_VAR, " cellar "),
            (MOVEMENT_MODE_ENV_VAR, "AR"),
        ]));
        assert_eq!(config.start_scene.as_deref(), Some("cellar"));
        assert_eq!(config.movement_override, Some(MovementMode::Ar));
    }

    #[test]
    fn unknown_movement_mode_is_ignored() {
        let config = runtime_config_from(env_of(&[(MOVEMENT_MODE_ENV_VAR, "teleport")]));
        assert_eq!(config.movement_override, None);
    }

    #[test]
    fn world_path_override_wins_over_assets() {
        let root = tempfile::tempdir().expect("root");
        let paths = paths_in(root.path());
        assert_eq!(world_path_from(&paths, env_of(&[])), paths.world_path);
        assert_eq!(
            world_path_from(&paths, env_of(&[(WORLD_PATH_ENV_VAR, "/tmp/other.json")])),
            PathBuf::from("/tmp/other.json")
        );
        assert_eq!(
            world_path_from(&paths, env_of(&[(WORLD_PATH_ENV_VAR, "  ")])),
            paths.world_path
        );
    }
}
