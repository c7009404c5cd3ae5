use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use super::capabilities::update_proximity_texts;
use super::clock::DeferredAction;
use super::combat::{self, CombatSystem, DamageOutcome};
use super::context::SimContext;
use super::input::InputSnapshot;
use super::lifecycle::{
    LifecycleError, LifecycleState, SceneChanged, SceneEnv, SceneLifecycle, SceneObserver,
};
use super::locomotion::{FreeTuning, LocomotionComponent, LocomotionConfig};
use super::math::{Transform, Vec3};
use super::scene::{EntityId, Player, SceneCommand, SceneWorld};
use crate::content::{
    export_bundle, import_world_document, persist_world_document, BundleManifest, ExportError,
    ImportError, ImportMode, ImportSummary, MovementMode, PersistError, SceneDef, SpriteCatalog,
    SpriteDef, WorldDocument,
};

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Wins over every scene's own `movementMode` when set.
    pub movement_override: Option<MovementMode>,
    pub start_scene: Option<String>,
    pub free_tuning: FreeTuning,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Owns the world document and the live scene, and drives both one fixed
/// tick at a time.
pub struct WorldRuntime {
    document: WorldDocument,
    catalog: SpriteCatalog,
    world: SceneWorld,
    ctx: SimContext,
    lifecycle: SceneLifecycle,
    locomotion: LocomotionComponent,
    config: RuntimeConfig,
    store_path: Option<PathBuf>,
}

impl WorldRuntime {
    pub fn new(document: WorldDocument, config: RuntimeConfig) -> Self {
        let catalog = SpriteCatalog::from_sprites(&document.sprites);
        Self {
            document,
            catalog,
            world: SceneWorld::default(),
            ctx: SimContext::new(CombatSystem::from_entropy()),
            lifecycle: SceneLifecycle::default(),
            locomotion: LocomotionComponent::default(),
            config,
            store_path: None,
        }
    }

    pub fn with_combat(mut self, combat: CombatSystem) -> Self {
        self.ctx.combat = combat;
        self
    }

    /// Edits and imports are written back to `path`.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Loads the configured start scene, falling back to the first scene in
    /// the document.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        let configured = self
            .config
            .start_scene
            .clone()
            .filter(|scene_id| {
                let known = self.document.scene(scene_id).is_some();
                if !known {
                    warn!(scene_id = %scene_id, "start_scene_not_found_using_first");
                }
                known
            });
        let scene_id = match configured {
            Some(scene_id) => scene_id,
            None => self
                .document
                .first_scene_id()
                .map(str::to_string)
                .ok_or(LifecycleError::EmptyWorld)?,
        };
        self.load_scene(&scene_id)
    }

    /// One simulation step: timers, input edges, locomotion, capability
    /// ticks, pending spawns, then at most one scene transition.
    pub fn tick(&mut self, dt: Duration, input: &InputSnapshot) {
        self.ctx.advance(dt);
        self.fire_due_actions();

        if input.reload_pressed() {
            self.ctx.request(SceneCommand::ReloadCurrent);
        }
        if input.cycle_mode_pressed() {
            self.cycle_movement_mode();
        }

        self.locomotion.tick(dt, input, &mut self.ctx, &mut self.world);
        update_proximity_texts(&mut self.world);
        self.world.apply_pending();
        self.apply_scene_commands();
    }

    fn fire_due_actions(&mut self) {
        let now = self.ctx.now();
        while let Some(action) = self.ctx.deferred.pop_due(now) {
            match action {
                DeferredAction::CounterAttack { hazard } => {
                    combat::counter_attack(&mut self.ctx, &mut self.world, hazard);
                }
                DeferredAction::RemoveEntity { entity } => {
                    combat::remove_hazard(&mut self.world, entity);
                }
                DeferredAction::UnlockMovement { hazard } => {
                    self.ctx.movement_lock.release(hazard, "combat_resolved");
                }
                DeferredAction::RestoreTexture { entity } => {
                    combat::restore_texture(&mut self.ctx, &mut self.world, entity);
                }
                DeferredAction::NotifySceneChanged { scene_id, epoch } => {
                    let event = SceneChanged { scene_id, epoch };
                    self.lifecycle.dispatch_scene_changed(self.world.epoch(), &event);
                }
            }
        }
    }

    fn apply_scene_commands(&mut self) {
        let mut commands = self.ctx.take_commands().into_iter();
        let Some(command) = commands.next() else {
            return;
        };
        for superseded in commands {
            info!(command = ?superseded, "scene_command_superseded");
        }
        let result = match command {
            SceneCommand::LoadScene(scene_id) => self.load_scene(&scene_id),
            SceneCommand::ReloadCurrent => self.reload(None),
        };
        if let Err(error) = result {
            warn!(error = %error, "scene_command_failed");
        }
    }

    pub fn current_scene(&self) -> Option<&SceneDef> {
        self.lifecycle
            .current_scene_id()
            .and_then(|scene_id| self.document.scene(scene_id))
    }

    pub fn load_scene(&mut self, scene_id: &str) -> Result<(), LifecycleError> {
        let env = SceneEnv {
            document: &self.document,
            catalog: &self.catalog,
            world: &mut self.world,
            ctx: &mut self.ctx,
            locomotion: &mut self.locomotion,
            movement_override: self.config.movement_override,
            free_tuning: self.config.free_tuning,
        };
        self.lifecycle.load_scene(scene_id, env)
    }

    /// Reloads `scene_id`, or the current scene when `None`.
    pub fn reload(&mut self, scene_id: Option<&str>) -> Result<(), LifecycleError> {
        let scene_id = match scene_id {
            Some(scene_id) => scene_id.to_string(),
            None => self
                .lifecycle
                .current_scene_id()
                .map(str::to_string)
                .ok_or(LifecycleError::NoActiveScene)?,
        };
        self.load_scene(&scene_id)
    }

    pub fn unload(&mut self) {
        self.lifecycle.unload(&mut self.ctx, &mut self.world, &mut self.locomotion);
    }

    pub fn sprite(&self, sprite_id: &str) -> Option<&SpriteDef> {
        self.catalog.get(sprite_id)
    }

    pub fn document(&self) -> &WorldDocument {
        &self.document
    }

    /// Applies an editor mutation, persists it when a store path is set and
    /// rebuilds the live scene from the new data.
    pub fn edit_world(
        &mut self,
        edit: impl FnOnce(&mut WorldDocument),
    ) -> Result<(), RuntimeError> {
        edit(&mut self.document);
        self.document_changed()?;
        Ok(())
    }

    /// The in-memory document is untouched when `raw` fails to import.
    pub fn import_world(
        &mut self,
        raw: &str,
        mode: ImportMode,
    ) -> Result<ImportSummary, RuntimeError> {
        let summary = import_world_document(&mut self.document, raw, mode)?;
        self.document_changed()?;
        Ok(summary)
    }

    pub fn export_bundle(
        &self,
        asset_root: &Path,
        out_dir: &Path,
    ) -> Result<BundleManifest, RuntimeError> {
        Ok(export_bundle(&self.document, asset_root, out_dir)?)
    }

    fn document_changed(&mut self) -> Result<(), RuntimeError> {
        self.catalog = SpriteCatalog::from_sprites(&self.document.sprites);
        if let Some(path) = self.store_path.as_deref() {
            persist_world_document(path, &self.document)?;
        }

        let target = self
            .lifecycle
            .current_scene_id()
            .filter(|scene_id| self.document.scene(scene_id).is_some())
            .or_else(|| self.document.first_scene_id())
            .map(str::to_string);
        match target {
            Some(scene_id) => self.load_scene(&scene_id)?,
            None => self.unload(),
        }
        Ok(())
    }

    /// Direct damage; bypasses the proximity trigger cooldown.
    pub fn take_damage(&mut self, entity: EntityId, amount: i32) -> DamageOutcome {
        let handle = self.world.handle(entity);
        combat::take_damage(&mut self.ctx, &mut self.world, handle, amount)
    }

    pub fn movement_mode(&self) -> Option<MovementMode> {
        self.locomotion.mode()
    }

    /// Overrides the movement mode for this and every later scene.
    pub fn set_movement_mode(&mut self, mode: MovementMode) {
        self.config.movement_override = Some(mode);
        let Some(scene) = self.current_scene() else {
            return;
        };
        let config = LocomotionConfig {
            ar_player_scale: scene.ar_player_scale,
            free: self.config.free_tuning,
        };
        self.locomotion.attach(mode, &config, &mut self.ctx, &mut self.world);
    }

    pub fn cycle_movement_mode(&mut self) {
        let current = self
            .locomotion
            .mode()
            .or(self.config.movement_override)
            .unwrap_or_default();
        let next = current.next();
        info!(
            from = current.as_token(),
            to = next.as_token(),
            "movement_mode_cycled"
        );
        self.set_movement_mode(next);
    }

    pub fn add_observer(&mut self, observer: Box<dyn SceneObserver>) {
        self.lifecycle.add_observer(observer);
    }

    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub fn player(&self) -> &Player {
        self.world.player()
    }

    /// Puts the player back where a saved session left it.
    pub fn restore_player(&mut self, position: Vec3, yaw_radians: f32, health: i32) {
        let player = self.world.player_mut();
        player.transform = Transform {
            position,
            yaw_radians,
        };
        player.health = health.clamp(1, player.max_health);
    }

    pub fn now(&self) -> Duration {
        self.ctx.now()
    }

    pub fn pending_actions(&self) -> usize {
        self.ctx.deferred.len()
    }

    pub fn movement_locked(&self) -> bool {
        self.ctx.movement_lock.is_locked()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn shutdown(&mut self) {
        self.unload();
        info!(
            pending_actions = self.ctx.deferred.len(),
            sim_time_ms = self.ctx.now().as_millis() as u64,
            "runtime_shutdown"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    use super::*;
    use crate::app::input::InputAction;
    use crate::content::{parse_world_document, LayerDef, RenderKind, BUNDLE_WORLD_FILE};

    const TICK: Duration = Duration::from_millis(16);

    fn scenario_world() -> WorldDocument {
        let mut start = SceneDef::new("S", 10);
        start.player_spawn.x = 5;
        start.player_spawn.z = 5;
        let mut floor = LayerDef::filled(-1, 10);
        for z in 0..10 {
            for x in 0..10 {
                floor.set(x, z, Some("floor"));
            }
        }
        start.layers.push(floor);
        let collision = start.layer_mut(0).expect("collision layer");
        collision.set(6, 5, Some("wall"));
        collision.set(4, 5, Some("portal"));
        collision.set(1, 1, Some("slime"));

        let mut target = SceneDef::new("T", 4);
        target.player_spawn.x = 1;
        target.player_spawn.z = 2;

        WorldDocument {
            sprites: vec![
                SpriteDef::new("floor", RenderKind::SolidBlock),
                SpriteDef::new("wall", RenderKind::SolidBlock).with_collision(true),
                SpriteDef::new("portal", RenderKind::Billboard).with_change_scene("T"),
                SpriteDef::new("slime", RenderKind::Billboard)
                    .with_collision(true)
                    .with_life(30),
            ],
            scenes: vec![start, target],
        }
    }

    fn started(document: WorldDocument) -> WorldRuntime {
        let mut runtime = WorldRuntime::new(document, RuntimeConfig::default())
            .with_combat(CombatSystem::seeded(7));
        runtime.start().expect("start");
        runtime
    }

    fn planar_cell(runtime: &WorldRuntime) -> (i64, i64) {
        let geometry = runtime.world().geometry().expect("geometry");
        let cell = geometry.cell_at(runtime.player().position());
        (cell.x, cell.z)
    }

    fn pressing(action: InputAction) -> InputSnapshot {
        InputSnapshot::empty().with_action_down(action, true)
    }

    fn sprite_on_layer(runtime: &WorldRuntime, sprite_id: &str, layer_index: i32) -> EntityId {
        runtime
            .world()
            .entities()
            .iter()
            .find(|entity| entity.sprite_id == sprite_id && entity.layer_index == layer_index)
            .map(|entity| entity.id)
            .expect("sprite spawned")
    }

    fn life_of(runtime: &WorldRuntime, id: EntityId) -> i32 {
        runtime
            .world()
            .find_entity(id)
            .and_then(|entity| entity.life)
            .map(|life| life.current_life)
            .expect("hazard life")
    }

    fn scene_id(runtime: &WorldRuntime) -> Option<&str> {
        runtime.current_scene().map(|scene| scene.id.as_str())
    }

    struct Recorder(Rc<RefCell<Vec<SceneChanged>>>);

    impl SceneObserver for Recorder {
        fn on_scene_changed(&mut self, event: &SceneChanged) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn current_scene_is_none_before_first_load() {
        let runtime = WorldRuntime::new(scenario_world(), RuntimeConfig::default());
        assert!(runtime.current_scene().is_none());
        assert_eq!(runtime.lifecycle_state(), LifecycleState::Unloaded);
    }

    #[test]
    fn unknown_start_scene_falls_back_to_first() {
        let config = RuntimeConfig {
            start_scene: Some("missing".to_string()),
            ..RuntimeConfig::default()
        };
        let mut runtime = WorldRuntime::new(scenario_world(), config);
        runtime.start().expect("start");
        assert_eq!(runtime.current_scene().map(|scene| scene.id.as_str()), Some("S"));
    }

    #[test]
    fn empty_world_cannot_start() {
        let mut runtime = WorldRuntime::new(WorldDocument::empty(), RuntimeConfig::default());
        assert_eq!(runtime.start(), Err(LifecycleError::EmptyWorld));
    }

    #[test]
    fn loading_unknown_scene_keeps_current_scene_active() {
        let mut runtime = started(scenario_world());
        let entity_count = runtime.world().entity_count();
        let error = runtime.load_scene("nowhere").expect_err("unknown scene");
        assert_eq!(
            error,
            LifecycleError::SceneNotFound {
                scene_id: "nowhere".to_string()
            }
        );
        assert_eq!(runtime.current_scene().map(|scene| scene.id.as_str()), Some("S"));
        assert_eq!(runtime.lifecycle_state(), LifecycleState::Active);
        assert_eq!(runtime.world().entity_count(), entity_count);
    }

    #[test]
    fn wall_to_the_east_blocks_the_move() {
        let mut runtime = started(scenario_world());
        assert_eq!(planar_cell(&runtime), (5, 5));
        runtime.tick(TICK, &pressing(InputAction::StrafeRight));
        assert_eq!(planar_cell(&runtime), (5, 5));
        assert_eq!(runtime.current_scene().map(|scene| scene.id.as_str()), Some("S"));
    }

    #[test]
    fn portal_to_the_west_loads_target_scene() {
        let mut runtime = started(scenario_world());
        runtime.tick(TICK, &pressing(InputAction::StrafeLeft));
        assert_eq!(runtime.current_scene().map(|scene| scene.id.as_str()), Some("T"));
        assert_eq!(planar_cell(&runtime), (1, 2));
    }

    #[test]
    fn two_pulses_inside_cooldown_move_once() {
        let mut runtime = started(scenario_world());
        let forward = pressing(InputAction::MoveForward);
        runtime.tick(TICK, &forward);
        runtime.tick(TICK, &forward);
        assert_eq!(planar_cell(&runtime), (5, 4));

        runtime.tick(Duration::from_millis(250), &forward);
        assert_eq!(planar_cell(&runtime), (5, 3));
    }

    #[test]
    fn hazard_dies_after_three_direct_hits_and_is_removed() {
        let mut runtime = started(scenario_world());
        let slime = runtime
            .world()
            .entities()
            .iter()
            .find(|entity| entity.sprite_id == "slime")
            .map(|entity| entity.id)
            .expect("slime spawned");

        assert_eq!(runtime.take_damage(slime, 10), DamageOutcome::Wounded { remaining: 20 });
        assert_eq!(runtime.take_damage(slime, 10), DamageOutcome::Wounded { remaining: 10 });
        assert_eq!(runtime.take_damage(slime, 10), DamageOutcome::Killed);
        assert!(runtime.world().find_entity(slime).is_some());

        runtime.tick(Duration::from_millis(1000), &InputSnapshot::empty());
        assert!(runtime.world().find_entity(slime).is_none());
        assert!(!runtime.movement_locked());
    }

    #[test]
    fn hazard_below_the_collision_layer_is_walked_over() {
        let mut document = scenario_world();
        let scene = document.scene_mut("S").expect("scene");
        scene.layer_mut(-1).expect("floor layer").set(5, 4, Some("slime"));
        let mut runtime = started(document);
        let buried = sprite_on_layer(&runtime, "slime", -1);

        runtime.tick(TICK, &pressing(InputAction::MoveForward));
        assert_eq!(planar_cell(&runtime), (5, 4));
        assert_eq!(life_of(&runtime, buried), 30);
        assert!(!runtime.movement_locked());
    }

    #[test]
    fn diagonal_hazard_does_not_hold_back_a_forward_step() {
        let mut document = scenario_world();
        let scene = document.scene_mut("S").expect("scene");
        scene.layer_mut(0).expect("collision layer").set(6, 4, Some("slime"));
        let mut runtime = started(document);
        let beside = runtime
            .world()
            .entities()
            .iter()
            .find(|entity| entity.sprite_id == "slime" && entity.cell.x == 6 && entity.cell.z == 4)
            .map(|entity| entity.id)
            .expect("slime at (6, 4)");

        runtime.tick(TICK, &pressing(InputAction::MoveForward));
        assert_eq!(planar_cell(&runtime), (5, 4));
        assert_eq!(life_of(&runtime, beside), 30);
        assert!(!runtime.movement_locked());
    }

    #[test]
    fn free_mode_stops_short_of_a_wall_by_the_margin() {
        let mut runtime = started(scenario_world());
        runtime.set_movement_mode(MovementMode::Free);
        let step = Duration::from_millis(100);

        // 0.3 of travel lands in the open half of (5, 5); the margin reaches (6, 5).
        runtime.tick(step, &pressing(InputAction::StrafeRight));
        assert_eq!(runtime.player().position().x, 0.0);

        runtime.tick(step, &pressing(InputAction::MoveForward));
        assert!((runtime.player().position().z + 0.3).abs() < 1e-4);
        assert_eq!(scene_id(&runtime), Some("S"));
    }

    #[test]
    fn free_mode_walks_into_a_portal() {
        let mut runtime = started(scenario_world());
        runtime.set_movement_mode(MovementMode::Free);
        runtime.tick(Duration::from_millis(100), &pressing(InputAction::StrafeLeft));
        assert_eq!(scene_id(&runtime), Some("T"));
        assert_eq!(planar_cell(&runtime), (1, 2));
        assert_eq!(runtime.movement_mode(), Some(MovementMode::Free));
    }

    #[test]
    fn movement_lock_holds_free_and_ar_players_in_place() {
        let mut runtime = started(scenario_world());
        let slime = sprite_on_layer(&runtime, "slime", 0);
        runtime.take_damage(slime, 10);
        assert!(runtime.movement_locked());

        runtime.set_movement_mode(MovementMode::Free);
        let before = runtime.player().position();
        runtime.tick(Duration::from_millis(100), &pressing(InputAction::MoveForward));
        assert_eq!(runtime.player().position(), before);

        runtime.set_movement_mode(MovementMode::Ar);
        let toward_portal = InputSnapshot::empty().with_head_offset(Vec3::new(-0.8, 0.0, 0.0));
        runtime.tick(Duration::from_millis(100), &toward_portal);
        assert_eq!(scene_id(&runtime), Some("S"));

        // The slime is out of reach, so its counter-attack only releases the lock.
        runtime.tick(Duration::from_millis(800), &toward_portal);
        assert!(!runtime.movement_locked());
        assert_eq!(scene_id(&runtime), Some("T"));
    }

    #[test]
    fn ar_head_hits_hazard_behind_it_without_a_cone() {
        let mut document = scenario_world();
        let scene = document.scene_mut("S").expect("scene");
        scene.layer_mut(0).expect("collision layer").set(5, 6, Some("slime"));
        let mut runtime = started(document);
        runtime.set_movement_mode(MovementMode::Ar);
        let behind = runtime
            .world()
            .entities()
            .iter()
            .find(|entity| entity.sprite_id == "slime" && entity.cell.z == 6)
            .map(|entity| entity.id)
            .expect("slime at (5, 6)");

        runtime.tick(TICK, &InputSnapshot::empty());
        assert_eq!(life_of(&runtime, behind), 30);

        let leaning_back = InputSnapshot::empty().with_head_offset(Vec3::new(0.0, 1.6, 0.4));
        runtime.tick(TICK, &leaning_back);
        assert_eq!(life_of(&runtime, behind), 20);
        assert!(runtime.movement_locked());
        assert_eq!(planar_cell(&runtime), (5, 5));
    }

    #[test]
    fn ar_head_over_a_portal_changes_scene() {
        let mut runtime = started(scenario_world());
        runtime.set_movement_mode(MovementMode::Ar);
        runtime.tick(TICK, &InputSnapshot::empty());
        assert_eq!(scene_id(&runtime), Some("S"));

        let over_portal = InputSnapshot::empty().with_head_offset(Vec3::new(-0.8, 1.6, 0.0));
        runtime.tick(TICK, &over_portal);
        assert_eq!(scene_id(&runtime), Some("T"));
        assert_eq!(runtime.movement_mode(), Some(MovementMode::Ar));
    }

    #[test]
    fn ar_ignores_a_portal_below_the_collision_layer() {
        let mut document = scenario_world();
        let scene = document.scene_mut("S").expect("scene");
        scene.layer_mut(-1).expect("floor layer").set(5, 5, Some("portal"));
        let mut runtime = started(document);
        runtime.set_movement_mode(MovementMode::Ar);

        runtime.tick(TICK, &InputSnapshot::empty());
        runtime.tick(TICK, &InputSnapshot::empty());
        assert_eq!(scene_id(&runtime), Some("S"));
    }

    #[test]
    fn overlapping_combat_keeps_the_lock_until_both_resolve() {
        let mut document = scenario_world();
        let scene = document.scene_mut("S").expect("scene");
        scene.layer_mut(0).expect("collision layer").set(2, 1, Some("slime"));
        let mut runtime = started(document);
        let y = runtime.player().position().y;
        runtime.restore_player(Vec3::new(-4.0, y, -3.0), 0.0, 100);
        let find = |x: i64| {
            runtime
                .world()
                .entities()
                .iter()
                .find(|entity| entity.sprite_id == "slime" && entity.cell.x == x)
                .map(|entity| entity.id)
                .expect("slime")
        };
        let (first, second) = (find(1), find(2));
        let idle = InputSnapshot::empty();

        runtime.take_damage(first, 10);
        runtime.tick(Duration::from_millis(500), &idle);
        runtime.take_damage(second, 10);
        runtime.tick(Duration::from_millis(500), &idle);
        runtime.tick(Duration::from_millis(500), &idle);

        // First exchange resolved at 2000ms; the second is still in flight.
        runtime.tick(Duration::from_millis(600), &idle);
        assert!(runtime.movement_locked());
        runtime.tick(Duration::from_millis(500), &idle);
        assert!(!runtime.movement_locked());
        assert!(runtime.player().health < 100);
    }

    #[test]
    fn observers_hear_about_loads_after_delay_and_stale_notices_drop() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut runtime = WorldRuntime::new(scenario_world(), RuntimeConfig::default());
        runtime.add_observer(Box::new(Recorder(Rc::clone(&events))));
        runtime.start().expect("start");

        runtime.tick(Duration::from_millis(299), &InputSnapshot::empty());
        assert!(events.borrow().is_empty());
        runtime.tick(Duration::from_millis(1), &InputSnapshot::empty());
        assert_eq!(events.borrow().len(), 1);
        assert_eq!(events.borrow()[0].scene_id, "S");

        runtime.load_scene("S").expect("reload S");
        runtime.tick(Duration::from_millis(100), &InputSnapshot::empty());
        runtime.load_scene("T").expect("load T");
        runtime.tick(Duration::from_millis(200), &InputSnapshot::empty());
        assert_eq!(events.borrow().len(), 1);
        runtime.tick(Duration::from_millis(100), &InputSnapshot::empty());
        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].scene_id, "T");
    }

    #[test]
    fn malformed_layer_blocks_instead_of_panicking() {
        let mut document = scenario_world();
        let scene = document.scene_mut("S").expect("scene");
        scene.layer_mut(0).expect("collision layer").grid[4] = vec![None, None];
        let mut runtime = started(document);
        runtime.tick(TICK, &pressing(InputAction::MoveForward));
        assert_eq!(planar_cell(&runtime), (5, 5));
    }

    #[test]
    fn export_then_import_yields_equal_document() {
        let runtime = started(scenario_world());
        let assets = tempfile::tempdir().expect("assets dir");
        let out = tempfile::tempdir().expect("out dir");
        runtime
            .export_bundle(assets.path(), out.path())
            .expect("export");

        let raw = fs::read_to_string(out.path().join(BUNDLE_WORLD_FILE)).expect("world file");
        let mut fresh = WorldRuntime::new(WorldDocument::empty(), RuntimeConfig::default());
        fresh.import_world(&raw, ImportMode::Replace).expect("import");
        assert_eq!(fresh.document(), runtime.document());
        assert_eq!(fresh.current_scene().map(|scene| scene.id.as_str()), Some("S"));
    }

    #[test]
    fn failed_import_leaves_document_and_scene_alone() {
        let mut runtime = started(scenario_world());
        let before = runtime.document().clone();
        let error = runtime
            .import_world("{ \"scenes\": 3 }", ImportMode::Merge)
            .expect_err("bad import");
        assert!(matches!(error, RuntimeError::Import(ImportError::Format(_))));
        assert_eq!(runtime.document(), &before);
        assert_eq!(runtime.current_scene().map(|scene| scene.id.as_str()), Some("S"));
    }

    #[test]
    fn edits_are_persisted_and_rebuild_the_scene() {
        let dir = tempfile::tempdir().expect("store dir");
        let path = dir.path().join("world.json");
        let mut runtime = WorldRuntime::new(scenario_world(), RuntimeConfig::default())
            .with_store_path(&path);
        runtime.start().expect("start");

        runtime
            .edit_world(|document| {
                let scene = document.scene_mut("S").expect("scene");
                scene.layer_mut(0).expect("collision layer").set(6, 5, None);
            })
            .expect("edit");

        let persisted = parse_world_document(&fs::read_to_string(&path).expect("persisted"))
            .expect("parse");
        assert_eq!(&persisted, runtime.document());
        runtime.tick(TICK, &pressing(InputAction::StrafeRight));
        assert_eq!(planar_cell(&runtime), (6, 5));
    }

    #[test]
    fn movement_override_survives_scene_changes() {
        let mut runtime = started(scenario_world());
        assert_eq!(runtime.movement_mode(), Some(MovementMode::Grid));
        runtime.cycle_movement_mode();
        assert_eq!(runtime.movement_mode(), Some(MovementMode::Free));
        runtime.load_scene("T").expect("load T");
        assert_eq!(runtime.movement_mode(), Some(MovementMode::Free));
    }

    #[test]
    fn unload_clears_current_scene() {
        let mut runtime = started(scenario_world());
        runtime.unload();
        assert!(runtime.current_scene().is_none());
        assert_eq!(runtime.lifecycle_state(), LifecycleState::Unloaded);
        assert_eq!(runtime.world().entity_count(), 0);
        assert_eq!(runtime.reload(None), Err(LifecycleError::NoActiveScene));
    }
}
