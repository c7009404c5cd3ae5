use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use super::capabilities::visible_texts;
use super::input::ActionStates;
use super::lifecycle::LifecycleError;
use super::metrics::MetricsAccumulator;
use super::rendering::Renderer;
use super::runtime::WorldRuntime;
use super::scene::TextPlacement;
use super::{InputAction, InputSnapshot, MetricsHandle};

pub const SLOW_FRAME_ENV_VAR: &str = "TILEWORLD_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Tile World".to_string(),
            window_width: 960,
            window_height: 720,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to start the world: {0}")]
    Start(#[from] LifecycleError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// Host-side work that does not belong to the simulation itself, such as
/// writing and reading session snapshots.
pub trait SessionHooks {
    /// Called with each tick's input before the runtime sees it.
    fn before_tick(&mut self, _runtime: &mut WorldRuntime, _input: &InputSnapshot) {}
    fn on_shutdown(&mut self, _runtime: &mut WorldRuntime) {}
}

#[derive(Debug, Default)]
pub struct NoHooks;

impl SessionHooks for NoHooks {}

pub fn run_app(
    config: LoopConfig,
    runtime: WorldRuntime,
    hooks: Box<dyn SessionHooks>,
) -> Result<(), AppError> {
    run_app_with_metrics(config, runtime, hooks, MetricsHandle::default())
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    mut runtime: WorldRuntime,
    mut hooks: Box<dyn SessionHooks>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    if runtime.current_scene().is_none() {
        runtime.start()?;
    }

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    let mut input_collector = InputCollector::default();

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut last_title: Option<String> = None;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    input_collector.mark_quit_requested();
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_keyboard_input(&event);
                    if input_collector.quit_requested {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    if slow_frame_delay > Duration::ZERO {
                        // Debug perturbation only; not the FPS cap.
                        thread::sleep(slow_frame_delay);
                    }

                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;

                    let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);
                    accumulator = accumulator.saturating_add(clamped_frame_dt);

                    let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                    for _ in 0..step_plan.ticks_to_run {
                        let input = input_collector.snapshot_for_tick();
                        hooks.before_tick(&mut runtime, &input);
                        runtime.tick(fixed_dt, &input);
                        metrics_accumulator.record_tick();
                    }
                    accumulator = step_plan.remaining_accumulator;

                    if step_plan.dropped_backlog > Duration::ZERO {
                        warn!(
                            dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                            max_ticks_per_frame, "sim_clamp_triggered"
                        );
                    }

                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    if let Err(error) = renderer.render(&runtime) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();

                    let next_title = window_title(&config.window_title, &runtime);
                    if last_title.as_deref() != Some(next_title.as_str()) {
                        window.set_title(&next_title);
                        last_title = Some(next_title);
                    }

                    metrics_accumulator.record_frame(raw_frame_dt);
                    metrics_accumulator.record_world(
                        runtime.world().entity_count(),
                        runtime.pending_actions(),
                    );
                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            entity_count = snapshot.entity_count,
                            pending_actions = snapshot.pending_actions,
                            scene = runtime.current_scene().map(|scene| scene.id.as_str()),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                hooks.on_shutdown(&mut runtime);
                runtime.shutdown();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn window_title(base: &str, runtime: &WorldRuntime) -> String {
    let scene = runtime
        .current_scene()
        .map_or("-", |scene| scene.id.as_str());
    let mode = runtime
        .movement_mode()
        .map_or("-", |mode| mode.as_token());
    let player = runtime.player();
    let lock = if runtime.movement_locked() { " [locked]" } else { "" };
    let mut title = format!(
        "{base} | {scene} | {mode} | hp {}/{}{lock}",
        player.health, player.max_health
    );
    // No font in the framebuffer; nearby texts ride along in the title.
    for placement in [TextPlacement::Hud, TextPlacement::World] {
        for text in visible_texts(runtime.world(), placement) {
            title.push_str(" | ");
            title.push_str(text);
        }
    }
    title
}

/// Press/release tracking for a key whose effect fires once per press.
#[derive(Debug, Default, Clone, Copy)]
struct EdgeKey {
    is_down: bool,
    pressed_edge: bool,
}

impl EdgeKey {
    fn handle(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.is_down {
                    self.pressed_edge = true;
                }
                self.is_down = true;
            }
            ElementState::Released => self.is_down = false,
        }
    }

    fn take(&mut self) -> bool {
        std::mem::take(&mut self.pressed_edge)
    }
}

#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    action_states: ActionStates,
    save: EdgeKey,
    load: EdgeKey,
    reload: EdgeKey,
    cycle_mode: EdgeKey,
}

impl InputCollector {
    fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        let is_pressed = key_event.state == ElementState::Pressed;
        self.update_action_state_from_physical_key(key_event.physical_key, is_pressed);
        if let Some(edge) = self.edge_key_mut(key_event.physical_key) {
            edge.handle(key_event.state);
        }
    }

    fn edge_key_mut(&mut self, key: PhysicalKey) -> Option<&mut EdgeKey> {
        match key {
            PhysicalKey::Code(KeyCode::F5) => Some(&mut self.save),
            PhysicalKey::Code(KeyCode::F9) => Some(&mut self.load),
            PhysicalKey::Code(KeyCode::F2) => Some(&mut self.reload),
            PhysicalKey::Code(KeyCode::Tab) => Some(&mut self.cycle_mode),
            _ => None,
        }
    }

    fn update_action_state_from_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        let action = match key {
            PhysicalKey::Code(KeyCode::KeyW | KeyCode::ArrowUp) => InputAction::MoveForward,
            PhysicalKey::Code(KeyCode::KeyS | KeyCode::ArrowDown) => InputAction::MoveBack,
            PhysicalKey::Code(KeyCode::KeyA | KeyCode::ArrowLeft) => InputAction::StrafeLeft,
            PhysicalKey::Code(KeyCode::KeyD | KeyCode::ArrowRight) => InputAction::StrafeRight,
            PhysicalKey::Code(KeyCode::KeyQ) => InputAction::TurnLeft,
            PhysicalKey::Code(KeyCode::KeyE) => InputAction::TurnRight,
            PhysicalKey::Code(KeyCode::Escape) => {
                if is_pressed {
                    self.mark_quit_requested();
                }
                InputAction::Quit
            }
            _ => return,
        };
        self.action_states.set(action, is_pressed);
    }

    fn snapshot_for_tick(&mut self) -> InputSnapshot {
        InputSnapshot::from_actions(self.action_states)
            .with_quit_requested(self.quit_requested)
            .with_save_pressed(self.save.take())
            .with_load_pressed(self.load.take())
            .with_reload_pressed(self.reload.take())
            .with_cycle_mode_pressed(self.cycle_mode.take())
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}
