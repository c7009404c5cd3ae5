use super::math::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveForward,
    MoveBack,
    StrafeLeft,
    StrafeRight,
    TurnLeft,
    TurnRight,
    Quit,
}

const ACTION_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveForward => 0,
            InputAction::MoveBack => 1,
            InputAction::StrafeLeft => 2,
            InputAction::StrafeRight => 3,
            InputAction::TurnLeft => 4,
            InputAction::TurnRight => 5,
            InputAction::Quit => 6,
        }
    }
}

/// Input sampled once per simulation tick. Held actions are levels; the
/// `*_pressed` flags are edges and are true for a single tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
    analog_stick: Option<(f32, f32)>,
    head_offset: Vec3,
    save_pressed: bool,
    load_pressed: bool,
    reload_pressed: bool,
    cycle_mode_pressed: bool,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_actions(actions: ActionStates) -> Self {
        Self {
            actions,
            ..Self::default()
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn with_quit_requested(mut self, quit_requested: bool) -> Self {
        self.quit_requested = quit_requested;
        self
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    /// Stick deflection as `(right, forward)`, each in `[-1, 1]`.
    pub fn with_analog_stick(mut self, analog_stick: Option<(f32, f32)>) -> Self {
        self.analog_stick = analog_stick;
        self
    }

    /// Tracked head position relative to the rig origin.
    pub fn with_head_offset(mut self, head_offset: Vec3) -> Self {
        self.head_offset = head_offset;
        self
    }

    pub fn with_save_pressed(mut self, save_pressed: bool) -> Self {
        self.save_pressed = save_pressed;
        self
    }

    pub fn with_load_pressed(mut self, load_pressed: bool) -> Self {
        self.load_pressed = load_pressed;
        self
    }

    pub fn with_reload_pressed(mut self, reload_pressed: bool) -> Self {
        self.reload_pressed = reload_pressed;
        self
    }

    pub fn with_cycle_mode_pressed(mut self, cycle_mode_pressed: bool) -> Self {
        self.cycle_mode_pressed = cycle_mode_pressed;
        self
    }

    pub fn analog_stick(&self) -> Option<(f32, f32)> {
        self.analog_stick
    }

    pub fn head_offset(&self) -> Vec3 {
        self.head_offset
    }

    pub fn save_pressed(&self) -> bool {
        self.save_pressed
    }

    pub fn load_pressed(&self) -> bool {
        self.load_pressed
    }

    pub fn reload_pressed(&self) -> bool {
        self.reload_pressed
    }

    pub fn cycle_mode_pressed(&self) -> bool {
        self.cycle_mode_pressed
    }

    /// Keyboard movement in the player's local frame: `x` strafes right,
    /// `-z` is forward.
    pub fn move_axis(&self) -> Vec3 {
        let mut axis = Vec3::ZERO;
        if self.is_down(InputAction::MoveForward) {
            axis.z -= 1.0;
        }
        if self.is_down(InputAction::MoveBack) {
            axis.z += 1.0;
        }
        if self.is_down(InputAction::StrafeLeft) {
            axis.x -= 1.0;
        }
        if self.is_down(InputAction::StrafeRight) {
            axis.x += 1.0;
        }
        axis
    }

    /// `+1` turning left, `-1` turning right, `0` when neither or both.
    pub fn turn_axis(&self) -> f32 {
        let left = self.is_down(InputAction::TurnLeft) as i8;
        let right = self.is_down(InputAction::TurnRight) as i8;
        f32::from(left - right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposing_keys_cancel() {
        let input = InputSnapshot::empty()
            .with_action_down(InputAction::MoveForward, true)
            .with_action_down(InputAction::MoveBack, true)
            .with_action_down(InputAction::StrafeRight, true);
        assert_eq!(input.move_axis(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn turn_axis_prefers_neither_when_both_held() {
        let both = InputSnapshot::empty()
            .with_action_down(InputAction::TurnLeft, true)
            .with_action_down(InputAction::TurnRight, true);
        assert_eq!(both.turn_axis(), 0.0);
        let left = InputSnapshot::empty().with_action_down(InputAction::TurnLeft, true);
        assert_eq!(left.turn_axis(), 1.0);
    }
}
