//! Input-device event translation.
//!
//! Keyboard and gamepad events are reduced to a closed set of actions. A
//! parameter action is a pure transform over a `SignalParameters` snapshot,
//! applied through the store's atomic update; everything else is a control
//! request the front-end routes to the session or the sequencer.

use crossterm::event::KeyCode;

use crate::params::SignalParameters;

/// Amplitude multiplier change per key press.
pub const MULTIPLIER_STEP: f64 = 0.25;

/// Frequency change per key press, Hz.
pub const FREQUENCY_STEP: f64 = 10.0;

/// Camber change per key press, degrees.
pub const CAMBER_STEP: f64 = 10.0;

/// A pure edit of the signal parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEdit {
    StepMultiplier(f64),
    StepFrequency(f64),
    StepCamber(f64),
    SetHeading(f64),
}

impl ParamEdit {
    /// Apply the edit to a snapshot. Normalization (heading wrap, amplitude
    /// clamp) happens when the result is written back through the store.
    pub fn apply(self, mut p: SignalParameters) -> SignalParameters {
        match self {
            ParamEdit::StepMultiplier(delta) => p.multiplier += delta,
            ParamEdit::StepFrequency(delta) => p.frequency += delta,
            ParamEdit::StepCamber(delta) => p.camber += delta,
            ParamEdit::SetHeading(heading) => p.zphase = heading,
        }
        p
    }
}

/// Everything an input event can ask for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Edit(ParamEdit),
    /// Start or stop the streaming session.
    ToggleOutput,
    /// Start or stop the selected choreography routine.
    ToggleRoutine,
}

/// Translate a key press. Unbound keys map to nothing.
pub fn map_key(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Char('t') | KeyCode::Char('T') => Action::ToggleOutput,
        KeyCode::Char('u') | KeyCode::Char('U') => Action::ToggleRoutine,
        KeyCode::Char('w') | KeyCode::Char('W') => {
            Action::Edit(ParamEdit::StepMultiplier(MULTIPLIER_STEP))
        }
        KeyCode::Char('q') | KeyCode::Char('Q') => {
            Action::Edit(ParamEdit::StepMultiplier(-MULTIPLIER_STEP))
        }
        KeyCode::Char('g') | KeyCode::Char('G') => {
            Action::Edit(ParamEdit::StepFrequency(FREQUENCY_STEP))
        }
        KeyCode::Char('f') | KeyCode::Char('F') => {
            Action::Edit(ParamEdit::StepFrequency(-FREQUENCY_STEP))
        }
        KeyCode::Char('b') | KeyCode::Char('B') => {
            Action::Edit(ParamEdit::StepCamber(CAMBER_STEP))
        }
        KeyCode::Char('v') | KeyCode::Char('V') => {
            Action::Edit(ParamEdit::StepCamber(-CAMBER_STEP))
        }
        KeyCode::Up => Action::Edit(ParamEdit::SetHeading(0.0)),
        KeyCode::Left => Action::Edit(ParamEdit::SetHeading(90.0)),
        KeyCode::Down => Action::Edit(ParamEdit::SetHeading(180.0)),
        KeyCode::Right => Action::Edit(ParamEdit::SetHeading(270.0)),
        _ => return None,
    };
    Some(action)
}

/// Gamepad buttons by position, the way controller layers report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamepadButton {
    North,
    South,
    East,
    West,
    LeftShoulder,
    RightShoulder,
    LeftThumb,
    Start,
}

/// A translated gamepad event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GamepadEvent {
    Button(GamepadButton),
    /// Left stick position, both axes in [-1, 1].
    Stick { x: f64, y: f64 },
}

/// Translate a gamepad event. Stick motion below the dead-zone magnitude
/// emits nothing.
pub fn map_gamepad(event: GamepadEvent, dead_zone: f64) -> Option<Action> {
    match event {
        GamepadEvent::Button(button) => Some(match button {
            GamepadButton::North => Action::Edit(ParamEdit::StepFrequency(FREQUENCY_STEP)),
            GamepadButton::West => Action::Edit(ParamEdit::StepFrequency(-FREQUENCY_STEP)),
            GamepadButton::East => Action::Edit(ParamEdit::StepCamber(CAMBER_STEP)),
            GamepadButton::South => Action::Edit(ParamEdit::StepCamber(-CAMBER_STEP)),
            GamepadButton::RightShoulder => {
                Action::Edit(ParamEdit::StepMultiplier(MULTIPLIER_STEP))
            }
            GamepadButton::LeftShoulder => {
                Action::Edit(ParamEdit::StepMultiplier(-MULTIPLIER_STEP))
            }
            GamepadButton::LeftThumb => Action::ToggleOutput,
            GamepadButton::Start => Action::ToggleRoutine,
        }),
        GamepadEvent::Stick { x, y } => {
            let (magnitude, heading) = stick_to_heading(x, y);
            if magnitude < dead_zone {
                None
            } else {
                Some(Action::Edit(ParamEdit::SetHeading(heading)))
            }
        }
    }
}

/// Convert stick coordinates to a magnitude and a 0-360 degree heading.
///
/// Stick angles grow counter-clockwise from +x; headings grow the other way,
/// so the angle is mirrored.
pub fn stick_to_heading(x: f64, y: f64) -> (f64, f64) {
    let magnitude = x.hypot(y);
    let degrees = y.atan2(x).to_degrees().rem_euclid(360.0);
    (magnitude, (360.0 - degrees).rem_euclid(360.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_bindings() {
        assert_eq!(map_key(KeyCode::Char('t')), Some(Action::ToggleOutput));
        assert_eq!(map_key(KeyCode::Char('T')), Some(Action::ToggleOutput));
        assert_eq!(map_key(KeyCode::Char('u')), Some(Action::ToggleRoutine));
        assert_eq!(
            map_key(KeyCode::Char('w')),
            Some(Action::Edit(ParamEdit::StepMultiplier(0.25)))
        );
        assert_eq!(
            map_key(KeyCode::Char('f')),
            Some(Action::Edit(ParamEdit::StepFrequency(-10.0)))
        );
        assert_eq!(
            map_key(KeyCode::Up),
            Some(Action::Edit(ParamEdit::SetHeading(0.0)))
        );
        assert_eq!(map_key(KeyCode::Char('x')), None);
        assert_eq!(map_key(KeyCode::Esc), None);
    }

    #[test]
    fn test_param_edit_is_pure() {
        let p = SignalParameters::default();
        let stepped = ParamEdit::StepFrequency(10.0).apply(p);
        assert_eq!(stepped.frequency, p.frequency + 10.0);
        // Original snapshot untouched.
        assert_eq!(p.frequency, SignalParameters::default().frequency);

        let headed = ParamEdit::SetHeading(270.0).apply(p);
        assert_eq!(headed.zphase, 270.0);
    }

    #[test]
    fn test_gamepad_buttons() {
        assert_eq!(
            map_gamepad(GamepadEvent::Button(GamepadButton::LeftThumb), 0.3),
            Some(Action::ToggleOutput)
        );
        assert_eq!(
            map_gamepad(GamepadEvent::Button(GamepadButton::North), 0.3),
            Some(Action::Edit(ParamEdit::StepFrequency(10.0)))
        );
        assert_eq!(
            map_gamepad(GamepadEvent::Button(GamepadButton::Start), 0.3),
            Some(Action::ToggleRoutine)
        );
    }

    #[test]
    fn test_stick_dead_zone() {
        let inside = GamepadEvent::Stick { x: 0.1, y: 0.1 };
        assert_eq!(map_gamepad(inside, 0.3), None);

        let outside = GamepadEvent::Stick { x: 1.0, y: 0.0 };
        assert_eq!(
            map_gamepad(outside, 0.3),
            Some(Action::Edit(ParamEdit::SetHeading(0.0)))
        );
    }

    #[test]
    fn test_stick_to_heading_quadrants() {
        let (mag, heading) = stick_to_heading(1.0, 0.0);
        assert!((mag - 1.0).abs() < 1e-9);
        assert_eq!(heading, 0.0);

        let (_, heading) = stick_to_heading(0.0, 1.0);
        assert_eq!(heading, 270.0);

        let (_, heading) = stick_to_heading(-1.0, 0.0);
        assert_eq!(heading, 180.0);

        let (_, heading) = stick_to_heading(0.0, -1.0);
        assert_eq!(heading, 90.0);
    }

    #[test]
    fn test_stick_magnitude() {
        let (mag, _) = stick_to_heading(3.0, 4.0);
        assert!((mag - 5.0).abs() < 1e-9);
    }
}
