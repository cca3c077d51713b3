//! Normalised controller events.
//!
//! Keyboard and gamepad mapping happens elsewhere; by the time an event
//! reaches the scheduler it is one of these.

use serde::{Deserialize, Serialize};

/// Buttons on a SNES-style pad.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    X,
    A,
    B,
    Y,
    BumperLeft,
    BumperRight,
    Select,
    Start,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
}

impl Button {
    /// Enters and leaves the menu.
    pub fn is_menu_toggle(self) -> bool {
        self == Self::Select
    }

    pub fn is_confirm(self) -> bool {
        matches!(self, Self::A | Self::Start)
    }

    pub fn is_back(self) -> bool {
        self == Self::B
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    ButtonDown { controller: u8, button: Button },
    ButtonUp { controller: u8, button: Button },
    Axis { controller: u8, axis: u8, value: f32 },
    Quit,
}

impl InputEvent {
    pub fn button_down(controller: u8, button: Button) -> Self {
        Self::ButtonDown { controller, button }
    }

    /// The button, if this is a press.
    pub fn pressed(&self) -> Option<Button> {
        match self {
            Self::ButtonDown { button, .. } => Some(*button),
            _ => None,
        }
    }

    pub fn controller(&self) -> Option<u8> {
        match self {
            Self::ButtonDown { controller, .. }
            | Self::ButtonUp { controller, .. }
            | Self::Axis { controller, .. } => Some(*controller),
            Self::Quit => None,
        }
    }
}
