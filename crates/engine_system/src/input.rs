//! Control and input events routed to systems.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Pressed,
    Released,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub code: u32,
    pub state: KeyState,
    pub device: DeviceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    Key(KeyEvent),
    /// A named, already-mapped action with an analog value.
    Action { tag: String, value: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResponse {
    /// Stops routing; later handlers never see the event.
    Handled,
    Ignored,
}

/// Implemented by systems that react to input.
///
/// Handlers run on the caller's thread, between ticks.
pub trait InputHandler: Send {
    fn handle_input(&mut self, event: &InputEvent) -> InputResponse;
}
