//! Native OS keyboard injection
//!
//! Sends key events to whatever window currently holds focus. This is the
//! only channel the tool has into the viewer application:
//! - macOS: CoreGraphics CGEvent
//! - Windows: SendInput with VK codes
//! - Linux: X11 xtest

pub mod keyboard;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Key codes understood by every backend.
///
/// Deliberately small: page navigation keys, the modifiers needed for
/// focus/close combos, and the function keys viewers bind to fullscreen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Space,
    Return,
    Tab,
    Escape,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    F4,
    F11,
    Shift,
    Control,
    Alt,
    Command,
    Q,
}

impl Key {
    pub fn is_modifier(self) -> bool {
        matches!(self, Key::Shift | Key::Control | Key::Alt | Key::Command)
    }
}

/// Input error types
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("Platform not supported")]
    Unsupported,
}

impl From<std::io::Error> for InputError {
    fn from(err: std::io::Error) -> Self {
        InputError::PlatformError(err.to_string())
    }
}

#[cfg(target_os = "linux")]
impl From<x11rb::errors::ConnectError> for InputError {
    fn from(err: x11rb::errors::ConnectError) -> Self {
        InputError::PlatformError(err.to_string())
    }
}

#[cfg(target_os = "linux")]
impl From<x11rb::errors::ConnectionError> for InputError {
    fn from(err: x11rb::errors::ConnectionError) -> Self {
        InputError::PlatformError(err.to_string())
    }
}

/// Press and release a single key on the focused window.
pub async fn press_key(key: Key) -> Result<(), InputError> {
    debug!("Pressing key: {:?}", key);

    #[cfg(target_os = "macos")]
    keyboard::macos::press_key(key)?;

    #[cfg(target_os = "windows")]
    keyboard::windows::press_key(key)?;

    #[cfg(target_os = "linux")]
    keyboard::linux::press_key(key).await?;

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    return Err(InputError::Unsupported);

    #[cfg(any(target_os = "macos", target_os = "windows", target_os = "linux"))]
    Ok(())
}

/// Press a key combination (e.g. Alt+Tab, Alt+F4).
///
/// Modifiers are held down first, released last, in reverse order.
pub async fn press_combo(keys: &[Key]) -> Result<(), InputError> {
    debug!("Pressing key combination: {:?}", keys);

    #[cfg(target_os = "macos")]
    keyboard::macos::press_combo(keys)?;

    #[cfg(target_os = "windows")]
    keyboard::windows::press_combo(keys)?;

    #[cfg(target_os = "linux")]
    keyboard::linux::press_combo(keys).await?;

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    return Err(InputError::Unsupported);

    #[cfg(any(target_os = "macos", target_os = "windows", target_os = "linux"))]
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_classification() {
        assert!(Key::Alt.is_modifier());
        assert!(Key::Command.is_modifier());
        assert!(!Key::Space.is_modifier());
        assert!(!Key::F11.is_modifier());
    }
}
