//! Keyboard Control Implementation
//!
//! Cross-platform keyboard automation:
//! - macOS: CoreGraphics CGEvent
//! - Windows: SendInput with VK codes
//! - Linux: X11 xtest

use super::{InputError, Key};

// ============================================================================
// macOS Implementation
// ============================================================================
#[cfg(target_os = "macos")]
pub mod macos {
    use super::*;
    use core_graphics::event::{CGEvent, CGEventTapLocation, CGKeyCode};
    use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

    fn post_key_event(keycode: CGKeyCode, key_down: bool) -> Result<(), InputError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| InputError::PlatformError("failed to create CGEventSource".to_string()))?;
        let event = CGEvent::new_keyboard_event(source, keycode, key_down)
            .map_err(|_| InputError::PlatformError("failed to create keyboard event".to_string()))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    pub fn press_key(key: Key) -> Result<(), InputError> {
        let keycode = map_key_to_keycode(key);
        post_key_event(keycode, true)?;
        std::thread::sleep(std::time::Duration::from_millis(10));
        post_key_event(keycode, false)?;
        Ok(())
    }

    pub fn press_combo(keys: &[Key]) -> Result<(), InputError> {
        // Press modifier keys
        for key in keys.iter().filter(|&&k| k.is_modifier()) {
            post_key_event(map_key_to_keycode(*key), true)?;
        }

        // Press and release the main key
        if let Some(main_key) = keys.iter().find(|&&k| !k.is_modifier()) {
            let keycode = map_key_to_keycode(*main_key);
            post_key_event(keycode, true)?;
            std::thread::sleep(std::time::Duration::from_millis(50));
            post_key_event(keycode, false)?;
        }

        // Release modifier keys
        for key in keys.iter().rev().filter(|&&k| k.is_modifier()) {
            post_key_event(map_key_to_keycode(*key), false)?;
        }

        Ok(())
    }

    fn map_key_to_keycode(key: Key) -> CGKeyCode {
        // CGKeyCode values from Carbon's Events.h
        match key {
            Key::Space => 49,
            Key::Return => 36,
            Key::Tab => 48,
            Key::Escape => 53,
            Key::Left => 123,
            Key::Right => 124,
            Key::Up => 126,
            Key::Down => 125,
            Key::Home => 115,
            Key::End => 119,
            Key::PageUp => 116,
            Key::PageDown => 121,
            Key::F4 => 118,
            Key::F11 => 103,
            Key::Shift => 56,
            Key::Control => 59,
            Key::Alt => 58,
            Key::Command => 55,
            Key::Q => 12,
        }
    }
}

// ============================================================================
// Windows Implementation
// ============================================================================
#[cfg(target_os = "windows")]
pub mod windows {
    use super::*;
    use ::windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
        KEYEVENTF_KEYUP, VIRTUAL_KEY,
    };

    fn send_key_event(vk: u16, key_up: bool) {
        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk),
                    wScan: 0,
                    dwFlags: if key_up {
                        KEYEVENTF_KEYUP
                    } else {
                        KEYBD_EVENT_FLAGS(0)
                    },
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        unsafe {
            SendInput(&[input], std::mem::size_of::<INPUT>() as i32);
        }
    }

    pub fn press_key(key: Key) -> Result<(), InputError> {
        let vk = map_key_to_vk(key);
        send_key_event(vk, false);
        std::thread::sleep(std::time::Duration::from_millis(10));
        send_key_event(vk, true);
        Ok(())
    }

    pub fn press_combo(keys: &[Key]) -> Result<(), InputError> {
        // Press modifier keys
        for key in keys.iter().filter(|&&k| k.is_modifier()) {
            send_key_event(map_key_to_vk(*key), false);
        }

        // Press main key
        if let Some(main_key) = keys.iter().find(|&&k| !k.is_modifier()) {
            let vk = map_key_to_vk(*main_key);
            send_key_event(vk, false);
            std::thread::sleep(std::time::Duration::from_millis(50));
            send_key_event(vk, true);
        }

        // Release modifier keys
        for key in keys.iter().rev().filter(|&&k| k.is_modifier()) {
            send_key_event(map_key_to_vk(*key), true);
        }

        Ok(())
    }

    fn map_key_to_vk(key: Key) -> u16 {
        use ::windows::Win32::UI::Input::KeyboardAndMouse::*;

        match key {
            Key::Space => VK_SPACE.0,
            Key::Return => VK_RETURN.0,
            Key::Tab => VK_TAB.0,
            Key::Escape => VK_ESCAPE.0,
            Key::Left => VK_LEFT.0,
            Key::Right => VK_RIGHT.0,
            Key::Up => VK_UP.0,
            Key::Down => VK_DOWN.0,
            Key::Home => VK_HOME.0,
            Key::End => VK_END.0,
            Key::PageUp => VK_PRIOR.0,
            Key::PageDown => VK_NEXT.0,
            Key::F4 => VK_F4.0,
            Key::F11 => VK_F11.0,
            Key::Shift => VK_SHIFT.0,
            Key::Control => VK_CONTROL.0,
            Key::Alt => VK_MENU.0,
            // Command maps to Control on Windows
            Key::Command => VK_CONTROL.0,
            Key::Q => VK_Q.0,
        }
    }
}

// ============================================================================
// Linux Implementation
// ============================================================================
#[cfg(target_os = "linux")]
pub mod linux {
    use super::*;
    use x11rb::connection::Connection;
    use x11rb::protocol::xtest::ConnectionExt as XtestConnectionExt;

    fn fake_key_event(
        conn: &impl Connection,
        root: u32,
        keycode: u8,
        event_type: u8,
    ) -> Result<(), InputError> {
        conn.xtest_fake_input(
            event_type,
            keycode, // detail (keycode)
            x11rb::CURRENT_TIME,
            root,
            0,
            0,
            0, // deviceid
        )
        .map_err(|e| InputError::PlatformError(e.to_string()))?;
        conn.flush()?;
        Ok(())
    }

    pub async fn press_key(key: Key) -> Result<(), InputError> {
        let (conn, _) = x11rb::connect(None)?;
        let root = conn.setup().roots[0].root;

        let keycode = map_key_to_keycode(key);

        fake_key_event(&conn, root, keycode, x11rb::protocol::xproto::KEY_PRESS_EVENT)?;
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        fake_key_event(&conn, root, keycode, x11rb::protocol::xproto::KEY_RELEASE_EVENT)?;

        Ok(())
    }

    pub async fn press_combo(keys: &[Key]) -> Result<(), InputError> {
        let (conn, _) = x11rb::connect(None)?;
        let root = conn.setup().roots[0].root;

        // Press modifier keys
        for key in keys.iter().filter(|&&k| k.is_modifier()) {
            let keycode = map_key_to_keycode(*key);
            fake_key_event(&conn, root, keycode, x11rb::protocol::xproto::KEY_PRESS_EVENT)?;
        }

        // Press main key
        if let Some(main_key) = keys.iter().find(|&&k| !k.is_modifier()) {
            let keycode = map_key_to_keycode(*main_key);
            fake_key_event(&conn, root, keycode, x11rb::protocol::xproto::KEY_PRESS_EVENT)?;

            // Release main key
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            fake_key_event(&conn, root, keycode, x11rb::protocol::xproto::KEY_RELEASE_EVENT)?;
        }

        // Release modifier keys
        for key in keys.iter().rev().filter(|&&k| k.is_modifier()) {
            let keycode = map_key_to_keycode(*key);
            fake_key_event(&conn, root, keycode, x11rb::protocol::xproto::KEY_RELEASE_EVENT)?;
        }

        Ok(())
    }

    fn map_key_to_keycode(key: Key) -> u8 {
        // Standard X11 keycodes for a pc105 layout
        match key {
            Key::Space => 65,
            Key::Return => 36,
            Key::Tab => 23,
            Key::Escape => 9,
            Key::Left => 113,
            Key::Right => 114,
            Key::Up => 111,
            Key::Down => 116,
            Key::Home => 110,
            Key::End => 115,
            Key::PageUp => 112,
            Key::PageDown => 117,
            Key::F4 => 70,
            Key::F11 => 95,
            Key::Shift => 50,
            Key::Control => 37,
            Key::Alt => 64,
            Key::Command => 133, // Super/Windows key
            Key::Q => 24,
        }
    }
}
