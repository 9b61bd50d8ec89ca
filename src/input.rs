// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Translates RFB input messages into host-window-sink events.
//!
//! Keyboard events carry an X11 keysym; [`translate_keysym`] maps it to an
//! abstract [`Key`] the host sink understands, independent of any particular
//! windowing toolkit's key-code numbering. Pointer events carry an RFB
//! button mask; [`PointerTranslator`] diffs successive masks into
//! move/press/release/wheel actions.

/// An abstract key, independent of any host windowing toolkit's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A printable Latin-1 character.
    Char(char),
    /// A dead (combining) key, offset from `XK_dead_grave`.
    Dead(u8),
    /// A function key, `F(1)` for `XK_F1`.
    Function(u8),
    /// A keypad digit `0..=9`.
    KeypadDigit(u8),
    Backspace,
    Tab,
    Return,
    Escape,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Left,
    Up,
    Right,
    Down,
    Shift,
    Control,
    Meta,
    Alt,
    Print,
    Pause,
    ScrollLock,
    Menu,
    KeypadAsterisk,
    KeypadPlus,
    KeypadMinus,
    KeypadPeriod,
    KeypadSlash,
    KeypadHome,
    KeypadLeft,
    KeypadUp,
    KeypadRight,
    KeypadDown,
    KeypadPageUp,
    KeypadPageDown,
    KeypadEnd,
    KeypadInsert,
    KeypadDelete,
    /// A keysym with no mapping; carries the raw value for logging.
    Unknown(u32),
}

const XK_DEAD_GRAVE: u32 = 0xFE50;
const XK_DEAD_GRAVE_END: u32 = 0xFE6F;
const XK_F1: u32 = 0xFFBE;
const XK_F_END: u32 = 0xFFE0;
const XK_KP_0: u32 = 0xFFB0;
const XK_KP_9: u32 = 0xFFB9;

/// Maps an X11 keysym to an abstract [`Key`].
#[must_use]
pub fn translate_keysym(keysym: u32) -> Key {
    if keysym <= 0xFF {
        if let Some(ch) = char::from_u32(keysym) {
            return Key::Char(ch);
        }
    }

    if (XK_DEAD_GRAVE..=XK_DEAD_GRAVE_END).contains(&keysym) {
        return Key::Dead((keysym - XK_DEAD_GRAVE) as u8);
    }

    if (XK_F1..XK_F_END).contains(&keysym) {
        return Key::Function((keysym - XK_F1 + 1) as u8);
    }

    if (XK_KP_0..=XK_KP_9).contains(&keysym) {
        return Key::KeypadDigit((keysym - XK_KP_0) as u8);
    }

    match keysym {
        0xFF08 => Key::Backspace,
        0xFF09 => Key::Tab,
        0xFF0D | 0xFF8D => Key::Return,
        0xFF1B => Key::Escape,
        0xFF63 | 0xFF9E => Key::Insert,
        0xFFFF | 0xFF9F => Key::Delete,
        0xFF50 | 0xFF95 => Key::Home,
        0xFF57 | 0xFF9C => Key::End,
        0xFF55 | 0xFF9A => Key::PageUp,
        0xFF56 | 0xFF9B => Key::PageDown,
        0xFF51 | 0xFF96 => Key::Left,
        0xFF52 | 0xFF97 => Key::Up,
        0xFF53 | 0xFF98 => Key::Right,
        0xFF54 | 0xFF99 => Key::Down,
        0xFFE1 | 0xFFE2 => Key::Shift,
        0xFFE3 | 0xFFE4 => Key::Control,
        0xFFE7 | 0xFFE8 => Key::Meta,
        0xFFE9 | 0xFFEA => Key::Alt,
        0xFF61 => Key::Print,
        0xFF13 => Key::Pause,
        0xFF14 => Key::ScrollLock,
        0xFF67 => Key::Menu,
        0xFFAA => Key::KeypadAsterisk,
        0xFFAB => Key::KeypadPlus,
        0xFFAD => Key::KeypadMinus,
        0xFFAE => Key::KeypadPeriod,
        0xFFAF => Key::KeypadSlash,
        _ => Key::Unknown(keysym),
    }
}

/// Given a keysym and whether Control is currently held, returns the
/// classical control character it produces (`Ctrl+G` → BEL, … `Ctrl+M` →
/// CR), or `None` if the key is not a letter or Control is not held.
#[must_use]
pub fn control_char(keysym: u32, control_held: bool) -> Option<char> {
    if !control_held {
        return None;
    }
    let ch = char::from_u32(keysym)?;
    if !ch.is_ascii_alphabetic() {
        return None;
    }
    let code = ch.to_ascii_uppercase() as u8 - b'A' + 1;
    Some(code as char)
}

/// A mouse button as carried by an RFB pointer event's button mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Middle,
    Right,
}

const MASK_LEFT: u8 = 1 << 0;
const MASK_MIDDLE: u8 = 1 << 1;
const MASK_RIGHT: u8 = 1 << 2;
const MASK_WHEEL_UP: u8 = 1 << 3;
const MASK_WHEEL_DOWN: u8 = 1 << 4;
const MASK_WHEEL_LEFT: u8 = 1 << 5;
const MASK_WHEEL_RIGHT: u8 = 1 << 6;

/// A pointer action derived from one RFB `PointerEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    /// Position changed with no button-state change.
    Move,
    /// `button` transitioned from released to pressed.
    Press(Button),
    /// `button` transitioned from pressed to released.
    Release(Button),
    /// A wheel step; `dx`/`dy` are signed deltas in steps.
    Wheel { dx: i32, dy: i32 },
}

/// Diffs successive RFB button masks into a [`PointerAction`].
///
/// Wheel bits take priority: if any are set, a `Wheel` action is returned
/// using the mask bits directly (RFB re-sends wheel "clicks" as momentary
/// button bits, not as held state). Otherwise the single button whose state
/// differs between `previous` and `current` determines Press/Release; if
/// nothing differs, it's a plain `Move`.
#[must_use]
pub fn translate_pointer(previous: u8, current: u8) -> PointerAction {
    if current & (MASK_WHEEL_UP | MASK_WHEEL_DOWN | MASK_WHEEL_LEFT | MASK_WHEEL_RIGHT) != 0 {
        let dy = i32::from(current & MASK_WHEEL_UP != 0) - i32::from(current & MASK_WHEEL_DOWN != 0);
        let dx =
            i32::from(current & MASK_WHEEL_RIGHT != 0) - i32::from(current & MASK_WHEEL_LEFT != 0);
        return PointerAction::Wheel { dx, dy };
    }

    let changed = previous ^ current;
    let buttons = [
        (MASK_LEFT, Button::Left),
        (MASK_MIDDLE, Button::Middle),
        (MASK_RIGHT, Button::Right),
    ];

    for (mask, button) in buttons {
        if changed & mask != 0 {
            return if current & mask != 0 {
                PointerAction::Press(button)
            } else {
                PointerAction::Release(button)
            };
        }
    }

    PointerAction::Move
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_letters_pass_through() {
        assert_eq!(translate_keysym(b'a' as u32), Key::Char('a'));
    }

    #[test]
    fn dead_key_range() {
        assert_eq!(translate_keysym(0xFE50), Key::Dead(0));
        assert_eq!(translate_keysym(0xFE51), Key::Dead(1));
    }

    #[test]
    fn function_key_range() {
        assert_eq!(translate_keysym(0xFFBE), Key::Function(1));
        assert_eq!(translate_keysym(0xFFBF), Key::Function(2));
    }

    #[test]
    fn keypad_digits() {
        assert_eq!(translate_keysym(0xFFB0), Key::KeypadDigit(0));
        assert_eq!(translate_keysym(0xFFB9), Key::KeypadDigit(9));
    }

    #[test]
    fn named_keys() {
        assert_eq!(translate_keysym(0xFF0D), Key::Return);
        assert_eq!(translate_keysym(0xFF8D), Key::Return);
        assert_eq!(translate_keysym(0xFFE1), Key::Shift);
        assert_eq!(translate_keysym(0xFF67), Key::Menu);
    }

    #[test]
    fn unmapped_keysym_is_unknown() {
        assert_eq!(translate_keysym(0x1234_5678), Key::Unknown(0x1234_5678));
    }

    #[test]
    fn control_letters_produce_classical_control_chars() {
        assert_eq!(control_char(b'g' as u32, true), Some('\u{7}'));
        assert_eq!(control_char(b'h' as u32, true), Some('\u{8}'));
        assert_eq!(control_char(b'i' as u32, true), Some('\t'));
        assert_eq!(control_char(b'j' as u32, true), Some('\n'));
        assert_eq!(control_char(b'k' as u32, true), Some('\u{B}'));
        assert_eq!(control_char(b'l' as u32, true), Some('\u{C}'));
        assert_eq!(control_char(b'm' as u32, true), Some('\r'));
    }

    #[test]
    fn control_char_requires_control_held() {
        assert_eq!(control_char(b'g' as u32, false), None);
    }

    #[test]
    fn pointer_move_when_mask_unchanged() {
        assert_eq!(translate_pointer(0, 0), PointerAction::Move);
    }

    #[test]
    fn pointer_press_and_release() {
        assert_eq!(
            translate_pointer(0, MASK_LEFT),
            PointerAction::Press(Button::Left)
        );
        assert_eq!(
            translate_pointer(MASK_RIGHT, 0),
            PointerAction::Release(Button::Right)
        );
    }

    #[test]
    fn pointer_wheel_directions() {
        assert_eq!(
            translate_pointer(0, MASK_WHEEL_UP),
            PointerAction::Wheel { dx: 0, dy: 1 }
        );
        assert_eq!(
            translate_pointer(0, MASK_WHEEL_DOWN),
            PointerAction::Wheel { dx: 0, dy: -1 }
        );
        assert_eq!(
            translate_pointer(0, MASK_WHEEL_RIGHT),
            PointerAction::Wheel { dx: 1, dy: 0 }
        );
    }
}
