//! In-memory mapping fixtures shared by the unit tests

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use x11rb::errors::{ConnectionError, ReplyError};

use crate::error::KeybindError;
use crate::keysym::{exact, Keycode, Keysym, NO_SYMBOL};
use crate::mapping::{KeyboardMapping, Mapping, ModifierMapping};
use crate::refresh::MappingSource;

pub const MIN_KEYCODE: Keycode = 8;
pub const KC_A: Keycode = 10;
pub const KC_J: Keycode = 11;
pub const KC_RETURN: Keycode = 12;
pub const KC_SHIFT_L: Keycode = 13;
pub const KC_SHIFT_R: Keycode = 14;
pub const KC_CONTROL_L: Keycode = 15;
pub const KC_ALT_L: Keycode = 16;
pub const KC_SUPER_L: Keycode = 17;
pub const KC_CAPS_LOCK: Keycode = 18;
pub const KC_NUM_LOCK: Keycode = 19;
pub const KC_SECOND_COLUMN_ONLY: Keycode = 20;
pub const KC_XF86_SLEEP: Keycode = 21;
pub const KC_KP_ENTER: Keycode = 22;
pub const MAX_KEYCODE: Keycode = 23;

fn sym(name: &str) -> Keysym {
    exact(name).unwrap_or_else(|| panic!("fixture keysym {} missing from table", name))
}

/// Two columns per keycode, keycodes 8..=23.
pub fn sample_keyboard() -> KeyboardMapping {
    let rows: [(Keysym, Keysym); 16] = [
        (NO_SYMBOL, NO_SYMBOL),
        (sym("Escape"), NO_SYMBOL),
        (sym("a"), sym("A")),
        (sym("j"), sym("J")),
        (sym("Return"), NO_SYMBOL),
        (sym("Shift_L"), NO_SYMBOL),
        (sym("Shift_R"), NO_SYMBOL),
        (sym("Control_L"), NO_SYMBOL),
        (sym("Alt_L"), sym("Meta_L")),
        (sym("Super_L"), NO_SYMBOL),
        (sym("Caps_Lock"), NO_SYMBOL),
        (sym("Num_Lock"), NO_SYMBOL),
        (NO_SYMBOL, sym("ISO_Level3_Shift")),
        (sym("XF86Sleep"), NO_SYMBOL),
        (sym("KP_Enter"), sym("Return")),
        (sym("F1"), NO_SYMBOL),
    ];
    let keysyms = rows.iter().flat_map(|&(a, b)| [a, b]).collect();
    KeyboardMapping::new(MIN_KEYCODE, MAX_KEYCODE, 2, keysyms).unwrap()
}

/// Two slots per modifier; no keycode appears under two rows.
pub fn sample_modifiers() -> ModifierMapping {
    ModifierMapping::new(
        2,
        vec![
            KC_SHIFT_L, KC_SHIFT_R, // shift
            KC_CAPS_LOCK, 0, // lock
            KC_CONTROL_L, 0, // control
            KC_ALT_L, 0, // mod1
            KC_NUM_LOCK, 0, // mod2
            0, 0, // mod3
            KC_SUPER_L, 0, // mod4
            KC_SECOND_COLUMN_ONLY, 0, // mod5
        ],
    )
    .unwrap()
}

pub fn sample_mapping(generation: u64) -> Mapping {
    Mapping::new(generation, sample_keyboard(), sample_modifiers())
}

/// A scriptable [`MappingSource`].
///
/// `version` is stamped into both tables (the first keysym of keycode 8 and
/// the mod3 row), so a reader can tell which fetch a table came from.
#[derive(Default)]
pub struct FakeSource {
    pub version: AtomicU32,
    pub bump_on_fetch: AtomicBool,
    pub fail_keyboard: AtomicBool,
    pub fail_modifiers: AtomicBool,
    pub delay: parking_lot::Mutex<Option<Duration>>,
    pub fetches: AtomicU32,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn failure() -> ReplyError {
        ReplyError::ConnectionError(ConnectionError::UnknownError)
    }
}

/// Version stamped into a keyboard table by [`FakeSource`].
pub fn keyboard_version(keyboard: &KeyboardMapping) -> u32 {
    keyboard.keysyms[0]
}

/// Version stamped into a modifier table by [`FakeSource`].
pub fn modifier_version(modifiers: &ModifierMapping) -> u32 {
    u32::from(modifiers.keycodes[10])
}

impl FakeSource {
    fn keyboard_at(&self, version: u32) -> Result<KeyboardMapping, KeybindError> {
        if self.fail_keyboard.load(Ordering::SeqCst) {
            return Err(KeybindError::KeyboardMapping(Self::failure()));
        }
        let mut keyboard = sample_keyboard();
        keyboard.keysyms[0] = version;
        Ok(keyboard)
    }

    fn modifiers_at(&self, version: u32) -> Result<ModifierMapping, KeybindError> {
        if self.fail_modifiers.load(Ordering::SeqCst) {
            return Err(KeybindError::ModifierMapping(Self::failure()));
        }
        let mut modifiers = sample_modifiers();
        modifiers.keycodes[10] = version as u8;
        Ok(modifiers)
    }
}

impl MappingSource for FakeSource {
    fn keyboard_mapping(&self) -> Result<KeyboardMapping, KeybindError> {
        self.keyboard_at(self.version.load(Ordering::SeqCst))
    }

    fn modifier_mapping(&self) -> Result<ModifierMapping, KeybindError> {
        self.modifiers_at(self.version.load(Ordering::SeqCst))
    }

    fn fetch(&self) -> Result<(KeyboardMapping, ModifierMapping), KeybindError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.delay.lock() {
            std::thread::sleep(delay);
        }
        let version = if self.bump_on_fetch.load(Ordering::SeqCst) {
            self.version.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.version.load(Ordering::SeqCst)
        };
        Ok((self.keyboard_at(version)?, self.modifiers_at(version)?))
    }
}
