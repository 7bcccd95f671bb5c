//! Keyboard and modifier mapping tables
//!
//! A [`Mapping`] is one generation of server state: a keyboard mapping and
//! a modifier mapping fetched together. It is immutable once built; a
//! refresh produces a new one rather than editing the old.

use x11rb::protocol::xproto::{GetKeyboardMappingReply, GetModifierMappingReply};

use crate::error::KeybindError;
use crate::keysym::{Keycode, Keysym};
use crate::modifier::Modifier;

/// Keycode -> keysym table for keycodes `min_keycode..=max_keycode`.
///
/// Column `c` of keycode `k` lives at
/// `(k - min_keycode) * keysyms_per_keycode + c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardMapping {
    pub min_keycode: Keycode,
    pub max_keycode: Keycode,
    pub keysyms_per_keycode: u8,
    pub keysyms: Vec<Keysym>,
}

impl KeyboardMapping {
    /// Build a mapping, checking that the table covers the keycode range.
    pub fn new(
        min_keycode: Keycode,
        max_keycode: Keycode,
        keysyms_per_keycode: u8,
        keysyms: Vec<Keysym>,
    ) -> Result<Self, KeybindError> {
        if min_keycode > max_keycode {
            return Err(KeybindError::MalformedMapping {
                message: format!("min keycode {} above max keycode {}", min_keycode, max_keycode),
            });
        }

        let codes = usize::from(max_keycode - min_keycode) + 1;
        let expected = codes * usize::from(keysyms_per_keycode);
        if keysyms.len() != expected {
            return Err(KeybindError::MalformedMapping {
                message: format!(
                    "expected {} keysyms for {} keycodes x {} columns, got {}",
                    expected,
                    codes,
                    keysyms_per_keycode,
                    keysyms.len()
                ),
            });
        }

        Ok(Self {
            min_keycode,
            max_keycode,
            keysyms_per_keycode,
            keysyms,
        })
    }

    /// Build from a `GetKeyboardMapping` reply for the range starting at
    /// `min_keycode`.
    pub fn from_reply(
        min_keycode: Keycode,
        max_keycode: Keycode,
        reply: GetKeyboardMappingReply,
    ) -> Result<Self, KeybindError> {
        Self::new(min_keycode, max_keycode, reply.keysyms_per_keycode, reply.keysyms)
    }

    /// The keycodes this table covers, ascending.
    pub fn keycodes(&self) -> impl Iterator<Item = Keycode> {
        self.min_keycode..=self.max_keycode
    }

    pub fn contains(&self, keycode: Keycode) -> bool {
        (self.min_keycode..=self.max_keycode).contains(&keycode)
    }

    /// Keysym in `column` of `keycode`.
    ///
    /// Out-of-range keycodes and columns are errors, never `NoSymbol`.
    pub fn keysym(&self, keycode: Keycode, column: u8) -> Result<Keysym, KeybindError> {
        let row = self.row(keycode)?;
        row.get(usize::from(column))
            .copied()
            .ok_or(KeybindError::ColumnOutOfRange {
                column,
                per_keycode: self.keysyms_per_keycode,
            })
    }

    /// All columns of `keycode`.
    pub fn row(&self, keycode: Keycode) -> Result<&[Keysym], KeybindError> {
        if !self.contains(keycode) {
            return Err(KeybindError::KeycodeOutOfRange {
                keycode,
                min: self.min_keycode,
                max: self.max_keycode,
            });
        }
        let width = usize::from(self.keysyms_per_keycode);
        let start = usize::from(keycode - self.min_keycode) * width;
        Ok(&self.keysyms[start..start + width])
    }
}

/// Modifier row -> keycodes table.
///
/// Rows follow [`Modifier::ROWS`]; each has `keycodes_per_modifier` slots
/// and a slot holding 0 is unbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierMapping {
    pub keycodes_per_modifier: u8,
    pub keycodes: Vec<Keycode>,
}

impl ModifierMapping {
    pub fn new(keycodes_per_modifier: u8, keycodes: Vec<Keycode>) -> Result<Self, KeybindError> {
        let expected = usize::from(keycodes_per_modifier) * Modifier::ROWS.len();
        if keycodes.len() != expected {
            return Err(KeybindError::MalformedMapping {
                message: format!(
                    "expected {} modifier slots ({} per modifier), got {}",
                    expected,
                    keycodes_per_modifier,
                    keycodes.len()
                ),
            });
        }
        Ok(Self {
            keycodes_per_modifier,
            keycodes,
        })
    }

    pub fn from_reply(reply: GetModifierMappingReply) -> Result<Self, KeybindError> {
        let per_modifier = reply.keycodes.len() / Modifier::ROWS.len();
        let per_modifier = u8::try_from(per_modifier).map_err(|_| KeybindError::MalformedMapping {
            message: format!("{} keycodes per modifier", per_modifier),
        })?;
        Self::new(per_modifier, reply.keycodes)
    }

    /// The slots of `modifier`'s row, unbound slots included. `Any` has no
    /// row and yields an empty slice.
    pub fn row(&self, modifier: Modifier) -> &[Keycode] {
        let Some(index) = Modifier::ROWS.iter().position(|m| *m == modifier) else {
            return &[];
        };
        let width = usize::from(self.keycodes_per_modifier);
        &self.keycodes[index * width..(index + 1) * width]
    }
}

/// One generation of mapping state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub generation: u64,
    pub keyboard: KeyboardMapping,
    pub modifiers: ModifierMapping,
}

impl Mapping {
    pub fn new(generation: u64, keyboard: KeyboardMapping, modifiers: ModifierMapping) -> Self {
        Self {
            generation,
            keyboard,
            modifiers,
        }
    }

    /// Whether both tables match `other`'s, ignoring the generation.
    pub fn same_tables(&self, other: &Mapping) -> bool {
        self.keyboard == other.keyboard && self.modifiers == other.modifiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyboard() -> KeyboardMapping {
        // keycodes 8..=10, two columns each
        KeyboardMapping::new(8, 10, 2, vec![0x61, 0x41, 0x62, 0x42, 0xff0d, 0]).unwrap()
    }

    #[test]
    fn test_keysym_indexing() {
        let map = keyboard();
        assert_eq!(map.keysym(8, 0).unwrap(), 0x61);
        assert_eq!(map.keysym(9, 1).unwrap(), 0x42);
        assert_eq!(map.keysym(10, 1).unwrap(), 0);
        assert_eq!(map.row(9).unwrap(), &[0x62, 0x42]);
    }

    #[test]
    fn test_keycode_out_of_range_is_error() {
        let map = keyboard();
        assert!(matches!(
            map.keysym(7, 0),
            Err(KeybindError::KeycodeOutOfRange { keycode: 7, min: 8, max: 10 })
        ));
        assert!(matches!(
            map.keysym(11, 0),
            Err(KeybindError::KeycodeOutOfRange { .. })
        ));
    }

    #[test]
    fn test_column_out_of_range_is_error() {
        let map = keyboard();
        assert!(matches!(
            map.keysym(8, 2),
            Err(KeybindError::ColumnOutOfRange { column: 2, per_keycode: 2 })
        ));
    }

    #[test]
    fn test_keyboard_length_checked() {
        let result = KeyboardMapping::new(8, 10, 2, vec![0; 5]);
        assert!(matches!(result, Err(KeybindError::MalformedMapping { .. })));

        let result = KeyboardMapping::new(10, 8, 2, vec![]);
        assert!(matches!(result, Err(KeybindError::MalformedMapping { .. })));
    }

    #[test]
    fn test_modifier_rows() {
        let mut slots = vec![0u8; 16];
        slots[0] = 50; // shift
        slots[1] = 62;
        slots[12] = 133; // mod4
        let map = ModifierMapping::new(2, slots).unwrap();
        assert_eq!(map.row(Modifier::Shift), &[50, 62]);
        assert_eq!(map.row(Modifier::Mod4), &[133, 0]);
        assert_eq!(map.row(Modifier::Lock), &[0, 0]);
        assert!(map.row(Modifier::Any).is_empty());
    }

    #[test]
    fn test_modifier_length_checked() {
        let result = ModifierMapping::new(2, vec![0; 15]);
        assert!(matches!(result, Err(KeybindError::MalformedMapping { .. })));
    }
}
