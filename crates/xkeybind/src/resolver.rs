//! Binding resolution
//!
//! Translates between keycodes, keysyms, modifier masks and binding strings
//! such as `"Mod4-j"`, against a single [`Mapping`] generation.
//!
//! All reverse lookups are linear scans in ascending order. The tables are
//! small and only consulted when bindings are set up, and the scan order is
//! what decides which physical key wins when a keysym sits on several.
//!
//! # Binding strings
//!
//! A binding is a `-`-separated list of tokens. Tokens naming a modifier
//! (`shift`, `lock`, `control`, `mod1`..`mod5`, `any`, any case) add to the
//! mask. The first token that is not a modifier is the key. Later
//! non-modifier tokens are ignored: `"Mod4-j-k"` binds `Mod4-j`. This
//! leniency is long-standing and kept on purpose.

use std::fmt;

use crate::error::KeybindError;
use crate::keysym::{self, Keycode, Keysym, NO_SYMBOL};
use crate::mapping::Mapping;
use crate::modifier::{Modifier, Modifiers};

/// A resolved binding: the modifier mask and keycode `GrabKey` wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Binding {
    pub modifiers: Modifiers,
    /// `None` when the key token was missing or did not resolve.
    pub keycode: Option<Keycode>,
}

impl Binding {
    pub fn is_resolved(&self) -> bool {
        self.keycode.is_some()
    }

    /// Keycode as sent on the wire, 0 when unresolved.
    pub fn raw_keycode(&self) -> Keycode {
        self.keycode.unwrap_or(0)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.keycode {
            Some(code) => write!(f, "mask=0x{:04x} keycode={}", self.modifiers.bits(), code),
            None => write!(f, "mask=0x{:04x} keycode=<unresolved>", self.modifiers.bits()),
        }
    }
}

impl Mapping {
    /// Parse a binding string into a modifier mask and keycode.
    ///
    /// An unresolvable key is not an error: the binding comes back with
    /// `keycode: None` and a warning is logged. Use
    /// [`Mapping::try_parse_binding`] to turn that into an error.
    pub fn parse_binding(&self, spec: &str) -> Binding {
        let mut modifiers = Modifiers::empty();
        let mut key_token: Option<&str> = None;

        for part in spec.split('-') {
            match Modifier::from_name(part) {
                Some(modifier) => modifiers |= modifier.mask(),
                None => {
                    if key_token.is_none() {
                        key_token = Some(part);
                    } else {
                        tracing::debug!("Ignoring extra key token '{}' in '{}'", part, spec);
                    }
                }
            }
        }

        let keycode = key_token.and_then(|token| self.keycode_for_name(token));
        if keycode.is_none() {
            tracing::warn!(
                "Could not find a valid keycode in the string '{}'. Things probably will not work right.",
                spec
            );
        }

        Binding { modifiers, keycode }
    }

    /// Like [`Mapping::parse_binding`], but an unresolved key is an error.
    pub fn try_parse_binding(&self, spec: &str) -> Result<Binding, KeybindError> {
        let binding = self.parse_binding(spec);
        if binding.is_resolved() {
            Ok(binding)
        } else {
            Err(KeybindError::UnresolvedBinding {
                spec: spec.to_string(),
            })
        }
    }

    /// Resolve a key name (with case fallback) to a keycode.
    pub fn keycode_for_name(&self, name: &str) -> Option<Keycode> {
        let sym = keysym::lookup(name)?;
        self.keycode_for_keysym(sym)
    }

    /// First keycode producing `sym`, scanning keycodes ascending and,
    /// within a keycode, columns ascending. `NoSymbol` never resolves.
    pub fn keycode_for_keysym(&self, sym: Keysym) -> Option<Keycode> {
        if sym == NO_SYMBOL {
            return None;
        }
        let keyboard = &self.keyboard;
        let width = usize::from(keyboard.keysyms_per_keycode);
        if width == 0 {
            return None;
        }
        keyboard
            .keysyms
            .chunks(width)
            .zip(keyboard.keycodes())
            .find(|(row, _)| row.contains(&sym))
            .map(|(_, code)| code)
    }

    /// Modifier bound to `keycode`, empty if none.
    ///
    /// Slots are scanned in ascending order; the first slot holding
    /// `keycode` decides the row. Keycode 0 marks an unbound slot and never
    /// matches.
    pub fn modifier_for_keycode(&self, keycode: Keycode) -> Modifiers {
        if keycode == 0 {
            return Modifiers::empty();
        }
        let per_modifier = usize::from(self.modifiers.keycodes_per_modifier);
        self.modifiers
            .keycodes
            .iter()
            .position(|&slot| slot == keycode)
            .and_then(|slot| Modifier::from_row(slot / per_modifier))
            .map(Modifier::mask)
            .unwrap_or_else(Modifiers::empty)
    }

    /// Keycodes bound to `modifier`, unbound slots skipped.
    pub fn keycodes_for_modifier(&self, modifier: Modifier) -> Vec<Keycode> {
        self.modifiers
            .row(modifier)
            .iter()
            .copied()
            .filter(|&code| code != 0)
            .collect()
    }

    /// Keysym in `column` of `keycode`.
    pub fn keysym(&self, keycode: Keycode, column: u8) -> Result<Keysym, KeybindError> {
        self.keyboard.keysym(keycode, column)
    }

    /// Best-effort keysym for display: column 0, or column 1 when column 0
    /// is `NoSymbol`.
    pub fn display_keysym(&self, keycode: Keycode) -> Result<Keysym, KeybindError> {
        let sym = self.keyboard.keysym(keycode, 0)?;
        if sym != NO_SYMBOL || self.keyboard.keysyms_per_keycode < 2 {
            return Ok(sym);
        }
        self.keyboard.keysym(keycode, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        sample_mapping, KC_A, KC_J, KC_KP_ENTER, KC_RETURN, KC_SHIFT_L, KC_SUPER_L, KC_XF86_SLEEP,
    };

    #[test]
    fn test_parse_binding_mod4_j() {
        let mapping = sample_mapping(1);
        let binding = mapping.parse_binding("Mod4-j");
        assert_eq!(binding.modifiers, Modifiers::MOD4);
        let expected = keysym::lookup("j").and_then(|sym| mapping.keycode_for_keysym(sym));
        assert_eq!(binding.keycode, expected);
        assert_eq!(binding.keycode, Some(KC_J));
    }

    #[test]
    fn test_parse_binding_shift_control_return() {
        let mapping = sample_mapping(1);
        let binding = mapping.parse_binding("shift-control-Return");
        assert_eq!(binding.modifiers, Modifiers::SHIFT | Modifiers::CONTROL);
        assert_eq!(binding.keycode, Some(KC_RETURN));
    }

    #[test]
    fn test_parse_binding_modifier_case_insensitive() {
        let mapping = sample_mapping(1);
        let binding = mapping.parse_binding("SHIFT-Mod1-ANY-a");
        assert_eq!(binding.modifiers, Modifiers::SHIFT | Modifiers::MOD1 | Modifiers::ANY);
        assert_eq!(binding.keycode, Some(KC_A));
    }

    #[test]
    fn test_parse_binding_key_only() {
        let mapping = sample_mapping(1);
        let binding = mapping.parse_binding("XF86Sleep");
        assert!(binding.modifiers.is_empty());
        assert_eq!(binding.keycode, Some(KC_XF86_SLEEP));
    }

    #[test]
    fn test_parse_binding_first_key_token_wins() {
        let mapping = sample_mapping(1);
        let binding = mapping.parse_binding("Mod4-j-a");
        assert_eq!(binding.modifiers, Modifiers::MOD4);
        assert_eq!(binding.keycode, Some(KC_J));

        // a bad first key token is not rescued by a good second one
        let binding = mapping.parse_binding("Mod4-nosuchkey-j");
        assert_eq!(binding.keycode, None);
    }

    #[test]
    fn test_parse_binding_without_key() {
        let mapping = sample_mapping(1);
        let binding = mapping.parse_binding("Mod4-shift");
        assert_eq!(binding.modifiers, Modifiers::MOD4 | Modifiers::SHIFT);
        assert_eq!(binding.keycode, None);
        assert_eq!(binding.raw_keycode(), 0);
    }

    #[test]
    fn test_parse_binding_unmapped_symbol() {
        // F35 is a known name but no key produces it
        let mapping = sample_mapping(1);
        assert!(keysym::lookup("F35").is_some());
        assert_eq!(mapping.parse_binding("control-F35").keycode, None);
    }

    #[test]
    fn test_try_parse_binding() {
        let mapping = sample_mapping(1);
        assert!(mapping.try_parse_binding("Mod4-j").is_ok());
        match mapping.try_parse_binding("Mod4-bogus") {
            Err(KeybindError::UnresolvedBinding { spec }) => assert_eq!(spec, "Mod4-bogus"),
            other => panic!("Expected UnresolvedBinding, got: {:?}", other),
        }
    }

    #[test]
    fn test_keycode_for_keysym_round_trip() {
        let mapping = sample_mapping(1);
        let keyboard = &mapping.keyboard;
        for code in keyboard.keycodes() {
            for column in 0..keyboard.keysyms_per_keycode {
                let sym = keyboard.keysym(code, column).unwrap();
                if sym == NO_SYMBOL {
                    continue;
                }
                let found = mapping
                    .keycode_for_keysym(sym)
                    .expect("a symbol in the table resolves");
                assert!(found <= code, "ascending scan returns the lowest keycode");
                assert!(keyboard.row(found).unwrap().contains(&sym));
            }
        }
    }

    #[test]
    fn test_keycode_for_keysym_lowest_keycode_wins() {
        let mapping = sample_mapping(1);
        // Return sits on the main key and on a later duplicate
        let sym = keysym::exact("Return").unwrap();
        assert_eq!(mapping.keyboard.keysym(KC_KP_ENTER, 1).unwrap(), sym);
        assert_eq!(mapping.keycode_for_keysym(sym), Some(KC_RETURN));
    }

    #[test]
    fn test_keycode_for_keysym_matches_any_column() {
        let mapping = sample_mapping(1);
        // "J" lives in column 1 of the j key
        let upper_j = keysym::exact("J").unwrap();
        assert_eq!(mapping.keycode_for_keysym(upper_j), Some(KC_J));
    }

    #[test]
    fn test_keycode_for_no_symbol() {
        let mapping = sample_mapping(1);
        assert_eq!(mapping.keycode_for_keysym(NO_SYMBOL), None);
    }

    #[test]
    fn test_modifier_for_keycode() {
        let mapping = sample_mapping(1);
        assert_eq!(mapping.modifier_for_keycode(KC_SHIFT_L), Modifiers::SHIFT);
        assert_eq!(mapping.modifier_for_keycode(KC_SUPER_L), Modifiers::MOD4);
        assert_eq!(mapping.modifier_for_keycode(KC_J), Modifiers::empty());
        assert_eq!(mapping.modifier_for_keycode(0), Modifiers::empty());
    }

    #[test]
    fn test_modifier_round_trip_for_every_bound_slot() {
        let mapping = sample_mapping(1);
        for modifier in Modifier::ROWS {
            for code in mapping.keycodes_for_modifier(modifier) {
                assert_eq!(mapping.modifier_for_keycode(code), modifier.mask(), "keycode {}", code);
            }
        }
        assert_eq!(mapping.keycodes_for_modifier(Modifier::Mod4), vec![KC_SUPER_L]);
        assert!(mapping.keycodes_for_modifier(Modifier::Mod3).is_empty());
    }

    #[test]
    fn test_modifier_first_slot_wins() {
        let mut mapping = sample_mapping(1);
        // also bind Super_L under mod1, ahead of its mod4 slot
        mapping.modifiers.keycodes[7] = KC_SUPER_L;
        assert_eq!(mapping.modifier_for_keycode(KC_SUPER_L), Modifiers::MOD1);
    }

    #[test]
    fn test_display_keysym_falls_back_to_column_one() {
        let mapping = sample_mapping(1);
        let code = crate::test_support::KC_SECOND_COLUMN_ONLY;
        assert_eq!(mapping.keysym(code, 0).unwrap(), NO_SYMBOL);
        assert_eq!(
            mapping.display_keysym(code).unwrap(),
            keysym::exact("ISO_Level3_Shift").unwrap()
        );
    }
}
