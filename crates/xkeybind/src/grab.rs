//! Passive key grabs and key event matching
//!
//! X matches grabs on the exact modifier state, so a grab on `Mod4-j`
//! stops firing as soon as NumLock or CapsLock is on. Every grab is
//! therefore repeated for each combination in [`IGNORED_MODIFIERS`], and
//! event matching masks those bits out.

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt as _, GrabMode, KeyPressEvent, ModMask, Window};

use crate::error::KeybindError;
use crate::keysym::Keycode;
use crate::modifier::Modifiers;
use crate::resolver::Binding;

/// Lock-style modifiers (NumLock on Mod2, CapsLock on Lock) that should
/// not affect whether a binding fires.
pub const IGNORED_MODIFIERS: [Modifiers; 4] = [
    Modifiers::empty(),
    Modifiers::MOD2,
    Modifiers::LOCK,
    Modifiers::MOD2.union(Modifiers::LOCK),
];

fn bound_keycode(binding: &Binding) -> Result<Keycode, KeybindError> {
    binding.keycode.ok_or(KeybindError::MissingKeycode {
        mask: binding.modifiers.bits(),
    })
}

/// Grab `binding` on `window`, once per ignored-modifier combination.
pub fn grab_key<C: Connection>(
    conn: &C,
    window: Window,
    binding: &Binding,
) -> Result<(), KeybindError> {
    let keycode = bound_keycode(binding)?;
    for ignored in IGNORED_MODIFIERS {
        let mods = ModMask::from((binding.modifiers | ignored).bits());
        conn.grab_key(true, window, mods, keycode, GrabMode::ASYNC, GrabMode::ASYNC)?
            .check()?;
    }
    tracing::debug!("Grabbed {} on window 0x{:x}", binding, window);
    Ok(())
}

/// Release a grab made by [`grab_key`].
pub fn ungrab_key<C: Connection>(
    conn: &C,
    window: Window,
    binding: &Binding,
) -> Result<(), KeybindError> {
    let keycode = bound_keycode(binding)?;
    for ignored in IGNORED_MODIFIERS {
        let mods = ModMask::from((binding.modifiers | ignored).bits());
        conn.ungrab_key(keycode, window, mods)?.check()?;
    }
    tracing::debug!("Released {} on window 0x{:x}", binding, window);
    Ok(())
}

impl Binding {
    /// Whether a key event with `state` and `detail` triggers this binding.
    ///
    /// Ignored modifiers and pointer button bits in `state` are dropped
    /// before comparing. A binding carrying `Any` matches every state.
    pub fn matches(&self, state: u16, detail: Keycode) -> bool {
        let Some(keycode) = self.keycode else {
            return false;
        };
        if keycode != detail {
            return false;
        }
        if self.modifiers.contains(Modifiers::ANY) {
            return true;
        }
        let ignored = IGNORED_MODIFIERS[3];
        let state = Modifiers::from_bits_truncate(state).difference(ignored | Modifiers::ANY);
        state == self.modifiers.difference(ignored)
    }

    /// [`Binding::matches`] for a key press or release event.
    pub fn matches_event(&self, event: &KeyPressEvent) -> bool {
        self.matches(u16::from(event.state), event.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(modifiers: Modifiers, keycode: Option<Keycode>) -> Binding {
        Binding { modifiers, keycode }
    }

    #[test]
    fn test_ignored_modifier_combinations() {
        assert_eq!(IGNORED_MODIFIERS[0].bits(), 0);
        assert_eq!(IGNORED_MODIFIERS[1].bits(), 0x10);
        assert_eq!(IGNORED_MODIFIERS[2].bits(), 0x02);
        assert_eq!(IGNORED_MODIFIERS[3].bits(), 0x12);
    }

    #[test]
    fn test_matches_exact_state() {
        let b = binding(Modifiers::MOD4, Some(44));
        assert!(b.matches(Modifiers::MOD4.bits(), 44));
        assert!(!b.matches(Modifiers::MOD4.bits(), 45));
        assert!(!b.matches(0, 44));
        assert!(!b.matches((Modifiers::MOD4 | Modifiers::SHIFT).bits(), 44));
    }

    #[test]
    fn test_matches_ignores_lock_modifiers() {
        let b = binding(Modifiers::MOD4, Some(44));
        for ignored in IGNORED_MODIFIERS {
            assert!(b.matches((Modifiers::MOD4 | ignored).bits(), 44));
        }
    }

    #[test]
    fn test_matches_ignores_button_bits() {
        // Button1 is bit 8 of the event state
        let b = binding(Modifiers::CONTROL, Some(9));
        assert!(b.matches(Modifiers::CONTROL.bits() | 0x100, 9));
    }

    #[test]
    fn test_any_matches_every_state() {
        let b = binding(Modifiers::ANY, Some(9));
        assert!(b.matches(0, 9));
        assert!(b.matches((Modifiers::SHIFT | Modifiers::MOD1).bits(), 9));
        assert!(!b.matches(0, 10));
    }

    #[test]
    fn test_unresolved_binding_never_matches() {
        let b = binding(Modifiers::empty(), None);
        assert!(!b.matches(0, 0));
        assert!(matches!(
            bound_keycode(&b),
            Err(KeybindError::MissingKeycode { mask: 0 })
        ));
    }

    #[test]
    fn test_missing_keycode_message_names_the_mask() {
        let b = binding(Modifiers::MOD4, None);
        let err = bound_keycode(&b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Binding with modifier mask 0x0040 has no keycode to grab"
        );
    }
}
