//! Modifier enumeration and masks
//!
//! [`Modifier::ALL`] is the one place the protocol's modifier order is
//! written down. The modifier mapping rows, binding parsing and the
//! modifier table dump all index through it.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// A set of modifier bits, as used in `GrabKey` and key event state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u16 {
        const SHIFT   = 1 << 0;
        const LOCK    = 1 << 1;
        const CONTROL = 1 << 2;
        const MOD1    = 1 << 3;
        const MOD2    = 1 << 4;
        const MOD3    = 1 << 5;
        const MOD4    = 1 << 6;
        const MOD5    = 1 << 7;
        const ANY     = 1 << 15;
    }
}

/// A single modifier.
///
/// `Any` is a wildcard understood by `GrabKey`; it has no row in the
/// modifier mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Shift,
    Lock,
    Control,
    Mod1,
    Mod2,
    Mod3,
    Mod4,
    Mod5,
    Any,
}

impl Modifier {
    /// Every modifier, in protocol order. Order matters.
    pub const ALL: [Modifier; 9] = [
        Modifier::Shift,
        Modifier::Lock,
        Modifier::Control,
        Modifier::Mod1,
        Modifier::Mod2,
        Modifier::Mod3,
        Modifier::Mod4,
        Modifier::Mod5,
        Modifier::Any,
    ];

    /// The modifiers that own a row in the server's modifier mapping: every
    /// entry of [`Modifier::ALL`] but `Any`.
    pub const ROWS: [Modifier; 8] = {
        let mut rows = [Modifier::Shift; 8];
        let mut i = 0;
        while i < rows.len() {
            rows[i] = Modifier::ALL[i];
            i += 1;
        }
        rows
    };

    /// The modifier for row `row` of the modifier mapping.
    pub fn from_row(row: usize) -> Option<Self> {
        Self::ROWS.get(row).copied()
    }

    /// Parse a modifier token, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }

    /// Lowercase name, as accepted in binding strings and printed by
    /// `xmodmap`.
    pub fn name(self) -> &'static str {
        match self {
            Modifier::Shift => "shift",
            Modifier::Lock => "lock",
            Modifier::Control => "control",
            Modifier::Mod1 => "mod1",
            Modifier::Mod2 => "mod2",
            Modifier::Mod3 => "mod3",
            Modifier::Mod4 => "mod4",
            Modifier::Mod5 => "mod5",
            Modifier::Any => "any",
        }
    }

    pub fn mask(self) -> Modifiers {
        match self {
            Modifier::Shift => Modifiers::SHIFT,
            Modifier::Lock => Modifiers::LOCK,
            Modifier::Control => Modifiers::CONTROL,
            Modifier::Mod1 => Modifiers::MOD1,
            Modifier::Mod2 => Modifiers::MOD2,
            Modifier::Mod3 => Modifiers::MOD3,
            Modifier::Mod4 => Modifiers::MOD4,
            Modifier::Mod5 => Modifiers::MOD5,
            Modifier::Any => Modifiers::ANY,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Modifiers {
    /// The modifiers in this set, in protocol order.
    pub fn modifiers(self) -> impl Iterator<Item = Modifier> {
        Modifier::ALL
            .into_iter()
            .filter(move |m| self.contains(m.mask()))
    }
}

impl fmt::Display for Modifiers {
    /// Renders as a binding prefix, e.g. `shift-mod4`. Empty renders as
    /// nothing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, m) in self.modifiers().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            f.write_str(m.name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_match_protocol_bits() {
        assert_eq!(Modifiers::SHIFT.bits(), 0x0001);
        assert_eq!(Modifiers::CONTROL.bits(), 0x0004);
        assert_eq!(Modifiers::MOD4.bits(), 0x0040);
        assert_eq!(Modifiers::ANY.bits(), 0x8000);
    }

    #[test]
    fn test_rows_are_prefix_of_all() {
        assert_eq!(&Modifier::ALL[..8], &Modifier::ROWS[..]);
        assert!(!Modifier::ROWS.contains(&Modifier::Any));
        assert_eq!(Modifier::from_row(6), Some(Modifier::Mod4));
        assert_eq!(Modifier::from_row(8), None);
    }

    #[test]
    fn test_all_order_matches_bit_order() {
        for pair in Modifier::ALL.windows(2) {
            assert!(pair[0].mask().bits() < pair[1].mask().bits());
        }
    }

    #[test]
    fn test_from_name_case_insensitive() {
        assert_eq!(Modifier::from_name("Mod4"), Some(Modifier::Mod4));
        assert_eq!(Modifier::from_name("CONTROL"), Some(Modifier::Control));
        assert_eq!(Modifier::from_name("any"), Some(Modifier::Any));
        assert_eq!(Modifier::from_name("ctrl"), None);
        assert_eq!(Modifier::from_name("j"), None);
    }

    #[test]
    fn test_display() {
        let mods = Modifiers::SHIFT | Modifiers::MOD4;
        assert_eq!(mods.to_string(), "shift-mod4");
        assert_eq!(Modifiers::empty().to_string(), "");
    }
}
