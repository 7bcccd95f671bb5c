//! Modifier table dump, in the style of `xmodmap -pm`
//!
//! A sanity check of the modifier mapping and an example of walking it.
//! Going from keycode back to a name is guesswork: a keycode carries
//! several keysyms and nothing says which one a human would call it. We
//! take column 0, or column 1 if column 0 is empty, and give up after that.

use std::fmt;
use std::io::{self, Write};

use crate::keysym::{self, Keycode, NO_SYMBOL};
use crate::mapping::Mapping;
use crate::modifier::Modifier;
use crate::refresh::{Keymap, MappingSource};

/// Shown for a bound keycode with no usable keysym.
pub const UNRESOLVED: &str = "NoSymbol";

/// Renders one row per real modifier (not `Any`).
pub struct ModifierTable<'a> {
    mapping: &'a Mapping,
}

impl<'a> ModifierTable<'a> {
    pub fn new(mapping: &'a Mapping) -> Self {
        Self { mapping }
    }

    /// Display name of a bound keycode.
    fn key_name(&self, keycode: Keycode) -> String {
        match self.mapping.display_keysym(keycode) {
            Ok(NO_SYMBOL) | Err(_) => UNRESOLVED.to_string(),
            Ok(sym) => keysym::name(sym)
                .map(str::to_string)
                .unwrap_or_else(|| format!("0x{:x}", sym)),
        }
    }
}

impl fmt::Display for ModifierTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "xkeybind:  up to {} keys per modifier, (keycodes in parentheses):",
            self.mapping.modifiers.keycodes_per_modifier
        )?;
        writeln!(f)?;

        for modifier in Modifier::ROWS {
            write!(f, "{:<10}", modifier.name())?;
            let keys: Vec<String> = self
                .mapping
                .keycodes_for_modifier(modifier)
                .into_iter()
                .map(|code| format!("{} (0x{:x})", self.key_name(code), code))
                .collect();
            writeln!(f, "{}", keys.join(",  "))?;
        }
        Ok(())
    }
}

/// Write the modifier table for `mapping` to `out`.
pub fn write_modifier_table<W: Write>(mapping: &Mapping, out: &mut W) -> io::Result<()> {
    write!(out, "{}", ModifierTable::new(mapping))
}

impl<S: MappingSource> Keymap<S> {
    /// Print the current modifier table to stdout.
    pub fn dump_modifier_table(&self) {
        print!("{}", ModifierTable::new(&self.snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_mapping;

    fn render() -> String {
        let mapping = sample_mapping(1);
        let mut out = Vec::new();
        write_modifier_table(&mapping, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_one_line_per_modifier_row() {
        let text = render();
        let rows: Vec<&str> = text.lines().skip(2).collect();
        assert_eq!(rows.len(), 8);
        for (row, modifier) in rows.iter().zip(Modifier::ROWS) {
            assert!(row.starts_with(modifier.name()), "{:?}", row);
        }
        assert!(!text.contains("any"));
    }

    #[test]
    fn test_bound_keys_listed_with_keycodes() {
        let text = render();
        let shift = text.lines().find(|l| l.starts_with("shift")).unwrap();
        assert_eq!(shift, "shift     Shift_L (0xd),  Shift_R (0xe)");
        let mod4 = text.lines().find(|l| l.starts_with("mod4")).unwrap();
        assert_eq!(mod4, "mod4      Super_L (0x11)");
    }

    #[test]
    fn test_empty_row() {
        let text = render();
        let mod3 = text.lines().find(|l| l.starts_with("mod3")).unwrap();
        assert_eq!(mod3.trim_end(), "mod3");
    }

    #[test]
    fn test_second_column_fallback() {
        let text = render();
        let mod5 = text.lines().find(|l| l.starts_with("mod5")).unwrap();
        assert_eq!(mod5, "mod5      ISO_Level3_Shift (0x14)");
    }

    #[test]
    fn test_unresolvable_key_uses_marker() {
        let mut mapping = sample_mapping(1);
        // bind a keycode with no keysyms at all, and one outside the range
        mapping.modifiers.keycodes[10] = 8;
        mapping.modifiers.keycodes[11] = 200;
        let text = ModifierTable::new(&mapping).to_string();
        let mod3 = text.lines().find(|l| l.starts_with("mod3")).unwrap();
        assert_eq!(mod3, "mod3      NoSymbol (0x8),  NoSymbol (0xc8)");
    }
}
