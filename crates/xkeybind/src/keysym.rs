//! Static keysym name table
//!
//! Bidirectional mapping between keysym values and their canonical X11
//! names. The table is built once on first use and never mutated, so it is
//! safe to read from any thread.
//!
//! Some keysyms have more than one name (`Prior` / `Page_Up`). Every name
//! resolves by [`lookup`]; [`name`] returns the first one listed, which is
//! the name `xmodmap` prints.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::keysymdef::TABLES;

pub use x11rb::protocol::xproto::{Keycode, Keysym};

/// The "no symbol" keysym, stored in unused keyboard mapping columns.
pub const NO_SYMBOL: Keysym = 0;

static NAME_TO_KEYSYM: Lazy<HashMap<&'static str, Keysym>> =
    Lazy::new(|| entries().map(|&(name, sym)| (name, sym)).collect());

static KEYSYM_TO_NAME: Lazy<HashMap<Keysym, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for &(name, sym) in entries() {
        map.entry(sym).or_insert(name);
    }
    map
});

fn entries() -> impl Iterator<Item = &'static (&'static str, Keysym)> {
    TABLES.iter().flat_map(|table| table.iter())
}

/// Find the keysym for `name`.
///
/// Tries, in order: the name as given, with its first character
/// uppercased, all lowercase, all uppercase. The first hit wins and there
/// is no further folding, so `"rEtUrN"` and `"RETURN"` find nothing.
pub fn lookup(name: &str) -> Option<Keysym> {
    exact(name)
        .or_else(|| exact(&title_case(name)))
        .or_else(|| exact(&name.to_lowercase()))
        .or_else(|| exact(&name.to_uppercase()))
}

/// Find the keysym for exactly `name`, no case folding.
pub fn exact(name: &str) -> Option<Keysym> {
    NAME_TO_KEYSYM.get(name).copied()
}

/// Canonical name of `sym`, if the table knows it.
pub fn name(sym: Keysym) -> Option<&'static str> {
    KEYSYM_TO_NAME.get(&sym).copied()
}

/// Number of distinct names in the table.
pub fn len() -> usize {
    NAME_TO_KEYSYM.len()
}

/// First character uppercased, the rest left alone.
fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_exact() {
        assert_eq!(lookup("j"), Some(0x006a));
        assert_eq!(lookup("J"), Some(0x004a));
        assert_eq!(lookup("Return"), Some(0xff0d));
        assert_eq!(lookup("XF86Sleep"), Some(0x1008ff2f));
    }

    #[test]
    fn test_lookup_case_fallback() {
        // first character uppercased
        assert_eq!(lookup("return"), Some(0xff0d));
        assert_eq!(lookup("escape"), Some(0xff1b));
        assert_eq!(lookup("f1"), Some(0xffbe));
        assert_eq!(lookup("super_L"), Some(0xffeb));
        // all lowercase
        assert_eq!(lookup("Space"), Some(0x0020));
        assert_eq!(lookup("SPACE"), Some(0x0020));
        // all uppercase
        assert_eq!(lookup("kp_f1"), Some(0xff91));
    }

    #[test]
    fn test_lookup_mixed_case_misses() {
        // no variant of these spells "Return"
        assert_eq!(lookup("rEtUrN"), None);
        assert_eq!(lookup("REtUrN"), None);
        assert_eq!(lookup("RETURN"), None);
    }

    #[test]
    fn test_lookup_no_further_fallback() {
        assert_eq!(lookup("xf86sleep"), None);
        assert_eq!(lookup("Xf86sleep"), None);
        assert_eq!(lookup("XF86SLEEP"), None);
        assert_eq!(lookup("page_up"), None);
        assert_eq!(lookup("NotAKey"), None);
        assert_eq!(lookup(""), None);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("return"), "Return");
        assert_eq!(title_case("rEtUrN"), "REtUrN");
        assert_eq!(title_case("x"), "X");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_non_latin_names() {
        assert_eq!(lookup("aogonek"), Some(0x01b1));
        assert_eq!(lookup("Greek_alpha"), Some(0x07e1));
        assert_eq!(lookup("Cyrillic_a"), Some(0x06c1));
        assert_eq!(lookup("hebrew_aleph"), Some(0x0ce0));
        assert_eq!(lookup("Arabic_alef"), Some(0x05c7));
        assert_eq!(lookup("Thai_kokai"), Some(0x0da1));
        assert_eq!(lookup("braille_dot_1"), Some(0xfff1));
        assert_eq!(lookup("EuroSign"), Some(0x20ac));
        assert_eq!(lookup("ISO_Level3_Shift"), Some(0xfe03));
    }

    #[test]
    fn test_reverse_name_is_canonical() {
        assert_eq!(name(0xff55), Some("Prior"));
        assert_eq!(lookup("Page_Up"), Some(0xff55));
        assert_eq!(name(0xff0d), Some("Return"));
        assert_eq!(name(0x0027), Some("apostrophe"));
        assert_eq!(name(NO_SYMBOL), None);
    }

    #[test]
    fn test_table_round_trip() {
        for &(entry_name, sym) in entries() {
            assert_eq!(exact(entry_name), Some(sym), "{}", entry_name);
            let canonical = name(sym).expect("every keysym has a name");
            assert_eq!(exact(canonical), Some(sym));
        }
    }

    #[test]
    fn test_no_duplicate_names() {
        assert_eq!(len(), entries().count());
        assert!(len() > 2000);
    }
}
