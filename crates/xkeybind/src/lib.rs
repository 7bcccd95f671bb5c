//! Keyboard mapping and key binding resolution for X11 clients
//!
//! This crate keeps the server's keyboard and modifier mappings in sync and
//! turns human-readable bindings like `"Mod4-j"` into the modifier mask and
//! keycode that `GrabKey` and key event matching need.
//!
//! ```no_run
//! use std::sync::Arc;
//! use xkeybind::{Keymap, KeymapOptions, X11Source};
//!
//! # fn main() -> Result<(), xkeybind::KeybindError> {
//! let (conn, _screen) = x11rb::connect(None)?;
//! let keymap = Keymap::initialize(X11Source::new(Arc::new(conn)), KeymapOptions::default())?;
//! let binding = keymap.parse_binding("Mod4-j");
//! println!("{}", binding);
//! # Ok(())
//! # }
//! ```

mod dump;
mod error;
mod grab;
pub mod keysym;
mod keysymdef;
mod mapping;
mod modifier;
mod refresh;
mod resolver;

#[cfg(test)]
mod test_support;

pub use dump::{write_modifier_table, ModifierTable, UNRESOLVED};
pub use error::KeybindError;
pub use grab::{grab_key, ungrab_key, IGNORED_MODIFIERS};
pub use keysym::{Keycode, Keysym, NO_SYMBOL};
pub use mapping::{KeyboardMapping, Mapping, ModifierMapping};
pub use modifier::{Modifier, Modifiers};
pub use refresh::{
    Keymap, KeymapOptions, MappingChange, MappingRequest, MappingSource, X11Source,
    DEFAULT_REFRESH_TIMEOUT,
};
pub use resolver::Binding;
