//! Error types for keyboard mapping and binding resolution

use miette::Diagnostic;
use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError};

use crate::keysym::Keycode;

#[derive(Error, Diagnostic, Debug)]
pub enum KeybindError {
    #[error("Failed to connect to the X server: {0}")]
    #[diagnostic(code(xkeybind::connect))]
    Connect(#[from] ConnectError),

    /// The server refused or failed the `GetKeyboardMapping` request.
    /// Without it no binding can be resolved.
    #[error("Could not get keyboard mapping: {0}")]
    #[diagnostic(
        code(xkeybind::keyboard_mapping),
        help("this is unrecoverable; key bindings cannot work without a mapping from the server")
    )]
    KeyboardMapping(#[source] ReplyError),

    #[error("Could not get modifier mapping: {0}")]
    #[diagnostic(
        code(xkeybind::modifier_mapping),
        help("this is unrecoverable; key bindings cannot work without a mapping from the server")
    )]
    ModifierMapping(#[source] ReplyError),

    #[error("Mapping refresh did not complete within {millis} ms")]
    #[diagnostic(code(xkeybind::refresh_timeout))]
    RefreshTimeout { millis: u128 },

    #[error("Mapping refresh worker exited without a result")]
    #[diagnostic(code(xkeybind::refresh_aborted))]
    RefreshAborted,

    #[error("Failed to spawn mapping refresh worker: {0}")]
    #[diagnostic(code(xkeybind::spawn))]
    Spawn(#[source] std::io::Error),

    #[error("Server returned a malformed mapping: {message}")]
    #[diagnostic(code(xkeybind::malformed_mapping))]
    MalformedMapping { message: String },

    #[error("Keycode {keycode} is outside the server range [{min}, {max}]")]
    #[diagnostic(code(xkeybind::keycode_out_of_range))]
    KeycodeOutOfRange { keycode: Keycode, min: Keycode, max: Keycode },

    #[error("Column {column} is outside the {per_keycode} keysyms per keycode")]
    #[diagnostic(code(xkeybind::column_out_of_range))]
    ColumnOutOfRange { column: u8, per_keycode: u8 },

    #[error("Could not find a valid keycode in '{spec}'")]
    #[diagnostic(code(xkeybind::unresolved_binding))]
    UnresolvedBinding { spec: String },

    #[error("Binding with modifier mask 0x{mask:04x} has no keycode to grab")]
    #[diagnostic(
        code(xkeybind::missing_keycode),
        help("resolve the binding with `try_parse_binding` before grabbing it")
    )]
    MissingKeycode { mask: u16 },

    #[error("X11 connection error: {0}")]
    #[diagnostic(code(xkeybind::connection))]
    Connection(#[from] ConnectionError),

    #[error("X11 request failed: {0}")]
    #[diagnostic(code(xkeybind::request))]
    Request(#[from] ReplyError),
}
