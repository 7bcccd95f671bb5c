//! Mapping cache and refresh
//!
//! [`Keymap`] owns the live [`Mapping`] for a connection. It fetches the
//! keyboard and modifier mappings at startup and again whenever the server
//! announces a mapping change.
//!
//! ## Consistency
//!
//! The live mapping sits behind an `Arc` that a refresh swaps in one step.
//! Readers take a snapshot (an `Arc` clone) and see either the old tables
//! or the new ones, never one of each. Refreshes are serialized: a second
//! refresh waits for the one in flight to finish or fail.
//!
//! ## Failure
//!
//! Without a mapping nothing can be resolved, so a failed initial fetch is
//! fatal and [`Keymap::initialize`] returns the error. A failed later
//! refresh returns the error and leaves the previous generation in place.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};
use parking_lot::{Mutex, RwLock};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt as _, Mapping as MappingKind, MappingNotifyEvent};
use x11rb::protocol::Event;

use crate::error::KeybindError;
use crate::keysym::{self, Keycode, Keysym};
use crate::mapping::{KeyboardMapping, Mapping, ModifierMapping};
use crate::modifier::Modifiers;
use crate::resolver::Binding;

/// Default bound on a single refresh round trip.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(5);

/// Where mapping tables come from.
///
/// Implemented for X11 connections by [`X11Source`]; tests use in-memory
/// sources.
pub trait MappingSource: Send + Sync + 'static {
    fn keyboard_mapping(&self) -> Result<KeyboardMapping, KeybindError>;

    fn modifier_mapping(&self) -> Result<ModifierMapping, KeybindError>;

    /// Fetch both tables. Both must succeed.
    fn fetch(&self) -> Result<(KeyboardMapping, ModifierMapping), KeybindError> {
        let keyboard = self.keyboard_mapping()?;
        let modifiers = self.modifier_mapping()?;
        Ok((keyboard, modifiers))
    }
}

/// Fetches mappings over an `x11rb` connection.
pub struct X11Source<C> {
    conn: Arc<C>,
}

impl<C: Connection> X11Source<C> {
    pub fn new(conn: Arc<C>) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    fn keycode_range(&self) -> Result<(Keycode, Keycode, u8), KeybindError> {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let count = max
            .checked_sub(min)
            .and_then(|span| span.checked_add(1))
            .ok_or_else(|| KeybindError::MalformedMapping {
                message: format!("server keycode range [{}, {}] is not usable", min, max),
            })?;
        Ok((min, max, count))
    }
}

impl<C: Connection + Send + Sync + 'static> MappingSource for X11Source<C> {
    fn keyboard_mapping(&self) -> Result<KeyboardMapping, KeybindError> {
        let (min, max, count) = self.keycode_range()?;
        let reply = self
            .conn
            .get_keyboard_mapping(min, count)
            .map_err(|e| KeybindError::KeyboardMapping(e.into()))?
            .reply()
            .map_err(KeybindError::KeyboardMapping)?;
        KeyboardMapping::from_reply(min, max, reply)
    }

    fn modifier_mapping(&self) -> Result<ModifierMapping, KeybindError> {
        let reply = self
            .conn
            .get_modifier_mapping()
            .map_err(|e| KeybindError::ModifierMapping(e.into()))?
            .reply()
            .map_err(KeybindError::ModifierMapping)?;
        ModifierMapping::from_reply(reply)
    }

    /// Sends both requests before waiting on either reply.
    fn fetch(&self) -> Result<(KeyboardMapping, ModifierMapping), KeybindError> {
        let (min, max, count) = self.keycode_range()?;
        let keyboard_cookie = self
            .conn
            .get_keyboard_mapping(min, count)
            .map_err(|e| KeybindError::KeyboardMapping(e.into()))?;
        let modifier_cookie = self
            .conn
            .get_modifier_mapping()
            .map_err(|e| KeybindError::ModifierMapping(e.into()))?;

        let keyboard = keyboard_cookie
            .reply()
            .map_err(KeybindError::KeyboardMapping)?;
        let modifiers = modifier_cookie
            .reply()
            .map_err(KeybindError::ModifierMapping)?;

        Ok((
            KeyboardMapping::from_reply(min, max, keyboard)?,
            ModifierMapping::from_reply(modifiers)?,
        ))
    }
}

/// Which table a mapping change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingRequest {
    Modifier,
    Keyboard,
    Pointer,
}

/// A "mapping changed" notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingChange {
    pub request: MappingRequest,
    pub first_keycode: Keycode,
    pub count: u8,
}

impl From<&MappingNotifyEvent> for MappingChange {
    fn from(event: &MappingNotifyEvent) -> Self {
        let request = if event.request == MappingKind::MODIFIER {
            MappingRequest::Modifier
        } else if event.request == MappingKind::KEYBOARD {
            MappingRequest::Keyboard
        } else {
            MappingRequest::Pointer
        };
        Self {
            request,
            first_keycode: event.first_keycode,
            count: event.count,
        }
    }
}

/// Options for [`Keymap::initialize`].
#[derive(Debug, Clone)]
pub struct KeymapOptions {
    /// Upper bound on one refresh. `None` waits for the server forever.
    pub refresh_timeout: Option<Duration>,
}

impl Default for KeymapOptions {
    fn default() -> Self {
        Self {
            refresh_timeout: Some(DEFAULT_REFRESH_TIMEOUT),
        }
    }
}

/// The live keyboard mapping of one connection.
pub struct Keymap<S> {
    source: Arc<S>,
    current: RwLock<Arc<Mapping>>,
    refresh_lock: Mutex<()>,
    options: KeymapOptions,
}

impl<S: MappingSource> Keymap<S> {
    /// Fetch the initial mapping.
    ///
    /// Must succeed before anything can be resolved; an error here should
    /// abort startup.
    pub fn initialize(source: S, options: KeymapOptions) -> Result<Self, KeybindError> {
        let source = Arc::new(source);
        let (keyboard, modifiers) = fetch_with_timeout(&source, options.refresh_timeout)?;
        let mapping = Mapping::new(1, keyboard, modifiers);

        tracing::info!(
            "Loaded keyboard mapping: keycodes {}..={}, {} keysyms per keycode, {} keycodes per modifier",
            mapping.keyboard.min_keycode,
            mapping.keyboard.max_keycode,
            mapping.keyboard.keysyms_per_keycode,
            mapping.modifiers.keycodes_per_modifier
        );

        Ok(Self {
            source,
            current: RwLock::new(Arc::new(mapping)),
            refresh_lock: Mutex::new(()),
            options,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The current generation. Holding on to it keeps it consistent even
    /// if a refresh happens meanwhile.
    pub fn snapshot(&self) -> Arc<Mapping> {
        self.current.read().clone()
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Fetch both tables again and install them as the next generation.
    pub fn refresh(&self) -> Result<Arc<Mapping>, KeybindError> {
        let _guard = self.refresh_lock.lock();

        let (keyboard, modifiers) =
            match fetch_with_timeout(&self.source, self.options.refresh_timeout) {
                Ok(tables) => tables,
                Err(e) => {
                    tracing::error!(
                        "Mapping refresh failed, keeping generation {}: {}",
                        self.generation(),
                        e
                    );
                    return Err(e);
                }
            };

        let next = Arc::new(Mapping::new(self.generation() + 1, keyboard, modifiers));
        *self.current.write() = Arc::clone(&next);

        tracing::debug!("Installed mapping generation {}", next.generation);
        Ok(next)
    }

    /// React to a mapping change. Keyboard and modifier changes refresh;
    /// pointer changes do not concern key bindings.
    ///
    /// Returns the new generation when a refresh happened.
    pub fn handle_mapping_notify(
        &self,
        change: &MappingChange,
    ) -> Result<Option<Arc<Mapping>>, KeybindError> {
        tracing::debug!(
            "MappingNotify: request={:?} first_keycode={} count={}",
            change.request,
            change.first_keycode,
            change.count
        );
        match change.request {
            MappingRequest::Pointer => Ok(None),
            MappingRequest::Keyboard | MappingRequest::Modifier => self.refresh().map(Some),
        }
    }

    /// Feed an X event from the owner's event loop. Only `MappingNotify`
    /// is acted on; the server sends it to every client unasked.
    pub fn handle_event(&self, event: &Event) -> Result<Option<Arc<Mapping>>, KeybindError> {
        match event {
            Event::MappingNotify(notify) => {
                self.handle_mapping_notify(&MappingChange::from(notify))
            }
            _ => Ok(None),
        }
    }

    pub fn parse_binding(&self, spec: &str) -> Binding {
        self.snapshot().parse_binding(spec)
    }

    pub fn try_parse_binding(&self, spec: &str) -> Result<Binding, KeybindError> {
        self.snapshot().try_parse_binding(spec)
    }

    pub fn lookup_keysym(&self, name: &str) -> Option<Keysym> {
        keysym::lookup(name)
    }

    pub fn keycode_for_keysym(&self, sym: Keysym) -> Option<Keycode> {
        self.snapshot().keycode_for_keysym(sym)
    }

    pub fn modifier_for_keycode(&self, keycode: Keycode) -> Modifiers {
        self.snapshot().modifier_for_keycode(keycode)
    }
}

/// Run `source.fetch()`, giving up after `timeout`.
///
/// The fetch runs on a helper thread. On timeout the thread is left to
/// finish on its own and its result is dropped.
fn fetch_with_timeout<S: MappingSource>(
    source: &Arc<S>,
    timeout: Option<Duration>,
) -> Result<(KeyboardMapping, ModifierMapping), KeybindError> {
    let Some(timeout) = timeout else {
        return source.fetch();
    };

    let (tx, rx) = channel::bounded(1);
    let worker = Arc::clone(source);
    std::thread::Builder::new()
        .name("xkeybind-refresh".to_string())
        .spawn(move || {
            // The receiver is gone if we timed out
            let _ = tx.send(worker.fetch());
        })
        .map_err(KeybindError::Spawn)?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(KeybindError::RefreshTimeout {
            millis: timeout.as_millis(),
        }),
        Err(RecvTimeoutError::Disconnected) => Err(KeybindError::RefreshAborted),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::test_support::{keyboard_version, modifier_version, FakeSource, KC_J};

    fn keymap(source: FakeSource) -> Keymap<FakeSource> {
        Keymap::initialize(source, KeymapOptions::default()).expect("initialize")
    }

    #[test]
    fn test_initialize_installs_first_generation() {
        let keymap = keymap(FakeSource::new());
        assert_eq!(keymap.generation(), 1);
        assert_eq!(keymap.parse_binding("Mod4-j").keycode, Some(KC_J));
        assert_eq!(keymap.source().fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_initialize_fails_without_keyboard_mapping() {
        let source = FakeSource::new();
        source.fail_keyboard.store(true, Ordering::SeqCst);
        let result = Keymap::initialize(source, KeymapOptions::default());
        assert!(matches!(result, Err(KeybindError::KeyboardMapping(_))));
    }

    #[test]
    fn test_initialize_fails_without_modifier_mapping() {
        let source = FakeSource::new();
        source.fail_modifiers.store(true, Ordering::SeqCst);
        let result = Keymap::initialize(source, KeymapOptions::default());
        assert!(matches!(result, Err(KeybindError::ModifierMapping(_))));
    }

    #[test]
    fn test_refresh_replaces_generation() {
        let source = FakeSource::new();
        source.bump_on_fetch.store(true, Ordering::SeqCst);
        let keymap = keymap(source);
        let before = keymap.snapshot();

        let after = keymap.refresh().unwrap();
        assert_eq!(after.generation, 2);
        assert_eq!(keymap.generation(), 2);
        assert_eq!(keyboard_version(&after.keyboard), 2);
        assert_eq!(modifier_version(&after.modifiers), 2);

        // an old snapshot is unaffected
        assert_eq!(before.generation, 1);
        assert_eq!(keyboard_version(&before.keyboard), 1);
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let keymap = keymap(FakeSource::new());
        let first = keymap.refresh().unwrap();
        let second = keymap.refresh().unwrap();
        assert!(first.same_tables(&second));
        assert_ne!(first.generation, second.generation);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_generation() {
        let keymap = keymap(FakeSource::new());
        keymap.source().fail_modifiers.store(true, Ordering::SeqCst);

        assert!(keymap.refresh().is_err());
        assert_eq!(keymap.generation(), 1);
        assert_eq!(keymap.parse_binding("Mod4-j").keycode, Some(KC_J));
    }

    #[test]
    fn test_refresh_timeout() {
        let keymap = Keymap::initialize(
            FakeSource::new(),
            KeymapOptions {
                refresh_timeout: Some(Duration::from_millis(20)),
            },
        )
        .unwrap();
        *keymap.source().delay.lock() = Some(Duration::from_millis(500));

        match keymap.refresh() {
            Err(KeybindError::RefreshTimeout { millis }) => assert_eq!(millis, 20),
            other => panic!("Expected RefreshTimeout, got: {:?}", other.map(|m| m.generation)),
        }
        assert_eq!(keymap.generation(), 1);
    }

    #[test]
    fn test_refresh_without_timeout_runs_inline() {
        let keymap = Keymap::initialize(
            FakeSource::new(),
            KeymapOptions {
                refresh_timeout: None,
            },
        )
        .unwrap();
        assert_eq!(keymap.refresh().unwrap().generation, 2);
    }

    #[test]
    fn test_concurrent_refreshes_are_serialized() {
        let source = FakeSource::new();
        source.bump_on_fetch.store(true, Ordering::SeqCst);
        let keymap = Arc::new(keymap(source));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let keymap = Arc::clone(&keymap);
                std::thread::spawn(move || keymap.refresh().unwrap().generation)
            })
            .collect();
        let mut generations: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        generations.sort_unstable();

        assert_eq!(generations, (2..=9).collect::<Vec<_>>());
        assert_eq!(keymap.generation(), 9);
    }

    #[test]
    fn test_readers_never_see_mixed_generations() {
        let source = FakeSource::new();
        source.bump_on_fetch.store(true, Ordering::SeqCst);
        let keymap = Arc::new(keymap(source));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let keymap = Arc::clone(&keymap);
                std::thread::spawn(move || {
                    for _ in 0..2000 {
                        let mapping = keymap.snapshot();
                        assert_eq!(
                            keyboard_version(&mapping.keyboard),
                            modifier_version(&mapping.modifiers),
                            "generation {} mixes tables",
                            mapping.generation
                        );
                    }
                })
            })
            .collect();

        for _ in 0..100 {
            keymap.refresh().unwrap();
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_pointer_mapping_change_does_not_refresh() {
        let keymap = keymap(FakeSource::new());
        let change = MappingChange {
            request: MappingRequest::Pointer,
            first_keycode: 0,
            count: 0,
        };
        assert!(keymap.handle_mapping_notify(&change).unwrap().is_none());
        assert_eq!(keymap.generation(), 1);
    }

    #[test]
    fn test_keyboard_mapping_change_refreshes() {
        let keymap = keymap(FakeSource::new());
        for request in [MappingRequest::Keyboard, MappingRequest::Modifier] {
            let change = MappingChange {
                request,
                first_keycode: 8,
                count: 16,
            };
            assert!(keymap.handle_mapping_notify(&change).unwrap().is_some());
        }
        assert_eq!(keymap.generation(), 3);
    }

    #[test]
    fn test_failed_mapping_change_refresh_surfaces_error() {
        let keymap = keymap(FakeSource::new());
        keymap.source().fail_keyboard.store(true, Ordering::SeqCst);

        let change = MappingChange {
            request: MappingRequest::Keyboard,
            first_keycode: 8,
            count: 16,
        };
        assert!(matches!(
            keymap.handle_mapping_notify(&change),
            Err(KeybindError::KeyboardMapping(_))
        ));

        let event = MappingNotifyEvent {
            response_type: 34,
            sequence: 0,
            request: MappingKind::MODIFIER,
            first_keycode: 0,
            count: 0,
        };
        assert!(keymap.handle_event(&Event::MappingNotify(event)).is_err());
        assert_eq!(keymap.generation(), 1);
    }

    #[test]
    fn test_mapping_change_timeout_surfaces_error() {
        let keymap = Keymap::initialize(
            FakeSource::new(),
            KeymapOptions {
                refresh_timeout: Some(Duration::from_millis(20)),
            },
        )
        .unwrap();
        *keymap.source().delay.lock() = Some(Duration::from_millis(500));

        let change = MappingChange {
            request: MappingRequest::Modifier,
            first_keycode: 0,
            count: 0,
        };
        assert!(matches!(
            keymap.handle_mapping_notify(&change),
            Err(KeybindError::RefreshTimeout { .. })
        ));
    }

    #[test]
    fn test_mapping_change_from_event() {
        let event = MappingNotifyEvent {
            response_type: 34,
            sequence: 0,
            request: MappingKind::KEYBOARD,
            first_keycode: 9,
            count: 3,
        };
        let change = MappingChange::from(&event);
        assert_eq!(change.request, MappingRequest::Keyboard);
        assert_eq!(change.first_keycode, 9);
        assert_eq!(change.count, 3);

        let keymap = keymap(FakeSource::new());
        let refreshed = keymap.handle_event(&Event::MappingNotify(event)).unwrap();
        assert_eq!(refreshed.map(|m| m.generation), Some(2));
    }
}
