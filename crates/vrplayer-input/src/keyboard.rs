use crate::ViewAction;
use tracing::trace;
use winit::keyboard::{Key, ModifiersState, NamedKey};

/// Engine key names that differ from the names produced here.
const ENGINE_KEY_ALIASES: &[(&str, &str)] = &[
    ("pgdown", "pgdwn"),
    ("backspace", "bs"),
    ("return", "enter"),
];

/// Turns key presses into view actions or engine key names.
pub struct KeyboardHandler {
    modifiers: ModifiersState,
}

impl KeyboardHandler {
    pub fn new() -> Self {
        Self {
            modifiers: ModifiersState::empty(),
        }
    }

    pub fn on_modifiers_changed(&mut self, modifiers: ModifiersState) {
        self.modifiers = modifiers;
    }

    /// Map a pressed logical key. `None` means the key is ignored.
    pub fn on_key_pressed(&self, key: &Key) -> Option<ViewAction> {
        if let Some(action) = view_action(key) {
            return Some(action);
        }
        let name = engine_key_name(key, self.modifiers)?;
        trace!(key = %name, "Key forwarded to engine");
        Some(ViewAction::Forward(name))
    }
}

impl Default for KeyboardHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys handled by the player itself, regardless of modifiers.
fn view_action(key: &Key) -> Option<ViewAction> {
    match key {
        Key::Named(NamedKey::Escape) => Some(ViewAction::ResetView),
        Key::Named(NamedKey::F7) => Some(ViewAction::CyclePacking),
        Key::Named(NamedKey::F8) => Some(ViewAction::ToggleInvertStereo),
        Key::Character(c) => match c.to_lowercase().as_str() {
            "+" | "=" => Some(ViewAction::ZoomIn),
            "-" => Some(ViewAction::ZoomOut),
            "w" => Some(ViewAction::Pitch(-1.0)),
            "s" => Some(ViewAction::Pitch(1.0)),
            "a" => Some(ViewAction::Yaw(-1.0)),
            "d" => Some(ViewAction::Yaw(1.0)),
            "q" => Some(ViewAction::Quit),
            _ => None,
        },
        _ => None,
    }
}

/// Build the engine's name for a key press, e.g. `ctrl+left` or `enter`.
///
/// Lone modifiers and keys without a printable name give `None`.
pub fn engine_key_name(key: &Key, modifiers: ModifiersState) -> Option<String> {
    let base = match key {
        Key::Character(c) => {
            if c.chars().any(char::is_control) {
                return None;
            }
            c.to_string()
        }
        Key::Named(named) => named_key_name(*named)?.to_string(),
        _ => return None,
    };

    let mut sequence = String::new();
    if modifiers.control_key() {
        sequence.push_str("ctrl+");
    }
    if modifiers.alt_key() {
        sequence.push_str("alt+");
    }
    if modifiers.shift_key() {
        sequence.push_str("shift+");
    }
    if modifiers.super_key() {
        sequence.push_str("meta+");
    }
    sequence.push_str(&base);

    Some(normalize_engine_key(&sequence))
}

/// Lowercase, apply the engine's aliases and drop one trailing `+`.
pub fn normalize_engine_key(sequence: &str) -> String {
    let mut name = sequence.to_lowercase();
    if let Some((_, alias)) = ENGINE_KEY_ALIASES.iter().find(|(from, _)| *from == name) {
        name = alias.to_string();
    }
    if name.ends_with('+') {
        name.pop();
    }
    name
}

fn named_key_name(key: NamedKey) -> Option<&'static str> {
    let name = match key {
        // Lone modifiers.
        NamedKey::Shift
        | NamedKey::Control
        | NamedKey::Alt
        | NamedKey::AltGraph
        | NamedKey::Super
        | NamedKey::Meta
        | NamedKey::Hyper
        | NamedKey::CapsLock
        | NamedKey::NumLock => return None,

        NamedKey::Space => "space",
        NamedKey::Enter => "return",
        NamedKey::Tab => "tab",
        NamedKey::Backspace => "backspace",
        NamedKey::Delete => "del",
        NamedKey::Insert => "ins",
        NamedKey::Home => "home",
        NamedKey::End => "end",
        NamedKey::PageUp => "pgup",
        NamedKey::PageDown => "pgdown",
        NamedKey::ArrowLeft => "left",
        NamedKey::ArrowRight => "right",
        NamedKey::ArrowUp => "up",
        NamedKey::ArrowDown => "down",
        NamedKey::Pause => "pause",
        NamedKey::PrintScreen => "print",
        NamedKey::MediaPlayPause => "playpause",
        NamedKey::MediaStop => "stop",
        NamedKey::MediaTrackNext => "next",
        NamedKey::MediaTrackPrevious => "prev",
        NamedKey::AudioVolumeUp => "volume_up",
        NamedKey::AudioVolumeDown => "volume_down",
        NamedKey::AudioVolumeMute => "mute",
        NamedKey::F1 => "f1",
        NamedKey::F2 => "f2",
        NamedKey::F3 => "f3",
        NamedKey::F4 => "f4",
        NamedKey::F5 => "f5",
        NamedKey::F6 => "f6",
        NamedKey::F7 => "f7",
        NamedKey::F8 => "f8",
        NamedKey::F9 => "f9",
        NamedKey::F10 => "f10",
        NamedKey::F11 => "f11",
        NamedKey::F12 => "f12",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(s: &str) -> Key {
        Key::Character(s.into())
    }

    fn press(key: Key, modifiers: ModifiersState) -> Option<ViewAction> {
        let mut handler = KeyboardHandler::new();
        handler.on_modifiers_changed(modifiers);
        handler.on_key_pressed(&key)
    }

    #[test]
    fn view_keys_map_to_actions() {
        let none = ModifiersState::empty();
        assert_eq!(press(ch("+"), none), Some(ViewAction::ZoomIn));
        assert_eq!(press(ch("="), none), Some(ViewAction::ZoomIn));
        assert_eq!(press(ch("-"), none), Some(ViewAction::ZoomOut));
        assert_eq!(press(ch("w"), none), Some(ViewAction::Pitch(-1.0)));
        assert_eq!(press(ch("s"), none), Some(ViewAction::Pitch(1.0)));
        assert_eq!(press(ch("a"), none), Some(ViewAction::Yaw(-1.0)));
        assert_eq!(press(ch("d"), none), Some(ViewAction::Yaw(1.0)));
        assert_eq!(press(ch("q"), none), Some(ViewAction::Quit));
        assert_eq!(press(Key::Named(NamedKey::Escape), none), Some(ViewAction::ResetView));
        assert_eq!(press(Key::Named(NamedKey::F7), none), Some(ViewAction::CyclePacking));
        assert_eq!(
            press(Key::Named(NamedKey::F8), none),
            Some(ViewAction::ToggleInvertStereo)
        );
    }

    #[test]
    fn view_keys_ignore_case_and_modifiers() {
        assert_eq!(press(ch("W"), ModifiersState::SHIFT), Some(ViewAction::Pitch(-1.0)));
        assert_eq!(press(ch("q"), ModifiersState::CONTROL), Some(ViewAction::Quit));
    }

    #[test]
    fn lone_modifiers_are_ignored() {
        for named in [NamedKey::Shift, NamedKey::Control, NamedKey::Alt, NamedKey::Super] {
            assert_eq!(press(Key::Named(named), ModifiersState::empty()), None);
        }
    }

    #[test]
    fn other_keys_are_forwarded() {
        let none = ModifiersState::empty();
        assert_eq!(press(ch("p"), none), Some(ViewAction::Forward("p".into())));
        assert_eq!(
            press(Key::Named(NamedKey::Space), none),
            Some(ViewAction::Forward("space".into()))
        );
        assert_eq!(
            press(Key::Named(NamedKey::ArrowRight), none),
            Some(ViewAction::Forward("right".into()))
        );
    }

    #[test]
    fn engine_names_use_aliases() {
        let none = ModifiersState::empty();
        let name = |k: NamedKey| engine_key_name(&Key::Named(k), none);
        assert_eq!(name(NamedKey::PageDown).as_deref(), Some("pgdwn"));
        assert_eq!(name(NamedKey::Backspace).as_deref(), Some("bs"));
        assert_eq!(name(NamedKey::Enter).as_deref(), Some("enter"));
        assert_eq!(name(NamedKey::PageUp).as_deref(), Some("pgup"));
    }

    #[test]
    fn modifiers_are_prefixed_in_order() {
        let mods = ModifiersState::CONTROL | ModifiersState::SHIFT | ModifiersState::ALT;
        assert_eq!(
            engine_key_name(&Key::Named(NamedKey::ArrowLeft), mods).as_deref(),
            Some("ctrl+alt+shift+left")
        );
        assert_eq!(
            engine_key_name(&ch("O"), ModifiersState::SHIFT).as_deref(),
            Some("shift+o")
        );
        assert_eq!(
            engine_key_name(&ch("x"), ModifiersState::SUPER).as_deref(),
            Some("meta+x")
        );
    }

    #[test]
    fn alias_applies_only_to_whole_name() {
        // A modified key keeps the raw name.
        assert_eq!(normalize_engine_key("Ctrl+Backspace"), "ctrl+backspace");
        assert_eq!(normalize_engine_key("Backspace"), "bs");
    }

    #[test]
    fn trailing_plus_is_chopped() {
        assert_eq!(normalize_engine_key("Shift++"), "shift+");
        assert_eq!(normalize_engine_key("ctrl+"), "ctrl");
    }

    #[test]
    fn control_characters_are_not_forwarded() {
        assert_eq!(engine_key_name(&ch("\u{1}"), ModifiersState::CONTROL), None);
    }
}
