//! Forbidden key-combination classification
//!
//! These chords are pre-empted at the input level where the host can do
//! so, and classified here so the monitor can treat an attempt as a
//! violation. Key names follow the browser `KeyboardEvent.key` values,
//! compared case-insensitively.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One key press as delivered by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
}

impl KeyChord {
    /// Plain key press without modifiers
    #[must_use]
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: false,
            meta: false,
            alt: false,
            shift: false,
        }
    }

    /// Ctrl (or Cmd) + key
    #[must_use]
    pub fn ctrl(key: &str) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(key)
        }
    }

    /// Alt + key
    #[must_use]
    pub fn alt(key: &str) -> Self {
        Self {
            alt: true,
            ..Self::plain(key)
        }
    }
}

/// What a forbidden chord was trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenKind {
    Clipboard,
    ViewSource,
    Save,
    SelectAll,
    Reload,
    Print,
    DevTools,
    Fullscreen,
    Escape,
    WindowSwitch,
    CloseWindow,
}

static CTRL_COMBOS: Lazy<HashMap<&'static str, ForbiddenKind>> = Lazy::new(|| {
    HashMap::from([
        ("c", ForbiddenKind::Clipboard),
        ("v", ForbiddenKind::Clipboard),
        ("x", ForbiddenKind::Clipboard),
        ("u", ForbiddenKind::ViewSource),
        ("s", ForbiddenKind::Save),
        ("a", ForbiddenKind::SelectAll),
        ("r", ForbiddenKind::Reload),
        ("p", ForbiddenKind::Print),
    ])
});

/// Classify a chord, returning what it attempted when it is forbidden
#[must_use]
pub fn classify(chord: &KeyChord) -> Option<ForbiddenKind> {
    let key = chord.key.to_lowercase();

    if (chord.ctrl || chord.meta) && CTRL_COMBOS.contains_key(key.as_str()) {
        return CTRL_COMBOS.get(key.as_str()).copied();
    }

    match key.as_str() {
        "f12" => return Some(ForbiddenKind::DevTools),
        "f11" => return Some(ForbiddenKind::Fullscreen),
        "escape" => return Some(ForbiddenKind::Escape),
        _ => {}
    }

    if chord.alt {
        match key.as_str() {
            "tab" => return Some(ForbiddenKind::WindowSwitch),
            "f4" => return Some(ForbiddenKind::CloseWindow),
            _ => {}
        }
    }

    None
}
