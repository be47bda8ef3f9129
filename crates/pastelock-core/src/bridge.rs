#![forbid(unsafe_code)]

//! Routing host signals into the controller.
//!
//! Copy and paste can each arrive twice for one user action (a Ctrl/Cmd
//! keydown and the native clipboard event). That is fine: a second capture
//! just re-snapshots the same selection, and a second paste restarts the
//! cycle before anything has been written.

use core::fmt::Debug;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::config::PasteLockConfig;
use crate::controller::{AlignController, ControllerStep, TimerId};
use crate::host::DomHost;

/// Attributes whose changes can signal a selection or render update.
pub const OBSERVED_ATTRIBUTES: [&str; 4] = ["class", "style", "aria-selected", "data-selected"];

bitflags! {
    /// Modifier keys held during a keydown.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const SUPER = 0b1000;
    }
}

impl Modifiers {
    /// Build from DOM `KeyboardEvent` flags.
    #[must_use]
    pub fn from_dom(shift: bool, alt: bool, ctrl: bool, meta: bool) -> Self {
        let mut mods = Self::empty();
        mods.set(Self::SHIFT, shift);
        mods.set(Self::ALT, alt);
        mods.set(Self::CTRL, ctrl);
        mods.set(Self::SUPER, meta);
        mods
    }

    /// Whether the platform shortcut modifier (Ctrl or Cmd) is held.
    #[must_use]
    pub const fn has_shortcut_modifier(self) -> bool {
        self.intersects(Self::CTRL.union(Self::SUPER))
    }
}

/// A keydown as reported by the DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    /// DOM `KeyboardEvent.key`.
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyChord {
    #[must_use]
    pub fn new(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }
}

/// Clipboard gesture recognized from a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardIntent {
    Copy,
    Paste,
}

impl ClipboardIntent {
    /// Ctrl/Cmd + C or V, ignoring case and other modifiers.
    #[must_use]
    pub fn from_chord(chord: &KeyChord) -> Option<Self> {
        if !chord.modifiers.has_shortcut_modifier() {
            return None;
        }
        match chord.key.to_lowercase().as_str() {
            "c" => Some(Self::Copy),
            "v" => Some(Self::Paste),
            _ => None,
        }
    }
}

/// Everything the page can tell the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    /// A keydown seen in capture phase.
    KeyDown(KeyChord),
    /// Native `copy` event.
    Copy,
    /// Native `paste` event.
    Paste,
    /// The observed subtree changed.
    Mutation,
    /// The page navigated within the same document.
    Navigation,
}

impl HostSignal {
    /// The clipboard gesture this signal stands for, if any.
    #[must_use]
    pub fn intent(&self) -> Option<ClipboardIntent> {
        match self {
            Self::KeyDown(chord) => ClipboardIntent::from_chord(chord),
            Self::Copy => Some(ClipboardIntent::Copy),
            Self::Paste => Some(ClipboardIntent::Paste),
            Self::Mutation | Self::Navigation => None,
        }
    }
}

/// Which documents the patch activates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationPolicy {
    /// Substrings matched against the document's hostname.
    pub host_patterns: Vec<String>,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self {
            host_patterns: vec!["canva.com".to_owned()],
        }
    }
}

impl ActivationPolicy {
    /// Whether the patch should install on `hostname`.
    #[must_use]
    pub fn allows(&self, hostname: &str) -> bool {
        let hostname = hostname.to_ascii_lowercase();
        self.host_patterns
            .iter()
            .filter(|pattern| !pattern.is_empty())
            .any(|pattern| hostname.contains(&pattern.to_ascii_lowercase()))
    }
}

/// Signal router owning the controller.
#[derive(Debug, Clone)]
pub struct EventBridge<E> {
    controller: AlignController<E>,
}

impl<E: Clone + PartialEq + Debug> EventBridge<E> {
    #[must_use]
    pub fn new(config: &PasteLockConfig) -> Self {
        Self {
            controller: AlignController::new(config),
        }
    }

    #[must_use]
    pub const fn controller(&self) -> &AlignController<E> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut AlignController<E> {
        &mut self.controller
    }

    /// Route one signal.
    pub fn dispatch<H: DomHost<Element = E>>(&mut self, host: &H, signal: &HostSignal) -> ControllerStep {
        match signal {
            HostSignal::Mutation => self.controller.on_mutation(host),
            HostSignal::Navigation => self.controller.reset(),
            _ => match signal.intent() {
                Some(ClipboardIntent::Copy) => self.controller.capture(host),
                Some(ClipboardIntent::Paste) => self.controller.begin_paste(),
                None => ControllerStep::default(),
            },
        }
    }

    /// Forward a fired host timer.
    pub fn on_timer<H: DomHost<Element = E>>(&mut self, host: &H, id: TimerId) -> ControllerStep {
        self.controller.on_timer(host, id)
    }
}
