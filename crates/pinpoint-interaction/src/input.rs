//! Platform input events fed to the engine, and what the engine asks the
//! platform to do with them.

use pinpoint_core::{ElementId, Point};
use serde::{Deserialize, Serialize};

/// Keys the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// Cancels capture mode
    Escape,
    /// Enter / Return
    Enter,
    /// Tab
    Tab,
    /// Any printable character
    Char(char),
    /// Anything else
    Other,
}

/// One input event delivered while capture mode may be active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// Pointer moved over `target` (`None` when over nothing)
    PointerMove {
        /// Element under the pointer
        #[serde(default)]
        target: Option<ElementId>,
    },
    /// Primary click on `target`
    Click {
        /// Element clicked
        #[serde(default)]
        target: Option<ElementId>,
    },
    /// A finger touched the screen
    TouchStart {
        /// Touch position in viewport coordinates
        point: Point,
    },
    /// A touching finger moved
    TouchMove {
        /// Current touch position
        point: Point,
    },
    /// The finger was lifted
    TouchEnd,
    /// A key was pressed
    KeyDown {
        /// The key
        key: Key,
    },
}

/// Input modality that produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    /// Mouse or other precise pointer
    Mouse,
    /// Touch screen
    Touch,
}

/// What the platform should do with an event after the engine saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Disposition {
    /// Suppress the platform default action
    pub prevent_default: bool,
    /// Keep the event from reaching the page
    pub stop_propagation: bool,
}

impl Disposition {
    /// Let the event through untouched.
    pub const PASS: Disposition = Disposition {
        prevent_default: false,
        stop_propagation: false,
    };

    /// Swallow the event.
    pub const CAPTURE: Disposition = Disposition {
        prevent_default: true,
        stop_propagation: true,
    };

    /// Whether the event was swallowed.
    pub fn is_captured(&self) -> bool {
        self.prevent_default && self.stop_propagation
    }
}
