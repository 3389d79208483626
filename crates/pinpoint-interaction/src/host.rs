//! Side effects the engine needs from the embedding platform.

use std::cell::RefCell;
use std::rc::Rc;

use pinpoint_core::ComponentInfo;
use serde::Serialize;

/// Kind of tactile pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pulse {
    /// Touch registered
    Acknowledge,
    /// Touched element changed during a drag
    Tick,
    /// Touch selection committed
    Confirm,
}

/// Platform hooks driven by the engine.
///
/// Listener installation is reported so hosts can attach and detach their
/// global input handlers; the engine guarantees installs and removals
/// alternate.
pub trait Host {
    /// Switch the page cursor between crosshair (`true`) and its previous
    /// value (`false`).
    fn set_capture_cursor(&mut self, active: bool);

    /// Attach global pointer, touch and key handlers.
    fn install_listeners(&mut self);

    /// Detach everything [`Host::install_listeners`] attached.
    fn remove_listeners(&mut self);

    /// Vibrate with the given pattern (alternating on/off milliseconds).
    fn vibrate(&mut self, pulse: Pulse, pattern_ms: &[u32]);

    /// Draw or clear the hover highlight.
    fn highlight(&mut self, _component: Option<&ComponentInfo>) {}
}

/// Everything a [`RecordingHost`] observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostLog {
    /// Calls to `install_listeners`
    pub installs: usize,
    /// Calls to `remove_listeners`
    pub removals: usize,
    /// Whether the crosshair cursor is currently shown
    pub capture_cursor: bool,
    /// Pulses in order, with their patterns
    pub pulses: Vec<(Pulse, Vec<u32>)>,
    /// Name of the highlighted component, if any
    pub highlighted: Option<String>,
}

impl HostLog {
    /// Whether listeners are currently attached.
    pub fn listeners_installed(&self) -> bool {
        self.installs > self.removals
    }

    /// Pulse kinds in order.
    pub fn pulse_kinds(&self) -> Vec<Pulse> {
        self.pulses.iter().map(|(pulse, _)| *pulse).collect()
    }
}

/// Headless host that records every side effect.
///
/// Used for replaying scenarios and in tests. Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    log: Rc<RefCell<HostLog>>,
}

impl RecordingHost {
    /// Create a host with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the log so far.
    pub fn log(&self) -> HostLog {
        self.log.borrow().clone()
    }
}

impl Host for RecordingHost {
    fn set_capture_cursor(&mut self, active: bool) {
        self.log.borrow_mut().capture_cursor = active;
    }

    fn install_listeners(&mut self) {
        self.log.borrow_mut().installs += 1;
    }

    fn remove_listeners(&mut self) {
        self.log.borrow_mut().removals += 1;
    }

    fn vibrate(&mut self, pulse: Pulse, pattern_ms: &[u32]) {
        self.log
            .borrow_mut()
            .pulses
            .push((pulse, pattern_ms.to_vec()));
    }

    fn highlight(&mut self, component: Option<&ComponentInfo>) {
        self.log.borrow_mut().highlighted = component.map(|c| c.name.clone());
    }
}
