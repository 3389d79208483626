//! Publish/subscribe channel between the engine and the surrounding UI.
//!
//! The bus is an explicitly constructed value, not a global. Clones share the
//! same subscriber table. Consumers register through a [`Subscriptions`]
//! scope so that tearing a consumer down is a single call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use pinpoint_core::{CaptureOutcome, ComponentInfo, ElementId, SessionId};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::input::InputSource;

/// Closed vocabulary of bus events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A component was selected for feedback
    #[serde(rename = "component:selected")]
    ComponentSelected,
    /// Authoring modal opened
    #[serde(rename = "modal:open")]
    ModalOpen,
    /// Authoring modal closed
    #[serde(rename = "modal:close")]
    ModalClose,
    /// Authoring modal minimized
    #[serde(rename = "modal:minimize")]
    ModalMinimize,
    /// Authoring modal restored
    #[serde(rename = "modal:restore")]
    ModalRestore,
    /// Sidebar opened
    #[serde(rename = "sidebar:open")]
    SidebarOpen,
    /// Sidebar closed
    #[serde(rename = "sidebar:close")]
    SidebarClose,
    /// Screenshot capture started
    #[serde(rename = "screenshot:capture")]
    ScreenshotCapture,
    /// Screenshot capture finished (either way)
    #[serde(rename = "screenshot:complete")]
    ScreenshotComplete,
    /// Draft saved
    #[serde(rename = "draft:save")]
    DraftSave,
    /// Draft cleared
    #[serde(rename = "draft:clear")]
    DraftClear,
    /// Draft restored
    #[serde(rename = "draft:restore")]
    DraftRestore,
    /// Feedback submitted
    #[serde(rename = "feedback:submit")]
    FeedbackSubmit,
    /// Feedback exported
    #[serde(rename = "feedback:export")]
    FeedbackExport,
    /// Capture mode requested
    #[serde(rename = "selection:start")]
    SelectionStart,
    /// Capture mode cancelled
    #[serde(rename = "selection:cancel")]
    SelectionCancel,
    /// Feedback manager opened
    #[serde(rename = "manager:open")]
    ManagerOpen,
    /// Export dialog opened
    #[serde(rename = "export:open")]
    ExportOpen,
    /// User confirmed clearing all feedback
    #[serde(rename = "clear-all:confirm")]
    ClearAllConfirm,
}

impl EventKind {
    /// Every event kind.
    pub const ALL: [EventKind; 19] = [
        EventKind::ComponentSelected,
        EventKind::ModalOpen,
        EventKind::ModalClose,
        EventKind::ModalMinimize,
        EventKind::ModalRestore,
        EventKind::SidebarOpen,
        EventKind::SidebarClose,
        EventKind::ScreenshotCapture,
        EventKind::ScreenshotComplete,
        EventKind::DraftSave,
        EventKind::DraftClear,
        EventKind::DraftRestore,
        EventKind::FeedbackSubmit,
        EventKind::FeedbackExport,
        EventKind::SelectionStart,
        EventKind::SelectionCancel,
        EventKind::ManagerOpen,
        EventKind::ExportOpen,
        EventKind::ClearAllConfirm,
    ];

    /// Wire name, e.g. `component:selected`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ComponentSelected => "component:selected",
            EventKind::ModalOpen => "modal:open",
            EventKind::ModalClose => "modal:close",
            EventKind::ModalMinimize => "modal:minimize",
            EventKind::ModalRestore => "modal:restore",
            EventKind::SidebarOpen => "sidebar:open",
            EventKind::SidebarClose => "sidebar:close",
            EventKind::ScreenshotCapture => "screenshot:capture",
            EventKind::ScreenshotComplete => "screenshot:complete",
            EventKind::DraftSave => "draft:save",
            EventKind::DraftClear => "draft:clear",
            EventKind::DraftRestore => "draft:restore",
            EventKind::FeedbackSubmit => "feedback:submit",
            EventKind::FeedbackExport => "feedback:export",
            EventKind::SelectionStart => "selection:start",
            EventKind::SelectionCancel => "selection:cancel",
            EventKind::ManagerOpen => "manager:open",
            EventKind::ExportOpen => "export:open",
            EventKind::ClearAllConfirm => "clear-all:confirm",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = pinpoint_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| pinpoint_core::Error::UnknownEventKind(s.to_string()))
    }
}

/// A committed selection, as announced on `component:selected`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// The selected component
    pub component: ComponentInfo,
    /// Capture session that produced the selection
    pub session: SessionId,
    /// Input modality that committed it
    pub input: InputSource,
    /// Wall-clock time of the selection
    pub selected_at: DateTime<Utc>,
}

/// Forwarded result of a screenshot capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotReport {
    /// Element that was captured
    pub element: ElementId,
    /// What the capturer returned
    pub outcome: CaptureOutcome,
}

/// Data carried by an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// No data
    Empty,
    /// A selection
    Selection(Box<Selection>),
    /// A screenshot result
    Screenshot(Box<ScreenshotReport>),
    /// Free-form data from UI components
    Json(serde_json::Value),
}

impl Payload {
    /// The selection, if this payload carries one.
    pub fn selection(&self) -> Option<&Selection> {
        match self {
            Payload::Selection(selection) => Some(selection),
            _ => None,
        }
    }

    /// The screenshot report, if this payload carries one.
    pub fn screenshot(&self) -> Option<&ScreenshotReport> {
        match self {
            Payload::Screenshot(report) => Some(report),
            _ => None,
        }
    }
}

/// Subscriber callback. Identity is the `Rc` allocation.
pub type Listener = Rc<dyn Fn(&Payload) -> anyhow::Result<()>>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Payload) -> anyhow::Result<()> + 'static,
{
    Rc::new(f)
}

/// Identifier of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery counts for one `emit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Listeners that returned `Ok`
    pub delivered: usize,
    /// Listeners that returned an error or panicked
    pub failed: usize,
}

struct Entry {
    id: SubscriptionId,
    listener: Listener,
    once: bool,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    subscribers: HashMap<EventKind, Vec<Entry>>,
}

impl BusState {
    fn add(&mut self, kind: EventKind, listener: Listener, once: bool) -> SubscriptionId {
        let entries = self.subscribers.entry(kind).or_default();
        if let Some(existing) = entries.iter().find(|e| Rc::ptr_eq(&e.listener, &listener)) {
            return existing.id;
        }
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        entries.push(Entry { id, listener, once });
        id
    }

    fn remove(&mut self, kind: EventKind, id: SubscriptionId) -> bool {
        let Some(entries) = self.subscribers.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        before != entries.len()
    }

    fn contains(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.subscribers
            .get(&kind)
            .is_some_and(|entries| entries.iter().any(|e| e.id == id))
    }
}

/// Process-local event bus.
#[derive(Clone, Default)]
pub struct EventBus {
    state: Rc<RefCell<BusState>>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a durable listener.
    ///
    /// Registering the same listener twice for a kind returns the existing
    /// registration.
    pub fn on(&self, kind: EventKind, listener: Listener) -> Subscription {
        let id = self.state.borrow_mut().add(kind, listener, false);
        self.handle(kind, id)
    }

    /// Register a listener removed right before its first invocation.
    pub fn once(&self, kind: EventKind, listener: Listener) -> Subscription {
        let id = self.state.borrow_mut().add(kind, listener, true);
        self.handle(kind, id)
    }

    /// Remove a registration. Returns whether it existed.
    pub fn off(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.state.borrow_mut().remove(kind, id)
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.state
            .borrow()
            .subscribers
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Create a per-consumer subscription scope.
    pub fn scope(&self) -> Subscriptions {
        Subscriptions {
            bus: self.clone(),
            handles: RefCell::new(Vec::new()),
        }
    }

    /// Remove every listener of every kind.
    pub fn teardown(&self) {
        self.state.borrow_mut().subscribers.clear();
    }

    /// Deliver `payload` to every current listener of `kind`, in registration
    /// order.
    ///
    /// Listener errors and panics are logged and counted; they never stop
    /// delivery to the remaining listeners. Listeners may subscribe,
    /// unsubscribe or emit from inside the callback.
    pub fn emit(&self, kind: EventKind, payload: Payload) -> EmitReport {
        let targets: Vec<(SubscriptionId, Listener, bool)> = {
            let mut state = self.state.borrow_mut();
            let Some(entries) = state.subscribers.get_mut(&kind) else {
                trace!(event = %kind, "emit with no listeners");
                return EmitReport::default();
            };
            let targets = entries
                .iter()
                .map(|e| (e.id, Rc::clone(&e.listener), e.once))
                .collect();
            entries.retain(|e| !e.once);
            targets
        };

        let mut report = EmitReport::default();
        for (id, listener, once) in targets {
            // A durable listener removed by an earlier listener in this emit is skipped.
            if !once && !self.state.borrow().contains(kind, id) {
                continue;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(&payload)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(event = %kind, subscription = %id, error = %err, "event listener failed");
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(event = %kind, subscription = %id, "event listener panicked");
                }
            }
        }
        report
    }

    fn handle(&self, kind: EventKind, id: SubscriptionId) -> Subscription {
        Subscription {
            bus: Rc::downgrade(&self.state),
            kind,
            id,
        }
    }
}

/// Handle to one registration.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`]
/// or register through a [`Subscriptions`] scope.
#[derive(Debug, Clone)]
pub struct Subscription {
    bus: Weak<RefCell<BusState>>,
    kind: EventKind,
    id: SubscriptionId,
}

impl Subscription {
    /// Event kind this registration listens to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Registration id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the registration. Returns whether it was still registered.
    pub fn unsubscribe(&self) -> bool {
        match self.bus.upgrade() {
            Some(state) => state.borrow_mut().remove(self.kind, self.id),
            None => false,
        }
    }
}

/// All registrations made by one consumer.
///
/// Dropping the scope unsubscribes everything registered through it.
pub struct Subscriptions {
    bus: EventBus,
    handles: RefCell<Vec<Subscription>>,
}

impl Subscriptions {
    /// The bus this scope registers on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Register a durable listener owned by this scope.
    pub fn on(&self, kind: EventKind, listener: Listener) -> SubscriptionId {
        let handle = self.bus.on(kind, listener);
        let id = handle.id();
        self.track(handle);
        id
    }

    /// Register a one-shot listener owned by this scope.
    pub fn once(&self, kind: EventKind, listener: Listener) -> SubscriptionId {
        let handle = self.bus.once(kind, listener);
        let id = handle.id();
        self.track(handle);
        id
    }

    /// Number of registrations made through this scope.
    pub fn len(&self) -> usize {
        self.handles.borrow().len()
    }

    /// Whether nothing was registered through this scope.
    pub fn is_empty(&self) -> bool {
        self.handles.borrow().is_empty()
    }

    /// Unsubscribe everything registered through this scope. Returns how many
    /// registrations were still live.
    pub fn clear(&self) -> usize {
        let handles = std::mem::take(&mut *self.handles.borrow_mut());
        handles.iter().filter(|h| h.unsubscribe()).count()
    }

    fn track(&self, handle: Subscription) {
        let mut handles = self.handles.borrow_mut();
        if !handles
            .iter()
            .any(|h| h.kind == handle.kind && h.id == handle.id)
        {
            handles.push(handle);
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.clear();
    }
}
