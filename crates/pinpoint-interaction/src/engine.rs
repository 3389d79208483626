//! The capture-mode state machine.
//!
//! ```text
//! Inactive --activate--> Idle <--> Hovering
//!                         |           |
//!                         +--select---+--> Selected --dismiss--> Idle
//! any active state --deactivate / Escape--> Inactive
//! ```
//!
//! Hover detection runs in idle time behind a pointer throttle. Selection
//! runs the chain synchronously. Touch drags are debounced and only
//! re-evaluated past the drag threshold.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use chrono::Utc;
use pinpoint_core::{
    ComponentInfo, ElementId, HapticSettings, InteractionSettings, Page, PinpointConfig, Point,
    ScreenshotCapturer, SessionId,
};
use pinpoint_detector::{Detection, DetectionChain};
use serde::Serialize;
use tracing::{debug, info};

use crate::bus::{listener, EventBus, EventKind, Payload, ScreenshotReport, Selection, Subscriptions};
use crate::host::{Host, Pulse, RecordingHost};
use crate::input::{Disposition, InputEvent, InputSource, Key};
use crate::scheduler::{Debounce, Gate, IdleDeadline, Scheduler, TaskId, TaskSink, Throttle};

/// Elements carrying this attribute (or inside one that does) belong to the
/// tool's own UI and are never captured.
pub const IGNORE_ATTRIBUTE: &str = "data-pinpoint-ignore";

/// Coarse engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Capture mode off
    Inactive,
    /// Capture mode on, nothing hovered
    Idle,
    /// A component is hovered
    Hovering,
    /// A component is selected; waiting for the authoring flow to finish
    Selected,
}

/// Read-only view of the engine for UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    /// Coarse state
    pub state: EngineState,
    /// Whether capture mode is on
    pub is_active: bool,
    /// Hovered component
    pub hovered: Option<ComponentInfo>,
    /// Selected component
    pub selected: Option<ComponentInfo>,
    /// Current capture session
    pub session: Option<SessionId>,
}

#[derive(Debug, Clone, Copy)]
struct IdleRequest {
    task: TaskId,
    target: ElementId,
    retried: bool,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    origin: Point,
    latest: Point,
    last_touched: Option<ElementId>,
}

/// State that exists only while capture mode is on.
struct Session {
    id: SessionId,
    hovered: Option<ComponentInfo>,
    selected: Option<ComponentInfo>,
    // Identity only; used to skip redundant hover detection.
    last_detected: Option<ElementId>,
    latest_pointer: Option<Option<ElementId>>,
    throttle: Throttle,
    idle: Option<IdleRequest>,
    drag: Option<Drag>,
    touch_debounce: Debounce,
}

impl Session {
    fn new(settings: &InteractionSettings) -> Self {
        Self {
            id: SessionId::new(),
            hovered: None,
            selected: None,
            last_detected: None,
            latest_pointer: None,
            throttle: Throttle::new(Duration::from_millis(settings.pointer_sample_interval_ms)),
            idle: None,
            drag: None,
            touch_debounce: Debounce::new(Duration::from_millis(settings.touch_debounce_ms)),
        }
    }

    /// Every scheduled task this session still owns.
    fn take_tasks(&mut self) -> Vec<TaskId> {
        let mut tasks = Vec::new();
        tasks.extend(self.throttle.cancel());
        tasks.extend(self.touch_debounce.cancel());
        tasks.extend(self.idle.take().map(|req| req.task));
        tasks
    }

    fn state(&self) -> EngineState {
        if self.selected.is_some() {
            EngineState::Selected
        } else if self.hovered.is_some() {
            EngineState::Hovering
        } else {
            EngineState::Idle
        }
    }
}

struct EngineInner {
    page: Rc<dyn Page>,
    chain: DetectionChain,
    bus: EventBus,
    host: RefCell<Box<dyn Host>>,
    scheduler: Rc<dyn Scheduler>,
    capturer: Option<Box<dyn ScreenshotCapturer>>,
    settings: InteractionSettings,
    haptics: HapticSettings,
    session: RefCell<Option<Session>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.get_mut().take() {
            for task in session.take_tasks() {
                self.scheduler.cancel(task);
            }
            let host = self.host.get_mut();
            host.remove_listeners();
            host.set_capture_cursor(false);
            host.highlight(None);
        }
    }
}

/// Builder for [`InteractionEngine`].
pub struct EngineBuilder {
    page: Rc<dyn Page>,
    bus: EventBus,
    scheduler: Rc<dyn Scheduler>,
    host: Option<Box<dyn Host>>,
    chain: Option<DetectionChain>,
    capturer: Option<Box<dyn ScreenshotCapturer>>,
    config: PinpointConfig,
}

impl EngineBuilder {
    /// Use this host for cursor, listener and haptic side effects.
    pub fn host(mut self, host: impl Host + 'static) -> Self {
        self.host = Some(Box::new(host));
        self
    }

    /// Use a custom detection chain instead of the configured default.
    pub fn chain(mut self, chain: DetectionChain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Capture a screenshot of every selected element.
    pub fn capturer(mut self, capturer: impl ScreenshotCapturer + 'static) -> Self {
        self.capturer = Some(Box::new(capturer));
        self
    }

    /// Apply configuration.
    pub fn config(mut self, config: &PinpointConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Build the engine, inactive.
    pub fn build(self) -> InteractionEngine {
        let chain = self
            .chain
            .unwrap_or_else(|| DetectionChain::with_defaults(&self.config.detection));
        let host = self
            .host
            .unwrap_or_else(|| Box::new(RecordingHost::new()) as Box<dyn Host>);

        InteractionEngine {
            inner: Rc::new(EngineInner {
                page: self.page,
                chain,
                bus: self.bus,
                host: RefCell::new(host),
                scheduler: self.scheduler,
                capturer: self.capturer,
                settings: self.config.interaction,
                haptics: self.config.haptics,
                session: RefCell::new(None),
            }),
        }
    }
}

/// Hover/selection state machine over mouse, touch and keyboard input.
///
/// Cheap to clone; clones drive the same engine. Every method releases its
/// internal borrows before emitting on the bus, so listeners may call back in.
#[derive(Clone)]
pub struct InteractionEngine {
    inner: Rc<EngineInner>,
}

impl InteractionEngine {
    /// Start building an engine over `page`.
    pub fn builder(page: Rc<dyn Page>, bus: EventBus, scheduler: Rc<dyn Scheduler>) -> EngineBuilder {
        EngineBuilder {
            page,
            bus,
            scheduler,
            host: None,
            chain: None,
            capturer: None,
            config: PinpointConfig::default(),
        }
    }

    /// Enter capture mode. No-op if already active.
    pub fn activate(&self) {
        let id = {
            let mut slot = self.inner.session.borrow_mut();
            if slot.is_some() {
                return;
            }
            let session = Session::new(&self.inner.settings);
            let id = session.id;
            *slot = Some(session);
            id
        };

        let mut host = self.inner.host.borrow_mut();
        host.set_capture_cursor(true);
        host.install_listeners();
        info!(session = %id, "capture mode activated");
    }

    /// Leave capture mode, dropping all session state and cancelling every
    /// pending timer and idle request. No-op if already inactive.
    pub fn deactivate(&self) {
        let Some(mut session) = self.inner.session.borrow_mut().take() else {
            return;
        };
        for task in session.take_tasks() {
            self.inner.scheduler.cancel(task);
        }

        let mut host = self.inner.host.borrow_mut();
        host.highlight(None);
        host.remove_listeners();
        host.set_capture_cursor(false);
        info!(session = %session.id, "capture mode deactivated");
    }

    /// Return from `Selected` to `Idle` once the authoring flow is done.
    /// Returns whether a selection was dismissed.
    pub fn dismiss_selection(&self) -> bool {
        let mut slot = self.inner.session.borrow_mut();
        let Some(session) = slot.as_mut() else {
            return false;
        };
        if session.selected.take().is_none() {
            return false;
        }
        session.last_detected = None;
        debug!(session = %session.id, "selection dismissed");
        true
    }

    /// Whether capture mode is on.
    pub fn is_active(&self) -> bool {
        self.inner.session.borrow().is_some()
    }

    /// Coarse state.
    pub fn state(&self) -> EngineState {
        self.inner
            .session
            .borrow()
            .as_ref()
            .map_or(EngineState::Inactive, Session::state)
    }

    /// Currently hovered component.
    pub fn hovered(&self) -> Option<ComponentInfo> {
        self.inner
            .session
            .borrow()
            .as_ref()
            .and_then(|s| s.hovered.clone())
    }

    /// Currently selected component.
    pub fn selected(&self) -> Option<ComponentInfo> {
        self.inner
            .session
            .borrow()
            .as_ref()
            .and_then(|s| s.selected.clone())
    }

    /// Current capture session id.
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.session.borrow().as_ref().map(|s| s.id)
    }

    /// Everything a UI needs to render the current state.
    pub fn snapshot(&self) -> EngineSnapshot {
        let slot = self.inner.session.borrow();
        match slot.as_ref() {
            Some(session) => EngineSnapshot {
                state: session.state(),
                is_active: true,
                hovered: session.hovered.clone(),
                selected: session.selected.clone(),
                session: Some(session.id),
            },
            None => EngineSnapshot {
                state: EngineState::Inactive,
                is_active: false,
                hovered: None,
                selected: None,
                session: None,
            },
        }
    }

    /// The detection chain (for diagnostics).
    pub fn chain(&self) -> &DetectionChain {
        &self.inner.chain
    }

    /// The bus this engine announces on.
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Follow `selection:start`, `selection:cancel` and `modal:close` on the
    /// bus. The registrations live as long as `scope`.
    pub fn bind(&self, scope: &Subscriptions) {
        let weak = Rc::downgrade(&self.inner);
        scope.on(
            EventKind::SelectionStart,
            listener(with_engine(&weak, InteractionEngine::activate)),
        );
        scope.on(
            EventKind::SelectionCancel,
            listener(with_engine(&weak, InteractionEngine::deactivate)),
        );
        scope.on(
            EventKind::ModalClose,
            listener(with_engine(&weak, |engine| {
                engine.dismiss_selection();
            })),
        );
    }

    /// Feed one input event. Returns what the platform should do with it.
    pub fn handle(&self, event: InputEvent) -> Disposition {
        if !self.is_active() {
            return Disposition::PASS;
        }
        match event {
            InputEvent::PointerMove { target } => self.pointer_move(target),
            InputEvent::Click { target } => self.click(target),
            InputEvent::TouchStart { point } => self.touch_start(point),
            InputEvent::TouchMove { point } => self.touch_move(point),
            InputEvent::TouchEnd => self.touch_end(),
            InputEvent::KeyDown { key } => self.key_down(key),
        }
    }

    fn pointer_move(&self, target: Option<ElementId>) -> Disposition {
        let now = self.inner.scheduler.now();
        let gate = {
            let mut slot = self.inner.session.borrow_mut();
            let Some(session) = slot.as_mut().filter(|s| s.selected.is_none()) else {
                return Disposition::PASS;
            };
            session.latest_pointer = Some(target);
            session.throttle.gate(now)
        };

        match gate {
            Gate::Now => self.sample_pointer(),
            Gate::Later(delay) => {
                let task = self.inner.scheduler.set_timer(delay);
                if let Some(session) = self.inner.session.borrow_mut().as_mut() {
                    session.throttle.arm(task);
                }
            }
            Gate::Queued => {}
        }
        Disposition::PASS
    }

    /// Evaluate the latest pointer sample.
    fn sample_pointer(&self) {
        let mut clear_highlight = false;
        {
            let mut slot = self.inner.session.borrow_mut();
            let Some(session) = slot.as_mut() else {
                return;
            };
            let Some(target) = session.latest_pointer.take() else {
                return;
            };
            if target == session.last_detected {
                return;
            }

            if let Some(previous) = session.idle.take() {
                self.inner.scheduler.cancel(previous.task);
            }
            session.last_detected = target;

            match target {
                Some(element) => {
                    let timeout = Duration::from_millis(self.inner.settings.idle_timeout_ms);
                    let task = self.inner.scheduler.request_idle(timeout);
                    session.idle = Some(IdleRequest {
                        task,
                        target: element,
                        retried: false,
                    });
                    debug!(session = %session.id, element = %element, "hover detection scheduled");
                }
                None => {
                    clear_highlight = session.hovered.take().is_some();
                }
            }
        }

        if clear_highlight {
            self.inner.host.borrow_mut().highlight(None);
        }
    }

    fn on_idle_inner(&self, task: TaskId, deadline: IdleDeadline) {
        let target = {
            let mut slot = self.inner.session.borrow_mut();
            let Some(session) = slot.as_mut() else {
                return;
            };
            let Some(request) = session.idle.filter(|req| req.task == task) else {
                return;
            };
            session.idle = None;

            let min_slack = Duration::from_millis(self.inner.settings.min_idle_slack_ms);
            if !deadline.did_timeout && deadline.time_remaining < min_slack {
                if request.retried {
                    // Second starved window: drop this sample, let the next move retry.
                    session.last_detected = None;
                    debug!(session = %session.id, element = %request.target, "hover detection abandoned");
                    return;
                }
                let timeout = Duration::from_millis(self.inner.settings.idle_retry_timeout_ms);
                session.idle = Some(IdleRequest {
                    task: self.inner.scheduler.request_idle(timeout),
                    target: request.target,
                    retried: true,
                });
                debug!(session = %session.id, element = %request.target, "hover detection rescheduled");
                return;
            }
            if session.selected.is_some() {
                return;
            }
            request.target
        };

        let hovered = self
            .inner
            .chain
            .detect(self.inner.page.as_ref(), Some(target))
            .into_info();

        {
            let mut slot = self.inner.session.borrow_mut();
            let Some(session) = slot.as_mut().filter(|s| s.selected.is_none()) else {
                return;
            };
            session.hovered = hovered.clone();
        }
        self.inner.host.borrow_mut().highlight(hovered.as_ref());
    }

    fn click(&self, target: Option<ElementId>) -> Disposition {
        if self.state() == EngineState::Selected {
            return Disposition::PASS;
        }
        if target.is_some_and(|element| self.is_own_ui(element)) {
            return Disposition::PASS;
        }

        self.cancel_hover_work();
        match self.inner.chain.detect(self.inner.page.as_ref(), target) {
            Detection::Found(info) => self.commit_selection(info, InputSource::Mouse),
            Detection::NoTarget => debug!("click without a target"),
        }
        Disposition::CAPTURE
    }

    fn touch_start(&self, point: Point) -> Disposition {
        if self.state() == EngineState::Selected {
            return Disposition::PASS;
        }
        let element = self.inner.page.element_from_point(point);
        if element.is_some_and(|element| self.is_own_ui(element)) {
            return Disposition::PASS;
        }

        {
            let mut slot = self.inner.session.borrow_mut();
            let Some(session) = slot.as_mut() else {
                return Disposition::PASS;
            };
            if let Some(task) = session.touch_debounce.cancel() {
                self.inner.scheduler.cancel(task);
            }
            session.drag = Some(Drag {
                origin: point,
                latest: point,
                last_touched: element,
            });
        }
        self.pulse(Pulse::Acknowledge);
        Disposition::CAPTURE
    }

    fn touch_move(&self, point: Point) -> Disposition {
        let mut slot = self.inner.session.borrow_mut();
        let Some(session) = slot.as_mut() else {
            return Disposition::PASS;
        };
        let Some(drag) = session.drag.as_mut() else {
            return Disposition::PASS;
        };
        drag.latest = point;

        let task = self
            .inner
            .scheduler
            .set_timer(session.touch_debounce.delay());
        if let Some(superseded) = session.touch_debounce.replace(task) {
            self.inner.scheduler.cancel(superseded);
        }
        Disposition::CAPTURE
    }

    /// Re-evaluate the drag once the touch-move burst has gone quiet.
    fn evaluate_drag(&self) {
        let element = {
            let mut slot = self.inner.session.borrow_mut();
            let Some(session) = slot.as_mut().filter(|s| s.selected.is_none()) else {
                return;
            };
            let Some(drag) = session.drag.as_mut() else {
                return;
            };

            let distance = drag.origin.distance_to(&drag.latest);
            if distance <= self.inner.settings.drag_threshold_px {
                debug!(session = %session.id, distance, "drag below threshold");
                return;
            }
            let element = self.inner.page.element_from_point(drag.latest);
            if element == drag.last_touched {
                return;
            }
            drag.last_touched = element;
            element
        };

        let hovered = self
            .inner
            .chain
            .detect(self.inner.page.as_ref(), element)
            .into_info();
        let changed = hovered.is_some();
        if let Some(session) = self.inner.session.borrow_mut().as_mut() {
            session.hovered = hovered.clone();
        }
        self.inner.host.borrow_mut().highlight(hovered.as_ref());
        if changed {
            self.pulse(Pulse::Tick);
        }
    }

    fn touch_end(&self) -> Disposition {
        let flush = {
            let mut slot = self.inner.session.borrow_mut();
            let Some(session) = slot.as_mut() else {
                return Disposition::PASS;
            };
            match session.touch_debounce.cancel() {
                Some(task) => {
                    self.inner.scheduler.cancel(task);
                    true
                }
                None => false,
            }
        };
        if flush {
            self.evaluate_drag();
        }

        let drag = {
            let mut slot = self.inner.session.borrow_mut();
            match slot.as_mut() {
                Some(session) => session.drag.take(),
                None => None,
            }
        };
        let Some(drag) = drag else {
            return Disposition::PASS;
        };

        if let Some(element) = drag.last_touched {
            self.cancel_hover_work();
            if let Detection::Found(info) = self
                .inner
                .chain
                .detect(self.inner.page.as_ref(), Some(element))
            {
                self.pulse(Pulse::Confirm);
                self.commit_selection(info, InputSource::Touch);
            }
        }
        Disposition::CAPTURE
    }

    fn key_down(&self, key: Key) -> Disposition {
        if key != Key::Escape {
            return Disposition::PASS;
        }
        self.deactivate();
        self.inner
            .bus
            .emit(EventKind::SelectionCancel, Payload::Empty);
        Disposition::CAPTURE
    }

    fn commit_selection(&self, info: ComponentInfo, input: InputSource) {
        let element = info.element;
        let session_id = {
            let mut slot = self.inner.session.borrow_mut();
            let Some(session) = slot.as_mut() else {
                return;
            };
            session.hovered = None;
            session.selected = Some(info.clone());
            session.last_detected = None;
            session.drag = None;
            if let Some(task) = session.touch_debounce.cancel() {
                self.inner.scheduler.cancel(task);
            }
            session.id
        };
        self.inner.host.borrow_mut().highlight(None);
        info!(
            session = %session_id,
            component = %info.name,
            method = %info.detection_method,
            "component selected"
        );

        let selection = Selection {
            component: info,
            session: session_id,
            input,
            selected_at: Utc::now(),
        };
        self.inner.bus.emit(
            EventKind::ComponentSelected,
            Payload::Selection(Box::new(selection)),
        );

        // A listener may have ended capture mode.
        if !self.is_active() {
            return;
        }
        if let Some(capturer) = &self.inner.capturer {
            self.inner.bus.emit(
                EventKind::ScreenshotCapture,
                Payload::Json(serde_json::json!({ "element": element })),
            );
            let outcome = capturer.capture(element);
            if let Err(reason) = &outcome {
                debug!(session = %session_id, element = %element, %reason, "screenshot capture failed");
            }
            self.inner.bus.emit(
                EventKind::ScreenshotComplete,
                Payload::Screenshot(Box::new(ScreenshotReport { element, outcome })),
            );
        }
    }

    /// Drop pending hover work so a stale result cannot land after selection.
    fn cancel_hover_work(&self) {
        let mut slot = self.inner.session.borrow_mut();
        let Some(session) = slot.as_mut() else {
            return;
        };
        session.latest_pointer = None;
        let tasks = [
            session.throttle.cancel(),
            session.idle.take().map(|req| req.task),
        ];
        for task in tasks.into_iter().flatten() {
            self.inner.scheduler.cancel(task);
        }
    }

    fn pulse(&self, pulse: Pulse) {
        let haptics = &self.inner.haptics;
        if !haptics.enabled {
            return;
        }
        let pattern = match pulse {
            Pulse::Acknowledge => vec![haptics.acknowledge_ms],
            Pulse::Tick => vec![haptics.tick_ms],
            Pulse::Confirm => haptics.confirm_pattern_ms.clone(),
        };
        self.inner.host.borrow_mut().vibrate(pulse, &pattern);
    }

    fn is_own_ui(&self, element: ElementId) -> bool {
        let page = self.inner.page.as_ref();
        let mut current = Some(element);
        while let Some(node) = current {
            if page.attribute(node, IGNORE_ATTRIBUTE).is_some() {
                return true;
            }
            current = page.parent(node);
        }
        false
    }
}

impl TaskSink for InteractionEngine {
    fn on_timer(&self, id: TaskId) {
        let now = self.inner.scheduler.now();
        let (pointer, touch) = {
            let mut slot = self.inner.session.borrow_mut();
            let Some(session) = slot.as_mut() else {
                return;
            };
            (
                session.throttle.fire(id, now),
                session.touch_debounce.fire(id),
            )
        };
        if pointer {
            self.sample_pointer();
        } else if touch {
            self.evaluate_drag();
        }
    }

    fn on_idle(&self, id: TaskId, deadline: IdleDeadline) {
        self.on_idle_inner(id, deadline);
    }
}

fn with_engine(
    weak: &Weak<EngineInner>,
    action: impl Fn(&InteractionEngine) + 'static,
) -> impl Fn(&Payload) -> anyhow::Result<()> {
    let weak = weak.clone();
    move |_| {
        if let Some(inner) = weak.upgrade() {
            action(&InteractionEngine { inner });
        }
        Ok(())
    }
}
