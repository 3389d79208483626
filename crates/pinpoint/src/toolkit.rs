//! Application wiring: one bus, one engine, one scheduler, torn down together.

use std::rc::Rc;
use std::time::Duration;

use pinpoint_core::{Document, ElementId, PinpointConfig, ScreenshotCapturer};
use pinpoint_interaction::{
    Disposition, EngineBuilder, EngineSnapshot, EventBus, InputEvent, InteractionEngine,
    RecordingHost, Scheduler, Subscriptions, VirtualScheduler,
};
use tracing::debug;

/// A fully wired pinpoint instance over an in-memory page.
///
/// The toolkit owns the bus and the engine's bus bindings. Dropping it
/// deactivates the engine and tears the bus down.
pub struct Toolkit {
    page: Rc<Document>,
    bus: EventBus,
    bindings: Subscriptions,
    scheduler: VirtualScheduler,
    host: RecordingHost,
    engine: InteractionEngine,
}

impl Toolkit {
    /// Wire a toolkit over `page`.
    pub fn new(page: Rc<Document>, config: &PinpointConfig) -> Self {
        Self::wire(page, config, |builder| builder)
    }

    /// Wire a toolkit that captures a screenshot of every selection.
    pub fn with_capturer(
        page: Rc<Document>,
        config: &PinpointConfig,
        capturer: impl ScreenshotCapturer + 'static,
    ) -> Self {
        Self::wire(page, config, |builder| builder.capturer(capturer))
    }

    fn wire(
        page: Rc<Document>,
        config: &PinpointConfig,
        customize: impl FnOnce(EngineBuilder) -> EngineBuilder,
    ) -> Self {
        let bus = EventBus::new();
        let scheduler = VirtualScheduler::new();
        let host = RecordingHost::new();

        let builder = InteractionEngine::builder(page.clone(), bus.clone(), Rc::new(scheduler.clone()))
            .host(host.clone())
            .config(config);
        let engine = customize(builder).build();

        let bindings = bus.scope();
        engine.bind(&bindings);
        debug!(elements = page.len(), "toolkit wired");

        Self {
            page,
            bus,
            bindings,
            scheduler,
            host,
            engine,
        }
    }

    /// The page.
    pub fn page(&self) -> &Document {
        &self.page
    }

    /// Resolve a fixture key to its element.
    pub fn element(&self, key: &str) -> pinpoint_core::Result<ElementId> {
        self.page.require(key)
    }

    /// The bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The engine.
    pub fn engine(&self) -> &InteractionEngine {
        &self.engine
    }

    /// The scheduler driving timers and idle callbacks.
    pub fn scheduler(&self) -> &VirtualScheduler {
        &self.scheduler
    }

    /// The recording host.
    pub fn host(&self) -> &RecordingHost {
        &self.host
    }

    /// Feed one input event to the engine.
    pub fn dispatch(&self, event: InputEvent) -> Disposition {
        self.engine.handle(event)
    }

    /// Let `by` pass on the virtual clock. Returns how many tasks fired.
    pub fn advance(&self, by: Duration) -> usize {
        self.scheduler.advance(by, &self.engine)
    }

    /// Give the engine an idle period with `slack` spare time.
    pub fn run_idle(&self, slack: Duration) -> usize {
        self.scheduler.run_idle(slack, &self.engine)
    }

    /// Current engine state.
    pub fn snapshot(&self) -> EngineSnapshot {
        self.engine.snapshot()
    }

    /// Milliseconds on the virtual clock.
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.scheduler.now().as_millis())
            .unwrap_or(u64::MAX)
    }
}

impl Drop for Toolkit {
    fn drop(&mut self) {
        self.engine.deactivate();
        self.bindings.clear();
        self.bus.teardown();
    }
}
