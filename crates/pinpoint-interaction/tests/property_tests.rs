//! Property-based tests for the interaction engine.
//!
//! Uses proptest to drive random input and clock sequences and verify the
//! state-machine invariants.

use std::rc::Rc;
use std::time::Duration;

use proptest::prelude::*;

use pinpoint_core::{Document, ElementId, Point, Rect};
use pinpoint_interaction::{
    EventBus, EventKind, InputEvent, InteractionEngine, Key, RecordingHost, VirtualScheduler,
};

/// One thing that can happen to the engine.
#[derive(Debug, Clone)]
enum Action {
    Input(InputEvent),
    Advance(u64),
    Idle(u64),
    Dismiss,
}

const ELEMENTS: u64 = 6;

fn page() -> Rc<Document> {
    let mut doc = Document::new();
    let root = doc.append(None, "main");
    doc.set_rect(root, Rect::new(0.0, 0.0, 300.0, 300.0));
    for row in 0..(ELEMENTS - 1) {
        let item = doc.append(Some(root), "li");
        doc.set_attribute(item, "data-testid", format!("row-{row}"));
        doc.set_rect(item, Rect::new(0.0, row as f64 * 50.0, 300.0, 50.0));
    }
    Rc::new(doc)
}

fn target() -> impl Strategy<Value = Option<ElementId>> {
    prop::option::weighted(0.9, (1..=ELEMENTS).prop_map(ElementId::new))
}

fn point() -> impl Strategy<Value = Point> {
    (0.0..300.0f64, 0.0..300.0f64).prop_map(|(x, y)| Point::new(x, y))
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => target().prop_map(|target| Action::Input(InputEvent::PointerMove { target })),
        1 => target().prop_map(|target| Action::Input(InputEvent::Click { target })),
        1 => point().prop_map(|point| Action::Input(InputEvent::TouchStart { point })),
        2 => point().prop_map(|point| Action::Input(InputEvent::TouchMove { point })),
        1 => Just(Action::Input(InputEvent::TouchEnd)),
        1 => Just(Action::Input(InputEvent::KeyDown { key: Key::Tab })),
        3 => (0u64..80).prop_map(Action::Advance),
        2 => (0u64..4).prop_map(Action::Idle),
        1 => Just(Action::Dismiss),
    ]
}

fn apply(engine: &InteractionEngine, sched: &VirtualScheduler, action: &Action) {
    match action {
        Action::Input(event) => {
            engine.handle(*event);
        }
        Action::Advance(ms) => {
            sched.advance(Duration::from_millis(*ms), engine);
        }
        Action::Idle(ms) => {
            sched.run_idle(Duration::from_millis(*ms), engine);
        }
        Action::Dismiss => {
            engine.dismiss_selection();
        }
    }
}

proptest! {
    /// Hovered and selected are never both populated.
    #[test]
    fn hover_and_selection_are_exclusive(actions in prop::collection::vec(action(), 1..60)) {
        let sched = VirtualScheduler::new();
        let engine = InteractionEngine::builder(page(), EventBus::new(), Rc::new(sched.clone())).build();
        engine.activate();

        for action in &actions {
            apply(&engine, &sched, action);
            let snapshot = engine.snapshot();
            prop_assert!(!(snapshot.hovered.is_some() && snapshot.selected.is_some()));
            prop_assert!(snapshot.is_active);
        }
    }

    /// After deactivation nothing is pending and nothing else happens.
    #[test]
    fn deactivation_stops_all_work(
        before in prop::collection::vec(action(), 0..40),
        after in prop::collection::vec(action(), 0..40),
    ) {
        let sched = VirtualScheduler::new();
        let bus = EventBus::new();
        let host = RecordingHost::new();
        let engine = InteractionEngine::builder(page(), bus.clone(), Rc::new(sched.clone()))
            .host(host.clone())
            .build();
        engine.activate();
        for action in &before {
            apply(&engine, &sched, action);
        }

        engine.deactivate();
        prop_assert!(!sched.has_pending());

        let selections = Rc::new(std::cell::Cell::new(0));
        let seen = Rc::clone(&selections);
        bus.on(EventKind::ComponentSelected, pinpoint_interaction::listener(move |_| {
            seen.set(seen.get() + 1);
            Ok(())
        }));
        let attempts: u64 = engine.chain().stats().iter().map(|(_, s)| s.attempts).sum();
        let pulses = host.log().pulses.len();

        for action in &after {
            if !matches!(action, Action::Dismiss) {
                apply(&engine, &sched, action);
            }
        }

        let attempts_after: u64 = engine.chain().stats().iter().map(|(_, s)| s.attempts).sum();
        prop_assert_eq!(attempts, attempts_after);
        prop_assert_eq!(selections.get(), 0);
        prop_assert_eq!(host.log().pulses.len(), pulses);
        prop_assert!(!host.log().listeners_installed());
    }
}
