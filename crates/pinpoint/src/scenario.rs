//! Scripted interaction scenarios.
//!
//! A scenario is a page fixture plus a list of steps. Replaying it drives a
//! [`Toolkit`] on the virtual clock and records every bus emission.
//!
//! ```yaml
//! page:
//!   elements:
//!     - key: save
//!       tag: button
//!       attributes: { data-testid: save-button }
//! steps:
//!   - emit: selection:start
//!   - move: save
//!   - idle: 8
//!   - click: save
//! ```

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use pinpoint_core::{Document, DocumentFixture, PinpointConfig, Point};
use pinpoint_interaction::{
    listener, Disposition, EngineSnapshot, EventKind, InputEvent, Key, Payload, Scheduler,
    Subscriptions,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::toolkit::Toolkit;

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Call `activate()` directly
    Activate,
    /// Call `deactivate()` directly
    Deactivate,
    /// Finish the authoring flow
    Dismiss,
    /// Emit an event on the bus, as a UI component would
    Emit(EventKind),
    /// Move the pointer over the element with this key (or over nothing)
    Move(Option<String>),
    /// Click the element with this key (or empty space)
    Click(Option<String>),
    /// Start a touch at a point
    TouchStart(Point),
    /// Move the touching finger
    TouchMove(Point),
    /// Lift the finger
    TouchEnd,
    /// Press a key
    Key(Key),
    /// Let this many milliseconds pass
    Wait(u64),
    /// Give the engine an idle period with this many milliseconds of slack
    Idle(u64),
    /// Remove the element with this key from the document
    Detach(String),
    /// Put a detached element back
    Reattach(String),
}

/// A page and the steps to run against it.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Page fixture
    pub page: DocumentFixture,
    /// Configuration; overridden by an explicit config file
    #[serde(default)]
    pub config: Option<PinpointConfig>,
    /// Steps, in order
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Load a scenario from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> pinpoint_core::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a scenario from a YAML string.
    pub fn from_yaml(yaml: &str) -> pinpoint_core::Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(yaml)?;
        if let Some(config) = &scenario.config {
            config.validate()?;
        }
        Ok(scenario)
    }
}

/// One bus emission observed during replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Emission {
    /// Virtual time of the emission
    pub at_ms: u64,
    /// Event kind
    pub event: EventKind,
    /// Payload
    pub payload: Payload,
}

/// Result of a single step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// What the engine told the platform to do, for input steps
    pub disposition: Option<Disposition>,
    /// Bus emissions caused by the step
    pub emissions: Vec<Emission>,
}

/// A scenario being replayed.
pub struct Replay {
    // Dropped before the toolkit.
    _recorder: Subscriptions,
    emissions: Rc<RefCell<Vec<Emission>>>,
    toolkit: Toolkit,
}

impl Replay {
    /// Build the page and wire a toolkit for `scenario`.
    ///
    /// `config` takes precedence over the scenario's own configuration.
    pub fn new(scenario: &Scenario, config: Option<&PinpointConfig>) -> pinpoint_core::Result<Self> {
        let page = Rc::new(Document::from_fixture(&scenario.page)?);
        let config = config
            .or(scenario.config.as_ref())
            .cloned()
            .unwrap_or_default();
        let toolkit = Toolkit::new(page, &config);

        let emissions = Rc::new(RefCell::new(Vec::new()));
        let recorder = toolkit.bus().scope();
        for kind in EventKind::ALL {
            let emissions = Rc::clone(&emissions);
            let scheduler = toolkit.scheduler().clone();
            recorder.on(
                kind,
                listener(move |payload| {
                    let at_ms = u64::try_from(scheduler.now().as_millis())?;
                    emissions.borrow_mut().push(Emission {
                        at_ms,
                        event: kind,
                        payload: payload.clone(),
                    });
                    Ok(())
                }),
            );
        }

        Ok(Self {
            _recorder: recorder,
            emissions,
            toolkit,
        })
    }

    /// The wired toolkit.
    pub fn toolkit(&self) -> &Toolkit {
        &self.toolkit
    }

    /// Run one step.
    pub fn step(&self, step: &Step) -> pinpoint_core::Result<StepOutcome> {
        debug!(?step, at_ms = self.toolkit.now_ms(), "replay step");
        let toolkit = &self.toolkit;
        let mut disposition = None;

        match step {
            Step::Activate => toolkit.engine().activate(),
            Step::Deactivate => toolkit.engine().deactivate(),
            Step::Dismiss => {
                toolkit.engine().dismiss_selection();
            }
            Step::Emit(kind) => {
                toolkit.bus().emit(*kind, Payload::Empty);
            }
            Step::Move(key) => {
                let target = self.resolve(key.as_deref())?;
                disposition = Some(toolkit.dispatch(InputEvent::PointerMove { target }));
            }
            Step::Click(key) => {
                let target = self.resolve(key.as_deref())?;
                disposition = Some(toolkit.dispatch(InputEvent::Click { target }));
            }
            Step::TouchStart(point) => {
                disposition = Some(toolkit.dispatch(InputEvent::TouchStart { point: *point }));
            }
            Step::TouchMove(point) => {
                disposition = Some(toolkit.dispatch(InputEvent::TouchMove { point: *point }));
            }
            Step::TouchEnd => {
                disposition = Some(toolkit.dispatch(InputEvent::TouchEnd));
            }
            Step::Key(key) => {
                disposition = Some(toolkit.dispatch(InputEvent::KeyDown { key: *key }));
            }
            Step::Wait(ms) => {
                toolkit.advance(Duration::from_millis(*ms));
            }
            Step::Idle(ms) => {
                toolkit.run_idle(Duration::from_millis(*ms));
            }
            Step::Detach(key) => toolkit.page().detach(toolkit.element(key)?),
            Step::Reattach(key) => toolkit.page().reattach(toolkit.element(key)?),
        }

        Ok(StepOutcome {
            disposition,
            emissions: std::mem::take(&mut *self.emissions.borrow_mut()),
        })
    }

    /// Run every step, returning all emissions and the final engine state.
    pub fn run_all(&self, steps: &[Step]) -> pinpoint_core::Result<(Vec<Emission>, EngineSnapshot)> {
        let mut emissions = Vec::new();
        for step in steps {
            emissions.extend(self.step(step)?.emissions);
        }
        Ok((emissions, self.toolkit.snapshot()))
    }

    fn resolve(&self, key: Option<&str>) -> pinpoint_core::Result<Option<pinpoint_core::ElementId>> {
        key.map(|key| self.toolkit.element(key)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinpoint_core::DetectionMethod;
    use pinpoint_interaction::EngineState;

    const SCENARIO: &str = r#"
page:
  elements:
    - key: shell
      tag: main
      children:
        - key: save
          tag: button
          attributes: { data-testid: save-button }
steps:
  - emit: selection:start
  - move: save
  - idle: 8
  - click: save
"#;

    #[test]
    fn test_parse_steps() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        assert_eq!(scenario.steps.len(), 4);
        assert_eq!(scenario.steps[0], Step::Emit(EventKind::SelectionStart));
        assert_eq!(scenario.steps[1], Step::Move(Some("save".to_string())));
        assert_eq!(scenario.steps[2], Step::Idle(8));
    }

    #[test]
    fn test_parse_unit_and_point_steps() {
        let yaml = r#"
page: {}
steps:
  - touch_start: { x: 4, y: 8 }
  - touch_end
  - key: escape
  - move: null
"#;
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.steps[0], Step::TouchStart(Point::new(4.0, 8.0)));
        assert_eq!(scenario.steps[1], Step::TouchEnd);
        assert_eq!(scenario.steps[2], Step::Key(Key::Escape));
        assert_eq!(scenario.steps[3], Step::Move(None));
    }

    #[test]
    fn test_unknown_event_kind_is_rejected() {
        let yaml = "page: {}\nsteps:\n  - emit: modal:explode\n";
        assert!(Scenario::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_replay_records_selection() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        let replay = Replay::new(&scenario, None).unwrap();
        let (emissions, snapshot) = replay.run_all(&scenario.steps).unwrap();

        let kinds: Vec<EventKind> = emissions.iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![EventKind::SelectionStart, EventKind::ComponentSelected]
        );
        let selection = emissions[1].payload.selection().unwrap();
        assert_eq!(selection.component.name, "SaveButton");
        assert_eq!(selection.component.detection_method, DetectionMethod::Heuristic);
        assert_eq!(snapshot.state, EngineState::Selected);
    }

    #[test]
    fn test_unknown_element_key_fails_step() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        let replay = Replay::new(&scenario, None).unwrap();
        assert!(replay.step(&Step::Click(Some("nope".to_string()))).is_err());
    }
}
