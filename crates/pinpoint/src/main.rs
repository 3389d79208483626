//! # pinpoint
//!
//! Command-line front end for the component detection and interaction
//! engine.
//!
//! ## Commands
//!
//! - `pinpoint replay <scenario.yaml> [--config <file>] [--realtime]`
//!   replays a scripted scenario and prints every bus emission, then the
//!   final engine snapshot, as JSON lines
//! - `pinpoint detect <page.yaml> <element-key> [--config <file>]`
//!   runs the detection chain once and prints the component
//! - `pinpoint schema` prints the JSON Schema of the detection result
//!
//! ## Architecture
//!
//! This is Layer 3 - the binary that ties together:
//! - pinpoint-core: Core types, page fixtures, configuration
//! - pinpoint-detector: Detection chain
//! - pinpoint-interaction: Event bus and interaction engine

use std::time::Duration;

use anyhow::{bail, Context};
use pinpoint::{component_info_schema, Replay, Scenario, Step};
use pinpoint_core::{Document, ElementId, PinpointConfig};
use pinpoint_detector::{Detection, DetectionChain};
use serde::Serialize;

const USAGE: &str = "usage:
  pinpoint replay <scenario.yaml> [--config <file>] [--realtime]
  pinpoint detect <page.yaml> <element-key> [--config <file>]
  pinpoint schema";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().skip(1).collect();
    let realtime = args.iter().any(|arg| arg == "--realtime");
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .map(|i| args.get(i + 1).context("--config needs a file"))
        .transpose()?;
    let positional: Vec<&str> = positional_args(&args);

    let config = match config_path {
        Some(path) => Some(load_config(path).await?),
        None => None,
    };

    // Initialize logging; stdout carries the JSON output
    let default_level = config
        .as_ref()
        .map_or("info", |c| c.logging.level.as_str());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match positional.as_slice() {
        ["replay", scenario] => replay(scenario, config.as_ref(), realtime).await,
        ["detect", page, element] => detect(page, element, config.as_ref()).await,
        ["schema"] => print_json(&component_info_schema()?),
        _ => bail!("{}", USAGE),
    }
}

/// Arguments that are neither flags nor flag values.
fn positional_args(args: &[String]) -> Vec<&str> {
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                iter.next();
            }
            "--realtime" => {}
            other => positional.push(other),
        }
    }
    positional
}

async fn load_config(path: &str) -> anyhow::Result<PinpointConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config {path}"))?;
    PinpointConfig::from_yaml(&content).with_context(|| format!("loading config {path}"))
}

async fn replay(path: &str, config: Option<&PinpointConfig>, realtime: bool) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading scenario {path}"))?;
    let scenario = Scenario::from_yaml(&content).with_context(|| format!("parsing scenario {path}"))?;
    let replay = Replay::new(&scenario, config)?;

    tracing::info!(steps = scenario.steps.len(), "replaying {}", path);

    for (index, step) in scenario.steps.iter().enumerate() {
        if let (true, Step::Wait(ms)) = (realtime, step) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        let outcome = replay
            .step(step)
            .with_context(|| format!("step {} ({step:?})", index + 1))?;
        for emission in &outcome.emissions {
            print_json(emission)?;
        }
    }

    #[derive(Serialize)]
    struct Final<T: Serialize> {
        snapshot: T,
    }
    print_json(&Final {
        snapshot: replay.toolkit().snapshot(),
    })
}

async fn detect(path: &str, element: &str, config: Option<&PinpointConfig>) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading page {path}"))?;
    let page = Document::from_yaml(&content).with_context(|| format!("parsing page {path}"))?;
    let target = resolve_element(&page, element)?;

    let settings = config.map(|c| c.detection.clone()).unwrap_or_default();
    let chain = DetectionChain::with_defaults(&settings);

    match chain.detect(&page, Some(target)) {
        Detection::Found(info) => {
            tracing::info!(
                component = %info.name,
                method = %info.detection_method,
                "resolved {}",
                element
            );
            print_json(&info)
        }
        Detection::NoTarget => bail!("element {element} is not attached to the page"),
    }
}

/// Accept a fixture key, or a raw id such as `#3`.
fn resolve_element(page: &Document, element: &str) -> anyhow::Result<ElementId> {
    if let Some(id) = page.element(element) {
        return Ok(id);
    }
    match element.trim_start_matches('#').parse::<u64>() {
        Ok(raw) => Ok(ElementId::new(raw)),
        Err(_) => bail!("no element with key '{element}'"),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
