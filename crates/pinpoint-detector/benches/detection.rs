use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pinpoint_core::{Document, ElementId, RenderNode, RenderNodeKind};
use pinpoint_detector::{
    ComponentStrategy, DetectionChain, FallbackStrategy, HeuristicStrategy, TreeWalkStrategy,
};

/// Build a page `depth` levels deep with a test id only at the top, so the
/// heuristic strategy has to climb the whole chain.
fn create_deep_page(depth: usize) -> (Document, ElementId) {
    let mut doc = Document::new();
    let mut current = doc.append(None, "main");
    doc.set_attribute(current, "data-testid", "app-shell");
    for _ in 0..depth {
        current = doc.append(Some(current), "div");
        doc.set_attribute(current, "class", "flex p-2");
    }
    (doc, current)
}

/// Build a page whose leaf is linked to a render tree `depth` nodes deep.
fn create_render_tree_page(depth: usize) -> (Document, ElementId) {
    let mut doc = Document::new();
    let leaf = doc.append(None, "span");
    let mut parent = Some(doc.add_render_node(RenderNode::new(
        RenderNodeKind::Function,
        "Dashboard",
        None,
    )));
    for _ in 0..depth {
        parent = Some(doc.add_render_node(RenderNode::new(RenderNodeKind::Host, "div", parent)));
    }
    let host = doc.add_render_node(RenderNode::new(RenderNodeKind::Host, "span", parent));
    doc.link_render_node(leaf, host);
    (doc, leaf)
}

fn bench_full_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_chain");

    for depth in [4usize, 16, 64].iter() {
        let (doc, leaf) = create_deep_page(*depth);
        let chain = DetectionChain::default();

        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, _| {
            b.iter(|| chain.detect(black_box(&doc), black_box(Some(leaf))));
        });
    }

    group.finish();
}

fn bench_individual_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategies");

    let (doc, leaf) = create_deep_page(8);
    let heuristic = HeuristicStrategy::new();
    group.bench_function("heuristic", |b| {
        b.iter(|| heuristic.resolve(black_box(&doc), black_box(leaf)));
    });

    let fallback = FallbackStrategy::new();
    group.bench_function("fallback", |b| {
        b.iter(|| fallback.resolve(black_box(&doc), black_box(leaf)));
    });

    let (doc, leaf) = create_render_tree_page(32);
    let tree_walk = TreeWalkStrategy::new();
    group.bench_function("tree_walk", |b| {
        b.iter(|| tree_walk.resolve(black_box(&doc), black_box(leaf)));
    });

    group.finish();
}

fn bench_detached_target(c: &mut Criterion) {
    let (doc, leaf) = create_deep_page(16);
    doc.detach(leaf);
    let chain = DetectionChain::default();

    c.bench_function("detached_target", |b| {
        b.iter(|| chain.detect(black_box(&doc), black_box(Some(leaf))));
    });
}

criterion_group!(
    benches,
    bench_full_chain,
    bench_individual_strategies,
    bench_detached_target
);
criterion_main!(benches);
