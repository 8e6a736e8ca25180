//! Scheduler and Update Pass benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pipeflow_core::{Engine, EngineConfig, Graph, Node, NodeId, Port, Scheduler};

struct Stage {
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl Stage {
    fn boxed() -> Box<dyn Node<()>> {
        Box::new(Self {
            inputs: vec![Port::new("a", "*"), Port::new("b", "*")],
            outputs: vec![Port::new("out", "*")],
        })
    }
}

impl Node<()> for Stage {
    fn type_name(&self) -> &str {
        "stage"
    }

    fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    fn outputs(&self) -> &[Port] {
        &self.outputs
    }
}

/// A layered graph, each node fed by two nodes of the previous layer.
/// Nodes are created last layer first so storage order fights dependency
/// order.
fn layered(layers: usize, width: usize) -> Graph<()> {
    let mut graph = Graph::new();
    let mut rows: Vec<Vec<NodeId>> = (0..layers)
        .map(|_| (0..width).map(|_| graph.add_node(Stage::boxed())).collect())
        .collect();
    rows.reverse();
    for pair in rows.windows(2) {
        for (i, &target) in pair[1].iter().enumerate() {
            let _ = graph.add_link(pair[0][i], 0, target, 0);
            let _ = graph.add_link(pair[0][(i + 1) % width], 0, target, 1);
        }
    }
    graph
}

fn bench_order_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_all");
    for layers in [10, 50, 100] {
        let graph = layered(layers, 10);
        let scheduler = Scheduler::default();
        group.bench_with_input(BenchmarkId::from_parameter(layers * 10), &graph, |b, graph| {
            b.iter(|| scheduler.order_all(black_box(graph)))
        });
    }
    group.finish();
}

fn bench_update_pass(c: &mut Criterion) {
    c.bench_function("update_pass_500", |b| {
        let mut engine: Engine<()> = Engine::new((), EngineConfig::default());
        let ids: Vec<NodeId> = (0..500).map(|_| engine.add_node(Stage::boxed())).collect();
        for pair in ids.windows(2) {
            let _ = engine.add_link(pair[0], 0, pair[1], 0);
        }
        b.iter(|| {
            engine.mark_dirty(ids[0]);
            black_box(engine.run_update())
        })
    });
}

criterion_group!(benches, bench_order_all, bench_update_pass);
criterion_main!(benches);
