use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tree_core::{ContainerId, InventoryItemId};
use tree_inventory::{plan_move, AncestorChain, Container, InventoryItem, MoveRequest};

fn root_chain() -> AncestorChain {
    AncestorChain::new(vec![ContainerId::from("root-container")])
}

/// `width` children directly under the source, one item per child.
fn wide_request(width: usize) -> MoveRequest {
    let source_chain = root_chain();
    let child_chain = AncestorChain::under(ContainerId::from("mixed-contents"), &source_chain);

    let mut children = Vec::with_capacity(width);
    let mut items = Vec::with_capacity(width);
    for i in 0..width {
        let id = ContainerId::new(i.to_string());
        items.push(InventoryItem::new(
            InventoryItemId::new(format!("item-{i}")),
            AncestorChain::under(id.clone(), &child_chain),
        ));
        children.push(Container::new(id, child_chain.clone()));
    }

    MoveRequest {
        source: Container::new("mixed-contents".into(), source_chain),
        children,
        items,
        destination: Container::new("production-lot".into(), root_chain()),
    }
}

/// A single path of `depth` containers under the source, supplied deepest first.
fn deep_request(depth: usize) -> MoveRequest {
    let mut chain = AncestorChain::under(ContainerId::from("mixed-contents"), &root_chain());
    let mut children = Vec::with_capacity(depth);
    for i in 0..depth {
        let id = ContainerId::new(format!("level-{i}"));
        children.push(Container::new(id.clone(), chain.clone()));
        chain = AncestorChain::under(id, &chain);
    }
    children.reverse();

    MoveRequest {
        source: Container::new("mixed-contents".into(), root_chain()),
        children,
        items: vec![],
        destination: Container::new("production-lot".into(), root_chain()),
    }
}

fn bench_plan_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_move");

    for size in [10usize, 100, 1_000] {
        let wide = wide_request(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("wide", size), &wide, |b, req| {
            b.iter(|| plan_move(black_box(req)).unwrap());
        });

        let deep = deep_request(size);
        group.bench_with_input(BenchmarkId::new("deep", size), &deep, |b, req| {
            b.iter(|| plan_move(black_box(req)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_plan_move);
criterion_main!(benches);
