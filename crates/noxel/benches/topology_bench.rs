//! Criterion microbenches for the panel topology.
//!
//! - Building an n×n quad sheet through `add_panel` (adjacency discovery on
//!   every insert).
//! - Node lookups on a finished sheet.
//! - Save + load of the whole sheet through redirectors.
//!
//! Results live under `target/criterion`.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use nalgebra::vector;
use noxel::api::{
    load_nodes, load_panels, save_nodes, save_panels, LoadRedirectorMap, NodeId, NodeRegistries,
    PanelData, PanelTopology, RegistryId, SaveRedirectorMap, TopologyId,
};

fn grid(n: usize) -> (NodeRegistries, RegistryId) {
    let mut regs = NodeRegistries::new();
    let id = regs.create();
    if let Some(r) = regs.get_mut(id) {
        r.set_editable(true);
        for y in 0..=n {
            for x in 0..=n {
                r.add_node(vector![x as f64 * 10.0, y as f64 * 10.0, 0.0]);
            }
        }
    }
    (regs, id)
}

fn quad(id: RegistryId, x: usize, y: usize) -> PanelData {
    let at = |x: usize, y: usize| NodeId::new(id, vector![x as f64 * 10.0, y as f64 * 10.0, 0.0]);
    PanelData::new(vec![at(x, y), at(x + 1, y), at(x + 1, y + 1), at(x, y + 1)], 1.0)
}

fn sheet(n: usize) -> (NodeRegistries, RegistryId, PanelTopology) {
    let (mut regs, id) = grid(n);
    let mut topo = PanelTopology::new(TopologyId(0));
    for y in 0..n {
        for x in 0..n {
            let _ = topo.add_panel(&mut regs, &quad(id, x, y));
        }
    }
    (regs, id, topo)
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology_build");
    for n in [4usize, 8, 16] {
        group.bench_function(BenchmarkId::new("quad_sheet", n * n), |b| {
            b.iter_batched(
                || grid(n),
                |(mut regs, id)| {
                    let mut topo = PanelTopology::new(TopologyId(0));
                    for y in 0..n {
                        for x in 0..n {
                            let _ = topo.add_panel(&mut regs, &quad(id, x, y));
                        }
                    }
                    topo
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology_lookup");
    let (regs, id, topo) = sheet(16);
    let query = quad(id, 7, 7).nodes;
    group.bench_function("find_panels_by_nodes", |b| {
        b.iter(|| topo.find_panels_by_nodes(&regs, &query, &[]))
    });
    group.bench_function("get_panel_by_nodes", |b| {
        b.iter(|| topo.get_panel_by_nodes(&regs, &query))
    });
    group.finish();
}

fn bench_save_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology_save");
    let (regs, id, topo) = sheet(8);
    let mut forward = SaveRedirectorMap::new();
    let nodes = regs.get(id).map(|r| save_nodes(r, 0, 0, &mut forward));
    let noxel = save_panels(&topo, &forward);
    group.bench_function("save_panels", |b| b.iter(|| save_panels(&topo, &forward)));
    if let Some(nodes) = nodes {
        group.bench_function("load_sheet", |b| {
            b.iter_batched(
                || grid(8),
                |(mut regs, id)| {
                    let mut reverse = LoadRedirectorMap::new();
                    if let Some(r) = regs.get_mut(id) {
                        load_nodes(r, 0, 0, &nodes, &mut reverse);
                    }
                    let mut topo = PanelTopology::new(TopologyId(0));
                    load_panels(&mut topo, &mut regs, &reverse, &noxel)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_lookup, bench_save_load);
criterion_main!(benches);
