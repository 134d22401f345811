//! Benchmarks for the host kernels.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use physarum::backend::{ComputeBackend, CpuBackend};
use physarum::config::{Settings, SimConfig, WorldConfig};
use physarum::kernels::StepParams;
use physarum::orchestrator::Orchestrator;

fn orchestrator(world: WorldConfig, sim: SimConfig) -> Orchestrator<CpuBackend> {
    let backend = CpuBackend::new(&world);
    let settings = Settings {
        world,
        sim,
        ..Default::default()
    };
    match Orchestrator::new(backend, settings, 1) {
        Ok(orch) => orch,
        Err(e) => panic!("bench world rejected: {}", e),
    }
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    group.sample_size(20);

    for agents in [10_000u32, 50_000, 200_000] {
        group.bench_with_input(BenchmarkId::new("flat", agents), &agents, |b, &agents| {
            let world = WorldConfig::two_d().with_agents(agents);
            let mut orch = orchestrator(world, SimConfig::default());
            b.iter(|| orch.step())
        });
    }

    group.bench_function("volume_100k", |b| {
        let mut orch = orchestrator(WorldConfig::three_d(), SimConfig::default());
        b.iter(|| orch.step())
    });

    group.bench_function("flat_collision", |b| {
        let world = WorldConfig::two_d().with_agents(50_000);
        let mut orch = orchestrator(world, SimConfig::default().with_collision(true));
        b.iter(|| orch.step())
    });

    group.finish();
}

fn bench_diffuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("diffuse");

    for world in [WorldConfig::two_d().with_agents(0), WorldConfig::three_d().with_agents(0)] {
        let label = format!("{}x{}x{}", world.width, world.height, world.depth);
        let params = StepParams::new(&world, &SimConfig::default(), 8.0, 0);
        let mut backend = CpuBackend::new(&world);
        backend.load_field(&vec![1.0; world.total_cells() as usize]);
        backend.begin_step(&params);
        group.bench_function(label, |b| {
            b.iter(|| {
                backend.diffuse();
                black_box(backend.field().len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_step, bench_diffuse);
criterion_main!(benches);
