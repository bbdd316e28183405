//! Criterion benchmarks for the save engine.
//!
//! Two benchmark groups:
//! - `save`: synchronous save of 1k and 10k crates into memory storage
//! - `load`: loading the same files back, once reusing live entities by
//!   persistent id and once spawning everything fresh

use criterion::{Criterion, criterion_group, criterion_main};
use reliquary_core::engine::SaveParams;
use reliquary_core::load::LoadParams;
use reliquary_core::settings::SaveSettings;
use reliquary_core::test_utils::*;
use reliquary_core::world::World;

const SIZES: [usize; 2] = [1_000, 10_000];

fn bench_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("save");
    for n in SIZES {
        let (mut engine, _storage) = memory_engine(SaveSettings::default());
        let mut world = sample_world();
        populate(&mut world, n);
        group.bench_function(format!("sync_{n}_crates"), |b| {
            b.iter(|| {
                engine
                    .save_sync(&mut world, &SaveParams::new("bench.sav"))
                    .unwrap();
            });
        });
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    for n in SIZES {
        let (mut engine, _storage) = memory_engine(SaveSettings::default());
        let mut world = sample_world();
        populate(&mut world, n);
        engine
            .save_sync(&mut world, &SaveParams::new("bench.sav"))
            .unwrap();

        group.bench_function(format!("reuse_{n}_crates"), |b| {
            b.iter(|| {
                engine
                    .load(&mut world, LoadParams::new("bench.sav"))
                    .unwrap();
            });
        });

        // Strip persistent ids so every record spawns.
        let mut anonymous = sample_world();
        for e in populate(&mut anonymous, n) {
            anonymous.record_mut(e).unwrap().persistent_id = Default::default();
        }
        engine
            .save_sync(&mut anonymous, &SaveParams::new("anon.sav"))
            .unwrap();
        group.bench_function(format!("spawn_{n}_crates"), |b| {
            b.iter(|| {
                let mut fresh = sample_world();
                engine.load(&mut fresh, LoadParams::new("anon.sav")).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_save, bench_load);
criterion_main!(benches);
