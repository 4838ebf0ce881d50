use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use vicenza_sim::{FixedClock, SensorModel, SensorState};

fn advance_benchmark(c: &mut Criterion) {
    for (name, hour) in [("advance_day", 12), ("advance_night", 2)] {
        let clock = FixedClock { hour, timestamp: 1_700_000_000 };
        let mut model = SensorModel::new(SensorState::default(), StdRng::seed_from_u64(42), clock);

        c.bench_function(name, |b| {
            b.iter(|| {
                model.advance();
                black_box(model.state());
            });
        });
    }
}

fn snapshot_benchmark(c: &mut Criterion) {
    let clock = FixedClock { hour: 12, timestamp: 1_700_000_000 };
    let mut model = SensorModel::new(SensorState::default(), StdRng::seed_from_u64(42), clock);
    model.advance();

    c.bench_function("snapshot_to_payload", |b| {
        b.iter(|| {
            let reading = black_box(&model).snapshot();
            black_box(reading.to_payload())
        });
    });
}

criterion_group!(benches, advance_benchmark, snapshot_benchmark);
criterion_main!(benches);
