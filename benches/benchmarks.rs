use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::hint::black_box;

use shared_state::{Interest, SharedState, State};

fn sample_state(fields: usize) -> State {
    (0..fields).map(|i| (format!("field{i}"), json!(0))).collect()
}

fn set_prop_benchmark(c: &mut Criterion) {
    let shared = SharedState::new(sample_state(8));

    c.bench_function("set_prop", |b| {
        let mut i = 0;
        b.iter(|| {
            shared.set_prop("field0", black_box(json!(i))).unwrap();
            i += 1;
        });
    });
}

fn unchanged_update_benchmark(c: &mut Criterion) {
    let shared = SharedState::new(sample_state(8));
    shared
        .add_listener(Interest::All, |_: &State, _: &State| {
            // Never reached
        })
        .unwrap();

    c.bench_function("unchanged_update", |b| {
        b.iter(|| {
            black_box(shared.set_prop("field0", json!(0)).unwrap());
        });
    });
}

fn state_read_benchmark(c: &mut Criterion) {
    let shared = SharedState::new(sample_state(8));

    c.bench_function("state_read", |b| {
        b.iter(|| {
            black_box(shared.read(|state| state.len()).unwrap());
        });
    });
}

fn dispatch_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for subscriber_count in [1, 10, 100].iter() {
        let shared = SharedState::new(sample_state(*subscriber_count));

        // One listener per field, so each update reaches a single subscriber
        for i in 0..*subscriber_count {
            shared
                .add_listener(format!("field{i}"), |_: &State, _: &State| {
                    // Empty subscriber
                })
                .unwrap();
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    shared.set_prop("field0", black_box(json!(i))).unwrap();
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn refresh_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("refresh");

    for subscriber_count in [1, 10, 100].iter() {
        let shared = SharedState::new(sample_state(4));

        for _ in 0..*subscriber_count {
            shared.register(|| {}, Interest::All);
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                b.iter(|| {
                    shared.refresh(Interest::All).unwrap();
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    set_prop_benchmark,
    unchanged_update_benchmark,
    state_read_benchmark,
    dispatch_benchmark,
    refresh_benchmark,
);
criterion_main!(benches);
