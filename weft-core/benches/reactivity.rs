//! Micro-benchmarks for the hot paths: tracked reads, notifying writes,
//! and batched flushes.

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use weft_core::scheduler::{queue_job, tick, Job};
use weft_core::{effect, reactive, stop, EffectOptions, Value};

fn bench_tracked_read(c: &mut Criterion) {
    let state = reactive(Value::object([("a", Value::Int(1))]))
        .into_container()
        .unwrap();

    let reader = state.clone();
    let handle = effect(
        move || {
            black_box(reader.get("a").unwrap());
        },
        EffectOptions::default(),
    );

    c.bench_function("tracked read", |b| {
        b.iter(|| black_box(state.get("a").unwrap()))
    });

    stop(&handle);
}

fn bench_notifying_write(c: &mut Criterion) {
    let state = reactive(Value::object([("a", Value::Int(0))]))
        .into_container()
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let reader = state.clone();
        handles.push(effect(
            move || {
                black_box(reader.get("a").unwrap());
            },
            EffectOptions::default(),
        ));
    }

    let mut n = 0i64;
    c.bench_function("write with 10 subscribers", |b| {
        b.iter(|| {
            n += 1;
            state.set("a", Value::Int(n)).unwrap();
        })
    });

    for handle in &handles {
        stop(handle);
    }
}

fn bench_batched_flush(c: &mut Criterion) {
    let state = reactive(Value::object([("a", Value::Int(0))]))
        .into_container()
        .unwrap();

    let reader = state.clone();
    let handle = effect(
        move || {
            black_box(reader.get("a").unwrap());
        },
        EffectOptions {
            scheduler: Some(Rc::new(|e| queue_job(Job::for_effect(&e)))),
            ..Default::default()
        },
    );

    let mut n = 0i64;
    c.bench_function("100 writes, one flush", |b| {
        b.iter(|| {
            for _ in 0..100 {
                n += 1;
                state.set("a", Value::Int(n)).unwrap();
            }
            tick();
        })
    });

    stop(&handle);
}

criterion_group!(
    benches,
    bench_tracked_read,
    bench_notifying_write,
    bench_batched_flush
);
criterion_main!(benches);
