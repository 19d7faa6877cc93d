// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for the looper engine
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Action fan-out when a single event fires
//! - Button press dispatch throughput
//! - Timer queue churn and chained timer resolution

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use looper::events::{Dispatcher, TimerQueue};
use looper::timing::ManualClock;

fn dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(ManualClock::new()))
}

/// Benchmark firing one event with many registered actions
fn bench_event_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_fan_out");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("fire", size), size, |b, &size| {
            b.iter_batched(
                || {
                    let dispatcher = dispatcher();
                    let counter = Arc::new(AtomicUsize::new(0));
                    let press = dispatcher.handle().button_press();
                    for _ in 0..size {
                        let counter = Arc::clone(&counter);
                        press.add_action(move || {
                            counter.fetch_add(1, Ordering::Relaxed);
                            Ok(())
                        });
                    }
                    (dispatcher, press, counter)
                },
                |(_dispatcher, press, counter)| {
                    press.fire().ok();
                    black_box(counter.load(Ordering::Relaxed))
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark draining pending button presses in construction order
fn bench_press_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("press_dispatch");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("drain", size), size, |b, &size| {
            b.iter_batched(
                || {
                    let dispatcher = dispatcher();
                    let handle = dispatcher.handle();
                    for _ in 0..size {
                        handle.button_press();
                    }
                    dispatcher
                },
                |dispatcher| {
                    let mut fired = 0;
                    while let Ok(Some(_)) = dispatcher.press_next() {
                        fired += 1;
                    }
                    black_box(fired)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark timer queue schedule/poll churn
fn bench_timer_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer_queue");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("churn", size), size, |b, &size| {
            let dispatcher = dispatcher();
            let handle = dispatcher.handle();
            let events: Vec<_> = (0..size).map(|_| handle.button_press()).collect();
            let base = Instant::now();

            b.iter(|| {
                let mut queue = TimerQueue::with_capacity(size);
                // interleaved deadlines so the heap has to reorder
                for (i, event) in events.iter().enumerate() {
                    let offset = (i * 7919) % size;
                    queue.schedule(event.clone(), base + Duration::from_micros(offset as u64));
                }
                let mut polled = 0;
                for step in 1..=10u64 {
                    let now = base + Duration::from_micros(step * size as u64 / 10);
                    polled += queue.poll(now).len();
                }
                black_box(polled + queue.len())
            })
        });
    }

    group.finish();
}

/// Benchmark resolving a chain of zero-delay timers hanging off boot
fn bench_timer_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("timer_chain");

    for depth in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("fire_due", depth), depth, |b, &depth| {
            b.iter_batched(
                || {
                    let dispatcher = dispatcher();
                    let mut tail = dispatcher.handle().boot();
                    for _ in 0..depth {
                        tail = tail.after(0.0);
                    }
                    (dispatcher, tail)
                },
                |(dispatcher, tail)| {
                    dispatcher.boot().ok();
                    let fired = dispatcher.fire_due().unwrap_or(0);
                    black_box((fired, tail.has_fired()))
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_event_fan_out,
    bench_press_dispatch,
    bench_timer_queue,
    bench_timer_chain,
);

criterion_main!(benches);
