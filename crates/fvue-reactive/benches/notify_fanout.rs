use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use fvue_reactive::{Value, Watcher, observe, tick};
use std::hint::black_box;

fn bench_notify_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive/notify_fanout");
    for subscribers in [1usize, 16, 256] {
        let data = Value::object([("n", Value::from(0))]);
        observe(&data, false);
        let root = data.as_obj().unwrap().clone();
        let watchers: Vec<Watcher> = (0..subscribers)
            .map(|_| {
                let o = root.clone();
                Watcher::builder(move || Ok(o.get("n"))).build().unwrap()
            })
            .collect();
        let mut n = 0i32;
        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &subscribers, |b, _| {
            b.iter(|| {
                n += 1;
                root.set("n", Value::from(n));
                tick::run_until_idle();
                black_box(watchers.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_notify_fanout);
criterion_main!(benches);
