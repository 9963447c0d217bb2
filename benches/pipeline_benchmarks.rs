use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use runweld::prelude::*;
use std::hint::black_box;

fn events(n: u64) -> Vec<Event> {
    (0..n)
        .map(|i| {
            Event::new(1, i, i).with_readout("cspad", Readout::from_values(vec![i as f64; 32]))
        })
        .collect()
}

fn bench_accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for size in [100u64, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size));

        group.bench_with_input(BenchmarkId::new("to_memory_queue", size), size, |b, &size| {
            b.iter(|| {
                runtime.block_on(async {
                    let broker = QueueBroker::with_capacity(size as usize);
                    let queue = QueueClient::connect(Endpoint::Memory(broker.clone()))
                        .await
                        .unwrap()
                        .queue("bench");
                    let acc = Accumulator::zeros(&[32]);
                    let processor = AccumulateProcessor::new(acc, |e: &Event| {
                        black_box(e.detector("cspad").unwrap().values().to_vec())
                    });

                    Pipeline::new(VecSource::new(events(size)), processor)
                        .sink(QueueSink::new(queue))
                        .await
                        .unwrap();
                })
            });
        });
    }

    group.finish();
}

fn bench_demand_batch_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("demand_batch_size");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for batch_size in [1usize, 10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("noop", batch_size),
            batch_size,
            |b, &batch_size| {
                b.iter(|| {
                    runtime.block_on(async {
                        Pipeline::new(VecSource::new(events(5000)), NoOpProcessor::new())
                            .demand_batch_size(black_box(batch_size))
                            .sink(CountSink::new())
                            .await
                            .unwrap();
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_accumulate, bench_demand_batch_size);
criterion_main!(benches);
