use bencher::{Fixture, generate_events};
use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use micro_req::EventStream;
use micro_req::transport::ResponseBody;
use std::hint::black_box;

fn fixtures() -> Vec<Fixture> {
    vec![
        Fixture::small("chat", include_str!("../resources/events/chat.txt")),
        Fixture::large("ticks_1k", generate_events(1_000, 64)),
    ]
}

fn benchmark_event_stream(criterion: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime should be created");
    let mut group = criterion.benchmark_group("event_stream");

    for fixture in fixtures() {
        group.throughput(Throughput::Bytes(fixture.len() as u64));
        let content = Bytes::from(fixture.content().to_owned());
        group.bench_with_input(BenchmarkId::from_parameter(fixture.name()), &content, |b, content| {
            b.iter(|| {
                runtime.block_on(async {
                    let mut stream = EventStream::new(ResponseBody::once(content.clone()));
                    let mut events = 0usize;
                    while let Ok(event) = stream.read().await {
                        black_box(&event);
                        events += 1;
                    }
                    black_box(events)
                })
            });
        });
    }

    group.finish();
}

criterion_group!(event_stream, benchmark_event_stream);
criterion_main!(event_stream);
