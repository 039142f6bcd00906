//! Benchmarks for packet encoding and decoding.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use evpkt_core::{AnyEventPacket, PolarityPacket};

const EVENTS: i32 = 100_000;

fn filled_packet() -> PolarityPacket {
    let mut packet = PolarityPacket::allocate(EVENTS, 1, 0).unwrap();
    for i in 0..EVENTS {
        let mut event = packet.get_event_mut(i).unwrap();
        event.set_x((i % 640) as u16);
        event.set_y((i % 480) as u16);
        event.set_polarity(i % 2 == 0);
        event.set_timestamp(i).unwrap();
        event.validate().unwrap();
    }
    packet
}

fn fill_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill");
    group.throughput(Throughput::Elements(EVENTS as u64));

    group.bench_function("polarity_100k_events", |b| {
        b.iter(|| black_box(filled_packet().event_valid()))
    });

    group.finish();
}

fn read_benchmark(c: &mut Criterion) {
    let packet = filled_packet();
    let bytes = packet.as_bytes().to_vec();

    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Elements(EVENTS as u64));

    group.bench_function("iter_valid_timestamp64", |b| {
        b.iter(|| {
            let sum: i64 = black_box(&packet)
                .iter_valid()
                .map(|event| event.timestamp64() + event.x() as i64)
                .sum();
            black_box(sum)
        })
    });

    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("from_bytes", |b| {
        b.iter(|| {
            let packet = AnyEventPacket::from_bytes(black_box(bytes.clone())).unwrap();
            black_box(packet.header().event_valid())
        })
    });

    group.finish();
}

criterion_group!(benches, fill_benchmark, read_benchmark);
criterion_main!(benches);
