use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ring_buffer::{RingBuffer, SharedRingBuffer};

fn bench_add_remove(c: &mut Criterion) {
    c.bench_function("add_remove", |b| {
        let mut buffer = RingBuffer::new(256);
        b.iter(|| {
            buffer.add(black_box([0i32; 64])).ok();
            black_box(buffer.remove().ok());
        })
    });
}

fn bench_overwrite(c: &mut Criterion) {
    c.bench_function("add_overwrite_full", |b| {
        let mut buffer = RingBuffer::with_overwrite(64, true);
        for _ in 0..64 {
            buffer.add([0i32; 64]).ok();
        }
        b.iter(|| black_box(buffer.add(black_box([1i32; 64])).ok()))
    });
}

fn bench_shared(c: &mut Criterion) {
    c.bench_function("shared_add_remove", |b| {
        let buffer = SharedRingBuffer::new(256, true);
        b.iter(|| {
            buffer.add(black_box(42u64)).ok();
            black_box(buffer.remove().ok());
        })
    });
}

criterion_group!(benches, bench_add_remove, bench_overwrite, bench_shared);
criterion_main!(benches);
