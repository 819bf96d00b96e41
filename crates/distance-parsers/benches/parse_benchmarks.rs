//! Lazy open versus full materialization of a generated level

use std::hint::black_box;
use std::io::Cursor;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use distance_parsers::{DstFormat, DstWriter, Layer, Level, ReadOptions, Registry};

fn level_bytes(registry: &Arc<Registry>, objects: usize) -> Vec<u8> {
    let mut level = Level::new(registry.clone(), "Bench").expect("level");
    let layer = level.add_layer(Layer::new("Main"));
    for _ in 0..objects {
        layer.objects_mut().push(registry.create_object("CubeGS").expect("cube"));
    }
    let mut w = DstWriter::new(Cursor::new(Vec::new()));
    level.write_to(&mut w).expect("write");
    w.into_inner().into_inner()
}

fn bench_open(c: &mut Criterion) {
    let registry = Arc::new(Registry::eager().expect("registry"));
    let bytes = level_bytes(&registry, 5000);
    let options = ReadOptions::default();

    c.bench_function("level_open_lazy_5000", |b| {
        b.iter(|| {
            let level = Level::from_bytes_with(bytes.clone(), registry.clone(), &options).expect("open");
            black_box(level.layer_count())
        })
    });

    c.bench_function("level_open_materialize_5000", |b| {
        b.iter(|| {
            let level = Level::from_bytes_with(bytes.clone(), registry.clone(), &options).expect("open");
            level.materialize_all();
            black_box(level.check_exceptions().is_ok())
        })
    });

    c.bench_function("level_roundtrip_5000", |b| {
        b.iter(|| {
            let level = Level::from_bytes_with(bytes.clone(), registry.clone(), &options).expect("open");
            black_box(level.to_bytes().expect("write").len())
        })
    });
}

fn bench_registry(c: &mut Criterion) {
    c.bench_function("registry_eager", |b| b.iter(|| black_box(Registry::eager().expect("registry"))));

    let manifest = Registry::eager().expect("registry").export_manifest();
    c.bench_function("registry_from_manifest", |b| {
        b.iter(|| black_box(Registry::from_manifest(manifest.clone()).expect("registry")))
    });
}

criterion_group!(benches, bench_open, bench_registry);
criterion_main!(benches);
