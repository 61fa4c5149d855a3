use criterion::{black_box, criterion_group, criterion_main, Criterion};
use levelkv_doc::MapDocument;
use serde_json::{json, Map, Value};

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn sample_document() -> MapDocument {
    let mut doc = MapDocument::new();
    for i in 0..100 {
        doc.set(&format!("users.u{i}.name"), json!(format!("user-{i}")));
        doc.set(&format!("users.u{i}.visits"), json!(i));
    }
    doc
}

fn bench_rich_set(c: &mut Criterion) {
    let mut doc = sample_document();
    let update = object(json!({
        "$del": ["users.u42.tags"],
        "$inc": {"users.u42.visits": 1},
        "$rpush": {"users.u42.tags": ["x"]},
        "$set": {"users.u42.name": "renamed"},
    }));

    c.bench_function("doc_rich_set_three_ops", |b| {
        b.iter(|| {
            doc.rich_set(black_box(update.clone())).unwrap();
        })
    });
}

fn bench_rich_get(c: &mut Criterion) {
    let doc = sample_document();

    c.bench_function("doc_rich_get_two_paths", |b| {
        b.iter(|| {
            black_box(doc.rich_get(black_box(&["users.u10.name", "users.u99"])));
        })
    });
}

fn bench_encode_decode(c: &mut Criterion) {
    let doc = sample_document();
    let bytes = doc.to_vec().unwrap();

    c.bench_function("doc_decode_100_users", |b| {
        b.iter(|| {
            black_box(MapDocument::from_slice(black_box(&bytes)).unwrap());
        })
    });
}

criterion_group!(benches, bench_rich_set, bench_rich_get, bench_encode_decode);
criterion_main!(benches);
