use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use propbag::{
    from_binary, from_json, from_json_with, property_bag, to_binary, to_json,
    JsonSerializationParameters, SerializedObjectReaderConfig,
};

#[derive(Clone, Default)]
struct User {
    id: u32,
    name: String,
    email: String,
    active: bool,
}
property_bag!(User { id: u32, name: String, email: String, active: bool });

#[derive(Clone, Default)]
struct Product {
    sku: String,
    name: String,
    price: f64,
    quantity: u32,
}
property_bag!(Product { sku: String, name: String, price: f64, quantity: u32 });

#[derive(Clone, Default)]
struct NestedData {
    id: u32,
    metadata: Metadata,
    tags: Vec<String>,
}
property_bag!(NestedData { id: u32, metadata: Metadata, tags: Vec<String> });

#[derive(Clone, Default)]
struct Metadata {
    created: String,
    updated: String,
    version: u32,
}
property_bag!(Metadata { created: String, updated: String, version: u32 });

fn user() -> User {
    User {
        id: 123,
        name: "Alice".to_string(),
        email: "alice@example.com".to_string(),
        active: true,
    }
}

fn products(size: u32) -> Vec<Product> {
    (0..size)
        .map(|i| Product {
            sku: format!("SKU{}", i),
            name: format!("Product {}", i),
            price: 9.99 + f64::from(i),
            quantity: i,
        })
        .collect()
}

fn nested() -> NestedData {
    NestedData {
        id: 42,
        metadata: Metadata {
            created: "2023-01-01T00:00:00Z".to_string(),
            updated: "2023-12-31T23:59:59Z".to_string(),
            version: 3,
        },
        tags: vec![
            "important".to_string(),
            "verified".to_string(),
            "production".to_string(),
        ],
    }
}

fn benchmark_simple(c: &mut Criterion) {
    let user = user();
    let json = to_json(&user).unwrap();
    let bytes = to_binary(&user).unwrap();

    c.bench_function("to_json_simple_struct", |b| {
        b.iter(|| to_json(black_box(&user)))
    });
    c.bench_function("from_json_simple_struct", |b| {
        b.iter(|| from_json::<User>(black_box(&json)))
    });
    c.bench_function("to_binary_simple_struct", |b| {
        b.iter(|| to_binary(black_box(&user)))
    });
    c.bench_function("from_binary_simple_struct", |b| {
        b.iter(|| from_binary::<User>(black_box(&bytes)))
    });
}

fn benchmark_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("product_array");

    for size in [10, 50, 100, 500].iter() {
        let products = products(*size);
        let json = to_json(&products).unwrap();
        let bytes = to_binary(&products).unwrap();

        group.bench_with_input(BenchmarkId::new("to_json", size), &products, |b, p| {
            b.iter(|| to_json(black_box(p)))
        });
        group.bench_with_input(BenchmarkId::new("from_json", size), &json, |b, json| {
            b.iter(|| from_json::<Vec<Product>>(black_box(json)))
        });
        group.bench_with_input(BenchmarkId::new("to_binary", size), &products, |b, p| {
            b.iter(|| to_binary(black_box(p)))
        });
        group.bench_with_input(BenchmarkId::new("from_binary", size), &bytes, |b, bytes| {
            b.iter(|| from_binary::<Vec<Product>>(black_box(bytes)))
        });
    }
    group.finish();
}

fn benchmark_nested(c: &mut Criterion) {
    let data = nested();
    let json = to_json(&data).unwrap();

    c.bench_function("to_json_nested_struct", |b| {
        b.iter(|| to_json(black_box(&data)))
    });
    c.bench_function("from_json_nested_struct", |b| {
        b.iter(|| from_json::<NestedData>(black_box(&json)))
    });
}

fn benchmark_block_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("reader_block_size");
    let json = to_json(&products(500)).unwrap();

    for block_size in [64, 1024, 65536].iter() {
        let params = JsonSerializationParameters::new()
            .with_reader(SerializedObjectReaderConfig::new().with_block_size(*block_size));
        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &params,
            |b, params| b.iter(|| from_json_with::<Vec<Product>>(black_box(&json), params)),
        );
    }
    group.finish();
}

fn benchmark_primitive_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitive_array");

    let numbers: Vec<i32> = (0..100).collect();
    let bools: Vec<bool> = (0..100).map(|i| i % 2 == 0).collect();
    let floats: Vec<f64> = (0..100).map(|i| i as f64 * 1.5).collect();

    group.bench_function("to_json_integers", |b| {
        b.iter(|| to_json(black_box(&numbers)))
    });
    group.bench_function("to_json_booleans", |b| b.iter(|| to_json(black_box(&bools))));
    group.bench_function("to_json_floats", |b| b.iter(|| to_json(black_box(&floats))));

    let numbers_json = to_json(&numbers).unwrap();
    let bools_json = to_json(&bools).unwrap();
    let floats_json = to_json(&floats).unwrap();

    group.bench_function("from_json_integers", |b| {
        b.iter(|| from_json::<Vec<i32>>(black_box(&numbers_json)))
    });
    group.bench_function("from_json_booleans", |b| {
        b.iter(|| from_json::<Vec<bool>>(black_box(&bools_json)))
    });
    group.bench_function("from_json_floats", |b| {
        b.iter(|| from_json::<Vec<f64>>(black_box(&floats_json)))
    });

    group.finish();
}

fn benchmark_comparison_with_serde_json(c: &mut Criterion) {
    let numbers: Vec<i64> = (0..1000).collect();
    let json = to_json(&numbers).unwrap();

    let mut group = c.benchmark_group("vs_serde_json");
    group.bench_function("propbag_from_json", |b| {
        b.iter(|| from_json::<Vec<i64>>(black_box(&json)))
    });
    group.bench_function("serde_json_from_str", |b| {
        b.iter(|| serde_json::from_str::<Vec<i64>>(black_box(&json)))
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_simple,
    benchmark_array,
    benchmark_nested,
    benchmark_block_size,
    benchmark_primitive_array,
    benchmark_comparison_with_serde_json
);
criterion_main!(benches);
