use criterion::{criterion_group, criterion_main, Criterion};
use natours::db::{DocumentStore, InMemoryStore};
use natours::models::Tour;
use natours::query::{Document, FindQuery, QueryFeatures};
use natours::resource::parse_model;
use natours::services::geo::{self, Unit};
use natours::services::tour_stats;
use serde_json::json;
use std::hint::black_box;

const DIFFICULTIES: [&str; 3] = ["easy", "medium", "difficult"];

/// Synthetic tours spread over the northern hemisphere.
fn tour_docs(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            json!({
                "id": format!("tour-{:05}", i),
                "name": format!("The Synthetic Tour {}", i),
                "duration": 3 + (i % 12),
                "maxGroupSize": 10 + (i % 20),
                "difficulty": DIFFICULTIES[i % 3],
                "price": 297 + (i * 37) % 2000,
                "ratingsAverage": 3.0 + (i % 20) as f64 / 10.0,
                "secretTour": i % 50 == 0,
                "startDates": [
                    format!("2021-{:02}-10T09:00:00.000Z", 1 + i % 12),
                    format!("2021-{:02}-20T09:00:00.000Z", 1 + (i + 5) % 12),
                ],
                "startLocation": {
                    "type": "Point",
                    "coordinates": [-120.0 + (i % 60) as f64, 20.0 + (i % 40) as f64],
                    "address": "Somewhere",
                    "description": "Start"
                }
            })
            .as_object()
            .cloned()
            .expect("tour fixture is an object")
        })
        .collect()
}

fn list_params() -> Vec<(String, String)> {
    [
        ("difficulty", "easy"),
        ("price[lt]", "1500"),
        ("sort", "-ratingsAverage,price"),
        ("fields", "name,price,ratingsAverage,difficulty"),
        ("page", "2"),
        ("limit", "20"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn benchmark_queries(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to build runtime");
    let store = InMemoryStore::new();
    runtime.block_on(async {
        for doc in tour_docs(2_000) {
            let id = doc["id"].as_str().expect("fixture id").to_string();
            store.put("tours", &id, &doc).await.expect("put");
        }
    });

    let mut group = c.benchmark_group("tour_queries");

    group.bench_function("parse_query_string", |b| {
        b.iter(|| {
            QueryFeatures::new(FindQuery::new(), black_box(list_params()))
                .filter()
                .map(|f| f.sort().select().paginate().into_query())
        })
    });

    let query = QueryFeatures::new(FindQuery::new(), list_params())
        .filter()
        .expect("valid query")
        .sort()
        .select()
        .paginate()
        .into_query();
    group.bench_function("memory_find_2000", |b| {
        b.iter(|| runtime.block_on(store.find("tours", black_box(&query))))
    });

    group.finish();
}

fn benchmark_aggregations(c: &mut Criterion) {
    let tours: Vec<Tour> = tour_docs(2_000)
        .into_iter()
        .map(|doc| parse_model(doc).expect("valid tour"))
        .collect();
    let center = geo::parse_lat_lng("34.111745,-118.113491").expect("valid center");

    let mut group = c.benchmark_group("tour_aggregations");

    group.bench_function("tour_stats", |b| {
        b.iter(|| tour_stats::tour_stats(black_box(&tours)))
    });

    group.bench_function("busy_month", |b| {
        b.iter(|| tour_stats::busy_month(black_box(&tours), 2021))
    });

    group.bench_function("tours_within_400mi", |b| {
        b.iter(|| geo::within(black_box(&tours), center, 400.0, Unit::Miles))
    });

    group.bench_function("distances_km", |b| {
        b.iter(|| geo::distances(black_box(&tours), center, Unit::Kilometers))
    });

    group.finish();
}

criterion_group!(benches, benchmark_queries, benchmark_aggregations);
criterion_main!(benches);
