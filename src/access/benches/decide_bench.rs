//! Decision and menu benchmarks

use casebook_access::{
    EngineConfig, GrantRow, InMemoryGrantSource, MenuDeriver, ResolutionEngine, ResourceNode, ResourcePath,
    RoleClassPolicy, RoleClassPolicyTable, Subject,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn engine_with_grants(grants_per_subject: usize) -> ResolutionEngine {
    let table = RoleClassPolicyTable::new(
        vec![ResourcePath::new("/logout").unwrap()],
        vec![
            RoleClassPolicy::full_bypass("director"),
            RoleClassPolicy::allow_list(
                "accountant",
                vec![ResourcePath::new("/payments").unwrap(), ResourcePath::new("/reports/loans").unwrap()],
            ),
            RoleClassPolicy::standard("caseworker"),
        ],
    )
    .unwrap();

    let rows = (0..grants_per_subject).map(|i| {
        GrantRow::new(
            "cw-1",
            format!("/area{}/section{}", i % 10, i),
            if i % 3 == 0 { Some("edit") } else { None },
            json!(if i % 4 == 0 { "No" } else { "Yes" }),
        )
    });

    ResolutionEngine::with_config(
        table,
        Arc::new(InMemoryGrantSource::with_rows(rows)),
        EngineConfig {
            enable_metrics: false,
            ..Default::default()
        },
    )
}

// ============================================================================
// DECISION LATENCY BENCHMARKS
// ============================================================================

fn bench_bypass_decisions(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let engine = engine_with_grants(0);
    let director = Subject::new("d-1", "director");
    let accountant = Subject::new("acc-1", "accountant");

    c.bench_function("decide_full_bypass", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(engine.decide(&director, "/families/42/notes", None).await) });
    });

    c.bench_function("decide_allow_list", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(engine.decide(&accountant, "/reports/loans/2024", None).await) });
    });
}

fn bench_grant_decisions(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("decide_cached_grants");
    let subject = Subject::new("cw-1", "caseworker");

    for grants in [10, 100, 1000] {
        let engine = engine_with_grants(grants);
        // Warm the cache
        rt.block_on(engine.decide(&subject, "/area1/section1", None));

        group.bench_with_input(BenchmarkId::from_parameter(grants), &grants, |b, _| {
            b.to_async(&rt)
                .iter(|| async { black_box(engine.decide(&subject, "/area3/section3/detail", Some("edit")).await) });
        });
    }

    group.finish();
}

// ============================================================================
// MENU BENCHMARKS
// ============================================================================

fn bench_menu_derivation(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let engine = Arc::new(engine_with_grants(200));
    let deriver = MenuDeriver::new(engine);
    let subject = Subject::new("cw-1", "caseworker");

    let catalog = ResourceNode::group(
        "root",
        (0..10)
            .map(|area| {
                ResourceNode::section(
                    format!("/area{}", area),
                    format!("Area {}", area),
                    (0..20)
                        .map(|s| ResourceNode::leaf(format!("/area{}/section{}", area, s), format!("Section {}", s)))
                        .collect(),
                )
            })
            .collect(),
    );

    let mut group = c.benchmark_group("menu");
    group.throughput(Throughput::Elements(catalog.paths().len() as u64));
    group.bench_function("derive_menu_210_nodes", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(deriver.derive_menu(&subject, &catalog).await) });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_bypass_decisions,
    bench_grant_decisions,
    bench_menu_derivation
);
criterion_main!(benches);
