//! Criterion benchmarks for settings-core.
//!
//! ## Benchmark groups
//!
//! 1. **ownership_index**: building the path and directory indexes.
//! 2. **resolve_team**: the exact / prefix / directory cascade per path.
//! 3. **resolver_run**: discovery plus a full resolver run on a temp tree.
//! 4. **classify_usage**: joining the all / unused result sets.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/settings-core/Cargo.toml -- resolve_team
//! ```

use std::fs;
use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use settings_core::models::{OwnershipManifest, Team, UnusedSettingRow, WarehouseSettingRow};
use settings_core::ownership::discovery::discover_setting_files;
use settings_core::ownership::index::{DirectoryOwnershipIndex, PathOwnershipIndex};
use settings_core::ownership::resolver::{OwnershipResolver, ResolutionStrategy};
use settings_core::usage::classify_usage;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `teams` teams, each owning one settings directory and one explicit file.
fn synthetic_manifest(teams: usize) -> OwnershipManifest {
    OwnershipManifest::new(
        (0..teams)
            .map(|t| {
                Team::new(
                    format!("Team{t}"),
                    vec![
                        format!("api/svc{t}/model_settings/"),
                        format!("lib/shared{t}/model_settings/special.py"),
                    ],
                )
            })
            .collect(),
    )
}

fn populate_tree(root: &Path, teams: usize, files_per_team: usize) {
    for t in 0..teams {
        let dir = root.join(format!("api/svc{t}/model_settings"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("__init__.py"), "").unwrap();
        for f in 0..files_per_team {
            fs::write(
                dir.join(format!("flag_{f}.py")),
                format!("FLAG = ModelSetting(name=\"svc{t}_flag_{f}\", default=False)\n"),
            )
            .unwrap();
        }
    }
}

fn settings_rows(n: usize) -> (Vec<WarehouseSettingRow>, Vec<UnusedSettingRow>) {
    let all = (0..n)
        .map(|i| WarehouseSettingRow {
            name: format!("setting_{i}"),
            description: String::new(),
            created_date: "2023-01-01".to_string(),
        })
        .collect();
    let unused = (0..n)
        .step_by(3)
        .map(|i| UnusedSettingRow {
            name: format!("setting_{i}"),
        })
        .collect();
    (all, unused)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_ownership_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("ownership_index");
    for &teams in &[10usize, 100, 1000] {
        let manifest = synthetic_manifest(teams);
        group.bench_with_input(BenchmarkId::new("build", teams), &manifest, |b, m| {
            b.iter(|| {
                let index = PathOwnershipIndex::build(black_box(m));
                black_box(DirectoryOwnershipIndex::build(&index, "model_settings"));
            });
        });
    }
    group.finish();
}

fn bench_resolve_team(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_team");
    let manifest = synthetic_manifest(200);
    let paths = [
        ("exact", "lib/shared150/model_settings/special.py"),
        ("prefix", "api/svc150/model_settings/flag_1.py"),
        ("unmatched", "api/orphan/model_settings/flag_1.py"),
    ];
    for strategy in [ResolutionStrategy::ManifestOrder, ResolutionStrategy::LongestPrefix] {
        let resolver = OwnershipResolver::new(&manifest, "model_settings").with_strategy(strategy);
        for (label, path) in paths {
            group.bench_function(format!("{}/{label}", strategy.as_str()), |b| {
                b.iter(|| black_box(resolver.resolve_team(black_box(path))));
            });
        }
    }
    group.finish();
}

fn bench_resolver_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolver_run");
    group.sample_size(20);
    let dir = tempfile::tempdir().unwrap();
    populate_tree(dir.path(), 20, 25);
    let manifest = synthetic_manifest(20);

    for &workers in &[1usize, 4] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &w| {
            let resolver = OwnershipResolver::new(&manifest, "model_settings").with_workers(w);
            b.iter(|| {
                let files = discover_setting_files(dir.path(), "model_settings", &[]);
                black_box(resolver.run(&files, dir.path()));
            });
        });
    }
    group.finish();
}

fn bench_classify_usage(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_usage");
    for &n in &[100usize, 1_000, 10_000] {
        let (all, unused) = settings_rows(n);
        group.bench_with_input(BenchmarkId::new("join", n), &n, |b, _| {
            b.iter(|| black_box(classify_usage(black_box(&all), black_box(&unused))));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_ownership_index,
    bench_resolve_team,
    bench_resolver_run,
    bench_classify_usage,
);
criterion_main!(benches);
