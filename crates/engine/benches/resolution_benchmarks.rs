//! Benchmarks for resolution and bulk rebuild
//!
//! These benchmarks measure the hot paths of hookwarden:
//! - Scope resolution for one repository
//! - Record key formatting and parsing
//! - A full rebuild over in-memory stores

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use hookwarden_config::TriggerSettings;
use hookwarden_core::{
    GlobalPolicy, GlobalPolicySource, HookConfig, HookKind, PersonalRepoFilter, Scope,
};
use hookwarden_engine::{
    Coordinator, Host, LocalPrivilege, MemoryArtifactStore, MemoryHost, MockPersistentState,
    RecordKey, Rebuilder, Resolver, StaticEnvironment,
};
use std::hint::black_box;

/// Host with `projects` projects of `repos` repositories each
fn create_host(projects: u64, repos: u64) -> MemoryHost {
    let host = MemoryHost::new();
    for p in 0..projects {
        let project = host.add_project(p, &format!("P{p}"));
        if p % 2 == 0 {
            host.enable(
                &Scope::Project(project.clone()),
                HookKind::PreReceive,
                HookConfig::new("/usr/local/bin/project-check"),
            );
        }
        for r in 0..repos {
            let repo = host.add_repository(&project, p * 1000 + r, &format!("repo-{r}"));
            if r % 5 == 0 {
                host.enable(
                    &Scope::Repository(repo),
                    HookKind::PreReceive,
                    HookConfig::new("/usr/local/bin/repo-check"),
                );
            }
        }
    }
    host.set_policy(GlobalPolicy {
        hook: HookKind::PreReceive,
        enabled: true,
        config: HookConfig::new("/usr/local/bin/global-check"),
        filter: PersonalRepoFilter::ApplyToAll,
    });
    host
}

fn bench_resolve(c: &mut Criterion) {
    let host = create_host(10, 10);
    let policies = host.snapshot().expect("snapshot");
    let repos = host.repositories();
    let resolver = Resolver::new(&host);

    c.bench_function("resolve_all_repositories", |b| {
        b.iter(|| {
            for repo in &repos {
                let resolved = resolver
                    .resolve(HookKind::PreReceive, black_box(repo), &policies)
                    .expect("resolve");
                black_box(resolved);
            }
        });
    });
}

fn bench_record_keys(c: &mut Criterion) {
    let host = create_host(1, 1);
    let repo = host.repositories().remove(0);
    let key = RecordKey::new(HookKind::PostReceive, &Scope::Project(repo.project.clone()), &repo);
    let text = key.to_string();

    c.bench_function("record_key_format", |b| {
        b.iter(|| black_box(black_box(&key).to_string()));
    });
    c.bench_function("record_key_parse", |b| {
        b.iter(|| black_box(black_box(text.as_str()).parse::<RecordKey>().expect("parse")));
    });
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");

    for size in &[5u64, 20, 50] {
        let host = create_host(*size, 10);
        let environment = StaticEnvironment::new("/srv/home");
        let privilege = LocalPrivilege::new(true);
        let triggers = TriggerSettings::default();

        group.bench_with_input(BenchmarkId::from_parameter(size), &host, |b, host| {
            b.iter(|| {
                let db = MockPersistentState::new();
                let artifacts = MemoryArtifactStore::new();
                let coordinator = Coordinator::new(
                    Host {
                        configs: host,
                        policies: host,
                        inventory: host,
                        artifacts: &artifacts,
                        privilege: &privilege,
                        environment: &environment,
                    },
                    &db,
                    &triggers,
                );
                let (progress, report) = Rebuilder::new(&coordinator, &db)
                    .run(&mut |_| {})
                    .expect("rebuild");
                black_box((progress, report))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_record_keys, bench_rebuild);
criterion_main!(benches);
