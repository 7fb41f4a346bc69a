//! Benchmark for outcome verification over large clusters

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ocs_capacity::crd::CephHealth;
use ocs_capacity::domain::snapshot::{ExpansionSnapshot, NodeRecord, PodRecord, PodSnapshot};
use ocs_capacity::expansion::OutcomeVerifier;
use std::collections::BTreeMap;

fn snapshot(
    label: &str,
    device_sets: u32,
    pods: usize,
    osds: usize,
    nodes: usize,
) -> ExpansionSnapshot {
    let mut records: Vec<PodRecord> = (0..pods)
        .map(|i| PodRecord {
            name: format!("csi-rbdplugin-{:05}", i),
            phase: "Running".into(),
            restart_count: 0,
        })
        .collect();
    records.extend((0..osds).map(|i| PodRecord {
        name: format!("rook-ceph-osd-{}-7d9f8c6b5-x{:03}", i, i),
        phase: "Running".into(),
        restart_count: 0,
    }));

    ExpansionSnapshot {
        device_set_count: device_sets,
        replica: 3,
        storage_class: Some("gp2".into()),
        pods: PodSnapshot {
            label: label.into(),
            taken_at: Utc::now(),
            pods: records,
        },
        nodes: (0..nodes)
            .map(|i| NodeRecord {
                name: format!("worker-{}", i),
                ready: true,
                control_plane: false,
                zone: Some(format!("zone-{}", i % 3)),
                labels: BTreeMap::new(),
                taint_keys: vec![],
            })
            .collect(),
        ceph_health: Some(CephHealth::Ok),
    }
}

fn bench_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("verifier");
    let verifier = OutcomeVerifier::default();

    for pods in [100usize, 1_000, 10_000] {
        let before = snapshot("before", 1, pods, 3, 50);
        let after = snapshot("after", 2, pods, 6, 50);
        group.throughput(Throughput::Elements(pods as u64));
        group.bench_with_input(BenchmarkId::new("verify", pods), &pods, |b, _| {
            b.iter(|| verifier.verify(black_box(&before), black_box(&after), Some("gp2")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_verify);
criterion_main!(benches);
