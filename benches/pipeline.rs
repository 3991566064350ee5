//! Micro-benchmarks for the hot paths: digest streaming and policy
//! evaluation.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use mcpshield_lib::core::digest::{Algorithm, compute};
use mcpshield_lib::core::security::policy::{
    EvalContext, GlobalPolicy, Policy, evaluate_add, glob_match,
};
use mcpshield_lib::core::types::{Finding, Severity};

fn bench_digest(c: &mut Criterion) {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let path = tmp.path().join("artifact");
    std::fs::write(&path, vec![0xabu8; 4 * 1024 * 1024]).expect("fixture");

    c.bench_function("digest_sha256_4mib", |b| {
        b.iter(|| compute(black_box(&path), Algorithm::Sha256).unwrap());
    });
    c.bench_function("digest_sha512_4mib", |b| {
        b.iter(|| compute(black_box(&path), Algorithm::Sha512).unwrap());
    });
}

fn bench_policy(c: &mut Criterion) {
    let findings: Vec<Finding> = (0..32)
        .map(|i| {
            Finding::new(
                "CODE_ENV_ACCESS",
                Severity::Low,
                "code",
                format!("file{i}.js: environment variable access"),
            )
        })
        .collect();
    let policy = Policy {
        version: "1.0".into(),
        global: Some(GlobalPolicy {
            allow_namespaces: vec!["io.github.good/*".into()],
            deny_namespaces: vec!["io.github.banned.*".into(), "*.evil/*".into()],
            max_risk_score: Some(50),
            block_severities: vec![Severity::Critical],
            ..GlobalPolicy::default()
        }),
        servers: None,
    };

    c.bench_function("evaluate_add_32_findings", |b| {
        b.iter(|| {
            evaluate_add(
                &EvalContext {
                    namespace: black_box("io.github.good/tool"),
                    verified: true,
                    risk_score: 42,
                    findings: &findings,
                },
                Some(&policy),
            )
        });
    });

    c.bench_function("glob_match", |b| {
        b.iter(|| glob_match(black_box("io.github.*.tools/*"), black_box("io.github.acme.tools/x")));
    });
}

criterion_group!(benches, bench_digest, bench_policy);
criterion_main!(benches);
