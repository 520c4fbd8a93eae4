use authz_rules::claims::CallerIdentity;
use authz_rules::config::{CompilerConfig, ConfiguredAuthProviders};
use authz_rules::engine::{CompiledTypeAuth, TypeRules};
use authz_rules::rules::AuthRule;
use authz_rules::types::{AuthType, FieldDef, ModelOperation, TypeSchema};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

fn providers() -> Arc<ConfiguredAuthProviders> {
    Arc::new(
        ConfiguredAuthProviders::new(AuthType::UserPools)
            .with_additional(AuthType::ApiKey)
            .with_additional(AuthType::Oidc),
    )
}

fn doc_rules() -> TypeRules {
    TypeRules::new(TypeSchema::new(
        "Doc",
        vec![
            FieldDef::scalar("id"),
            FieldDef::scalar("title"),
            FieldDef::scalar("ssn"),
            FieldDef::list("editors"),
        ],
    ))
    .with_rules(vec![
        AuthRule::owner(),
        AuthRule::groups(["Admin", "Auditors"]),
        AuthRule::groups_field("editors"),
        AuthRule::public().with_operations([ModelOperation::Read]),
    ])
    .with_field_rules("ssn", vec![AuthRule::owner().with_operations([ModelOperation::Read])])
}

fn bench_compile(c: &mut Criterion) {
    let rules = doc_rules();
    let providers = providers();

    c.bench_function("compile_type", |b| {
        b.iter(|| {
            CompiledTypeAuth::compile(black_box(&rules), Arc::clone(&providers), CompilerConfig::default())
                .unwrap()
        });
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let compiled = CompiledTypeAuth::compile(&doc_rules(), providers(), CompilerConfig::default()).unwrap();

    let admin = serde_json::json!({ "username": "alice", "cognito:groups": ["Admin"] });
    let member = serde_json::json!({ "username": "bob", "cognito:groups": ["writers", "readers"] });

    let mut group = c.benchmark_group("evaluate");
    group.bench_function("static_allow", |b| {
        b.iter(|| compiled.authorize(black_box(ModelOperation::List), &CallerIdentity::user_pools(&admin)));
    });
    group.bench_function("dynamic_filter", |b| {
        b.iter(|| compiled.authorize(black_box(ModelOperation::List), &CallerIdentity::user_pools(&member)));
    });
    group.bench_function("api_key", |b| {
        b.iter(|| compiled.authorize(black_box(ModelOperation::Get), &CallerIdentity::api_key()));
    });
    group.finish();
}

fn bench_group_fanout(c: &mut Criterion) {
    let compiled = CompiledTypeAuth::compile(&doc_rules(), providers(), CompilerConfig::default()).unwrap();

    let mut group = c.benchmark_group("group_fanout");
    for count in [1usize, 5, 9, 20] {
        let groups: Vec<String> = (0..count).map(|i| format!("team-{}", i)).collect();
        let claims = serde_json::json!({ "username": "bob", "cognito:groups": groups });
        group.bench_with_input(BenchmarkId::from_parameter(count), &claims, |b, claims| {
            b.iter(|| compiled.authorize(ModelOperation::List, &CallerIdentity::user_pools(claims)));
        });
    }
    group.finish();
}

fn bench_redact(c: &mut Criterion) {
    let compiled = CompiledTypeAuth::compile(&doc_rules(), providers(), CompilerConfig::default()).unwrap();
    let caller = CallerIdentity::api_key();
    let expr = compiled.authorize(ModelOperation::Get, &caller);
    let record = serde_json::json!({ "id": "1", "title": "t", "ssn": "123", "owner": "bob", "editors": [] });

    c.bench_function("redact_record", |b| {
        b.iter(|| {
            let mut record = record.clone();
            compiled.redact_record(ModelOperation::Get, &caller, &expr, black_box(&mut record))
        });
    });
}

criterion_group!(benches, bench_compile, bench_evaluate, bench_group_fanout, bench_redact);
criterion_main!(benches);
