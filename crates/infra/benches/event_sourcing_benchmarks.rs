use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use tokio::runtime::Runtime;
use uuid::Uuid;

use warden_core::{AggregateId, AggregateRef, UuidV7Generator};
use warden_events::CommandContext;
use warden_idp::events::IdpConfigChanged;
use warden_idp::{
    AddIdpConfig, AddOidcConfig, AddUserExternalIdp, ChangeIdpConfig, IdpConfigEvent, IdpConfigType,
    IdpConfigWriteModel, IdpStylingType, OidcMappingField, RemoveIdpConfig, IDP_CONFIG_AGGREGATE_TYPE,
};
use warden_infra::event_store::{filter_to_reducer, AppendBatch, EventStore, InMemoryEventStore, UncommittedEvent};
use warden_infra::{CommandSide, Sha256SecretHasher};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread().build().unwrap()
}

fn ctx() -> CommandContext {
    CommandContext::new("bench".into(), "org-bench".into())
}

fn command_side() -> CommandSide<Arc<InMemoryEventStore>> {
    CommandSide::new(
        Arc::new(InMemoryEventStore::new()),
        Arc::new(UuidV7Generator),
        Arc::new(Sha256SecretHasher::default()),
    )
}

fn add_cmd() -> AddIdpConfig {
    AddIdpConfig {
        name: "corp-oidc".to_string(),
        idp_type: IdpConfigType::Oidc,
        styling_type: IdpStylingType::Unspecified,
        oidc_config: Some(AddOidcConfig {
            client_id: "abc".to_string(),
            client_secret: "s3cr3t".to_string(),
            issuer: "https://idp.example.com".to_string(),
            scopes: vec!["openid".to_string()],
            idp_display_name_mapping: OidcMappingField::PreferredUsername,
            username_mapping: OidcMappingField::Email,
        }),
    }
}

fn rename_event(id: &AggregateId, i: usize) -> UncommittedEvent {
    let aggregate = AggregateRef::new(IDP_CONFIG_AGGREGATE_TYPE, id.clone(), "org-bench".into());
    let event = IdpConfigEvent::Changed(IdpConfigChanged {
        idp_config_id: id.clone(),
        name: Some(format!("corp-oidc-{i}")),
        styling_type: None,
    });
    UncommittedEvent::from_typed(&ctx(), &aggregate, &event).unwrap()
}

/// One config whose stream holds `history` rename events after creation.
fn seeded(rt: &Runtime, history: usize) -> (CommandSide<Arc<InMemoryEventStore>>, AggregateId) {
    let commands = command_side();
    let id = rt.block_on(commands.add_idp_config(&ctx(), add_cmd())).unwrap().idp_config_id;
    for chunk in (0..history).collect::<Vec<_>>().chunks(100) {
        let mut batch = AppendBatch::new();
        for i in chunk {
            batch.push(rename_event(&id, *i));
        }
        rt.block_on(commands.store().push(batch)).unwrap();
    }
    (commands, id)
}

fn bench_command_latency(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("command_latency");

    group.bench_function("add_idp_config", |b| {
        let commands = command_side();
        b.iter(|| black_box(rt.block_on(commands.add_idp_config(&ctx(), add_cmd())).unwrap()));
    });

    for history in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("change_idp_config", history), &history, |b, &history| {
            let (commands, id) = seeded(&rt, history);
            let mut n = 0u64;
            b.iter(|| {
                n += 1;
                let cmd = ChangeIdpConfig {
                    idp_config_id: id.clone(),
                    name: format!("renamed-{n}"),
                    styling_type: IdpStylingType::Unspecified,
                };
                black_box(rt.block_on(commands.change_idp_config(&ctx(), cmd)).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("event_append_throughput");

    for batch_size in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::new("batch_append", batch_size), &batch_size, |b, &size| {
            let store = InMemoryEventStore::new();
            b.iter(|| {
                let id = AggregateId::from(Uuid::now_v7().to_string());
                let mut batch = AppendBatch::new();
                for i in 0..size {
                    batch.push(rename_event(&id, i));
                }
                black_box(rt.block_on(store.push(batch)).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_write_model_hydration(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("write_model_hydration");

    for history in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(history as u64 + 2));
        group.bench_with_input(BenchmarkId::new("filter_to_reducer", history), &history, |b, &history| {
            let (commands, id) = seeded(&rt, history);
            b.iter(|| {
                let mut model = IdpConfigWriteModel::new(id.clone(), "org-bench".into());
                rt.block_on(filter_to_reducer(commands.store(), &mut model)).unwrap();
                black_box(model)
            });
        });
    }

    group.finish();
}

fn bench_cascade_removal(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("cascade_removal");
    group.sample_size(20);

    for users in [10usize, 100] {
        group.bench_with_input(BenchmarkId::new("remove_idp_config", users), &users, |b, &users| {
            b.iter_batched(
                || {
                    let (commands, id) = seeded(&rt, 0);
                    rt.block_on(commands.add_idp_to_login_policy(&ctx(), &id)).unwrap();
                    for u in 0..users {
                        let link = AddUserExternalIdp {
                            user_id: format!("user-{u}").into(),
                            idp_config_id: id.clone(),
                            external_user_id: format!("ext-{u}"),
                            display_name: format!("User {u}"),
                        };
                        rt.block_on(commands.add_user_external_idp(&ctx(), link)).unwrap();
                    }
                    rt.block_on(commands.deactivate_idp_config(&ctx(), &id)).unwrap();
                    (commands, id)
                },
                |(commands, id)| {
                    let cmd = RemoveIdpConfig {
                        idp_config_id: id,
                        cascade_remove_providers: true,
                    };
                    rt.block_on(commands.remove_idp_config(&ctx(), cmd)).unwrap()
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_command_latency,
    bench_event_append_throughput,
    bench_write_model_hydration,
    bench_cascade_removal
);
criterion_main!(benches);
