//! # Secure-Bus Benchmarks
//!
//! Hot paths of the middleware:
//!
//! - AES-256-GCM seal/open through `MessageEncryptor` at several payload sizes
//! - Token validation, cold (signature check) versus cached (fingerprint lookup)
//! - Authorization decision over a validated token

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sb_01_message_encryption::{InMemoryKeyProvider, MessageEncryptor, PayloadCipher};
use sb_02_token_auth::{AuthorizationEngine, Authorizer, ClaimsValidator, TokenAuthenticator};
use sb_tests::support::{auth_config, authz_config, token, ORDERS};
use shared_bus::CancellationToken;
use shared_crypto::SecretKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

fn bench_encryption(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let provider = InMemoryKeyProvider::new("v1", SecretKey::generate()).expect("provider");
    let encryptor = MessageEncryptor::new(Arc::new(provider));
    let cancel = CancellationToken::new();

    let mut group = c.benchmark_group("encryption");
    for size in [64usize, 1024, 16 * 1024, 256 * 1024] {
        let payload = vec![0x5Au8; size];
        let sealed = rt
            .block_on(encryptor.encrypt(&payload, &cancel))
            .expect("encrypt");

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encrypt", size), &payload, |b, p| {
            b.iter(|| rt.block_on(encryptor.encrypt(black_box(p), &cancel)))
        });
        group.bench_with_input(BenchmarkId::new("decrypt", size), &sealed, |b, s| {
            b.iter(|| rt.block_on(encryptor.decrypt(black_box(s), "v1", &cancel)))
        });
    }
    group.finish();
}

fn bench_token_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_validation");

    let cached = ClaimsValidator::new(&auth_config()).expect("validator");
    let mut uncached_config = auth_config();
    uncached_config.cache_ttl = Duration::ZERO;
    let uncached = ClaimsValidator::new(&uncached_config).expect("validator");

    let admin = token("svc-admin", &["admin"], 3600);
    group.bench_function("cold", |b| {
        b.iter(|| uncached.validate_token(black_box(&admin)))
    });
    group.bench_function("cached", |b| {
        b.iter(|| cached.validate_token(black_box(&admin)))
    });
    group.finish();

    let validator: Arc<dyn TokenAuthenticator> = Arc::new(cached);
    let engine = AuthorizationEngine::new(validator, authz_config());
    let publisher = token("svc-orders", &["publisher"], 3600);
    c.bench_function("authorize_topic", |b| {
        b.iter(|| engine.authorize_topic(black_box(&publisher), "publish", Some(ORDERS)))
    });
}

criterion_group!(benches, bench_encryption, bench_token_validation);
criterion_main!(benches);
