//! Verification throughput benchmarks
//!
//! Measures:
//! - Token parsing alone
//! - Full verification with a warm key cache (no network)
//! - Rejection of a tampered signature with a warm key cache

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use id_token_verifier::keys::{CertificateFetcher, CertificateSet};
use id_token_verifier::token::ParsedToken;
use id_token_verifier::{Config, TokenVerificationService, VerifyError};
use std::sync::Arc;
use tokio::runtime::Runtime;
use verifier_test_utils::{
    default_certificates, tamper_signature, TestTokenBuilder, TEST_ISSUER_BASE,
};

/// Serves the test certificates from memory.
struct InMemoryFetcher;

#[async_trait]
impl CertificateFetcher for InMemoryFetcher {
    async fn fetch_certificates(&self) -> Result<CertificateSet, VerifyError> {
        Ok(CertificateSet {
            certificates: default_certificates()
                .into_iter()
                .map(|(kid, pem)| (kid.to_string(), pem.to_string()))
                .collect(),
            max_age: None,
        })
    }
}

fn warm_service(rt: &Runtime) -> TokenVerificationService {
    let config = Config::new("proj-x").with_issuer_base(TEST_ISSUER_BASE);
    let service = TokenVerificationService::with_fetcher(&config, Arc::new(InMemoryFetcher))
        .expect("bench config should be valid");
    rt.block_on(service.key_source().force_refresh())
        .expect("in-memory fetch should succeed");
    service
}

fn bench_parse(c: &mut Criterion) {
    let token = TestTokenBuilder::new("proj-x").sign_with_key_1();

    c.bench_function("parse_token", |b| {
        b.iter(|| ParsedToken::parse(black_box(&token)).unwrap());
    });
}

fn bench_verify_warm_cache(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let service = warm_service(&rt);
    let token = TestTokenBuilder::new("proj-x")
        .for_subject("bench-user")
        .sign_with_key_1();

    c.bench_function("verify_warm_cache", |b| {
        b.iter(|| rt.block_on(service.verify(black_box(&token))).unwrap());
    });
}

fn bench_reject_tampered(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let service = warm_service(&rt);
    let token = tamper_signature(&TestTokenBuilder::new("proj-x").sign_with_key_1());

    c.bench_function("reject_tampered_signature", |b| {
        b.iter(|| {
            rt.block_on(service.verify(black_box(&token)))
                .unwrap_err()
        });
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_verify_warm_cache,
    bench_reject_tampered
);
criterion_main!(benches);
