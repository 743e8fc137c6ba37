mod common;

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use certwarden::{
    acme::{CertificateCache, PROVIDER_NAME, upsert_certificate},
    config::Domain,
    error::ProviderError,
};
use common::MemoryStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[test]
fn test_upsert_replaces_same_domain() {
    let first = common::certificate(Domain::new("a.com"), 30);
    let second = common::certificate(Domain::new("a.com"), 60);

    let mut records = vec![first];
    assert!(upsert_certificate(&mut records, second.clone()));

    assert_eq!(records, vec![second]);
}

#[test]
fn test_upsert_appends_different_domain() {
    let mut records = vec![common::certificate(Domain::new("a.com"), 30)];

    assert!(!upsert_certificate(&mut records, common::certificate(Domain::new("b.com"), 30)));
    assert!(!upsert_certificate(
        &mut records,
        common::certificate(Domain::new("a.com").with_sans(["c.com"]), 30)
    ));

    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn test_consumer_publishes_current_certificates_on_start() {
    let store = Arc::new(MemoryStore::default());
    let cache = Arc::new(CertificateCache::new(
        store,
        vec![common::certificate(Domain::new("a.com"), 60)],
    ));

    let (tx, mut rx) = mpsc::channel(4);
    let shutdown = CancellationToken::new();
    let handle = cache.spawn(tx, shutdown.clone()).unwrap();

    let message = rx.recv().await.unwrap();
    assert_eq!(message.provider_name, PROVIDER_NAME);
    assert_eq!(message.configuration.tls.len(), 1);

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_commit_applies_persists_and_publishes() {
    let store = Arc::new(MemoryStore::default());
    let cache = Arc::new(CertificateCache::new(store.clone(), Vec::new()));

    let (tx, mut rx) = mpsc::channel(4);
    let shutdown = CancellationToken::new();
    let handle = cache.spawn(tx, shutdown.clone()).unwrap();

    // Initial, empty publication
    assert!(rx.recv().await.unwrap().configuration.tls.is_empty());

    let first = common::certificate(Domain::new("a.com"), 30);
    let second = common::certificate(Domain::new("a.com"), 60);
    cache.commit(first).await.unwrap();
    cache.commit(second.clone()).await.unwrap();

    assert_eq!(cache.certificates(), vec![second.clone()]);
    assert_eq!(store.certificates.lock().unwrap().clone(), vec![second.clone()]);
    assert_eq!(store.certificate_saves.load(Ordering::SeqCst), 2);

    rx.recv().await.unwrap();
    let latest = rx.recv().await.unwrap();
    assert_eq!(latest.configuration.tls.len(), 1);
    assert_eq!(latest.configuration.tls[0].certificate.cert, second.certificate);

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_consumer_starts_once() {
    let cache = Arc::new(CertificateCache::new(Arc::new(MemoryStore::default()), Vec::new()));
    let shutdown = CancellationToken::new();

    let (tx, _rx) = mpsc::channel(4);
    let handle = cache.spawn(tx.clone(), shutdown.clone()).unwrap();

    assert!(matches!(
        cache.spawn(tx, shutdown.clone()),
        Err(ProviderError::AlreadyStarted)
    ));

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_commit_fails_once_consumer_stopped() {
    let cache = Arc::new(CertificateCache::new(Arc::new(MemoryStore::default()), Vec::new()));
    let shutdown = CancellationToken::new();

    let (tx, _rx) = mpsc::channel(4);
    let handle = cache.spawn(tx, shutdown.clone()).unwrap();
    shutdown.cancel();
    handle.await.unwrap();

    let result = cache.commit(common::certificate(Domain::new("a.com"), 30)).await;
    assert!(matches!(result, Err(ProviderError::CacheUnavailable)));
}

#[tokio::test]
async fn test_shutdown_while_publishing_stops_consumer() {
    let cache = Arc::new(CertificateCache::new(Arc::new(MemoryStore::default()), Vec::new()));
    let shutdown = CancellationToken::new();

    // Nobody reads: the initial publication fills the channel
    let (tx, _rx) = mpsc::channel(1);
    let handle = cache.spawn(tx, shutdown.clone()).unwrap();

    let committer = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.commit(common::certificate(Domain::new("a.com"), 30)).await })
    };

    // Applied, now blocked on the full channel
    common::wait_for(|| cache.len() == 1).await;
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("consumer did not stop on shutdown")
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), committer)
        .await
        .expect("commit did not resolve after shutdown")
        .unwrap();
    assert!(matches!(result, Ok(()) | Err(ProviderError::CacheUnavailable)));
}

#[tokio::test]
async fn test_persistence_failure_is_not_fatal() {
    let store = Arc::new(MemoryStore::read_only());
    let cache = Arc::new(CertificateCache::new(store.clone(), Vec::new()));

    let (tx, mut rx) = mpsc::channel(4);
    let shutdown = CancellationToken::new();
    let handle = cache.spawn(tx, shutdown.clone()).unwrap();
    assert!(rx.recv().await.unwrap().configuration.tls.is_empty());

    let certificate = common::certificate(Domain::new("a.com"), 30);
    cache.commit(certificate.clone()).await.unwrap();

    assert_eq!(store.certificate_saves.load(Ordering::SeqCst), 1);
    assert!(store.certificates.lock().unwrap().is_empty());
    assert_eq!(cache.certificates(), vec![certificate.clone()]);

    let published = rx.recv().await.unwrap();
    assert_eq!(published.configuration.tls.len(), 1);
    assert_eq!(published.configuration.tls[0].certificate.cert, certificate.certificate);

    // The consumer keeps serving commits
    cache
        .commit(common::certificate(Domain::new("b.com"), 30))
        .await
        .unwrap();
    assert_eq!(cache.len(), 2);

    shutdown.cancel();
    handle.await.unwrap();
}

#[test]
fn test_domain_groups() {
    let cache = CertificateCache::new(
        Arc::new(MemoryStore::default()),
        vec![
            common::certificate(Domain::new("a.com").with_sans(["b.com"]), 30),
            common::certificate(Domain::new("c.com"), 30),
        ],
    );

    assert_eq!(cache.domain_groups(), vec!["a.com,b.com", "c.com"]);
    assert_eq!(cache.len(), 2);
}
