use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::{debug, error, info};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    dynamic::{ConfigMessage, DynamicConfiguration, TlsCertificate, TlsConfiguration},
    error::ProviderError,
};

use super::{Certificate, Store};

/// Name the provider publishes its configuration under
pub const PROVIDER_NAME: &str = "acme";

struct CacheUpdate {
    certificate: Certificate,
    applied: oneshot::Sender<()>,
}

/// The certificates known to the provider.
///
/// Readers take snapshots; every mutation goes through a single consumer task
/// started with [`CertificateCache::spawn`], which persists the full list and
/// publishes a fresh configuration after each change.
pub struct CertificateCache {
    records: RwLock<Vec<Certificate>>,
    store: Arc<dyn Store>,
    updates: mpsc::UnboundedSender<CacheUpdate>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<CacheUpdate>>>,
}

impl CertificateCache {
    pub fn new(store: Arc<dyn Store>, records: Vec<Certificate>) -> Self {
        let (updates, receiver) = mpsc::unbounded_channel();

        Self {
            records: RwLock::new(records),
            store,
            updates,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// A snapshot of the cached certificates
    pub fn certificates(&self) -> Vec<Certificate> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The comma-joined domain group of every cached certificate
    pub fn domain_groups(&self) -> Vec<String> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|cert| cert.domain.group())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queues a certificate and waits until the consumer has applied it
    pub async fn commit(&self, certificate: Certificate) -> Result<(), ProviderError> {
        let (applied, done) = oneshot::channel();

        self.updates
            .send(CacheUpdate {
                certificate,
                applied,
            })
            .map_err(|_| ProviderError::CacheUnavailable)?;

        done.await.map_err(|_| ProviderError::CacheUnavailable)
    }

    /// The configuration message describing the current certificates
    pub fn configuration_message(&self) -> ConfigMessage {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);

        let tls = records
            .iter()
            .map(|cert| TlsConfiguration {
                certificate: TlsCertificate {
                    cert: cert.certificate.clone(),
                    key: cert.key.clone(),
                },
            })
            .collect();

        ConfigMessage {
            provider_name: PROVIDER_NAME.to_string(),
            configuration: DynamicConfiguration { tls },
        }
    }

    /// Starts the consumer task; the current certificates are published first
    pub fn spawn(
        self: &Arc<Self>,
        publisher: mpsc::Sender<ConfigMessage>,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>, ProviderError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ProviderError::AlreadyStarted)?;

        let cache = Arc::clone(self);
        Ok(tokio::spawn(async move {
            cache.run(receiver, publisher, shutdown).await;
        }))
    }

    async fn run(
        &self,
        mut receiver: mpsc::UnboundedReceiver<CacheUpdate>,
        publisher: mpsc::Sender<ConfigMessage>,
        shutdown: CancellationToken,
    ) {
        if !self.publish(&publisher, &shutdown).await {
            return;
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Shutdown signal received, stopping the certificate cache");
                    break;
                }

                update = receiver.recv() => {
                    let Some(update) = update else {
                        break;
                    };

                    self.apply(update.certificate);
                    self.persist();
                    let published = self.publish(&publisher, &shutdown).await;

                    // The resolver may have given up waiting
                    let _ = update.applied.send(());

                    if !published {
                        break;
                    }
                }
            }
        }
    }

    fn apply(&self, certificate: Certificate) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let domain = certificate.domain.clone();

        if upsert_certificate(&mut records, certificate) {
            info!("Updated the certificate for domains {domain}");
        } else {
            info!("Added a certificate for domains {domain}");
        }
    }

    fn persist(&self) {
        let snapshot = self.certificates();
        if let Err(e) = self.store.save_certificates(&snapshot) {
            error!("Unable to persist ACME certificates: {e}");
        }
    }

    /// Sends the current configuration; returns false when shutdown won the race
    async fn publish(&self, publisher: &mpsc::Sender<ConfigMessage>, shutdown: &CancellationToken) -> bool {
        let message = self.configuration_message();
        debug!(
            "Publishing {} ACME certificate(s)",
            message.configuration.tls.len()
        );

        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Shutdown signal received while publishing ACME certificates");
                false
            }

            sent = publisher.send(message) => {
                if sent.is_err() {
                    error!("Unable to publish ACME certificates: the configuration channel is closed");
                }
                true
            }
        }
    }
}

/// Replaces the key pair of the record with the same domain, or appends a new record.
///
/// Returns whether an existing record was updated.
pub fn upsert_certificate(records: &mut Vec<Certificate>, certificate: Certificate) -> bool {
    match records.iter_mut().find(|record| record.domain == certificate.domain) {
        Some(record) => {
            record.certificate = certificate.certificate;
            record.key = certificate.key;
            true
        }
        None => {
            records.push(certificate);
            false
        }
    }
}
