use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{config::Renewal, tls};

use super::{Certificate, Provider};

/// Whether a cached certificate should be renewed at `now`.
///
/// Records whose key pair cannot be parsed, or whose key does not belong to
/// the certificate, are always renewed.
pub fn needs_renewal(certificate: &Certificate, now: DateTime<Utc>, renew_before: chrono::Duration) -> bool {
    if let Err(e) = tls::verify_key_pair(&certificate.certificate, &certificate.key) {
        error!(
            "Unable to load the key pair for domains {}: {e}",
            certificate.domain
        );
        return true;
    }

    match tls::certificate_expiry(&certificate.certificate) {
        Ok(expiry) => {
            debug!("Certificate for domains {} expires at {expiry}", certificate.domain);
            // A window reaching past the calendar covers every expiry
            now.checked_add_signed(renew_before)
                .is_none_or(|deadline| expiry < deadline)
        }
        Err(e) => {
            error!(
                "Unable to load the certificate for domains {}: {e}",
                certificate.domain
            );
            true
        }
    }
}

/// Periodically renews certificates that are about to expire
pub struct RenewalScheduler {
    provider: Arc<Provider>,
    interval: Duration,
    renew_before: chrono::Duration,
}

impl RenewalScheduler {
    pub fn new(provider: Arc<Provider>) -> Self {
        let renewal = &provider.config().renewal;
        let interval = renewal.check_interval();
        let renew_before = renewal.renew_before();

        Self {
            provider,
            interval,
            renew_before,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_renew_before(mut self, renew_before: chrono::Duration) -> Self {
        self.renew_before = renew_before;
        self
    }

    /// Renews every cached certificate inside the renewal window.
    ///
    /// Failures are logged and the sweep moves on. Returns how many
    /// certificates were renewed.
    pub async fn check_renewals(&self) -> usize {
        info!("Testing certificate renew...");

        let now = Utc::now();
        let mut renewed = 0;

        for certificate in self.provider.cache().certificates() {
            if !needs_renewal(&certificate, now, self.renew_before) {
                continue;
            }

            match self.provider.renew_certificate(&certificate).await {
                Ok(()) => renewed += 1,
                Err(e) => error!("Error renewing certificate from LE: {}, {e}", certificate.domain),
            }
        }

        if renewed > 0 {
            info!("Renewed {renewed} certificate(s)");
        }

        renewed
    }

    /// Runs one sweep right away, then one per interval until cancelled
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    async fn run(&self, shutdown: CancellationToken) {
        self.check_renewals().await;

        let period = self.interval.max(Duration::from_secs(1));
        let start = Instant::now()
            .checked_add(period)
            .unwrap_or_else(|| Instant::now() + Renewal::default().check_interval());
        let mut ticker = tokio::time::interval_at(start, period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Shutdown signal received, stopping certificate renewal");
                    break;
                }

                _ = ticker.tick() => {
                    self.check_renewals().await;
                }
            }
        }
    }
}
