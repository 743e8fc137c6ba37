use std::sync::Arc;

use log::{debug, error};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Domain,
    dynamic::{RoutingConfiguration, RuleParser},
};

use super::Provider;

/// Host lists found on the TLS routers of a routing snapshot, keyed by router name.
///
/// TCP routers come first. Routers whose rule cannot be parsed, or that match no
/// host, are logged and skipped.
pub fn discover_domains(config: &RoutingConfiguration, parser: &dyn RuleParser) -> Vec<(String, Vec<String>)> {
    let mut discovered = Vec::new();

    if let Some(tcp) = &config.tcp {
        for (name, router) in tcp.iter().filter(|(_, router)| router.is_tls()) {
            match parser.parse_host_sni(&router.rule) {
                Ok(domains) if domains.is_empty() => {
                    debug!("No domain parsed in rule {:?} in provider ACME", router.rule);
                }
                Ok(domains) => discovered.push((name.clone(), domains)),
                Err(e) => {
                    error!("Error parsing domains in provider ACME for TCP router {name}: {e}");
                }
            }
        }
    }

    for (name, router) in config.http.iter().filter(|(_, router)| router.is_tls()) {
        match parser.parse_domains(&router.rule) {
            Ok(domains) if domains.is_empty() => {
                debug!("No domain parsed in rule {:?} in provider ACME", router.rule);
            }
            Ok(domains) => discovered.push((name.clone(), domains)),
            Err(e) => {
                error!("Error parsing domains in provider ACME for router {name}: {e}");
            }
        }
    }

    discovered
}

/// Requests certificates for the hosts of every routing snapshot it receives
pub struct DomainWatcher {
    provider: Arc<Provider>,
    parser: Arc<dyn RuleParser>,
}

impl DomainWatcher {
    pub fn new(provider: Arc<Provider>, parser: Arc<dyn RuleParser>) -> Self {
        Self { provider, parser }
    }

    pub fn spawn(
        self,
        mut routes: mpsc::Receiver<RoutingConfiguration>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Shutdown signal received, no longer watching routes");
                        break;
                    }

                    snapshot = routes.recv() => {
                        let Some(snapshot) = snapshot else {
                            debug!("Routing channel closed, no longer watching routes");
                            break;
                        };

                        self.handle(&snapshot);
                    }
                }
            }
        })
    }

    /// Starts one resolution per discovered host list and returns how many were started
    pub fn handle(&self, config: &RoutingConfiguration) -> usize {
        let discovered = discover_domains(config, self.parser.as_ref());
        let started = discovered.len();

        for (router, domains) in discovered {
            let Some(domain) = Domain::from_names(&domains) else {
                continue;
            };

            let provider = Arc::clone(&self.provider);
            tokio::spawn(async move {
                if let Err(e) = provider.resolve_certificate(&domain, false).await {
                    error!("Unable to obtain ACME certificate for domains {domain} of router {router}: {e}");
                }
            });
        }

        started
    }
}
