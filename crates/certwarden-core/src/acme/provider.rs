use std::sync::Arc;

use log::{debug, error, info};
use rustls::sign::CertifiedKey;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{AcmeConfig, Domain},
    domain::{normalize_domain, prune_static_domains},
    dynamic::{ConfigMessage, HostRuleParser, RoutingConfiguration, RuleParser},
    error::ProviderError,
    tls,
};

use super::{
    Account, Certificate, CertificateCache, CertificateResource, ClientFactory, ClientOptions,
    DomainWatcher, IssuingClient, LocalStore, RenewalScheduler, ResolvingSet, Store, user_agent,
};

/// Certificates served by other parts of the proxy, e.g. manually configured ones
pub trait TlsStore: Send + Sync {
    /// Every domain (or wildcard) an existing certificate already serves
    fn all_domains(&self) -> Vec<String>;
}

#[derive(Default)]
struct ClientSlot {
    account: Option<Account>,
    client: Option<Arc<dyn IssuingClient>>,
}

/// The certificate provider.
///
/// Owns the certificate cache, the set of domains being resolved and the lazily
/// built issuing client. It is shared as an `Arc` by every task it starts.
pub struct Provider {
    config: AcmeConfig,
    domains: Vec<Domain>,
    store: Arc<dyn Store>,
    factory: Arc<dyn ClientFactory>,
    client: Mutex<ClientSlot>,
    cache: Arc<CertificateCache>,
    resolving: ResolvingSet,
    tls_store: Option<Arc<dyn TlsStore>>,
    rule_parser: Arc<dyn RuleParser>,
}

impl Provider {
    /// Creates a provider persisting to the JSON file named by `config.storage`
    pub fn new(config: AcmeConfig, factory: Arc<dyn ClientFactory>) -> Result<Self, ProviderError> {
        if config.storage.trim().is_empty() {
            return Err(ProviderError::StorageNotConfigured);
        }

        let store = Arc::new(LocalStore::new(&config.storage));
        Self::with_store(config, store, factory)
    }

    /// Creates a provider on top of an existing store.
    ///
    /// Loads the account and certificates, and prunes the static domain list.
    pub fn with_store(
        config: AcmeConfig,
        store: Arc<dyn Store>,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self, ProviderError> {
        if config.challenge().is_none() {
            return Err(ProviderError::ChallengeNotConfigured);
        }

        let mut account = store.get_account().map_err(ProviderError::StoreReadFailed)?;

        // A different CA means a different registration URI
        if account
            .as_ref()
            .is_some_and(|account| !account.matches_ca_server(config.ca_server()))
        {
            info!("Account URI does not match the current CA server. The account will be reset.");
            account = None;
        }

        let certificates = store
            .get_certificates()
            .map_err(ProviderError::StoreReadFailed)?;
        debug!("Loaded {} ACME certificate(s) from the store", certificates.len());

        let domains = prune_static_domains(&config.domains);

        Ok(Self {
            domains,
            cache: Arc::new(CertificateCache::new(Arc::clone(&store), certificates)),
            store,
            factory,
            client: Mutex::new(ClientSlot {
                account,
                client: None,
            }),
            resolving: ResolvingSet::new(),
            tls_store: None,
            rule_parser: Arc::new(HostRuleParser::new()),
            config,
        })
    }

    /// Takes domains served by other certificates into account
    pub fn with_tls_store(mut self, tls_store: Arc<dyn TlsStore>) -> Self {
        self.tls_store = Some(tls_store);
        self
    }

    /// Replaces the parser used to read host names from router rules
    pub fn with_rule_parser(mut self, parser: Arc<dyn RuleParser>) -> Self {
        self.rule_parser = parser;
        self
    }

    pub fn config(&self) -> &AcmeConfig {
        &self.config
    }

    /// The static domains left after pruning duplicates and covered names
    pub fn static_domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn cache(&self) -> &Arc<CertificateCache> {
        &self.cache
    }

    pub fn resolving(&self) -> &ResolvingSet {
        &self.resolving
    }

    pub fn rule_parser(&self) -> Arc<dyn RuleParser> {
        Arc::clone(&self.rule_parser)
    }

    /// The account as currently known, if any
    pub async fn account(&self) -> Option<Account> {
        self.client.lock().await.account.clone()
    }

    /// Starts the long-lived tasks and requests certificates for the static domains.
    ///
    /// Certificate updates are published on `publisher`; routing snapshots are read
    /// from `routes`. Cancelling `shutdown` stops the cache consumer, the route
    /// watcher and the renewal timer. Resolutions already running finish on their own.
    pub fn provide(
        self: &Arc<Self>,
        publisher: mpsc::Sender<ConfigMessage>,
        routes: mpsc::Receiver<RoutingConfiguration>,
        shutdown: CancellationToken,
    ) -> Result<ProviderTasks, ProviderError> {
        let mut handles = vec![self.cache.spawn(publisher, shutdown.clone())?];

        if self.config.on_host_rule {
            let watcher = DomainWatcher::new(Arc::clone(self), self.rule_parser());
            handles.push(watcher.spawn(routes, shutdown.clone()));
        } else {
            info!("Certificate generation from router rules is disabled");
        }

        for domain in self.domains.iter().cloned() {
            let provider = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = provider.resolve_certificate(&domain, true).await {
                    error!("Unable to obtain ACME certificate for domains {domain}: {e}");
                }
            });
        }

        let scheduler = RenewalScheduler::new(Arc::clone(self));
        handles.push(scheduler.spawn(shutdown.clone()));

        Ok(ProviderTasks { handles, shutdown })
    }

    /// Requests a certificate for the domain unless every name is already handled.
    ///
    /// `from_config` is true for statically configured domains, the only ones that
    /// may be wildcards. Returns `Ok(None)` when nothing needed issuing.
    pub async fn resolve_certificate(
        &self,
        domain: &Domain,
        from_config: bool,
    ) -> Result<Option<CertificateResource>, ProviderError> {
        let domains = normalize_domain(domain, from_config, self.config.has_dns_challenge())?;

        debug!("Looking for provided certificate(s) to validate {domains:?}...");
        let existing = self.existing_domain_groups(!from_config);

        let Some(claim) = self.resolving.claim(&domains, &existing) else {
            return Ok(None);
        };
        let unchecked = claim.domains().to_vec();
        let group = unchecked.join(",");

        debug!("Loading ACME certificates {unchecked:?}...");
        let client = self.issuing_client().await?;

        let resource = client
            .obtain(&unchecked)
            .await
            .map_err(|source| ProviderError::IssuanceFailed {
                domains: group.clone(),
                source,
            })?
            .ok_or_else(|| ProviderError::NoCertificateIssued {
                domains: group.clone(),
            })?;

        if resource.is_empty() {
            return Err(ProviderError::EmptyCertificate { domains: group });
        }

        debug!("Certificates obtained for domains {unchecked:?}");

        let domain = Domain::from_names(&unchecked).ok_or(ProviderError::NoDomainGiven)?;
        self.cache
            .commit(Certificate {
                domain,
                certificate: resource.certificate.clone(),
                key: resource.private_key.clone(),
            })
            .await?;

        // Only release the names once the cache covers them
        drop(claim);

        Ok(Some(resource))
    }

    /// Renews a cached certificate, keeping its domain as the cache key
    pub async fn renew_certificate(&self, certificate: &Certificate) -> Result<(), ProviderError> {
        let names = certificate.domain.to_names();
        let group = names.join(",");
        let _guard = self.resolving.mark(&names);

        let client = self.issuing_client().await?;

        info!("Renewing certificate for domains {group}");
        let renewed = client
            .renew(CertificateResource {
                domain: certificate.domain.main.clone(),
                certificate: certificate.certificate.clone(),
                private_key: certificate.key.clone(),
            })
            .await
            .map_err(|source| ProviderError::RenewalFailed {
                domains: group.clone(),
                source,
            })?;

        if renewed.is_empty() {
            return Err(ProviderError::EmptyCertificate { domains: group });
        }

        self.cache
            .commit(Certificate {
                domain: certificate.domain.clone(),
                certificate: renewed.certificate,
                key: renewed.private_key,
            })
            .await
    }

    /// Resolves a certificate for a single host on demand and returns it ready to serve
    pub async fn listen_request(&self, host: &str) -> Result<Option<Arc<CertifiedKey>>, ProviderError> {
        match self.resolve_certificate(&Domain::new(host), false).await? {
            Some(resource) => tls::certified_key(&resource.certificate, &resource.private_key).map(Some),
            None => Ok(None),
        }
    }

    /// Domain groups that already have, or are about to have, a certificate
    fn existing_domain_groups(&self, include_static: bool) -> Vec<String> {
        let mut groups = self
            .tls_store
            .as_ref()
            .map(|store| store.all_domains())
            .unwrap_or_default();

        groups.extend(self.cache.domain_groups());

        if include_static {
            groups.extend(self.domains.iter().map(Domain::group));
        }

        groups
    }

    /// Returns the issuing client, building and registering it on first use
    async fn issuing_client(&self) -> Result<Arc<dyn IssuingClient>, ProviderError> {
        let mut guard = self.client.lock().await;
        let slot = &mut *guard;

        if let Some(client) = &slot.client {
            return Ok(Arc::clone(client));
        }

        let challenge = self
            .config
            .challenge()
            .ok_or(ProviderError::ChallengeNotConfigured)?;

        let account = match slot.account.take() {
            Some(account) if !account.email.is_empty() => account,
            _ => Account::new(self.config.email.clone(), self.config.key_type),
        };
        let account = slot.account.insert(account);

        debug!("Building ACME client for {}", self.config.ca_server());
        let client = self
            .factory
            .connect(ClientOptions {
                ca_server: self.config.ca_server().to_string(),
                key_type: account.key_type,
                user_agent: user_agent(),
                account: account.clone(),
                challenge: challenge.clone(),
            })
            .await
            .map_err(ProviderError::ClientInitializationFailed)?;

        if !account.is_registered() {
            info!("Registering ACME account for {}", account.email);
            let registration = client
                .register()
                .await
                .map_err(ProviderError::ClientInitializationFailed)?;
            account.registration = Some(registration);
        }

        // No certificate can be requested before the account is saved
        self.store
            .save_account(account)
            .map_err(ProviderError::StoreWriteFailed)?;

        debug!("Using {challenge} challenge");
        slot.client = Some(Arc::clone(&client));

        Ok(client)
    }
}

/// Handles to the provider's long-lived tasks
pub struct ProviderTasks {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl ProviderTasks {
    /// The token that stops the tasks
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Signals the tasks to stop and waits for them
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.wait().await;
    }

    /// Waits for the tasks to finish
    pub async fn wait(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("ACME provider task failed: {e}");
            }
        }
    }
}
