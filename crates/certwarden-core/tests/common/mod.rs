#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use certwarden::{
    acme::{
        Account, Certificate, CertificateResource, ClientFactory, ClientOptions, IssuingClient,
        Registration, Store,
    },
    config::{AcmeConfig, DnsChallenge, Domain, HttpChallenge},
    error::{ClientError, StoreError},
};
use tokio::sync::Notify;

/// A self-signed PEM certificate and key for `name`, expiring in `days` days
pub fn pem_pair(name: &str, days: i64) -> (Vec<u8>, Vec<u8>) {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(vec![name.to_string()]).unwrap();
    params.not_before = time::OffsetDateTime::now_utc() - time::Duration::days(1);
    params.not_after = time::OffsetDateTime::now_utc() + time::Duration::days(days);

    let cert = params.self_signed(&key_pair).unwrap();
    (cert.pem().into_bytes(), key_pair.serialize_pem().into_bytes())
}

pub fn certificate(domain: Domain, days: i64) -> Certificate {
    let (certificate, key) = pem_pair(&domain.main, days);
    Certificate {
        domain,
        certificate,
        key,
    }
}

pub fn http_config() -> AcmeConfig {
    AcmeConfig {
        email: "admin@example.com".to_string(),
        http_challenge: Some(HttpChallenge {
            entry_point: "web".to_string(),
        }),
        ..AcmeConfig::default()
    }
}

pub fn dns_config() -> AcmeConfig {
    AcmeConfig {
        email: "admin@example.com".to_string(),
        dns_challenge: Some(DnsChallenge {
            provider: "cloudflare".to_string(),
            ..DnsChallenge::default()
        }),
        ..AcmeConfig::default()
    }
}

/// Polls until `check` holds, panicking after two seconds
pub async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

#[derive(Default)]
pub struct MemoryStore {
    pub account: Mutex<Option<Account>>,
    pub certificates: Mutex<Vec<Certificate>>,
    pub account_saves: AtomicUsize,
    pub certificate_saves: AtomicUsize,
    /// When set, every certificate save fails
    pub fail_saves: bool,
}

impl MemoryStore {
    pub fn with_account(account: Account) -> Self {
        Self {
            account: Mutex::new(Some(account)),
            ..Self::default()
        }
    }

    pub fn with_certificates(certificates: Vec<Certificate>) -> Self {
        Self {
            certificates: Mutex::new(certificates),
            ..Self::default()
        }
    }

    pub fn read_only() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }
}

impl Store for MemoryStore {
    fn get_account(&self) -> Result<Option<Account>, StoreError> {
        Ok(self.account.lock().unwrap().clone())
    }

    fn save_account(&self, account: &Account) -> Result<(), StoreError> {
        self.account_saves.fetch_add(1, Ordering::SeqCst);
        *self.account.lock().unwrap() = Some(account.clone());
        Ok(())
    }

    fn get_certificates(&self) -> Result<Vec<Certificate>, StoreError> {
        Ok(self.certificates.lock().unwrap().clone())
    }

    fn save_certificates(&self, certificates: &[Certificate]) -> Result<(), StoreError> {
        self.certificate_saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves {
            return Err(StoreError::Io {
                path: "acme.json".into(),
                message: "read-only file system".to_string(),
            });
        }
        *self.certificates.lock().unwrap() = certificates.to_vec();
        Ok(())
    }
}

/// Issuing client that mints self-signed certificates and records every call
#[derive(Default)]
pub struct MockClient {
    pub register_calls: AtomicUsize,
    pub obtain_calls: AtomicUsize,
    pub renew_calls: AtomicUsize,
    pub obtained: Mutex<Vec<Vec<String>>>,
    pub renewed: Mutex<Vec<String>>,
    pub fail_obtain: bool,
    /// Domains whose renewal is refused
    pub fail_renew: Vec<String>,
    /// When set, `obtain` waits for a notification before answering
    pub gate: Option<Arc<Notify>>,
}

impl MockClient {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_obtain: true,
            ..Self::default()
        }
    }

    pub fn obtain_count(&self) -> usize {
        self.obtain_calls.load(Ordering::SeqCst)
    }

    pub fn renew_count(&self) -> usize {
        self.renew_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IssuingClient for MockClient {
    async fn register(&self) -> Result<Registration, ClientError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Registration {
            uri: "https://acme-v02.api.letsencrypt.org/acme/acct/42".to_string(),
            body: serde_json::json!({ "status": "valid" }),
        })
    }

    async fn obtain(&self, domains: &[String]) -> Result<Option<CertificateResource>, ClientError> {
        self.obtain_calls.fetch_add(1, Ordering::SeqCst);
        self.obtained.lock().unwrap().push(domains.to_vec());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if self.fail_obtain {
            return Err(ClientError::Obtain("rate limited".to_string()));
        }

        let (certificate, private_key) = pem_pair(&domains[0], 90);
        Ok(Some(CertificateResource {
            domain: domains[0].clone(),
            certificate,
            private_key,
        }))
    }

    async fn renew(&self, existing: CertificateResource) -> Result<CertificateResource, ClientError> {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        self.renewed.lock().unwrap().push(existing.domain.clone());

        if self.fail_renew.contains(&existing.domain) {
            return Err(ClientError::Renew("order expired".to_string()));
        }

        let (certificate, private_key) = pem_pair(&existing.domain, 90);
        Ok(CertificateResource {
            domain: existing.domain,
            certificate,
            private_key,
        })
    }
}

pub struct MockFactory {
    pub client: Arc<MockClient>,
    pub connect_calls: AtomicUsize,
    pub options: Mutex<Vec<ClientOptions>>,
}

impl MockFactory {
    pub fn new(client: MockClient) -> Self {
        Self {
            client: Arc::new(client),
            connect_calls: AtomicUsize::new(0),
            options: Mutex::new(Vec::new()),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn connect(&self, options: ClientOptions) -> Result<Arc<dyn IssuingClient>, ClientError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.options.lock().unwrap().push(options);
        Ok(self.client.clone() as Arc<dyn IssuingClient>)
    }
}
