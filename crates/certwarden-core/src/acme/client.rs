// Interface to the external ACME issuing client
//
// The protocol exchange itself (orders, authorizations, challenge responders) lives
// behind these traits. The provider only decides what to ask for and when.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::{Challenge, KeyType},
    error::ClientError,
};

use super::{Account, Registration};

/// A certificate as returned by the issuing client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateResource {
    /// Main domain the certificate was issued for
    pub domain: String,

    /// PEM encoded certificate chain
    pub certificate: Vec<u8>,

    /// PEM encoded private key
    pub private_key: Vec<u8>,
}

impl CertificateResource {
    /// Whether either half of the key pair is missing
    pub fn is_empty(&self) -> bool {
        self.certificate.is_empty() || self.private_key.is_empty()
    }
}

/// Everything needed to build an issuing client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// ACME directory URL
    pub ca_server: String,

    /// Key type for certificate private keys
    pub key_type: KeyType,

    /// User agent sent to the CA
    pub user_agent: String,

    /// The account the client acts for
    pub account: Account,

    /// The single challenge mechanism to configure
    pub challenge: Challenge,
}

/// The external ACME client
#[async_trait]
pub trait IssuingClient: Send + Sync {
    /// Registers the account, agreeing to the terms of service
    async fn register(&self) -> Result<Registration, ClientError>;

    /// Requests a new certificate covering all the given names.
    ///
    /// `Ok(None)` means the CA answered without a certificate.
    async fn obtain(&self, domains: &[String]) -> Result<Option<CertificateResource>, ClientError>;

    /// Renews an existing certificate
    async fn renew(&self, existing: CertificateResource) -> Result<CertificateResource, ClientError>;
}

/// Builds issuing clients; called at most once per provider unless construction fails
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, options: ClientOptions) -> Result<Arc<dyn IssuingClient>, ClientError>;
}

/// The user agent reported to the CA
pub fn user_agent() -> String {
    format!("certwarden/{}", env!("CARGO_PKG_VERSION"))
}
