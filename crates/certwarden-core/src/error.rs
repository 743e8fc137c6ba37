use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertwardenError {
    #[error("Error in `{field}`: {message}")]
    ConfigError { field: String, message: String },

    #[error("Failed to parse `{field}`: {message}")]
    ParseError { field: String, message: String },

    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("{0}")]
    GenericError(String),
}

/// Errors produced by the certificate provider and its collaborators
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Unable to initialize ACME provider with no storage location for the certificates")]
    StorageNotConfigured,

    #[error("Unable to read the certificate store, reason: {0}")]
    StoreReadFailed(#[source] StoreError),

    #[error("Unable to write to the certificate store, reason: {0}")]
    StoreWriteFailed(#[source] StoreError),

    #[error("ACME challenge not specified, please select TLS or HTTP or DNS challenge")]
    ChallengeNotConfigured,

    #[error("Unable to generate a certificate when no domain is given")]
    NoDomainGiven,

    #[error("Unable to generate a wildcard certificate for domain `{domains}` from a host rule")]
    WildcardFromHostRule { domains: String },

    #[error("Unable to generate a wildcard certificate for domain `{domains}`: a DNS challenge is required")]
    WildcardRequiresDnsChallenge { domains: String },

    #[error("Unable to generate a wildcard certificate for domain `{domains}`: '*.*' wildcard domains are not allowed")]
    DoubleWildcard { domains: String },

    #[error("Cannot get ACME client, reason: {0}")]
    ClientInitializationFailed(#[source] ClientError),

    #[error("Unable to generate a certificate for the domains `{domains}`, reason: {source}")]
    IssuanceFailed {
        domains: String,
        #[source]
        source: ClientError,
    },

    #[error("Domains `{domains}` did not generate a certificate")]
    NoCertificateIssued { domains: String },

    #[error("Domains `{domains}` generated a certificate with no value")]
    EmptyCertificate { domains: String },

    #[error("Unable to renew the certificate for the domains `{domains}`, reason: {source}")]
    RenewalFailed {
        domains: String,
        #[source]
        source: ClientError,
    },

    #[error("Invalid certificate material: {0}")]
    InvalidCertificate(String),

    #[error("The certificate cache is not running")]
    CacheUnavailable,

    #[error("The provider has already been started")]
    AlreadyStarted,
}

/// Errors raised by a certificate store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on `{path}`: {message}")]
    Io { path: String, message: String },

    #[error("Malformed store data in `{path}`: {message}")]
    Serialization { path: String, message: String },
}

/// Errors reported by an issuing client implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("registration failed: {0}")]
    Registration(String),

    #[error("obtain failed: {0}")]
    Obtain(String),

    #[error("renew failed: {0}")]
    Renew(String),

    #[error("invalid client configuration: {0}")]
    Configuration(String),
}
