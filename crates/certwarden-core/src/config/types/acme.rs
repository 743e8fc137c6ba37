use std::{fmt::Display, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::CertwardenError;

use super::Domain;

/// Default Let's Encrypt production directory URL
pub const LETS_ENCRYPT_PRODUCTION_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// Let's Encrypt staging directory URL (for testing)
pub const LETS_ENCRYPT_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Key algorithm used for certificate private keys
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[serde(rename = "EC256")]
    Ec256,
    #[serde(rename = "EC384")]
    Ec384,
    #[serde(rename = "RSA2048")]
    Rsa2048,
    #[default]
    #[serde(rename = "RSA4096")]
    Rsa4096,
    #[serde(rename = "RSA8192")]
    Rsa8192,
}

impl FromStr for KeyType {
    type Err = CertwardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EC256" => Ok(KeyType::Ec256),
            "EC384" => Ok(KeyType::Ec384),
            "RSA2048" => Ok(KeyType::Rsa2048),
            "RSA4096" => Ok(KeyType::Rsa4096),
            "RSA8192" => Ok(KeyType::Rsa8192),
            _ => Err(CertwardenError::ParseError {
                field: "acme.key_type".to_string(),
                message: format!(
                    "unknown key type `{s}`, expected one of EC256, EC384, RSA2048, RSA4096, RSA8192"
                ),
            }),
        }
    }
}

impl Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyType::Ec256 => "EC256",
            KeyType::Ec384 => "EC384",
            KeyType::Rsa2048 => "RSA2048",
            KeyType::Rsa4096 => "RSA4096",
            KeyType::Rsa8192 => "RSA8192",
        };
        write!(f, "{name}")
    }
}

/// DNS-01 challenge options
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsChallenge {
    /// Name of the DNS provider integration answering the challenge
    #[serde(default)]
    pub provider: String,

    /// Seconds to wait instead of checking DNS propagation
    #[serde(default)]
    pub delay_before_check: u64,

    /// Resolvers used to find the authoritative name servers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolvers: Vec<String>,

    /// Skip propagation checks before notifying the CA (not recommended)
    #[serde(default)]
    pub disable_propagation_check: bool,
}

/// HTTP-01 challenge options
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpChallenge {
    /// The entry point serving `/.well-known/acme-challenge/`
    #[serde(default)]
    pub entry_point: String,
}

/// TLS-ALPN-01 challenge options
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsChallenge {}

/// The challenge mechanism handed to the issuing client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Dns01 {
        provider: String,
        resolvers: Vec<String>,
        disable_propagation_check: bool,
        delay_before_check: Duration,
    },
    Http01 {
        entry_point: String,
    },
    TlsAlpn01,
}

impl Display for Challenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Challenge::Dns01 { provider, .. } => write!(f, "DNS-01 ({provider})"),
            Challenge::Http01 { entry_point } => write!(f, "HTTP-01 (entry point `{entry_point}`)"),
            Challenge::TlsAlpn01 => write!(f, "TLS-ALPN-01"),
        }
    }
}

/// Renewal sweep settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renewal {
    /// Hours between two renewal sweeps (default: 24)
    #[serde(default = "Renewal::default_check_interval_hours")]
    pub check_interval_hours: u64,

    /// Renew certificates expiring within this many days (default: 30)
    #[serde(default = "Renewal::default_renew_before_days")]
    pub renew_before_days: u64,
}

impl Default for Renewal {
    fn default() -> Self {
        Self {
            check_interval_hours: Self::default_check_interval_hours(),
            renew_before_days: Self::default_renew_before_days(),
        }
    }
}

impl Renewal {
    /// One year
    pub const MAX_CHECK_INTERVAL_HOURS: u64 = 24 * 365;

    /// Ten years
    pub const MAX_RENEW_BEFORE_DAYS: u64 = 3650;

    pub fn default_check_interval_hours() -> u64 {
        24
    }

    pub fn default_renew_before_days() -> u64 {
        30
    }

    /// Time between sweeps, kept within one hour and [`Renewal::MAX_CHECK_INTERVAL_HOURS`]
    pub fn check_interval(&self) -> Duration {
        let hours = self.check_interval_hours.clamp(1, Self::MAX_CHECK_INTERVAL_HOURS);
        hours
            .checked_mul(3600)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(Self::MAX_CHECK_INTERVAL_HOURS * 3600))
    }

    /// The renewal window, capped at [`Renewal::MAX_RENEW_BEFORE_DAYS`]
    pub fn renew_before(&self) -> chrono::Duration {
        let days = self.renew_before_days.min(Self::MAX_RENEW_BEFORE_DAYS);
        i64::try_from(days)
            .ok()
            .and_then(chrono::Duration::try_days)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), CertwardenError> {
        if !(1..=Self::MAX_CHECK_INTERVAL_HOURS).contains(&self.check_interval_hours) {
            return Err(CertwardenError::ConfigError {
                field: "acme.renewal.check_interval_hours".to_string(),
                message: format!(
                    "Must be between 1 and {} hours, got {}",
                    Self::MAX_CHECK_INTERVAL_HOURS,
                    self.check_interval_hours
                ),
            });
        }

        if self.renew_before_days > Self::MAX_RENEW_BEFORE_DAYS {
            return Err(CertwardenError::ConfigError {
                field: "acme.renewal.renew_before_days".to_string(),
                message: format!(
                    "Must be at most {} days, got {}",
                    Self::MAX_RENEW_BEFORE_DAYS,
                    self.renew_before_days
                ),
            });
        }

        Ok(())
    }
}

/// ACME provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcmeConfig {
    /// Email address used for registration
    #[serde(default)]
    pub email: String,

    /// CA directory to use (default: Let's Encrypt production)
    #[serde(default = "AcmeConfig::default_ca_server")]
    pub ca_server: String,

    /// Where the account and certificates are persisted (default: "acme.json")
    #[serde(default = "AcmeConfig::default_storage")]
    pub storage: String,

    /// Entry point the certificates are served on
    #[serde(default)]
    pub entry_point: String,

    /// Key type for certificate private keys (default: RSA4096)
    #[serde(default)]
    pub key_type: KeyType,

    /// Issue certificates for hosts found in TLS-enabled router rules (default: true)
    #[serde(default = "AcmeConfig::default_on_host_rule")]
    pub on_host_rule: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_challenge: Option<DnsChallenge>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_challenge: Option<HttpChallenge>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_challenge: Option<TlsChallenge>,

    #[serde(default)]
    pub renewal: Renewal,

    /// Domains to issue certificates for on startup. Wildcards need a DNS challenge.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<Domain>,
}

impl Default for AcmeConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            ca_server: Self::default_ca_server(),
            storage: Self::default_storage(),
            entry_point: String::new(),
            key_type: KeyType::default(),
            on_host_rule: Self::default_on_host_rule(),
            dns_challenge: None,
            http_challenge: None,
            tls_challenge: None,
            renewal: Renewal::default(),
            domains: Vec::new(),
        }
    }
}

impl AcmeConfig {
    pub fn default_ca_server() -> String {
        LETS_ENCRYPT_PRODUCTION_URL.to_string()
    }

    pub fn default_storage() -> String {
        "acme.json".to_string()
    }

    pub fn default_on_host_rule() -> bool {
        true
    }

    /// The CA directory, falling back to production when unset
    pub fn ca_server(&self) -> &str {
        if self.ca_server.is_empty() {
            LETS_ENCRYPT_PRODUCTION_URL
        } else {
            &self.ca_server
        }
    }

    /// Whether wildcard names can be validated, i.e. a DNS provider is configured
    pub fn has_dns_challenge(&self) -> bool {
        self.dns_challenge.is_some()
    }

    /// Picks the challenge to configure: DNS, then HTTP, then TLS-ALPN
    pub fn challenge(&self) -> Option<Challenge> {
        if let Some(dns) = self.dns_challenge.as_ref().filter(|dns| !dns.provider.is_empty()) {
            return Some(Challenge::Dns01 {
                provider: dns.provider.clone(),
                resolvers: dns.resolvers.clone(),
                disable_propagation_check: dns.disable_propagation_check,
                delay_before_check: Duration::from_secs(dns.delay_before_check),
            });
        }

        if let Some(http) = self.http_challenge.as_ref().filter(|http| !http.entry_point.is_empty()) {
            return Some(Challenge::Http01 {
                entry_point: http.entry_point.clone(),
            });
        }

        self.tls_challenge.as_ref().map(|_| Challenge::TlsAlpn01)
    }

    /// Checks the configuration for errors that would stop the provider from starting
    pub fn validate(&self) -> Result<(), CertwardenError> {
        if self.storage.trim().is_empty() {
            return Err(CertwardenError::ConfigError {
                field: "acme.storage".to_string(),
                message: "A storage location for the certificates is required".to_string(),
            });
        }

        if self.challenge().is_none() {
            return Err(CertwardenError::ConfigError {
                field: "acme".to_string(),
                message: "One of dns_challenge, http_challenge or tls_challenge must be set"
                    .to_string(),
            });
        }

        if let Some(position) = self.domains.iter().position(|domain| domain.main.trim().is_empty()) {
            return Err(CertwardenError::ConfigError {
                field: format!("acme.domains[{position}].main"),
                message: "The main domain cannot be empty".to_string(),
            });
        }

        self.renewal.validate()
    }
}
