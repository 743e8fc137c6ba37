use log::info;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::KeyType;

/// The registration resource returned by the CA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// The account URI on the CA server
    pub uri: String,

    /// Raw account object as returned by the CA
    #[serde(default)]
    pub body: serde_json::Value,
}

/// The ACME account certificates are requested with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,

    #[serde(default)]
    pub key_type: KeyType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<Registration>,
}

impl Account {
    /// Creates an unregistered account
    pub fn new(email: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            email: email.into(),
            key_type,
            registration: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// Checks that the account was registered against the given CA server.
    ///
    /// Accounts without a registration always match since they will be
    /// registered against whichever server is configured.
    pub fn matches_ca_server(&self, ca_server: &str) -> bool {
        match &self.registration {
            Some(registration) => is_same_host(&registration.uri, ca_server),
            None => true,
        }
    }
}

/// Compares the host names of two URLs, treating unparseable URLs as different
pub fn is_same_host(account_uri: &str, server_uri: &str) -> bool {
    let account_url = match Url::parse(account_uri) {
        Ok(url) => url,
        Err(e) => {
            info!("Unable to parse account registration URL `{account_uri}`: {e}");
            return false;
        }
    };

    let server_url = match Url::parse(server_uri) {
        Ok(url) => url,
        Err(e) => {
            info!("Unable to parse CA server URL `{server_uri}`: {e}");
            return false;
        }
    };

    account_url.host_str() == server_url.host_str()
}
