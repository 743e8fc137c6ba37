// Messages exchanged with the proxy's configuration pipeline

mod rules;

pub use rules::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// TLS options attached to a router
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterTls {
    /// Name of the TLS options set the router uses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

/// A routing rule as seen by the certificate provider
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    /// The matching rule, e.g. ``Host(`example.com`)``
    pub rule: String,

    /// Present when the router terminates TLS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<RouterTls>,
}

impl Router {
    pub fn new(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            tls: None,
        }
    }

    pub fn with_tls(mut self) -> Self {
        self.tls = Some(RouterTls::default());
        self
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }
}

/// A full routing configuration snapshot
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfiguration {
    /// HTTP routers by name
    #[serde(default)]
    pub http: BTreeMap<String, Router>,

    /// TCP routers by name, when the proxy has any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp: Option<BTreeMap<String, Router>>,
}

impl RoutingConfiguration {
    pub fn with_http_router(mut self, name: impl Into<String>, router: Router) -> Self {
        self.http.insert(name.into(), router);
        self
    }

    pub fn with_tcp_router(mut self, name: impl Into<String>, router: Router) -> Self {
        self.tcp.get_or_insert_with(BTreeMap::new).insert(name.into(), router);
        self
    }
}

/// A certificate and its key, both PEM encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsCertificate {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfiguration {
    pub certificate: TlsCertificate,
}

/// The configuration produced by the certificate provider
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DynamicConfiguration {
    pub tls: Vec<TlsConfiguration>,
}

/// A configuration update sent to the proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMessage {
    pub provider_name: String,
    pub configuration: DynamicConfiguration,
}
