use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A certificate subject: the main name plus its subject alternative names.
///
/// Two domains are the same only when `main` and every SAN match in order, so
/// `{a, [b]}` and `{b, [a]}` are different certificates.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq, Hash)]
pub struct Domain {
    /// The primary name (may be a wildcard such as `*.example.com`)
    pub main: String,

    /// Additional names covered by the same certificate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sans: Vec<String>,
}

impl Domain {
    /// Constructs a domain with no alternative names
    pub fn new(main: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            sans: Vec::new(),
        }
    }

    /// Adds alternative names to the domain
    pub fn with_sans<I, S>(mut self, sans: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sans.extend(sans.into_iter().map(Into::into));
        self
    }

    /// Builds a domain from a flat list, the first entry becoming the main name
    pub fn from_names(names: &[String]) -> Option<Self> {
        let (main, sans) = names.split_first()?;
        Some(Self {
            main: main.clone(),
            sans: sans.to_vec(),
        })
    }

    /// Returns `[main] + sans`, skipping an empty main name
    pub fn to_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.sans.len() + 1);
        if !self.main.is_empty() {
            names.push(self.main.clone());
        }
        names.extend(self.sans.iter().cloned());
        names
    }

    /// Replaces the domain's names with the given flat list
    pub fn set(&mut self, names: Vec<String>) {
        let mut names = names.into_iter();
        self.main = names.next().unwrap_or_default();
        self.sans = names.collect();
    }

    /// The comma-joined form used when comparing against existing domain groups
    pub fn group(&self) -> String {
        self.to_names().join(",")
    }

    /// Whether the main name is a wildcard
    pub fn is_wildcard(&self) -> bool {
        self.main.starts_with('*')
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.group())
    }
}
