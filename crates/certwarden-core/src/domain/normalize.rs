use log::warn;

use crate::{config::Domain, error::ProviderError};

use super::{canonical_domain, un_fqdn};

/// Validates a domain for issuance and returns its canonical flat name list.
///
/// `wildcard_allowed` is only true for statically configured domains; names
/// discovered from live routes can never request a wildcard. Wildcards also need
/// a DNS challenge, and `*.*` prefixes are always rejected.
pub fn normalize_domain(
    domain: &Domain,
    wildcard_allowed: bool,
    dns_challenge: bool,
) -> Result<Vec<String>, ProviderError> {
    let names = domain.to_names();
    if names.is_empty() {
        return Err(ProviderError::NoDomainGiven);
    }

    if domain.is_wildcard() {
        let domains = names.join(",");

        if !wildcard_allowed {
            return Err(ProviderError::WildcardFromHostRule { domains });
        }

        if !dns_challenge {
            return Err(ProviderError::WildcardRequiresDnsChallenge { domains });
        }

        if domain.main.starts_with("*.*") {
            return Err(ProviderError::DoubleWildcard { domains });
        }
    }

    let clean = names
        .iter()
        .map(|name| {
            let canonical = canonical_domain(name);
            let clean = un_fqdn(&canonical).to_string();
            if clean != canonical {
                warn!("FQDN detected, please remove the trailing dot: {canonical}");
            }
            clean
        })
        .collect();

    Ok(clean)
}
