// Domain canonicalization, validation and coverage rules

mod matcher;
mod normalize;

pub use matcher::*;
pub use normalize::*;

/// Lowercases and trims a host name
pub fn canonical_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}

/// Strips a single trailing dot from a fully-qualified name
pub fn un_fqdn(domain: &str) -> &str {
    domain.strip_suffix('.').unwrap_or(domain)
}

/// Checks whether `domain` is matched by `cert_domain`, either exactly or through a
/// wildcard.
///
/// Labels are replaced by `*` from the left one at a time, so `*.a.com` matches
/// `x.a.com` but not `x.y.a.com`; that would need `*.*.a.com`.
pub fn match_domain(domain: &str, cert_domain: &str) -> bool {
    if domain == cert_domain {
        return true;
    }

    let cert_domain = cert_domain.trim_end_matches('.');

    let mut labels: Vec<&str> = domain.split('.').collect();
    for index in 0..labels.len() {
        labels[index] = "*";
        if labels.join(".") == cert_domain {
            return true;
        }
    }

    false
}
