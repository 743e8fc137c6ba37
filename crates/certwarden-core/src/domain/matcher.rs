use log::{debug, warn};

use crate::config::Domain;

use super::match_domain;

/// Checks whether `domain` is already handled by one of the existing domain groups.
///
/// Each group is a comma-joined list of names, as produced by [`Domain::group`].
pub fn is_covered<S: AsRef<str>>(domain: &str, existing_groups: &[S]) -> bool {
    existing_groups.iter().any(|group| {
        group
            .as_ref()
            .split(',')
            .any(|cert_domain| match_domain(domain, cert_domain))
    })
}

/// Returns the names in `domains` that no existing group covers, keeping their order
pub fn search_unchecked_domains<S: AsRef<str>>(
    domains: &[String],
    existing_groups: &[S],
) -> Vec<String> {
    let unchecked: Vec<String> = domains
        .iter()
        .filter(|domain| !is_covered(domain, existing_groups))
        .cloned()
        .collect();

    if unchecked.is_empty() {
        debug!("No ACME certificate generation required for domains {domains:?}");
    } else {
        debug!(
            "Domains {domains:?} need ACME certificates generation for domains {:?}",
            unchecked.join(",")
        );
    }

    unchecked
}

/// Removes duplicated and already covered entries from the static domain list.
///
/// An entry identical to an earlier one is dropped. Names covered by an earlier
/// entry (exactly or by its wildcard) are removed from later entries, and an
/// entry left without names is dropped. Which entry covers which depends on
/// declaration order.
pub fn prune_static_domains(domains: &[Domain]) -> Vec<Domain> {
    let mut pruned = Vec::with_capacity(domains.len());

    for (index, original) in domains.iter().enumerate() {
        let mut candidate = original.clone();
        let mut keep = true;

        for (other_index, other) in domains.iter().enumerate() {
            if other_index == index {
                continue;
            }

            if *other == candidate {
                if index > other_index {
                    warn!(
                        "The domain {candidate} is duplicated in the configuration but will be processed only once"
                    );
                    keep = false;
                }
                break;
            }

            if other_index > index {
                continue;
            }

            let covering = [other.group()];
            let remaining: Vec<String> = candidate
                .to_names()
                .into_iter()
                .filter(|name| {
                    if !is_covered(name, &covering) {
                        return true;
                    }

                    if other.is_wildcard() && other.main != *name && match_domain(name, &other.main) {
                        warn!(
                            "Domain {name:?} will not be processed because it is validated by the wildcard {:?}",
                            other.main
                        );
                    } else {
                        warn!(
                            "Domain {name:?} is duplicated in the configuration or validated by the domain {other}. It will be processed once"
                        );
                    }
                    false
                })
                .collect();

            if remaining.is_empty() {
                keep = false;
                break;
            }
            candidate.set(remaining);
        }

        if keep {
            pruned.push(candidate);
        }
    }

    pruned
}
