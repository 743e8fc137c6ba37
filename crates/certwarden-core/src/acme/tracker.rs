use std::{
    collections::HashSet,
    sync::{PoisonError, RwLock},
};

use log::debug;

use crate::domain::search_unchecked_domains;

/// Domains with an issuance currently in flight.
///
/// Membership checks take the read lock; insertions and removals take the write
/// lock. Entries are released by dropping the [`ResolvingGuard`] returned when
/// they were added, so a failed or abandoned resolution never leaks them.
#[derive(Debug, Default)]
pub struct ResolvingSet {
    domains: RwLock<HashSet<String>>,
}

impl ResolvingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the domains to the set
    pub fn mark_resolving(&self, domains: &[String]) {
        let mut set = self.domains.write().unwrap_or_else(PoisonError::into_inner);
        set.extend(domains.iter().cloned());
    }

    /// Removes the domains from the set
    pub fn unmark_resolving(&self, domains: &[String]) {
        let mut set = self.domains.write().unwrap_or_else(PoisonError::into_inner);
        for domain in domains {
            set.remove(domain);
        }
    }

    /// The domains currently being resolved
    pub fn snapshot(&self) -> Vec<String> {
        let set = self.domains.read().unwrap_or_else(PoisonError::into_inner);
        set.iter().cloned().collect()
    }

    pub fn contains(&self, domain: &str) -> bool {
        let set = self.domains.read().unwrap_or_else(PoisonError::into_inner);
        set.contains(domain)
    }

    pub fn is_empty(&self) -> bool {
        let set = self.domains.read().unwrap_or_else(PoisonError::into_inner);
        set.is_empty()
    }

    /// Marks the domains and returns a guard that unmarks them when dropped.
    ///
    /// Names another resolution already holds stay with that resolution.
    pub fn mark(&self, domains: &[String]) -> ResolvingGuard<'_> {
        let mut set = self.domains.write().unwrap_or_else(PoisonError::into_inner);
        let inserted = domains
            .iter()
            .filter(|domain| set.insert((*domain).clone()))
            .cloned()
            .collect();

        ResolvingGuard {
            set: self,
            domains: inserted,
        }
    }

    /// Claims the domains that neither `existing` nor an in-flight resolution covers.
    ///
    /// The check and the insertion happen under one write lock, so two callers
    /// racing for overlapping names cannot both claim them. Returns `None` when
    /// nothing is left to resolve.
    pub fn claim<S: AsRef<str>>(
        &self,
        domains: &[String],
        existing: &[S],
    ) -> Option<ResolvingGuard<'_>> {
        let mut set = self.domains.write().unwrap_or_else(PoisonError::into_inner);

        let mut known: Vec<&str> = existing.iter().map(AsRef::as_ref).collect();
        known.extend(set.iter().map(String::as_str));

        let unchecked = search_unchecked_domains(domains, &known);
        if unchecked.is_empty() {
            return None;
        }

        set.extend(unchecked.iter().cloned());
        drop(set);

        debug!("Marked domains {unchecked:?} as resolving");
        Some(ResolvingGuard {
            set: self,
            domains: unchecked,
        })
    }
}

/// Membership in the [`ResolvingSet`] for the lifetime of one resolution
#[derive(Debug)]
pub struct ResolvingGuard<'a> {
    set: &'a ResolvingSet,
    domains: Vec<String>,
}

impl ResolvingGuard<'_> {
    /// The domains held by this guard, in request order
    pub fn domains(&self) -> &[String] {
        &self.domains
    }
}

impl Drop for ResolvingGuard<'_> {
    fn drop(&mut self) {
        self.set.unmark_resolving(&self.domains);
    }
}
