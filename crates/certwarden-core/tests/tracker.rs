use std::{sync::Arc, thread};

use certwarden::acme::ResolvingSet;

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn test_mark_and_unmark() {
    let set = ResolvingSet::new();
    set.mark_resolving(&names(&["a.com", "b.com"]));

    assert!(set.contains("a.com"));
    assert!(set.contains("b.com"));

    set.unmark_resolving(&names(&["a.com"]));
    assert!(!set.contains("a.com"));
    assert_eq!(set.snapshot(), vec!["b.com".to_string()]);
}

#[test]
fn test_claim_skips_existing_and_in_flight_names() {
    let set = ResolvingSet::new();
    set.mark_resolving(&names(&["b.com"]));

    let guard = set
        .claim(&names(&["a.com", "b.com", "x.c.com"]), &["*.c.com"])
        .unwrap();

    assert_eq!(guard.domains(), ["a.com".to_string()]);
    assert!(set.contains("a.com"));
}

#[test]
fn test_claim_returns_none_when_everything_is_handled() {
    let set = ResolvingSet::new();
    let _first = set.claim(&names(&["a.com"]), &[] as &[&str]).unwrap();

    assert!(set.claim(&names(&["a.com"]), &[] as &[&str]).is_none());
}

#[test]
fn test_dropping_guard_releases_names() {
    let set = ResolvingSet::new();
    {
        let guard = set.claim(&names(&["a.com", "b.com"]), &[] as &[&str]);
        assert!(guard.is_some());
        assert!(set.contains("b.com"));
    }

    assert!(set.is_empty());
}

#[test]
fn test_mark_guard_keeps_names_owned_by_another_claim() {
    let set = ResolvingSet::new();
    let claim = set.claim(&names(&["a.com"]), &[] as &[&str]).unwrap();

    {
        let renewal = set.mark(&names(&["a.com", "b.com"]));
        assert_eq!(renewal.domains(), ["b.com".to_string()]);
    }

    assert!(set.contains("a.com"));
    assert!(!set.contains("b.com"));

    drop(claim);
    assert!(set.is_empty());
}

#[test]
fn test_concurrent_claims_are_exclusive() {
    let set = Arc::new(ResolvingSet::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                let claim = set.claim(&names(&["race.example.com"]), &[] as &[&str]);
                // Hold the claim so no later thread can take the name
                let claimed = claim.is_some();
                std::mem::forget(claim);
                claimed
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|claimed| *claimed)
        .count();

    assert_eq!(winners, 1);
}
