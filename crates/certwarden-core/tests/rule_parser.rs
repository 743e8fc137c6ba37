use certwarden::dynamic::{HostRuleParser, RuleParser};

#[test]
fn test_parse_single_host() {
    let parser = HostRuleParser::new();
    assert_eq!(
        parser.parse_domains("Host(`example.com`)").unwrap(),
        vec!["example.com"]
    );
}

#[test]
fn test_parse_multiple_hosts_lowercased() {
    let parser = HostRuleParser::new();
    assert_eq!(
        parser
            .parse_domains("Host(`Example.com`, \"WWW.example.com\")")
            .unwrap(),
        vec!["example.com", "www.example.com"]
    );
}

#[test]
fn test_parse_hosts_across_operators_and_groups() {
    let parser = HostRuleParser::new();
    let rule = "(Host(`a.com`) || Host(`b.com`)) && PathPrefix(`/api(v1)`) || Host(`a.com`)";

    assert_eq!(parser.parse_domains(rule).unwrap(), vec!["a.com", "b.com"]);
}

#[test]
fn test_rule_without_host_matcher() {
    let parser = HostRuleParser::new();
    assert!(parser.parse_domains("PathPrefix(`/`)").unwrap().is_empty());
}

#[test]
fn test_malformed_rules_are_errors() {
    let parser = HostRuleParser::new();
    assert!(parser.parse_domains("Host(`example.com`").is_err());
    assert!(parser.parse_domains("Host(example.com)").is_err());
}

#[test]
fn test_parse_host_sni_ignores_catch_all() {
    let parser = HostRuleParser::new();

    assert_eq!(
        parser.parse_host_sni("HostSNI(`db.example.com`)").unwrap(),
        vec!["db.example.com"]
    );
    assert!(parser.parse_host_sni("HostSNI(`*`)").unwrap().is_empty());
}

#[test]
fn test_host_and_host_sni_are_distinct_matchers() {
    let parser = HostRuleParser::new();

    assert!(parser.parse_domains("HostSNI(`db.example.com`)").unwrap().is_empty());
    assert!(parser.parse_host_sni("Host(`example.com`)").unwrap().is_empty());
}

#[test]
fn test_negated_hosts_are_skipped() {
    let parser = HostRuleParser::new();

    assert!(parser.parse_domains("!Host(`x.com`)").unwrap().is_empty());
    assert_eq!(
        parser
            .parse_domains("Host(`a.com`) && !Host(`b.com`)")
            .unwrap(),
        vec!["a.com"]
    );
    assert_eq!(
        parser
            .parse_domains("Host(`a.com`) && ! (Host(`b.com`) || Host(`c.com`))")
            .unwrap(),
        vec!["a.com"]
    );
    assert_eq!(
        parser
            .parse_host_sni("HostSNI(`a.com`) && !HostSNI(`b.com`)")
            .unwrap(),
        vec!["a.com"]
    );
}
