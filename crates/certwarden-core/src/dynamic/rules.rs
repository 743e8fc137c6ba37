use crate::error::CertwardenError;

/// Extracts host names from router rules
pub trait RuleParser: Send + Sync {
    /// Host names matched by an HTTP router rule
    fn parse_domains(&self, rule: &str) -> Result<Vec<String>, CertwardenError>;

    /// Server names matched by a TCP router rule
    fn parse_host_sni(&self, rule: &str) -> Result<Vec<String>, CertwardenError>;
}

/// Reads the arguments of ``Host(`...`)`` and ``HostSNI(`...`)`` matchers.
///
/// Arguments may be wrapped in backquotes or double quotes and separated by commas.
/// Other matchers and the operators between them are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostRuleParser;

impl HostRuleParser {
    pub fn new() -> Self {
        Self
    }

    fn matcher_arguments(rule: &str, matcher: &str) -> Result<Vec<String>, CertwardenError> {
        let mut found = Vec::new();
        let mut rest = rule;

        while let Some(open) = rest.find('(') {
            let prefix = &rest[..open];
            let name = prefix
                .rsplit(|c: char| !c.is_ascii_alphanumeric())
                .next()
                .unwrap_or_default();
            let negated = prefix[..prefix.len() - name.len()].trim_end().ends_with('!');

            let after = &rest[open + 1..];
            let close = find_closing(after).ok_or_else(|| CertwardenError::ParseError {
                field: "rule".to_string(),
                message: format!("unbalanced parenthesis in `{rule}`"),
            })?;

            if negated {
                // Hosts under a negation are never served
                rest = &after[close + 1..];
            } else if name.eq_ignore_ascii_case(matcher) {
                for argument in split_arguments(&after[..close], rule)? {
                    let host = argument.trim().to_lowercase();
                    if !host.is_empty() && !found.contains(&host) {
                        found.push(host);
                    }
                }
                rest = &after[close + 1..];
            } else if name.is_empty() {
                // A grouping parenthesis, look inside it
                rest = after;
            } else {
                rest = &after[close + 1..];
            }
        }

        Ok(found)
    }
}

impl RuleParser for HostRuleParser {
    fn parse_domains(&self, rule: &str) -> Result<Vec<String>, CertwardenError> {
        Self::matcher_arguments(rule, "Host")
    }

    fn parse_host_sni(&self, rule: &str) -> Result<Vec<String>, CertwardenError> {
        let hosts = Self::matcher_arguments(rule, "HostSNI")?;
        Ok(hosts.into_iter().filter(|host| host != "*").collect())
    }
}

/// Index of the parenthesis closing the group `input` starts inside of
fn find_closing(input: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (index, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '`' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') if depth == 0 => return Some(index),
            (None, ')') => depth -= 1,
            _ => {}
        }
    }

    None
}

fn split_arguments(arguments: &str, rule: &str) -> Result<Vec<String>, CertwardenError> {
    let mut values = Vec::new();

    for raw in arguments.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let unquoted = ['`', '"']
            .iter()
            .find_map(|q| raw.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
            .ok_or_else(|| CertwardenError::ParseError {
                field: "rule".to_string(),
                message: format!("unquoted matcher argument `{raw}` in `{rule}`"),
            })?;

        values.push(unquoted.to_string());
    }

    Ok(values)
}
