// security/rules.rs - Declarative ordered rule table for payload scanning
use crate::security::{Finding, Severity, VulnerabilityKind};
use regex::Regex;

/// How evidence is extracted from a rule match
pub(crate) enum EvidenceMode {
    /// First `limit` characters of the whole match, "..." appended
    FullMatch { limit: usize },
    /// "Key: " plus the first `limit` characters of capture group 1, "..." appended
    Token { limit: usize },
    /// A fixed evidence string, independent of the match
    Fixed(&'static str),
}

/// How many findings a rule emits per payload
pub(crate) enum MatchMode {
    /// One finding per match, in match order
    PerMatch,
    /// At most one finding no matter how many matches exist
    Once,
}

pub(crate) struct Rule {
    kind: VulnerabilityKind,
    severity: Severity,
    description: &'static str,
    recommendation: &'static str,
    pattern: Regex,
    evidence: EvidenceMode,
    mode: MatchMode,
}

impl Rule {
    /// Run this rule over the decoded payload, appending findings in order.
    pub(crate) fn apply(&self, text: &str, out: &mut Vec<Finding>) {
        match self.mode {
            MatchMode::PerMatch => {
                for caps in self.pattern.captures_iter(text) {
                    let evidence = match self.evidence {
                        EvidenceMode::FullMatch { limit } => {
                            truncated(caps.get(0).map_or("", |m| m.as_str()), limit)
                        }
                        EvidenceMode::Token { limit } => {
                            let token = caps.get(1).map_or("", |m| m.as_str());
                            format!("Key: {}", truncated(token, limit))
                        }
                        EvidenceMode::Fixed(fixed) => fixed.to_string(),
                    };
                    out.push(self.finding(evidence));
                }
            }
            MatchMode::Once => {
                if self.pattern.is_match(text) {
                    let evidence = match self.evidence {
                        EvidenceMode::Fixed(fixed) => fixed.to_string(),
                        // A match-independent mode is the only sensible pairing here
                        _ => String::new(),
                    };
                    out.push(self.finding(evidence));
                }
            }
        }
    }

    fn finding(&self, evidence: String) -> Finding {
        Finding {
            kind: self.kind,
            severity: self.severity,
            description: self.description,
            evidence,
            recommendation: self.recommendation,
        }
    }
}

/// Take the first `limit` characters and append "...".
fn truncated(text: &str, limit: usize) -> String {
    let mut out: String = text.chars().take(limit).collect();
    out.push_str("...");
    out
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in rule pattern must compile")
}

fn credential_rule(pattern: &str) -> Rule {
    Rule {
        kind: VulnerabilityKind::UnencryptedCredentials,
        severity: Severity::Critical,
        description: "Credentials transmitted in plaintext",
        recommendation: "Always use HTTPS for authentication endpoints",
        pattern: compile(pattern),
        evidence: EvidenceMode::FullMatch { limit: 50 },
        mode: MatchMode::PerMatch,
    }
}

fn api_key_rule(pattern: &str) -> Rule {
    Rule {
        kind: VulnerabilityKind::PlaintextApiKey,
        severity: Severity::Critical,
        description: "API key exposed in plaintext HTTP request",
        recommendation: "Use HTTPS and consider OAuth 2.0 or API Gateway",
        pattern: compile(pattern),
        evidence: EvidenceMode::Token { limit: 20 },
        mode: MatchMode::PerMatch,
    }
}

fn sensitive_data_rule(pattern: &str) -> Rule {
    Rule {
        kind: VulnerabilityKind::SensitiveDataExposure,
        severity: Severity::High,
        description: "Sensitive data transmitted without encryption",
        recommendation: "Encrypt all sensitive data and use HTTPS",
        pattern: compile(pattern),
        evidence: EvidenceMode::Fixed("Pattern matched in payload"),
        mode: MatchMode::Once,
    }
}

/// The built-in scanning rules, in evaluation order: credentials, then API
/// keys and tokens, then sensitive data patterns.
pub(crate) fn default_rules() -> Vec<Rule> {
    vec![
        credential_rule(r#"(?i)password["'\s:=]+([^"'\s&]+)"#),
        credential_rule(r#"(?i)passwd["'\s:=]+([^"'\s&]+)"#),
        credential_rule(r#"(?i)pwd["'\s:=]+([^"'\s&]+)"#),
        credential_rule(r#"(?i)username["'\s:=]+([^"'\s&]+)"#),
        credential_rule(r#"(?i)email["'\s:=]+([^@\s]+@[^\s"'&]+)"#),
        api_key_rule(r#"(?i)api[_-]?key["'\s:=]+([a-zA-Z0-9_-]{20,})"#),
        api_key_rule(r#"(?i)apikey["'\s:=]+([a-zA-Z0-9_-]{20,})"#),
        api_key_rule(r#"(?i)access[_-]?token["'\s:=]+([a-zA-Z0-9_-]{20,})"#),
        api_key_rule(r#"(?i)bearer\s+([a-zA-Z0-9_-]{20,})"#),
        api_key_rule(r#"(?i)authorization["'\s:]+([a-zA-Z0-9+/=]{20,})"#),
        sensitive_data_rule(r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b"),
        sensitive_data_rule(r"\b\d{3}-\d{2}-\d{4}\b"),
        sensitive_data_rule(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b"),
    ]
}
