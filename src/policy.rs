//! Per-request license decision
//!
//! While the license is violated, mutating requests are blocked except on a
//! small set of exempt paths that let operators restore compliance. Read
//! requests always pass and carry the violation details back to the client.

use serde::{Deserialize, Serialize};

use crate::violation::Violation;

/// Verbs treated as writes.
pub const MUTATING_VERBS: [&str; 4] = ["post", "put", "delete", "patch"];

/// Outcome of a license check for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
    /// Forward the request and attach the violation details to the response.
    AllowWithAnnotation,
}

/// A path prefix that stays writable during a violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemption {
    pub prefix: String,
    /// Lower-case verbs the exemption applies to; `None` means every mutating verb.
    #[serde(default)]
    pub verbs: Option<Vec<String>>,
}

impl Exemption {
    pub fn any_verb(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            verbs: None,
        }
    }

    pub fn for_verbs(prefix: impl Into<String>, verbs: &[&str]) -> Self {
        Self {
            prefix: prefix.into(),
            verbs: Some(verbs.iter().map(|v| v.to_ascii_lowercase()).collect()),
        }
    }

    /// `verb` must already be lower-case.
    fn matches(&self, verb: &str, path: &str) -> bool {
        if !path.starts_with(&self.prefix) {
            return false;
        }
        match &self.verbs {
            None => true,
            Some(verbs) => verbs.iter().any(|v| v == verb),
        }
    }
}

/// The license API (to fix the license), the OAuth endpoints (to keep sessions
/// alive) and cluster deletion (to get back under the cluster limit).
pub fn default_exemptions() -> Vec<Exemption> {
    vec![
        Exemption::any_verb("/kapis/license.v1"),
        Exemption::any_verb("/oauth/"),
        Exemption::for_verbs("/kapis/cluster", &["delete"]),
    ]
}

#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    exemptions: Vec<Exemption>,
}

impl Default for PolicyEvaluator {
    fn default() -> Self {
        Self::new(default_exemptions())
    }
}

impl PolicyEvaluator {
    pub fn new(mut exemptions: Vec<Exemption>) -> Self {
        for verbs in exemptions.iter_mut().filter_map(|e| e.verbs.as_mut()) {
            verbs.iter_mut().for_each(|v| v.make_ascii_lowercase());
        }
        Self { exemptions }
    }

    /// Decide what to do with a request given the current violation.
    ///
    /// `path` is the request path without the query string; matching is
    /// case-sensitive. Unknown or empty verbs are treated as reads.
    pub fn decide(&self, violation: &Violation, verb: &str, path: &str) -> Verdict {
        if !violation.is_violation() {
            return Verdict::Allow;
        }

        let verb = verb.to_ascii_lowercase();
        if !is_mutating(&verb) {
            return Verdict::AllowWithAnnotation;
        }

        if self.exemptions.iter().any(|e| e.matches(&verb, path)) {
            Verdict::Allow
        } else {
            Verdict::Deny
        }
    }
}

/// `verb` must already be lower-case.
fn is_mutating(verb: &str) -> bool {
    MUTATING_VERBS.contains(&verb)
}
