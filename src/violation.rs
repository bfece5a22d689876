//! License violation data model
//!
//! A [`Violation`] is the snapshot the refresher publishes and every request
//! reads. It is replaced wholesale on each refresh and never mutated in place.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of license violation reported by the licensing subsystem.
///
/// Unknown kinds are kept verbatim in [`ViolationType::Other`] so a newer
/// licensing subsystem can report kinds this gateway has never seen; they are
/// still enforced as violations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ViolationType {
    NoViolation,
    /// No license record was found.
    EmptyLicense,
    /// The status record exists but could not be decoded.
    FormatError,
    ClusterCountExceeded,
    NodeCountExceeded,
    CoreCountExceeded,
    LicenseExpired,
    LicenseNotEffective,
    Other(String),
}

impl ViolationType {
    pub fn as_str(&self) -> &str {
        match self {
            ViolationType::NoViolation => "NoViolation",
            ViolationType::EmptyLicense => "EmptyLicense",
            ViolationType::FormatError => "FormatError",
            ViolationType::ClusterCountExceeded => "ClusterCountExceeded",
            ViolationType::NodeCountExceeded => "NodeCountExceeded",
            ViolationType::CoreCountExceeded => "CoreCountExceeded",
            ViolationType::LicenseExpired => "LicenseExpired",
            ViolationType::LicenseNotEffective => "LicenseNotEffective",
            ViolationType::Other(s) => s,
        }
    }

    /// Kinds that carry `expected`/`current` counts.
    pub fn is_quantitative(&self) -> bool {
        matches!(
            self,
            ViolationType::ClusterCountExceeded
                | ViolationType::NodeCountExceeded
                | ViolationType::CoreCountExceeded
        )
    }

    /// Kinds that carry a validity window.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ViolationType::LicenseExpired | ViolationType::LicenseNotEffective
        )
    }
}

impl From<String> for ViolationType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "NoViolation" => ViolationType::NoViolation,
            "EmptyLicense" => ViolationType::EmptyLicense,
            "FormatError" => ViolationType::FormatError,
            "ClusterCountExceeded" => ViolationType::ClusterCountExceeded,
            "NodeCountExceeded" => ViolationType::NodeCountExceeded,
            "CoreCountExceeded" => ViolationType::CoreCountExceeded,
            "LicenseExpired" => ViolationType::LicenseExpired,
            "LicenseNotEffective" => ViolationType::LicenseNotEffective,
            _ => ViolationType::Other(s),
        }
    }
}

impl From<ViolationType> for String {
    fn from(t: ViolationType) -> Self {
        match t {
            ViolationType::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single license violation snapshot.
///
/// Either `NoViolation` with every other field zero/absent, or exactly one
/// violation kind with its kind-specific fields populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationType,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub expected: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub current: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

impl Violation {
    /// The healthy state, also the fail-open default before the first refresh.
    pub fn none() -> Self {
        Self::of(ViolationType::NoViolation)
    }

    /// A violation that carries no kind-specific fields.
    pub fn of(kind: ViolationType) -> Self {
        Self {
            kind,
            expected: 0,
            current: 0,
            start_time: None,
            end_time: None,
        }
    }

    pub fn empty_license() -> Self {
        Self::of(ViolationType::EmptyLicense)
    }

    pub fn format_error() -> Self {
        Self::of(ViolationType::FormatError)
    }

    /// A count-based violation, e.g. more nodes than the license allows.
    pub fn quantitative(kind: ViolationType, expected: i64, current: i64) -> Self {
        Self {
            expected,
            current,
            ..Self::of(kind)
        }
    }

    /// A validity-window violation, e.g. an expired license.
    pub fn temporal(
        kind: ViolationType,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            start_time,
            end_time,
            ..Self::of(kind)
        }
    }

    pub fn is_violation(&self) -> bool {
        self.kind != ViolationType::NoViolation
    }
}

impl Default for Violation {
    fn default() -> Self {
        Self::none()
    }
}

/// Status document stored by the licensing subsystem on the license record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseStatus {
    pub violation: Violation,
}
