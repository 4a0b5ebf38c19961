use std::fmt;
use std::str::FromStr;

/// Vendor-reported stage of a generation task.
///
/// Matching is exact and case-sensitive. Anything outside the vendor
/// vocabulary, including the local `"unknown"` and `"submitted"` markers,
/// is kept verbatim in [`LifecycleStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LifecycleStatus {
    Preparing,
    Queueing,
    Processing,
    Success,
    Fail,
    Other(String),
}

impl LifecycleStatus {
    /// Placeholder reported before the first status response arrives.
    pub const SUBMITTED: &'static str = "submitted";
    /// Placeholder used when the vendor omits the status field.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn as_str(&self) -> &str {
        match self {
            LifecycleStatus::Preparing => "Preparing",
            LifecycleStatus::Queueing => "Queueing",
            LifecycleStatus::Processing => "Processing",
            LifecycleStatus::Success => "Success",
            LifecycleStatus::Fail => "Fail",
            LifecycleStatus::Other(s) => s,
        }
    }

    /// `Success` and `Fail` end the vendor-side lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStatus::Success | LifecycleStatus::Fail)
    }
}

impl From<&str> for LifecycleStatus {
    fn from(s: &str) -> Self {
        match s {
            "Preparing" => LifecycleStatus::Preparing,
            "Queueing" => LifecycleStatus::Queueing,
            "Processing" => LifecycleStatus::Processing,
            "Success" => LifecycleStatus::Success,
            "Fail" => LifecycleStatus::Fail,
            other => LifecycleStatus::Other(other.to_owned()),
        }
    }
}

impl FromStr for LifecycleStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LifecycleStatus::from(s))
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
