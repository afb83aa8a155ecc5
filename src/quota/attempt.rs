// Attempt outcomes and the policy that decides what a fatal one means.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Outcome of running one unit of work under one credential.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptResult<T> {
    Success(T),
    /// The credential's quota (or rate limit) is used up.
    QuotaExceeded,
    /// Worth trying the next credential: transient failure or a rejected key.
    RetryableError(String),
    /// The request itself is bad; another credential won't help.
    FatalError(FatalError),
}

impl<T> AttemptResult<T> {
    /// Transform the success payload, keeping failures as they are.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AttemptResult<U> {
        match self {
            AttemptResult::Success(value) => AttemptResult::Success(f(value)),
            AttemptResult::QuotaExceeded => AttemptResult::QuotaExceeded,
            AttemptResult::RetryableError(detail) => AttemptResult::RetryableError(detail),
            AttemptResult::FatalError(err) => AttemptResult::FatalError(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptResult::Success(_))
    }
}

/// Broad categories of non-retryable failure, so policy can be set per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatalClass {
    NotFound,
    InvalidRequest,
    Decode,
    Other,
}

impl fmt::Display for FatalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FatalClass::NotFound => "not found",
            FatalClass::InvalidRequest => "invalid request",
            FatalClass::Decode => "decode error",
            FatalClass::Other => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalError {
    pub class: FatalClass,
    pub detail: String,
}

impl FatalError {
    pub fn new(class: FatalClass, detail: impl Into<String>) -> Self {
        Self {
            class,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class, self.detail)
    }
}

/// What to do when an attempt ends in a `FatalError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFatal {
    /// Stop rotating and surface the error.
    Abort,
    /// Treat it like a retryable error and move on.
    Continue,
}

impl FromStr for OnFatal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(OnFatal::Abort),
            "continue" => Ok(OnFatal::Continue),
            other => anyhow::bail!("expected \"continue\" or \"abort\", got {other:?}"),
        }
    }
}

/// Per-class fatal error handling. Classes without an override use `default`.
///
/// The default policy continues on everything, matching how the platform's
/// handlers have always behaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalPolicy {
    pub default: OnFatal,
    overrides: HashMap<FatalClass, OnFatal>,
}

impl Default for FatalPolicy {
    fn default() -> Self {
        Self::uniform(OnFatal::Continue)
    }
}

impl FatalPolicy {
    pub fn uniform(action: OnFatal) -> Self {
        Self {
            default: action,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, class: FatalClass, action: OnFatal) -> Self {
        self.overrides.insert(class, action);
        self
    }

    pub fn action_for(&self, class: FatalClass) -> OnFatal {
        self.overrides.get(&class).copied().unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_continues_on_everything() {
        let policy = FatalPolicy::default();
        for class in [
            FatalClass::NotFound,
            FatalClass::InvalidRequest,
            FatalClass::Decode,
            FatalClass::Other,
        ] {
            assert_eq!(policy.action_for(class), OnFatal::Continue);
        }
    }

    #[test]
    fn test_override_applies_to_one_class_only() {
        let policy = FatalPolicy::default().with_override(FatalClass::NotFound, OnFatal::Abort);
        assert_eq!(policy.action_for(FatalClass::NotFound), OnFatal::Abort);
        assert_eq!(policy.action_for(FatalClass::Decode), OnFatal::Continue);
    }

    #[test]
    fn test_on_fatal_parses_setting_names() {
        assert_eq!("abort".parse::<OnFatal>().unwrap(), OnFatal::Abort);
        assert_eq!(" Continue ".parse::<OnFatal>().unwrap(), OnFatal::Continue);
        assert!("retry".parse::<OnFatal>().is_err());
    }

    #[test]
    fn test_map_keeps_failures() {
        let ok: AttemptResult<u32> = AttemptResult::Success(2);
        assert_eq!(ok.map(|v| v * 10), AttemptResult::Success(20));

        let quota: AttemptResult<u32> = AttemptResult::QuotaExceeded;
        assert_eq!(quota.map(|v| v * 10), AttemptResult::QuotaExceeded);

        let fatal: AttemptResult<u32> =
            AttemptResult::FatalError(FatalError::new(FatalClass::Decode, "bad json"));
        assert!(!fatal.map(|v| v + 1).is_success());
    }
}
