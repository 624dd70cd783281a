//! Per-target publication state machine and retry policy.
//!
//! ```text
//! Pending --start--> InFlight --Success--> Succeeded
//!    |                  |  \---Fatal / exhausted--> Failed
//!    |                  \--Retryable--> Retrying --start--> InFlight
//!    \--unchanged--> Succeeded (attempt 0)
//! ```
//!
//! Any non-terminal state may be cancelled into `Failed("cancelled")`.

use std::time::Duration;

use thiserror::Error;

use crate::targets::Outcome;

/// Reason recorded for cancelled publications.
pub const CANCELLED: &str = "cancelled";

/// Exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    factor: u32,
    max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), 2, Duration::from_secs(5))
    }
}

impl Backoff {
    pub fn new(initial: Duration, factor: u32, max: Duration) -> Self {
        Self {
            initial,
            factor: factor.max(1),
            max,
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    /// (1-based): `initial * factor^(attempt - 1)`, capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.factor.checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(multiplier)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

/// How many attempts a target gets and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Backoff::default())
    }
}

impl RetryPolicy {
    /// A policy allowing `max_attempts` attempts (at least one).
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Replace the attempt limit.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid transition: {event} from {from}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub event: &'static str,
}

/// Where one (bundle, target) publication stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishState {
    Pending,
    InFlight {
        attempt: u32,
    },
    Retrying {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    Succeeded {
        attempt: u32,
    },
    Failed {
        attempt: u32,
        reason: String,
    },
}

impl PublishState {
    fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InFlight { .. } => "InFlight",
            Self::Retrying { .. } => "Retrying",
            Self::Succeeded { .. } => "Succeeded",
            Self::Failed { .. } => "Failed",
        }
    }

    fn invalid(&self, event: &'static str) -> InvalidTransition {
        InvalidTransition {
            from: self.label(),
            event,
        }
    }

    /// Number of attempts made so far.
    pub fn attempt(&self) -> u32 {
        match self {
            Self::Pending => 0,
            Self::InFlight { attempt }
            | Self::Retrying { attempt, .. }
            | Self::Succeeded { attempt }
            | Self::Failed { attempt, .. } => *attempt,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// The target already holds the bundle; nothing needs uploading.
    ///
    /// # Errors
    ///
    /// Only valid from `Pending`.
    pub fn unchanged(self) -> Result<Self, InvalidTransition> {
        match self {
            Self::Pending => Ok(Self::Succeeded { attempt: 0 }),
            other => Err(other.invalid("unchanged")),
        }
    }

    /// Begin the next attempt.
    ///
    /// # Errors
    ///
    /// Only valid from `Pending` or `Retrying`.
    pub fn start(self) -> Result<Self, InvalidTransition> {
        match self {
            Self::Pending => Ok(Self::InFlight { attempt: 1 }),
            Self::Retrying { attempt, .. } => Ok(Self::InFlight {
                attempt: attempt + 1,
            }),
            other => Err(other.invalid("start")),
        }
    }

    /// Record the outcome of the in-flight attempt.
    ///
    /// `Retryable` moves to `Retrying` with the policy's backoff delay, or to
    /// `Failed` once `max_attempts` attempts have been made.
    ///
    /// # Errors
    ///
    /// Only valid from `InFlight`.
    pub fn complete(self, outcome: Outcome, policy: &RetryPolicy) -> Result<Self, InvalidTransition> {
        let Self::InFlight { attempt } = self else {
            return Err(self.invalid("complete"));
        };
        Ok(match outcome {
            Outcome::Success => Self::Succeeded { attempt },
            Outcome::Fatal(reason) => Self::Failed { attempt, reason },
            Outcome::Retryable(reason) if attempt >= policy.max_attempts() => Self::Failed {
                attempt,
                reason: format!("{reason} (gave up after {attempt} attempts)"),
            },
            Outcome::Retryable(reason) => Self::Retrying {
                attempt,
                delay: policy.backoff().delay(attempt),
                reason,
            },
        })
    }

    /// Abandon a publication that has not finished. Terminal states are kept.
    pub fn cancel(self) -> Self {
        if self.is_terminal() {
            return self;
        }
        Self::Failed {
            attempt: self.attempt(),
            reason: CANCELLED.to_string(),
        }
    }

    /// The terminal outcome, if the state is terminal.
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            Self::Succeeded { .. } => Some(Outcome::Success),
            Self::Failed { reason, .. } => Some(Outcome::Fatal(reason.clone())),
            _ => None,
        }
    }
}
