use std::time::Duration;

/// Explicit retry schedule, replacing fire-and-forget timers that re-invoke
/// a connect routine recursively: retry state lives in a [`Supervisor`]
/// where it can be inspected and cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    Fixed {
        delay: Duration,
        max_attempts: u32,
    },
    /// `initial * 2^attempt`, capped.
    Exponential {
        initial: Duration,
        cap: Duration,
        max_attempts: u32,
    },
}

impl ReconnectPolicy {
    /// The schedule the signaling transport uses: five attempts, one second
    /// apart.
    pub fn signaling_default() -> Self {
        Self::Fixed {
            delay: Duration::from_secs(1),
            max_attempts: 5,
        }
    }

    /// Media acquisition gets one automatic retry after a short fixed
    /// delay; a second failure is surfaced instead of looping silently.
    pub fn media_default() -> Self {
        Self::Fixed {
            delay: Duration::from_millis(500),
            max_attempts: 1,
        }
    }

    /// Delay before retry number `attempt` (zero-based), or `None` once the
    /// attempt budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Fixed {
                delay,
                max_attempts,
            } => (attempt < max_attempts).then_some(delay),
            Self::Exponential {
                initial,
                cap,
                max_attempts,
            } => {
                if attempt >= max_attempts {
                    return None;
                }
                let scaled = initial
                    .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
                    .unwrap_or(cap);
                Some(scaled.min(cap))
            }
        }
    }
}

/// Owns the retry counter for one supervised loop.
#[derive(Debug)]
pub struct Supervisor {
    policy: ReconnectPolicy,
    attempt: u32,
    cancelled: bool,
}

impl Supervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            cancelled: false,
        }
    }

    /// Next delay to wait before retrying, advancing the counter. `None`
    /// when the budget is exhausted or the supervisor was cancelled.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.cancelled {
            return None;
        }
        let delay = self.policy.delay_for(self.attempt)?;
        self.attempt += 1;
        Some(delay)
    }

    /// A successful connection resets the schedule.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
