//! Cancellable one-shot deadline for the kinematic auto-stop.
//!
//! Every arm or cancel bumps a generation counter. A [`StopToken`] from an
//! older generation is stale and must be ignored, so a deadline armed by a
//! previous run can never stop the next one.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopToken(u64);

#[derive(Debug, Clone, Default)]
pub struct AutoStopTimer {
    generation: u64,
    armed: Option<(StopToken, Duration)>,
}

impl AutoStopTimer {
    /// Arm a deadline `after` from `now`, invalidating any earlier token.
    pub fn arm(&mut self, now: Duration, after: Duration) -> StopToken {
        self.generation += 1;
        let token = StopToken(self.generation);
        self.armed = Some((token, now + after));
        token
    }

    /// Disarm and invalidate every token handed out so far.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.armed = None;
    }

    /// Take the token once its deadline has passed.
    pub fn poll(&mut self, now: Duration) -> Option<StopToken> {
        match self.armed {
            Some((token, deadline)) if now >= deadline => {
                self.armed = None;
                Some(token)
            }
            _ => None,
        }
    }

    pub fn is_current(&self, token: StopToken) -> bool {
        token.0 == self.generation
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.armed.map(|(_, deadline)| deadline)
    }
}
