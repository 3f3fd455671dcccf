//! Loop timing: when does the next iteration of a track start.
//!
//! All deadlines live on the renderer's monotonic audio clock
//! ([`RenderBackend::dsp_time`](crate::backend::RenderBackend::dsp_time)),
//! never on frame time, so a hitch on the game side does not shift a loop.

use std::time::Duration;

/// How the wait until the next loop iteration is derived from a clip.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Retrigger {
    /// Restart exactly when the clip ends: `duration - start_offset`
    #[default]
    ClipEnd,
    /// Legacy divisor form: `duration / factor - start_offset`
    Divided(f32),
    /// Restart `lead` before the clip ends: `duration - start_offset - lead`
    Lead(Duration),
}

impl Retrigger {
    /// Seconds to wait after starting a clip of length `clip` at `start_offset`.
    ///
    /// Non-positive or non-finite results clamp to zero, so the wake fires on
    /// the next tick instead of being scheduled in the past.
    pub fn wait(&self, clip: Duration, start_offset: Duration) -> Duration {
        let clip = clip.as_secs_f64();
        let offset = start_offset.as_secs_f64();
        let raw = match *self {
            Self::ClipEnd => clip - offset,
            Self::Divided(factor) => clip / f64::from(factor) - offset,
            Self::Lead(lead) => clip - offset - lead.as_secs_f64(),
        };

        if !raw.is_finite() {
            log::warn!(
                "Retrigger {:?} produced a non-finite wait for a {:.3}s clip; firing on the next tick",
                self,
                clip
            );
            return Duration::ZERO;
        }
        if raw <= 0.0 {
            log::debug!(
                "Retrigger {:?} wait {:.3}s is not positive; clamping to zero",
                self,
                raw
            );
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(raw).unwrap_or_else(|err| {
            log::warn!(
                "Retrigger {:?} wait {:.3e}s is out of range ({}); firing on the next tick",
                self,
                raw,
                err
            );
            Duration::ZERO
        })
    }
}

/// A single armed wake on the audio clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopWake {
    pub armed_at: f64,
    pub deadline: f64,
}

/// One-shot timer on the audio clock. Arming replaces any previous wake.
#[derive(Debug, Default)]
pub struct LoopTimer {
    wake: Option<LoopWake>,
}

impl LoopTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire `wait` after `now` and returns the deadline.
    pub fn arm(&mut self, now: f64, wait: Duration) -> f64 {
        let deadline = now + wait.as_secs_f64();
        if let Some(previous) = self.wake.replace(LoopWake {
            armed_at: now,
            deadline,
        }) {
            log::debug!(
                "Superseding loop wake at {:.3}s with {:.3}s",
                previous.deadline,
                deadline
            );
        }
        deadline
    }

    /// Disarms the timer. Returns true if a wake was pending.
    pub fn cancel(&mut self) -> bool {
        self.wake.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.wake.is_some()
    }

    pub fn wake(&self) -> Option<LoopWake> {
        self.wake
    }

    pub fn deadline(&self) -> Option<f64> {
        self.wake.map(|wake| wake.deadline)
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self, now: f64) -> Option<Duration> {
        self.wake.map(|wake| {
            Duration::try_from_secs_f64((wake.deadline - now).max(0.0)).unwrap_or(Duration::MAX)
        })
    }

    /// Fires the wake if `now` has reached the deadline. A fired wake is disarmed.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.wake {
            Some(wake) if now >= wake.deadline => {
                self.wake = None;
                true
            }
            _ => false,
        }
    }
}
