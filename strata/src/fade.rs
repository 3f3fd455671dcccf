//! Time-driven volume ramps.
//!
//! A [`Fade`] is an explicit task record advanced by [`FadeScheduler::tick`].
//! The scheduler holds at most one fade per channel; starting another on the
//! same channel replaces it.

use crate::backend::RenderBackend;
use crate::channel::{ChannelId, ChannelLease, ChannelPool};
use crate::math::smoothstep;
use std::collections::BTreeMap;
use std::time::Duration;

/// What happens to the channel once a fade reaches its end volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeEnd {
    /// Keep playing at the end volume
    Hold,
    /// Stop the channel and return it to the pool
    Release,
    /// Keep playing and hand control back to the owner
    Continue,
}

impl FadeEnd {
    /// Release when fading to silence, hold otherwise.
    pub fn for_target(to: f32) -> Self {
        if to <= 0.0 { Self::Release } else { Self::Hold }
    }
}

/// A finished fade, reported to whoever owns the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    Held(ChannelLease),
    Released(ChannelLease),
    Continued(ChannelLease),
}

impl FadeOutcome {
    pub fn lease(&self) -> ChannelLease {
        match self {
            Self::Held(lease) | Self::Released(lease) | Self::Continued(lease) => *lease,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    pub lease: ChannelLease,
    pub from: f32,
    pub to: f32,
    pub duration: Duration,
    pub elapsed: Duration,
    pub end: FadeEnd,
}

impl Fade {
    pub fn new(lease: ChannelLease, from: f32, to: f32, duration: Duration, end: FadeEnd) -> Self {
        Self {
            lease,
            from,
            to,
            duration,
            elapsed: Duration::ZERO,
            end,
        }
    }

    /// Volume at the current elapsed time.
    pub fn volume(&self) -> f32 {
        if self.is_finished() {
            return self.to;
        }
        let t = self.elapsed.as_secs_f64() / self.duration.as_secs_f64();
        smoothstep(self.from, self.to, t as f32)
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Advances by `dt` and returns the new volume.
    pub fn advance(&mut self, dt: Duration) -> f32 {
        self.elapsed = self.elapsed.saturating_add(dt).min(self.duration);
        self.volume()
    }
}

#[derive(Debug, Default)]
pub struct FadeScheduler {
    fades: BTreeMap<ChannelId, Fade>,
}

impl FadeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `fade`, replacing whatever fade the channel had.
    ///
    /// The channel is set to `fade.from` right away. A zero-length fade
    /// completes here and its outcome is returned; otherwise `None`.
    pub fn start(
        &mut self,
        fade: Fade,
        pool: &mut ChannelPool,
        render: &mut dyn RenderBackend,
    ) -> Option<FadeOutcome> {
        let Some(channel) = pool.get_mut(fade.lease) else {
            log::debug!("Ignoring fade on stale channel {}", fade.lease);
            return None;
        };

        if let Some(previous) = self.fades.remove(&fade.lease.id) {
            log::debug!(
                "Fade {:.2} -> {:.2} on {} superseded",
                previous.from,
                previous.to,
                previous.lease
            );
        }

        channel.set_volume(render, fade.from);
        if fade.duration.is_zero() {
            return Self::finish(fade, pool, render);
        }
        self.fades.insert(fade.lease.id, fade);
        None
    }

    /// Drops the fade on `lease`'s channel, if it belongs to that lease.
    pub fn cancel(&mut self, lease: ChannelLease) -> bool {
        match self.fades.get(&lease.id) {
            Some(fade) if fade.lease == lease => self.fades.remove(&lease.id).is_some(),
            _ => false,
        }
    }

    /// Drops any fade on the channel, whoever started it.
    pub fn cancel_channel(&mut self, id: ChannelId) -> bool {
        self.fades.remove(&id).is_some()
    }

    pub fn get(&self, lease: ChannelLease) -> Option<&Fade> {
        self.fades.get(&lease.id).filter(|fade| fade.lease == lease)
    }

    pub fn is_fading(&self, lease: ChannelLease) -> bool {
        self.get(lease).is_some()
    }

    pub fn len(&self) -> usize {
        self.fades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fades.is_empty()
    }

    /// Advances every fade by `dt` of unscaled time and returns those that finished.
    pub fn tick(
        &mut self,
        dt: Duration,
        pool: &mut ChannelPool,
        render: &mut dyn RenderBackend,
    ) -> Vec<FadeOutcome> {
        let mut finished = Vec::new();
        self.fades.retain(|_, fade| {
            let Some(channel) = pool.get_mut(fade.lease) else {
                // Channel was re-acquired by someone else
                return false;
            };
            let volume = fade.advance(dt);
            channel.set_volume(render, volume);
            if fade.is_finished() {
                finished.push(*fade);
                false
            } else {
                true
            }
        });

        finished
            .into_iter()
            .filter_map(|fade| Self::finish(fade, pool, render))
            .collect()
    }

    fn finish(
        fade: Fade,
        pool: &mut ChannelPool,
        render: &mut dyn RenderBackend,
    ) -> Option<FadeOutcome> {
        let channel = pool.get_mut(fade.lease)?;
        channel.set_volume(render, fade.to);
        match fade.end {
            FadeEnd::Hold => Some(FadeOutcome::Held(fade.lease)),
            FadeEnd::Continue => Some(FadeOutcome::Continued(fade.lease)),
            FadeEnd::Release => {
                pool.release(fade.lease, render);
                Some(FadeOutcome::Released(fade.lease))
            }
        }
    }
}
