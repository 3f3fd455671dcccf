use crate::backend::{AttachmentBackend, RenderBackend};
use crate::channel::{Channel, ChannelCategory, ChannelLease, ChannelPool};
use crate::config::Placement;
use crate::error::Result;
use crate::events::StrataEvent;
use crate::fade::{Fade, FadeOutcome, FadeScheduler};
use crate::pack::PitchRandomization;
use crossbeam_channel::Sender;
use rand::rngs::StdRng;

/// Everything a subsystem needs to drive channels, borrowed out of the
/// orchestrator for the duration of one call.
pub(crate) struct PlaybackContext<'a> {
    pub render: &'a mut dyn RenderBackend,
    pub attachment: &'a mut dyn AttachmentBackend,
    pub pool: &'a mut ChannelPool,
    pub fades: &'a mut FadeScheduler,
    pub rng: &'a mut StdRng,
    /// Outcomes of fades that completed synchronously, routed after the call
    pub pending: &'a mut Vec<FadeOutcome>,
    pub events: &'a Sender<StrataEvent>,
}

impl PlaybackContext<'_> {
    pub fn emit(&self, event: StrataEvent) {
        // The orchestrator owns the receiver, so this cannot disconnect while we run
        let _ = self.events.send(event);
    }

    /// Current audio clock time.
    pub fn now(&self) -> f64 {
        self.render.dsp_time()
    }

    /// Acquires an idle channel and clears any fade a previous owner left on it.
    pub fn acquire(&mut self, category: ChannelCategory) -> Result<ChannelLease> {
        let lease = self.pool.acquire(category, self.render)?;
        self.fades.cancel_channel(lease.id);
        Ok(lease)
    }

    /// Cancels the lease's fade, stops the channel and returns it to idle.
    pub fn release(&mut self, lease: ChannelLease) -> bool {
        self.fades.cancel(lease);
        let Some(category) = self.pool.get(lease).map(Channel::category) else {
            return false;
        };
        if self.pool.release(lease, self.render) {
            self.emit(StrataEvent::ChannelReleased {
                category,
                channel: lease.id,
            });
            true
        } else {
            false
        }
    }

    /// Starts a fade, queueing its outcome if it completed immediately.
    pub fn start_fade(&mut self, fade: Fade) {
        if let Some(outcome) = self.fades.start(fade, self.pool, self.render) {
            self.pending.push(outcome);
        }
    }

    pub fn volume(&self, lease: ChannelLease) -> Option<f32> {
        self.pool.get(lease).map(Channel::volume)
    }

    pub fn set_volume(&mut self, lease: ChannelLease, volume: f32) -> Result<()> {
        let channel = self.pool.checked_mut(lease)?;
        channel.set_volume(self.render, volume);
        Ok(())
    }

    pub fn sample_pitch(&mut self, pitch: &PitchRandomization) -> f32 {
        pitch.sample(self.rng)
    }

    /// Resets the channel's attachment and applies `placement`.
    pub fn place(&mut self, lease: ChannelLease, placement: Placement) -> Result<()> {
        let channel = self.pool.checked_mut(lease)?;
        let voice = channel.voice();
        self.attachment.detach(voice);
        match placement {
            Placement::None => {}
            Placement::WorldPosition(position) => {
                self.attachment.set_world_position(voice, position);
            }
            Placement::AttachedTo { node, offset } => {
                self.attachment.set_parent(voice, node);
                self.attachment.set_local_position(voice, offset);
            }
        }
        channel.set_placement(placement);
        Ok(())
    }
}
