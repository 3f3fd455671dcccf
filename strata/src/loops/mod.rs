//! Looping ambience layers.
//!
//! - [`LoopManager`]: owns every live loop, runs cross-fades and reclaims
//!   finished loops on a throttled sweep
//! - [`LoopHandle`]: the caller's weak, cloneable controller for one loop
//!
//! A loop moves `Active -> Stopping -> Inactive` (faded stop) or straight
//! `Active -> Inactive` (`stop_immediate`). Once inactive, every handle
//! operation is a no-op.

mod handle;

pub use handle::LoopHandle;

use crate::backend::RenderBackend;
use crate::channel::{ChannelCategory, ChannelLease, ChannelPool};
use crate::config::{LoopDesc, Placement, SpatialDefaults, SpatialParams};
use crate::context::PlaybackContext;
use crate::error::{Result, StrataError};
use crate::events::StrataEvent;
use crate::fade::{Fade, FadeEnd, FadeOutcome};
use crate::math::{Vec3, clamp01};
use crate::pack::{AudioPack, LoopPack};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(u64);

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoopId({})", self.0)
    }
}

/// Parameters for [`Strata::start_loop`](crate::Strata::start_loop).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRequest {
    pub clip_index: usize,
    pub fade_in: Duration,
    /// Desired volume, capped at the pack's play volume
    pub start_volume: f32,
    pub placement: Placement,
}

impl Default for LoopRequest {
    fn default() -> Self {
        Self {
            clip_index: 0,
            fade_in: Duration::from_millis(500),
            start_volume: 1.0,
            placement: Placement::None,
        }
    }
}

impl LoopRequest {
    /// Request using the pack's own fade-in and play volume.
    pub fn from_pack(pack: &LoopPack) -> Self {
        Self {
            fade_in: pack.default_fade_in(),
            start_volume: pack.play_volume(),
            ..Self::default()
        }
    }

    pub fn clip(clip_index: usize) -> Self {
        Self {
            clip_index,
            ..Self::default()
        }
    }

    pub fn with_clip_index(mut self, clip_index: usize) -> Self {
        self.clip_index = clip_index;
        self
    }

    pub fn with_fade_in(mut self, fade_in: Duration) -> Self {
        self.fade_in = fade_in;
        self
    }

    pub fn with_start_volume(mut self, start_volume: f32) -> Self {
        self.start_volume = start_volume;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Active,
    Stopping,
    Inactive,
}

/// Second half of a clip cross-fade, run once the channel reaches silence.
#[derive(Debug, Clone, Copy)]
struct PendingSwap {
    clip_index: usize,
    restore_volume: f32,
    half: Duration,
}

#[derive(Debug)]
struct LoopEntry {
    id: LoopId,
    lease: ChannelLease,
    pack: Arc<LoopPack>,
    clip_index: usize,
    state: LoopState,
    target_volume: f32,
    pending: Option<PendingSwap>,
}

impl LoopEntry {
    fn scaled(&self, volume: f32) -> f32 {
        clamp01(volume) * self.pack.play_volume()
    }

    /// Clip index after any cross-fade in flight completes
    fn effective_clip(&self) -> usize {
        self.pending
            .map(|swap| swap.clip_index)
            .unwrap_or(self.clip_index)
    }

    fn is_active(&self, pool: &ChannelPool, render: &dyn RenderBackend) -> bool {
        self.state != LoopState::Inactive
            && pool
                .get(self.lease)
                .is_some_and(|channel| channel.is_busy(render))
    }
}

#[derive(Debug)]
pub struct LoopManager {
    entries: Vec<LoopEntry>,
    next_id: u64,
    defaults: SpatialDefaults,
    sweep_interval: Duration,
    since_sweep: Duration,
}

impl LoopManager {
    pub fn new(desc: &LoopDesc) -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            defaults: desc.spatial_defaults,
            sweep_interval: desc.sweep_interval,
            since_sweep: Duration::ZERO,
        }
    }

    /// Loops tracked so far, including inactive ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: LoopId) -> Option<&LoopEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Entry that still owns its channel and has not been stopped.
    fn live_mut(&mut self, pool: &ChannelPool, id: LoopId) -> Option<&mut LoopEntry> {
        self.entries.iter_mut().find(|entry| {
            entry.id == id && entry.state != LoopState::Inactive && pool.is_current(entry.lease)
        })
    }

    /// Like `live_mut`, but a loop that is already fading out is excluded too.
    fn active_mut(&mut self, pool: &ChannelPool, id: LoopId) -> Option<&mut LoopEntry> {
        self.live_mut(pool, id)
            .filter(|entry| entry.state == LoopState::Active)
    }

    pub(crate) fn start(
        &mut self,
        ctx: &mut PlaybackContext<'_>,
        pack: Arc<LoopPack>,
        request: &LoopRequest,
    ) -> Result<LoopId> {
        let clip = Arc::clone(pack.checked_clip(request.clip_index)?);
        let lease = ctx.acquire(ChannelCategory::Loop)?;
        ctx.place(lease, request.placement)?;

        let pitch = ctx.sample_pitch(pack.pitch());
        let spatial = SpatialParams::resolve(pack.spatial(), &self.defaults, &request.placement);
        let channel = ctx.pool.checked_mut(lease)?;
        channel.set_clip(ctx.render, Arc::clone(&clip));
        channel.set_looping(ctx.render, true);
        channel.set_output_group(ctx.render, pack.output_group());
        channel.set_pitch(ctx.render, pitch);
        channel.set_spatial(ctx.render, spatial);
        channel.set_time(ctx.render, Duration::ZERO);
        channel.set_volume(ctx.render, 0.0);
        channel.play(ctx.render);

        self.next_id += 1;
        let id = LoopId(self.next_id);
        self.entries.push(LoopEntry {
            id,
            lease,
            pack: Arc::clone(&pack),
            clip_index: request.clip_index,
            state: LoopState::Active,
            target_volume: 0.0,
            pending: None,
        });

        log::info!(
            "Loop {} started: '{}' from pack '{}' on {}",
            id,
            clip.name(),
            pack.name(),
            lease
        );
        ctx.emit(StrataEvent::LoopStarted {
            loop_id: id,
            channel: lease.id,
        });

        let ratio = if pack.play_volume() > 0.0 {
            request.start_volume / pack.play_volume()
        } else {
            0.0
        };
        self.fade_to_volume(ctx, id, ratio, request.fade_in);
        Ok(id)
    }

    /// Starts a loop on a random clip of `pack`; `request.clip_index` is ignored.
    pub(crate) fn start_random(
        &mut self,
        ctx: &mut PlaybackContext<'_>,
        pack: Arc<LoopPack>,
        request: &LoopRequest,
    ) -> Result<LoopId> {
        let clip_index = pack
            .random_index(ctx.rng)
            .ok_or_else(|| StrataError::EmptyPack(pack.name().to_string()))?;
        self.start(ctx, pack, &request.with_clip_index(clip_index))
    }

    /// Sets the volume (0..1 of the pack volume) at once, cancelling any fade.
    pub(crate) fn set_volume(&mut self, ctx: &mut PlaybackContext<'_>, id: LoopId, volume: f32) -> bool {
        let Some(entry) = self.active_mut(ctx.pool, id) else {
            return false;
        };
        let volume = entry.scaled(volume);
        entry.pending = None;
        entry.target_volume = volume;
        ctx.fades.cancel(entry.lease);
        ctx.set_volume(entry.lease, volume).is_ok()
    }

    /// Ramps to `volume` (0..1 of the pack volume). Fading to zero keeps the loop running.
    pub(crate) fn fade_to_volume(
        &mut self,
        ctx: &mut PlaybackContext<'_>,
        id: LoopId,
        volume: f32,
        duration: Duration,
    ) -> bool {
        let Some(entry) = self.active_mut(ctx.pool, id) else {
            return false;
        };
        let target = entry.scaled(volume);
        entry.pending = None;
        entry.target_volume = target;
        let from = ctx.volume(entry.lease).unwrap_or(0.0);
        ctx.start_fade(Fade::new(entry.lease, from, target, duration, FadeEnd::Hold));
        true
    }

    /// Cross-fades to another clip of the same pack: out over half the time,
    /// swap and rewind, back in over the other half.
    pub(crate) fn change_clip(
        &mut self,
        ctx: &mut PlaybackContext<'_>,
        id: LoopId,
        index: usize,
        crossfade: Option<Duration>,
    ) -> bool {
        let Some(entry) = self.active_mut(ctx.pool, id) else {
            return false;
        };
        if index >= entry.pack.clip_count() {
            log::debug!(
                "Loop {}: clip {} out of range for pack '{}'",
                id,
                index,
                entry.pack.name()
            );
            return false;
        }
        if index == entry.effective_clip() {
            return false;
        }

        let current = ctx.volume(entry.lease).unwrap_or(0.0);
        let restore_volume = entry
            .pending
            .map(|swap| swap.restore_volume)
            .unwrap_or(current);
        let half = crossfade.unwrap_or_else(|| entry.pack.crossfade()) / 2;
        entry.pending = Some(PendingSwap {
            clip_index: index,
            restore_volume,
            half,
        });

        log::debug!(
            "Loop {}: cross-fading clip {} -> {} over {:.2}s",
            id,
            entry.clip_index,
            index,
            (half * 2).as_secs_f64()
        );
        ctx.start_fade(Fade::new(entry.lease, current, 0.0, half, FadeEnd::Continue));
        true
    }

    /// Cross-fades to a random clip other than the current one.
    pub(crate) fn change_to_random_clip(
        &mut self,
        ctx: &mut PlaybackContext<'_>,
        id: LoopId,
        crossfade: Option<Duration>,
    ) -> bool {
        let Some(entry) = self.active_mut(ctx.pool, id) else {
            return false;
        };
        let count = entry.pack.clip_count();
        if count < 2 {
            return false;
        }
        let index = (entry.effective_clip() + ctx.rng.random_range(1..count)) % count;
        self.change_clip(ctx, id, index, crossfade)
    }

    /// Fades out and releases the channel. `None` uses the pack's fade-out.
    pub(crate) fn stop(
        &mut self,
        ctx: &mut PlaybackContext<'_>,
        id: LoopId,
        fade_out: Option<Duration>,
    ) -> bool {
        let Some(entry) = self.active_mut(ctx.pool, id) else {
            return false;
        };
        let duration = fade_out.unwrap_or_else(|| entry.pack.default_fade_out());
        entry.pending = None;
        entry.state = LoopState::Stopping;

        log::debug!("Loop {}: stopping over {:.2}s", id, duration.as_secs_f64());
        let from = ctx.volume(entry.lease).unwrap_or(0.0);
        ctx.start_fade(Fade::new(entry.lease, from, 0.0, duration, FadeEnd::Release));
        true
    }

    pub(crate) fn stop_immediate(&mut self, ctx: &mut PlaybackContext<'_>, id: LoopId) -> bool {
        let Some(entry) = self.live_mut(ctx.pool, id) else {
            return false;
        };
        entry.pending = None;
        entry.state = LoopState::Inactive;
        ctx.release(entry.lease);

        log::debug!("Loop {}: stopped immediately", id);
        ctx.emit(StrataEvent::LoopStopped { loop_id: id });
        true
    }

    pub(crate) fn pause(&mut self, ctx: &mut PlaybackContext<'_>, id: LoopId) -> bool {
        let Some(entry) = self.live_mut(ctx.pool, id) else {
            return false;
        };
        match ctx.pool.get_mut(entry.lease) {
            Some(channel) => {
                channel.pause(ctx.render);
                true
            }
            None => false,
        }
    }

    pub(crate) fn resume(&mut self, ctx: &mut PlaybackContext<'_>, id: LoopId) -> bool {
        let Some(entry) = self.live_mut(ctx.pool, id) else {
            return false;
        };
        match ctx.pool.get_mut(entry.lease) {
            Some(channel) => {
                channel.resume(ctx.render);
                true
            }
            None => false,
        }
    }

    pub(crate) fn update_position(
        &mut self,
        ctx: &mut PlaybackContext<'_>,
        id: LoopId,
        position: Vec3,
    ) -> bool {
        let Some(entry) = self.live_mut(ctx.pool, id) else {
            return false;
        };
        let Some(channel) = ctx.pool.get_mut(entry.lease) else {
            return false;
        };
        ctx.attachment.set_world_position(channel.voice(), position);
        if matches!(channel.placement(), Placement::WorldPosition(_)) {
            channel.set_placement(Placement::WorldPosition(position));
        }
        true
    }

    pub(crate) fn stop_all(&mut self, ctx: &mut PlaybackContext<'_>, fade_out: Duration) {
        let ids: Vec<LoopId> = self
            .entries
            .iter()
            .filter(|entry| entry.state == LoopState::Active)
            .map(|entry| entry.id)
            .collect();
        log::info!("Stopping {} loops over {:.2}s", ids.len(), fade_out.as_secs_f64());
        for id in ids {
            self.stop(ctx, id, Some(fade_out));
        }
    }

    pub(crate) fn stop_all_immediate(&mut self, ctx: &mut PlaybackContext<'_>) {
        let ids: Vec<LoopId> = self.entries.iter().map(|entry| entry.id).collect();
        for id in ids {
            self.stop_immediate(ctx, id);
        }
        self.sweep(ctx);
    }

    pub fn is_active(&self, pool: &ChannelPool, render: &dyn RenderBackend, id: LoopId) -> bool {
        self.entry(id)
            .is_some_and(|entry| entry.is_active(pool, render))
    }

    pub fn state(&self, id: LoopId) -> LoopState {
        self.entry(id)
            .map(|entry| entry.state)
            .unwrap_or(LoopState::Inactive)
    }

    /// Volume the channel is at right now, 0.0 once the loop is gone.
    pub fn current_volume(&self, pool: &ChannelPool, id: LoopId) -> f32 {
        self.entry(id)
            .filter(|entry| entry.state != LoopState::Inactive)
            .and_then(|entry| pool.get(entry.lease))
            .map(|channel| channel.volume())
            .unwrap_or(0.0)
    }

    pub fn target_volume(&self, id: LoopId) -> f32 {
        self.entry(id)
            .map(|entry| entry.target_volume)
            .unwrap_or(0.0)
    }

    pub fn clip_index(&self, id: LoopId) -> Option<usize> {
        self.entry(id).map(|entry| entry.clip_index)
    }

    /// Routes a finished fade to the loop that owns the channel.
    pub(crate) fn on_fade_outcome(&mut self, ctx: &mut PlaybackContext<'_>, outcome: &FadeOutcome) {
        let lease = outcome.lease();
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.lease == lease && entry.state != LoopState::Inactive)
        else {
            return;
        };

        match outcome {
            FadeOutcome::Released(_) => {
                entry.state = LoopState::Inactive;
                entry.pending = None;
                log::debug!("Loop {}: faded out", entry.id);
                ctx.emit(StrataEvent::LoopStopped { loop_id: entry.id });
            }
            FadeOutcome::Continued(_) => {
                if let Some(swap) = entry.pending.take() {
                    Self::swap_clip(ctx, entry, swap);
                }
            }
            FadeOutcome::Held(_) => {}
        }
    }

    fn swap_clip(ctx: &mut PlaybackContext<'_>, entry: &mut LoopEntry, swap: PendingSwap) {
        let Some(clip) = entry.pack.clip(swap.clip_index).cloned() else {
            return;
        };
        let pitch = entry
            .pack
            .pitch()
            .enabled
            .then(|| ctx.sample_pitch(entry.pack.pitch()));
        let Some(channel) = ctx.pool.get_mut(entry.lease) else {
            return;
        };

        channel.set_clip(ctx.render, clip);
        channel.set_time(ctx.render, Duration::ZERO);
        if let Some(pitch) = pitch {
            channel.set_pitch(ctx.render, pitch);
        }
        if !channel.is_busy(&*ctx.render) {
            channel.play(ctx.render);
        }

        entry.clip_index = swap.clip_index;
        ctx.emit(StrataEvent::LoopClipChanged {
            loop_id: entry.id,
            clip_index: swap.clip_index,
        });
        ctx.start_fade(Fade::new(
            entry.lease,
            0.0,
            swap.restore_volume,
            swap.half,
            FadeEnd::Hold,
        ));
    }

    /// Accumulates unscaled time and sweeps once the interval has passed.
    pub(crate) fn tick(&mut self, ctx: &mut PlaybackContext<'_>, dt: Duration) {
        self.since_sweep += dt;
        if self.since_sweep >= self.sweep_interval {
            self.since_sweep = Duration::ZERO;
            self.sweep(ctx);
        }
    }

    /// Drops every loop that is no longer active and returns how many went.
    pub(crate) fn sweep(&mut self, ctx: &mut PlaybackContext<'_>) -> usize {
        let pool: &ChannelPool = &*ctx.pool;
        let render: &dyn RenderBackend = &*ctx.render;
        let (live, finished): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.is_active(pool, render));
        self.entries = live;

        for entry in &finished {
            ctx.fades.cancel(entry.lease);
            if ctx.pool.is_current(entry.lease) {
                ctx.release(entry.lease);
            }
            log::debug!("Loop {} reclaimed", entry.id);
            ctx.emit(StrataEvent::LoopReclaimed { loop_id: entry.id });
        }
        if !finished.is_empty() {
            log::info!(
                "Reclaimed {} loops, {} still active",
                finished.len(),
                self.entries.len()
            );
        }
        finished.len()
    }

    pub(crate) fn active_count(&mut self, ctx: &mut PlaybackContext<'_>) -> usize {
        self.sweep(ctx);
        self.entries.len()
    }

    pub(crate) fn active_ids(&mut self, ctx: &mut PlaybackContext<'_>) -> Vec<LoopId> {
        self.sweep(ctx);
        self.entries.iter().map(|entry| entry.id).collect()
    }
}
