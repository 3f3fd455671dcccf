//! Background music: one current track, blended against the previous one.
//!
//! Each `play_track` acquires a fresh music channel, blends the outgoing
//! channel out, fades the new one in and arms a single wake on the audio
//! clock. At the wake a looping pack restarts the same clip; a non-looping
//! pack holds its volume over the reverb tail and is then released.

use crate::channel::{ChannelCategory, ChannelLease};
use crate::config::{MusicDesc, Placement, SpatialParams};
use crate::context::PlaybackContext;
use crate::error::{Result, StrataError};
use crate::events::StrataEvent;
use crate::fade::{Fade, FadeEnd, FadeOutcome};
use crate::pack::{AudioPack, MusicPack, OutputGroup};
use crate::timing::LoopTimer;
use std::sync::Arc;
use std::time::Duration;

/// How the outgoing track leaves when a new one starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlendOut {
    /// Ramp to silence over the given time
    Duration(Duration),
    /// Keep the current volume for the outgoing pack's tail, then cut
    Tail,
}

/// Parameters for [`Strata::play_music`](crate::Strata::play_music).
///
/// Blends left at `None` use [`MusicDesc::default_blend`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MusicRequest {
    pub clip_index: usize,
    /// Offset into the clip to start from
    pub start_time: Duration,
    pub blend_out: Option<BlendOut>,
    pub blend_in: Option<Duration>,
}

impl MusicRequest {
    pub fn clip(clip_index: usize) -> Self {
        Self {
            clip_index,
            ..Self::default()
        }
    }

    pub fn starting_at(mut self, start_time: Duration) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_blend_out(mut self, blend_out: Duration) -> Self {
        self.blend_out = Some(BlendOut::Duration(blend_out));
        self
    }

    pub fn with_tail_blend_out(mut self) -> Self {
        self.blend_out = Some(BlendOut::Tail);
        self
    }

    pub fn with_blend_in(mut self, blend_in: Duration) -> Self {
        self.blend_in = Some(blend_in);
        self
    }

    /// Same duration for both directions.
    pub fn with_blend(self, blend: Duration) -> Self {
        self.with_blend_out(blend).with_blend_in(blend)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicState {
    Idle,
    /// Started by a caller
    Playing,
    /// Restarted itself at least once
    Looping,
    /// Holding over the tail of a non-looping pack
    Decaying,
    /// Fading out after `stop_music`
    Stopping,
}

#[derive(Debug)]
pub struct MusicController {
    max_volume: f32,
    default_blend: Duration,
    retrigger_blend: Duration,
    output_group: Option<OutputGroup>,
    state: MusicState,
    current: Option<ChannelLease>,
    pack: Option<Arc<MusicPack>>,
    clip_index: usize,
    timer: LoopTimer,
    /// Audio-clock time the tail hold of a non-looping pack ends
    tail_ends: Option<f64>,
    retriggers: u32,
}

impl MusicController {
    pub fn new(desc: &MusicDesc) -> Self {
        Self {
            max_volume: desc.max_volume,
            default_blend: desc.default_blend,
            retrigger_blend: desc.retrigger_blend,
            output_group: desc.output_group.clone(),
            state: MusicState::Idle,
            current: None,
            pack: None,
            clip_index: 0,
            timer: LoopTimer::new(),
            tail_ends: None,
            retriggers: 0,
        }
    }

    pub fn state(&self) -> MusicState {
        self.state
    }

    pub fn current_channel(&self) -> Option<ChannelLease> {
        self.current
    }

    pub fn current_pack(&self) -> Option<&Arc<MusicPack>> {
        self.pack.as_ref()
    }

    pub fn clip_index(&self) -> usize {
        self.clip_index
    }

    /// How many times the current pack has restarted itself
    pub fn retrigger_count(&self) -> u32 {
        self.retriggers
    }

    /// Time until the next wake, plus the tail when the pack does not loop.
    /// While decaying, the part of the tail still to ring out.
    pub fn time_remaining(&self, now: f64) -> Duration {
        if let Some(tail_ends) = self.tail_ends {
            return Duration::try_from_secs_f64((tail_ends - now).max(0.0)).unwrap_or_default();
        }
        let Some(remaining) = self.timer.remaining(now) else {
            return Duration::ZERO;
        };
        match &self.pack {
            Some(pack) if !pack.is_looping() => remaining + pack.tail(),
            _ => remaining,
        }
    }

    pub(crate) fn play_track(
        &mut self,
        ctx: &mut PlaybackContext<'_>,
        pack: Arc<MusicPack>,
        request: &MusicRequest,
    ) -> Result<ChannelLease> {
        self.retriggers = 0;
        self.start(ctx, pack, request, false)
    }

    /// Plays a clip of `pack` picked at random; `request.clip_index` is ignored.
    pub(crate) fn play_random_track(
        &mut self,
        ctx: &mut PlaybackContext<'_>,
        pack: Arc<MusicPack>,
        request: &MusicRequest,
    ) -> Result<ChannelLease> {
        let clip_index = pack
            .random_index(ctx.rng)
            .ok_or_else(|| StrataError::EmptyPack(pack.name().to_string()))?;
        self.play_track(ctx, pack, &MusicRequest { clip_index, ..*request })
    }

    fn start(
        &mut self,
        ctx: &mut PlaybackContext<'_>,
        pack: Arc<MusicPack>,
        request: &MusicRequest,
        retrigger: bool,
    ) -> Result<ChannelLease> {
        let clip = Arc::clone(pack.checked_clip(request.clip_index)?);
        let lease = ctx.acquire(ChannelCategory::Music)?;

        let blend_out = request
            .blend_out
            .unwrap_or(BlendOut::Duration(self.default_blend));
        let blend_in = request.blend_in.unwrap_or(self.default_blend);
        if let Some(previous) = self.current.take() {
            self.blend_out(ctx, previous, blend_out);
        }
        self.tail_ends = None;

        let pitch = ctx.sample_pitch(pack.pitch());
        let channel = ctx.pool.checked_mut(lease)?;
        channel.set_clip(ctx.render, Arc::clone(&clip));
        channel.set_looping(ctx.render, false);
        channel.set_output_group(
            ctx.render,
            pack.output_group().or(self.output_group.as_ref()),
        );
        channel.set_pitch(ctx.render, pitch);
        channel.set_spatial(
            ctx.render,
            SpatialParams {
                blend: 0.0,
                ..*pack.spatial()
            },
        );
        channel.set_time(ctx.render, request.start_time);
        channel.set_volume(ctx.render, 0.0);
        channel.play(ctx.render);
        ctx.place(lease, Placement::None)?;

        let wait = pack.retrigger().wait(clip.duration(), request.start_time);
        self.timer.arm(ctx.now(), wait);

        let target = self.max_volume * pack.play_volume();
        ctx.start_fade(Fade::new(
            lease,
            0.0,
            target,
            blend_in,
            FadeEnd::for_target(target),
        ));

        log::info!(
            "Music '{}' from pack '{}' on {} (target volume {:.2}, next wake in {:.2}s)",
            clip.name(),
            pack.name(),
            lease,
            target,
            wait.as_secs_f64()
        );

        self.state = if retrigger {
            MusicState::Looping
        } else {
            MusicState::Playing
        };
        self.current = Some(lease);
        self.pack = Some(pack);
        self.clip_index = request.clip_index;

        let clip = clip.name().to_string();
        ctx.emit(if retrigger {
            StrataEvent::MusicRetriggered {
                channel: lease.id,
                clip,
                count: self.retriggers,
            }
        } else {
            StrataEvent::MusicStarted {
                channel: lease.id,
                clip,
            }
        });
        Ok(lease)
    }

    fn blend_out(&self, ctx: &mut PlaybackContext<'_>, previous: ChannelLease, blend: BlendOut) {
        let Some(volume) = ctx.volume(previous) else {
            return;
        };
        let fade = match blend {
            BlendOut::Duration(duration) => {
                Fade::new(previous, volume, 0.0, duration, FadeEnd::Release)
            }
            BlendOut::Tail => {
                let tail = self.pack.as_ref().map(|pack| pack.tail()).unwrap_or_default();
                Fade::new(previous, volume, volume, tail, FadeEnd::Release)
            }
        };
        log::debug!("Blending out music on {} over {:?}", previous, blend);
        ctx.start_fade(fade);
    }

    /// Fades the current track out; `None` uses the default blend.
    pub(crate) fn stop_track(&mut self, ctx: &mut PlaybackContext<'_>, fade_out: Option<Duration>) {
        let fade_out = fade_out.unwrap_or(self.default_blend);
        self.timer.cancel();
        self.tail_ends = None;
        let Some(lease) = self.current else {
            log::debug!("stop_music: nothing is playing");
            return;
        };
        let Some(volume) = ctx.volume(lease) else {
            self.reset();
            return;
        };

        log::info!("Stopping music on {} over {:.2}s", lease, fade_out.as_secs_f64());
        self.state = MusicState::Stopping;
        ctx.start_fade(Fade::new(lease, volume, 0.0, fade_out, FadeEnd::Release));
    }

    /// Fires the wake once the audio clock reaches it.
    pub(crate) fn tick(&mut self, ctx: &mut PlaybackContext<'_>) {
        if !self.timer.poll(ctx.now()) {
            return;
        }
        let Some(pack) = self.pack.clone() else {
            return;
        };

        if pack.is_looping() {
            let request = MusicRequest {
                clip_index: self.clip_index,
                start_time: Duration::ZERO,
                blend_out: Some(BlendOut::Duration(self.retrigger_blend)),
                blend_in: Some(self.retrigger_blend),
            };
            self.retriggers += 1;
            if let Err(err) = self.start(ctx, pack, &request, true) {
                log::warn!("Music retrigger failed: {}", err);
            }
            return;
        }

        let Some(lease) = self.current else {
            return;
        };
        let Some(volume) = ctx.volume(lease) else {
            self.reset();
            return;
        };
        log::info!(
            "Music pack '{}' does not loop; holding {:.2}s tail on {}",
            pack.name(),
            pack.tail().as_secs_f64(),
            lease
        );
        self.state = MusicState::Decaying;
        self.tail_ends = Some(ctx.now() + pack.tail().as_secs_f64());
        ctx.emit(StrataEvent::MusicDecaying {
            channel: lease.id,
            tail: pack.tail(),
        });
        ctx.start_fade(Fade::new(lease, volume, volume, pack.tail(), FadeEnd::Release));
    }

    pub(crate) fn on_fade_outcome(&mut self, ctx: &mut PlaybackContext<'_>, outcome: &FadeOutcome) {
        let FadeOutcome::Released(lease) = outcome else {
            return;
        };
        if self.current == Some(*lease) {
            log::info!("Music on {} finished", lease);
            ctx.emit(StrataEvent::MusicStopped { channel: lease.id });
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.timer.cancel();
        self.tail_ends = None;
        self.current = None;
        self.pack = None;
        self.state = MusicState::Idle;
    }
}
