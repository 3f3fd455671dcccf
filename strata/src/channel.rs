//! Playback channels and the pool that hands them out.
//!
//! - [`ChannelCategory`]: music, effect or loop
//! - [`ChannelLease`]: a generation-checked reference to an acquired channel
//! - [`Channel`]: one reusable voice plus the state Strata last pushed to it
//! - [`ChannelPool`]: per-category, grow-only pool of channels
//!
//! Channels are never destroyed while the orchestrator lives. Releasing one
//! stops it and makes it idle; the next acquisition bumps its generation so
//! every lease held by the previous owner goes stale.

use crate::backend::{RenderBackend, VoiceId};
use crate::config::{Placement, SpatialParams};
use crate::error::{Result, StrataError};
use crate::math::clamp01;
use crate::pack::{AudioClip, OutputGroup};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelCategory {
    Music,
    Effect,
    Loop,
}

impl ChannelCategory {
    pub const ALL: [ChannelCategory; 3] = [Self::Music, Self::Effect, Self::Loop];

    fn slot(self) -> usize {
        match self {
            Self::Music => 0,
            Self::Effect => 1,
            Self::Loop => 2,
        }
    }
}

impl fmt::Display for ChannelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Music => "music",
            Self::Effect => "effect",
            Self::Loop => "loop",
        };
        f.write_str(name)
    }
}

/// Index of a channel in the pool's arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(usize);

impl ChannelId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

/// An acquired channel. Valid until the channel is released or re-acquired.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelLease {
    pub id: ChannelId,
    pub generation: u64,
}

impl fmt::Display for ChannelLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.generation)
    }
}

/// One playback voice and the state last pushed to the renderer.
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    voice: VoiceId,
    category: ChannelCategory,
    generation: u64,
    leased: bool,
    paused: bool,
    clip: Option<Arc<AudioClip>>,
    volume: f32,
    pitch: f32,
    spatial: SpatialParams,
    placement: Placement,
}

impl Channel {
    fn new(id: ChannelId, voice: VoiceId, category: ChannelCategory) -> Self {
        Self {
            id,
            voice,
            category,
            generation: 0,
            leased: false,
            paused: false,
            clip: None,
            volume: 1.0,
            pitch: 1.0,
            spatial: SpatialParams::default(),
            placement: Placement::None,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn voice(&self) -> VoiceId {
        self.voice
    }

    pub fn category(&self) -> ChannelCategory {
        self.category
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn lease(&self) -> ChannelLease {
        ChannelLease {
            id: self.id,
            generation: self.generation,
        }
    }

    pub fn clip(&self) -> Option<&Arc<AudioClip>> {
        self.clip.as_ref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn spatial(&self) -> &SpatialParams {
        &self.spatial
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Playing or paused. A busy channel is never handed out.
    pub fn is_busy(&self, render: &dyn RenderBackend) -> bool {
        self.paused || render.is_playing(self.voice)
    }

    pub(crate) fn set_clip(&mut self, render: &mut dyn RenderBackend, clip: Arc<AudioClip>) {
        render.set_clip(self.voice, Some(&clip));
        self.clip = Some(clip);
    }

    pub(crate) fn set_volume(&mut self, render: &mut dyn RenderBackend, volume: f32) {
        let volume = clamp01(volume);
        render.set_volume(self.voice, volume);
        self.volume = volume;
    }

    pub(crate) fn set_pitch(&mut self, render: &mut dyn RenderBackend, pitch: f32) {
        render.set_pitch(self.voice, pitch);
        self.pitch = pitch;
    }

    pub(crate) fn set_spatial(&mut self, render: &mut dyn RenderBackend, spatial: SpatialParams) {
        render.set_spatial(self.voice, &spatial);
        self.spatial = spatial;
    }

    pub(crate) fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    pub(crate) fn set_output_group(
        &mut self,
        render: &mut dyn RenderBackend,
        group: Option<&OutputGroup>,
    ) {
        render.set_output_group(self.voice, group);
    }

    pub(crate) fn set_time(&mut self, render: &mut dyn RenderBackend, position: Duration) {
        render.set_time(self.voice, position);
    }

    pub(crate) fn set_looping(&mut self, render: &mut dyn RenderBackend, looping: bool) {
        render.set_looping(self.voice, looping);
    }

    pub(crate) fn play(&mut self, render: &mut dyn RenderBackend) {
        render.play(self.voice);
        self.paused = false;
    }

    pub(crate) fn pause(&mut self, render: &mut dyn RenderBackend) {
        if render.is_playing(self.voice) {
            render.pause(self.voice);
            self.paused = true;
        }
    }

    pub(crate) fn resume(&mut self, render: &mut dyn RenderBackend) {
        if self.paused {
            render.resume(self.voice);
            self.paused = false;
        }
    }

    pub(crate) fn stop(&mut self, render: &mut dyn RenderBackend) {
        render.stop(self.voice);
        self.paused = false;
    }
}

/// Grow-only pool of channels with one index list per category.
#[derive(Debug, Default)]
pub struct ChannelPool {
    channels: Vec<Channel>,
    by_category: [Vec<ChannelId>; 3],
}

impl ChannelPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out an idle channel of `category`, creating one if none is idle.
    ///
    /// The returned channel carries a fresh generation; the caller owns it
    /// until it is released.
    pub fn acquire(
        &mut self,
        category: ChannelCategory,
        render: &mut dyn RenderBackend,
    ) -> Result<ChannelLease> {
        let view: &dyn RenderBackend = &*render;
        let idle = self.by_category[category.slot()]
            .iter()
            .copied()
            .find(|id| !self.channels[id.index()].is_busy(view));

        let id = match idle {
            Some(id) => id,
            None => {
                let voice = render
                    .create_voice(category)
                    .ok_or(StrataError::MissingTemplate(category))?;
                let id = ChannelId(self.channels.len());
                self.channels.push(Channel::new(id, voice, category));
                self.by_category[category.slot()].push(id);
                log::debug!(
                    "Created {} channel {} ({} in category)",
                    category,
                    id,
                    self.by_category[category.slot()].len()
                );
                id
            }
        };

        let channel = &mut self.channels[id.index()];
        channel.generation += 1;
        channel.leased = true;
        channel.paused = false;
        Ok(channel.lease())
    }

    /// Stops the channel and returns it to idle. Stale leases are ignored.
    pub fn release(&mut self, lease: ChannelLease, render: &mut dyn RenderBackend) -> bool {
        let Some(channel) = self.get_mut(lease) else {
            return false;
        };
        channel.stop(render);
        channel.set_volume(render, 0.0);
        channel.leased = false;
        log::debug!("Released {} channel {}", channel.category, lease);
        true
    }

    /// True while `lease` still refers to the channel's current owner.
    pub fn is_current(&self, lease: ChannelLease) -> bool {
        self.get(lease).is_some()
    }

    pub fn get(&self, lease: ChannelLease) -> Option<&Channel> {
        self.channels
            .get(lease.id.index())
            .filter(|channel| channel.leased && channel.generation == lease.generation)
    }

    pub fn get_mut(&mut self, lease: ChannelLease) -> Option<&mut Channel> {
        self.channels
            .get_mut(lease.id.index())
            .filter(|channel| channel.leased && channel.generation == lease.generation)
    }

    /// Like [`get_mut`](Self::get_mut) but reports a stale lease as an error.
    pub fn checked_mut(&mut self, lease: ChannelLease) -> Result<&mut Channel> {
        self.get_mut(lease)
            .ok_or(StrataError::StaleChannel(lease.id))
    }

    /// Looks a channel up regardless of ownership.
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len_of(&self, category: ChannelCategory) -> usize {
        self.by_category[category.slot()].len()
    }

    pub fn idle_count(&self, category: ChannelCategory, render: &dyn RenderBackend) -> usize {
        self.by_category[category.slot()]
            .iter()
            .filter(|id| !self.channels[id.index()].is_busy(render))
            .count()
    }

    /// Stops and destroys every voice. Only used when the orchestrator goes away.
    pub(crate) fn teardown(&mut self, render: &mut dyn RenderBackend) {
        for channel in self.channels.drain(..) {
            render.stop(channel.voice);
            render.destroy_voice(channel.voice);
        }
        for list in self.by_category.iter_mut() {
            list.clear();
        }
    }
}
