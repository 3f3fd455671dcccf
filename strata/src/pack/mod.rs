//! Read-only sound collections: what to play and how loud.

mod effect;
mod loop_pack;
mod music;

pub use effect::EffectPack;
pub use loop_pack::LoopPack;
pub use music::MusicPack;

use crate::config::SpatialParams;
use crate::error::{Result, StrataError};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A playable clip as far as Strata cares: a name and how long it plays.
///
/// Sample data lives with the renderer; backends look clips up by name.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    name: String,
    duration: Duration,
}

impl AudioClip {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }

    /// Convenience for building packs, which hold clips behind `Arc`.
    pub fn shared(name: impl Into<String>, duration: Duration) -> Arc<Self> {
        Arc::new(Self::new(name, duration))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Named mixer bus a voice is routed to. The renderer owns the actual buses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputGroup(String);

impl OutputGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutputGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional pitch variation applied each time a clip starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchRandomization {
    pub enabled: bool,
    pub min: f32,
    pub max: f32,
}

impl Default for PitchRandomization {
    fn default() -> Self {
        Self {
            enabled: false,
            min: 1.0,
            max: 1.0,
        }
    }
}

impl PitchRandomization {
    pub fn range(min: f32, max: f32) -> Self {
        Self {
            enabled: true,
            min,
            max,
        }
    }

    /// Draws a pitch. Disabled or degenerate ranges give 1.0 or the single bound.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if !self.enabled || !self.min.is_finite() || !self.max.is_finite() {
            return 1.0;
        }
        let (low, high) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        if low == high {
            return low;
        }
        rng.random_range(low..=high)
    }
}

/// Fields shared by every pack kind, with by-value builder setters.
#[derive(Debug, Clone)]
pub struct PackBase {
    name: String,
    clips: Vec<Arc<AudioClip>>,
    play_volume: f32,
    pitch: PitchRandomization,
    spatial: SpatialParams,
    output_group: Option<OutputGroup>,
}

impl PackBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clips: Vec::new(),
            play_volume: 1.0,
            pitch: PitchRandomization::default(),
            spatial: SpatialParams::default(),
            output_group: None,
        }
    }

    pub fn with_clip(mut self, clip: Arc<AudioClip>) -> Self {
        self.clips.push(clip);
        self
    }

    pub fn with_clips(mut self, clips: impl IntoIterator<Item = Arc<AudioClip>>) -> Self {
        self.clips.extend(clips);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.play_volume = volume;
        self
    }

    pub fn with_pitch_range(mut self, min: f32, max: f32) -> Self {
        self.pitch = PitchRandomization::range(min, max);
        self
    }

    pub fn with_spatial(mut self, spatial: SpatialParams) -> Self {
        self.spatial = spatial;
        self
    }

    pub fn with_output_group(mut self, group: OutputGroup) -> Self {
        self.output_group = Some(group);
        self
    }
}

/// Read-only accessors the orchestrator needs from any pack.
pub trait AudioPack {
    fn base(&self) -> &PackBase;

    fn name(&self) -> &str {
        &self.base().name
    }

    fn clips(&self) -> &[Arc<AudioClip>] {
        &self.base().clips
    }

    fn clip_count(&self) -> usize {
        self.clips().len()
    }

    fn clip(&self, index: usize) -> Option<&Arc<AudioClip>> {
        self.clips().get(index)
    }

    fn clip_length(&self, index: usize) -> Option<Duration> {
        self.clip(index).map(|clip| clip.duration())
    }

    fn play_volume(&self) -> f32 {
        self.base().play_volume
    }

    fn pitch(&self) -> &PitchRandomization {
        &self.base().pitch
    }

    fn spatial(&self) -> &SpatialParams {
        &self.base().spatial
    }

    /// Mixer bus for this pack's voices. `None` leaves the renderer's default.
    fn output_group(&self) -> Option<&OutputGroup> {
        self.base().output_group.as_ref()
    }

    /// Position of `clip` in this pack, compared by value.
    fn index_of(&self, clip: &AudioClip) -> Option<usize> {
        self.clips().iter().position(|candidate| **candidate == *clip)
    }

    fn random_index<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        match self.clip_count() {
            0 => None,
            count => Some(rng.random_range(0..count)),
        }
    }

    /// Bounds-checked clip lookup with a descriptive error.
    fn checked_clip(&self, index: usize) -> Result<&Arc<AudioClip>> {
        let len = self.clip_count();
        if len == 0 {
            return Err(StrataError::EmptyPack(self.name().to_string()));
        }
        self.clip(index).ok_or_else(|| StrataError::ClipIndexOutOfRange {
            pack: self.name().to_string(),
            index,
            len,
        })
    }
}
