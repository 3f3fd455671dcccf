//! Collaborator traits for the renderer and the host object model.
//!
//! Strata schedules and configures playback; it never touches samples.
//! Everything audible goes through a [`RenderBackend`], and everything
//! positional goes through an [`AttachmentBackend`].

mod memory;

pub use memory::{MemoryBackend, MemoryVoice};

use crate::channel::ChannelCategory;
use crate::config::{NodeRef, SpatialParams};
use crate::math::Vec3;
use crate::pack::{AudioClip, OutputGroup};
use std::fmt;
use std::time::Duration;

/// Renderer-side handle for one playback voice.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoiceId({})", self.0)
    }
}

/// The device that actually produces sound.
///
/// Called only from the thread that owns the orchestrator, so implementations
/// need not be `Send` or `Sync`.
///
/// # Example
///
/// ```
/// use strata::backend::{RenderBackend, VoiceId};
/// use strata::channel::ChannelCategory;
/// use strata::config::SpatialParams;
/// use strata::pack::AudioClip;
/// use std::time::Duration;
///
/// struct Silent {
///     next: u64,
/// }
///
/// impl RenderBackend for Silent {
///     fn create_voice(&mut self, _category: ChannelCategory) -> Option<VoiceId> {
///         self.next += 1;
///         Some(VoiceId(self.next))
///     }
///     fn set_clip(&mut self, _voice: VoiceId, _clip: Option<&AudioClip>) {}
///     fn play(&mut self, _voice: VoiceId) {}
///     fn stop(&mut self, _voice: VoiceId) {}
///     fn pause(&mut self, _voice: VoiceId) {}
///     fn resume(&mut self, _voice: VoiceId) {}
///     fn set_volume(&mut self, _voice: VoiceId, _volume: f32) {}
///     fn set_pitch(&mut self, _voice: VoiceId, _pitch: f32) {}
///     fn set_spatial(&mut self, _voice: VoiceId, _params: &SpatialParams) {}
///     fn set_time(&mut self, _voice: VoiceId, _position: Duration) {}
///     fn set_looping(&mut self, _voice: VoiceId, _looping: bool) {}
///     fn is_playing(&self, _voice: VoiceId) -> bool {
///         false
///     }
///     fn dsp_time(&self) -> f64 {
///         0.0
///     }
/// }
/// ```
pub trait RenderBackend {
    /// Creates a voice from the template for `category`.
    ///
    /// Returns `None` when no template is configured for that category.
    fn create_voice(&mut self, category: ChannelCategory) -> Option<VoiceId>;

    /// Frees a voice. Only called when the orchestrator is dropped.
    fn destroy_voice(&mut self, _voice: VoiceId) {}

    fn set_clip(&mut self, voice: VoiceId, clip: Option<&AudioClip>);

    /// Starts playback from the current playback time.
    fn play(&mut self, voice: VoiceId);

    /// Stops playback and rewinds.
    fn stop(&mut self, voice: VoiceId);

    fn pause(&mut self, voice: VoiceId);

    fn resume(&mut self, voice: VoiceId);

    fn set_volume(&mut self, voice: VoiceId, volume: f32);

    fn set_pitch(&mut self, voice: VoiceId, pitch: f32);

    fn set_spatial(&mut self, voice: VoiceId, params: &SpatialParams);

    fn set_time(&mut self, voice: VoiceId, position: Duration);

    fn set_looping(&mut self, voice: VoiceId, looping: bool);

    /// Routes the voice to a mixer bus, or back to the default bus for `None`.
    ///
    /// Default implementation does nothing.
    fn set_output_group(&mut self, _voice: VoiceId, _group: Option<&OutputGroup>) {}

    /// Whether the voice is audibly playing. Must be true right after
    /// [`play`](Self::play) and false while paused.
    fn is_playing(&self, voice: VoiceId) -> bool;

    /// Monotonic audio clock in seconds.
    fn dsp_time(&self) -> f64;

    /// Called at the start of every orchestrator tick.
    ///
    /// Default implementation does nothing.
    fn begin_frame(&mut self, _dt: Duration) {}
}

/// The host object model channels are positioned in.
pub trait AttachmentBackend {
    fn set_parent(&mut self, voice: VoiceId, node: NodeRef);

    /// Position relative to the current parent.
    fn set_local_position(&mut self, voice: VoiceId, position: Vec3);

    fn set_world_position(&mut self, voice: VoiceId, position: Vec3);

    /// Drops any parent, leaving the voice at the world origin.
    fn detach(&mut self, voice: VoiceId);
}

/// Attachment backend for applications without a scene graph.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAttachment;

impl AttachmentBackend for NoAttachment {
    fn set_parent(&mut self, voice: VoiceId, node: NodeRef) {
        log::debug!("Ignoring parent {} for {}: no attachment backend", node, voice);
    }

    fn set_local_position(&mut self, _voice: VoiceId, _position: Vec3) {}

    fn set_world_position(&mut self, _voice: VoiceId, _position: Vec3) {}

    fn detach(&mut self, _voice: VoiceId) {}
}
