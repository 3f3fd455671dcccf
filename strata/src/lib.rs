//! # Strata
//!
//! A layered audio orchestrator for interactive applications: background music
//! with cross-track blending, one-shot effects on pooled channels, and
//! independent looping layers with fade and cross-fade control.
//!
//! Strata schedules and configures playback; it never decodes or mixes a
//! sample. Rendering goes through a [`RenderBackend`](backend::RenderBackend)
//! and positioning through an [`AttachmentBackend`](backend::AttachmentBackend).
//!
//! ## Quick Start
//!
//! ```
//! use strata::backend::MemoryBackend;
//! use strata::{
//!     AudioClip, EffectPack, LoopPack, LoopRequest, MusicPack, MusicRequest, PackBase, Strata,
//!     StrataDesc, StrataError, StrataEvent, Vec3,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let backend = MemoryBackend::new();
//! let audio = Strata::new(StrataDesc::default(), backend.clone(), backend)?;
//!
//! // Music: a new track blends against whatever was playing
//! let battle = Arc::new(MusicPack::new(
//!     PackBase::new("Battle").with_clip(AudioClip::shared("battle", Duration::from_secs(90))),
//! ));
//! audio.play_music(&battle, MusicRequest::default());
//!
//! // Effects: fire and forget, optionally placed in the world
//! let steps = EffectPack::new(
//!     PackBase::new("Footsteps")
//!         .with_clip(AudioClip::shared("step-1", Duration::from_millis(250)))
//!         .with_clip(AudioClip::shared("step-2", Duration::from_millis(250)))
//!         .with_pitch_range(0.9, 1.1),
//! );
//! audio.play_random_effect_at(&steps, Vec3::new(2.0, 0.0, 1.0));
//!
//! // Loops: keep the handle to control the layer later
//! let rain = Arc::new(LoopPack::new(
//!     PackBase::new("Rain").with_clip(AudioClip::shared("rain", Duration::from_secs(20))),
//! ));
//! let handle = audio.start_loop(&rain, LoopRequest::default());
//!
//! // Once per frame, with real (unscaled) time
//! audio.tick(Duration::from_millis(16));
//!
//! if let Some(handle) = handle {
//!     handle.fade_to_volume(0.3, Duration::from_secs(2));
//! }
//!
//! for event in audio.poll_events() {
//!     if let StrataEvent::LoopReclaimed { loop_id } = event {
//!         println!("{} was reclaimed", loop_id);
//!     }
//! }
//! # Ok::<(), StrataError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`Strata`]**: the orchestrator and caller-facing API
//! - **[`MusicPack`] / [`EffectPack`] / [`LoopPack`]**: read-only sound collections
//! - **[`LoopHandle`]**: controller for one running loop
//! - **[`DispatchRegistry`]**: explicit "current orchestrator" lookup
//! - **[`StrataEvent`]**: lifecycle events drained with [`Strata::poll_events`]
//!
//! ## Scheduling Model
//!
//! Everything runs on the thread that owns the orchestrator. Fades, music
//! retriggers and loop cross-fades are explicit task records advanced by
//! [`Strata::tick`]; loop retriggers are timed against the renderer's
//! monotonic audio clock rather than frame time.

pub mod backend;
pub mod channel;
pub mod config;
mod context;
pub mod effects;
pub mod error;
pub mod events;
pub mod fade;
pub mod loops;
pub mod math;
pub mod music;
mod orchestrator;
pub mod pack;
pub mod registry;
pub mod timing;

pub use channel::{ChannelCategory, ChannelId, ChannelLease};
pub use config::{
    EffectDesc, LoopDesc, MusicDesc, NodeRef, Placement, RolloffMode, SpatialDefaults,
    SpatialParams, StrataDesc,
};
pub use error::{Result, StrataError};
pub use events::StrataEvent;
pub use loops::{LoopHandle, LoopId, LoopRequest, LoopState};
pub use math::Vec3;
pub use music::{BlendOut, MusicRequest, MusicState};
pub use orchestrator::{Strata, WeakStrata};
pub use pack::{
    AudioClip, AudioPack, EffectPack, LoopPack, MusicPack, OutputGroup, PackBase, PitchRandomization,
};
pub use registry::DispatchRegistry;
pub use timing::Retrigger;
