use super::{AttachmentBackend, RenderBackend, VoiceId};
use crate::channel::ChannelCategory;
use crate::config::{NodeRef, SpatialParams};
use crate::math::Vec3;
use crate::pack::{AudioClip, OutputGroup};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Snapshot of one simulated voice.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryVoice {
    pub id: VoiceId,
    pub category: ChannelCategory,
    pub clip: Option<AudioClip>,
    /// Playback position in seconds
    pub position: f64,
    pub playing: bool,
    pub paused: bool,
    pub looping: bool,
    pub output_group: Option<OutputGroup>,
    pub volume: f32,
    pub pitch: f32,
    pub spatial: SpatialParams,
    pub parent: Option<NodeRef>,
    pub local_position: Vec3,
    pub world_position: Vec3,
    /// How many times `play` started this voice
    pub play_count: u32,
}

impl MemoryVoice {
    fn new(id: VoiceId, category: ChannelCategory) -> Self {
        Self {
            id,
            category,
            clip: None,
            position: 0.0,
            playing: false,
            paused: false,
            looping: false,
            output_group: None,
            volume: 1.0,
            pitch: 1.0,
            spatial: SpatialParams::default(),
            parent: None,
            local_position: Vec3::ZERO,
            world_position: Vec3::ZERO,
            play_count: 0,
        }
    }

    fn advance(&mut self, dt: f64) {
        if !self.playing || self.paused {
            return;
        }
        let Some(length) = self.clip.as_ref().map(|clip| clip.duration().as_secs_f64()) else {
            self.playing = false;
            return;
        };

        self.position += dt * f64::from(self.pitch.max(0.0));
        if self.position >= length {
            if self.looping && length > 0.0 {
                self.position %= length;
            } else {
                self.playing = false;
                self.position = 0.0;
            }
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    clock: f64,
    next_voice: u64,
    voices: Vec<MemoryVoice>,
    missing_templates: Vec<ChannelCategory>,
    destroyed: Vec<VoiceId>,
}

impl MemoryState {
    fn voice_mut(&mut self, id: VoiceId) -> Option<&mut MemoryVoice> {
        let voice = self.voices.iter_mut().find(|candidate| candidate.id == id);
        if voice.is_none() {
            log::warn!("Memory backend: unknown voice {}", id);
        }
        voice
    }
}

/// Deterministic headless renderer and scene graph.
///
/// Voices advance their playback position on every
/// [`begin_frame`](RenderBackend::begin_frame), clips end (or wrap when looping),
/// and the audio clock is simply the sum of all frame deltas. Clones share
/// state, so a test can hand one clone to [`Strata`](crate::Strata) and inspect
/// voices through the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses to create voices for `category`, as if its template were unset.
    pub fn without_template(self, category: ChannelCategory) -> Self {
        self.set_template_available(category, false);
        self
    }

    pub fn set_template_available(&self, category: ChannelCategory, available: bool) {
        let mut state = self.state.borrow_mut();
        state.missing_templates.retain(|missing| *missing != category);
        if !available {
            state.missing_templates.push(category);
        }
    }

    /// Advances the clock and every playing voice by `dt`.
    pub fn advance(&self, dt: Duration) {
        let mut state = self.state.borrow_mut();
        let dt = dt.as_secs_f64();
        state.clock += dt;
        for voice in state.voices.iter_mut() {
            voice.advance(dt);
        }
    }

    pub fn clock(&self) -> f64 {
        self.state.borrow().clock
    }

    pub fn voice(&self, voice: VoiceId) -> Option<MemoryVoice> {
        self.state
            .borrow()
            .voices
            .iter()
            .find(|candidate| candidate.id == voice)
            .cloned()
    }

    pub fn voices(&self) -> Vec<MemoryVoice> {
        self.state.borrow().voices.clone()
    }

    pub fn voice_count(&self, category: ChannelCategory) -> usize {
        self.state
            .borrow()
            .voices
            .iter()
            .filter(|voice| voice.category == category)
            .count()
    }

    pub fn playing_count(&self, category: ChannelCategory) -> usize {
        self.state
            .borrow()
            .voices
            .iter()
            .filter(|voice| voice.category == category && voice.playing && !voice.paused)
            .count()
    }

    /// Voices released through [`RenderBackend::destroy_voice`]
    pub fn destroyed(&self) -> Vec<VoiceId> {
        self.state.borrow().destroyed.clone()
    }

    fn with_voice(&self, voice: VoiceId, f: impl FnOnce(&mut MemoryVoice)) {
        if let Some(voice) = self.state.borrow_mut().voice_mut(voice) {
            f(voice);
        }
    }
}

impl RenderBackend for MemoryBackend {
    fn create_voice(&mut self, category: ChannelCategory) -> Option<VoiceId> {
        let mut state = self.state.borrow_mut();
        if state.missing_templates.contains(&category) {
            return None;
        }
        state.next_voice += 1;
        let id = VoiceId(state.next_voice);
        state.voices.push(MemoryVoice::new(id, category));
        Some(id)
    }

    fn destroy_voice(&mut self, voice: VoiceId) {
        let mut state = self.state.borrow_mut();
        state.voices.retain(|candidate| candidate.id != voice);
        state.destroyed.push(voice);
    }

    fn set_clip(&mut self, voice: VoiceId, clip: Option<&AudioClip>) {
        self.with_voice(voice, |voice| {
            voice.clip = clip.cloned();
            voice.position = 0.0;
        });
    }

    fn play(&mut self, voice: VoiceId) {
        self.with_voice(voice, |voice| {
            if voice.clip.is_none() {
                return;
            }
            voice.playing = true;
            voice.paused = false;
            voice.play_count += 1;
        });
    }

    fn stop(&mut self, voice: VoiceId) {
        self.with_voice(voice, |voice| {
            voice.playing = false;
            voice.paused = false;
            voice.position = 0.0;
        });
    }

    fn pause(&mut self, voice: VoiceId) {
        self.with_voice(voice, |voice| {
            if voice.playing {
                voice.paused = true;
            }
        });
    }

    fn resume(&mut self, voice: VoiceId) {
        self.with_voice(voice, |voice| voice.paused = false);
    }

    fn set_volume(&mut self, voice: VoiceId, volume: f32) {
        self.with_voice(voice, |voice| voice.volume = volume);
    }

    fn set_pitch(&mut self, voice: VoiceId, pitch: f32) {
        self.with_voice(voice, |voice| voice.pitch = pitch);
    }

    fn set_spatial(&mut self, voice: VoiceId, params: &SpatialParams) {
        self.with_voice(voice, |voice| voice.spatial = *params);
    }

    fn set_time(&mut self, voice: VoiceId, position: Duration) {
        self.with_voice(voice, |voice| voice.position = position.as_secs_f64());
    }

    fn set_looping(&mut self, voice: VoiceId, looping: bool) {
        self.with_voice(voice, |voice| voice.looping = looping);
    }

    fn set_output_group(&mut self, voice: VoiceId, group: Option<&OutputGroup>) {
        let group = group.cloned();
        self.with_voice(voice, |voice| voice.output_group = group);
    }

    fn is_playing(&self, voice: VoiceId) -> bool {
        self.state
            .borrow()
            .voices
            .iter()
            .any(|candidate| candidate.id == voice && candidate.playing && !candidate.paused)
    }

    fn dsp_time(&self) -> f64 {
        self.clock()
    }

    fn begin_frame(&mut self, dt: Duration) {
        self.advance(dt);
    }
}

impl AttachmentBackend for MemoryBackend {
    fn set_parent(&mut self, voice: VoiceId, node: NodeRef) {
        self.with_voice(voice, |voice| voice.parent = Some(node));
    }

    fn set_local_position(&mut self, voice: VoiceId, position: Vec3) {
        self.with_voice(voice, |voice| voice.local_position = position);
    }

    fn set_world_position(&mut self, voice: VoiceId, position: Vec3) {
        self.with_voice(voice, |voice| voice.world_position = position);
    }

    fn detach(&mut self, voice: VoiceId) {
        self.with_voice(voice, |voice| {
            voice.parent = None;
            voice.local_position = Vec3::ZERO;
            voice.world_position = Vec3::ZERO;
        });
    }
}
