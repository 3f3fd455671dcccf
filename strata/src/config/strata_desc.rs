use super::SpatialDefaults;
use crate::error::{Result, StrataError};
use crate::pack::{MusicPack, OutputGroup};
use std::sync::Arc;
use std::time::Duration;

/// Configuration descriptor for a Strata orchestrator
#[derive(Debug, Clone, Default)]
pub struct StrataDesc {
    pub music: MusicDesc,
    pub effects: EffectDesc,
    pub loops: LoopDesc,
    /// Seed for pitch and clip randomization. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl StrataDesc {
    pub fn with_music(mut self, music: MusicDesc) -> Self {
        self.music = music;
        self
    }

    pub fn with_effects(mut self, effects: EffectDesc) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_loops(mut self, loops: LoopDesc) -> Self {
        self.loops = loops;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Checks the descriptor for values the orchestrator cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.music.max_volume) {
            return Err(StrataError::Configuration(format!(
                "music max_volume must be within [0, 1], got {}",
                self.music.max_volume
            )));
        }
        if self.loops.sweep_interval.is_zero() {
            return Err(StrataError::Configuration(
                "loop sweep_interval must be greater than zero".to_string(),
            ));
        }
        for (name, defaults) in [
            ("effects", &self.effects.spatial_defaults),
            ("loops", &self.loops.spatial_defaults),
        ] {
            if defaults.min_distance > defaults.max_distance {
                return Err(StrataError::Configuration(format!(
                    "{} spatial defaults: min_distance {} exceeds max_distance {}",
                    name, defaults.min_distance, defaults.max_distance
                )));
            }
        }
        Ok(())
    }
}

/// Music controller settings
#[derive(Debug, Clone)]
pub struct MusicDesc {
    /// Ceiling applied on top of every music pack's play volume
    pub max_volume: f32,
    /// Blend used by `stop_music(None)` and by music requests that leave a
    /// direction unset
    pub default_blend: Duration,
    /// Blend used in both directions when a looping track restarts itself
    pub retrigger_blend: Duration,
    /// Pack started automatically when the orchestrator is created
    pub default_pack: Option<Arc<MusicPack>>,
    pub play_on_start: bool,
    /// Mixer bus for music packs that don't name their own
    pub output_group: Option<OutputGroup>,
}

impl Default for MusicDesc {
    fn default() -> Self {
        Self {
            max_volume: 1.0,
            default_blend: Duration::from_secs(1),
            retrigger_blend: Duration::from_secs(1),
            default_pack: None,
            play_on_start: true,
            output_group: None,
        }
    }
}

impl MusicDesc {
    pub fn with_max_volume(mut self, max_volume: f32) -> Self {
        self.max_volume = max_volume;
        self
    }

    pub fn with_default_blend(mut self, blend: Duration) -> Self {
        self.default_blend = blend;
        self
    }

    pub fn with_retrigger_blend(mut self, blend: Duration) -> Self {
        self.retrigger_blend = blend;
        self
    }

    pub fn with_default_pack(mut self, pack: Arc<MusicPack>) -> Self {
        self.default_pack = Some(pack);
        self
    }

    pub fn with_play_on_start(mut self, play_on_start: bool) -> Self {
        self.play_on_start = play_on_start;
        self
    }

    pub fn with_output_group(mut self, group: OutputGroup) -> Self {
        self.output_group = Some(group);
        self
    }
}

/// One-shot effect settings
#[derive(Debug, Clone, Default)]
pub struct EffectDesc {
    pub spatial_defaults: SpatialDefaults,
}

impl EffectDesc {
    pub fn with_spatial_defaults(mut self, defaults: SpatialDefaults) -> Self {
        self.spatial_defaults = defaults;
        self
    }
}

/// Loop layer settings
#[derive(Debug, Clone)]
pub struct LoopDesc {
    pub spatial_defaults: SpatialDefaults,
    /// How often finished loops are reclaimed, in unscaled time
    pub sweep_interval: Duration,
}

impl Default for LoopDesc {
    fn default() -> Self {
        Self {
            spatial_defaults: SpatialDefaults::default(),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

impl LoopDesc {
    pub fn with_spatial_defaults(mut self, defaults: SpatialDefaults) -> Self {
        self.spatial_defaults = defaults;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
