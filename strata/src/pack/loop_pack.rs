use super::{AudioPack, PackBase};
use std::time::Duration;

/// Continuous ambience layers controlled through a
/// [`LoopHandle`](crate::loops::LoopHandle).
#[derive(Debug, Clone)]
pub struct LoopPack {
    base: PackBase,
    fade_in: Duration,
    fade_out: Duration,
    crossfade: Duration,
}

impl LoopPack {
    pub fn new(base: PackBase) -> Self {
        Self {
            base,
            fade_in: Duration::from_millis(500),
            fade_out: Duration::from_millis(500),
            crossfade: Duration::from_millis(200),
        }
    }

    pub fn with_fade_in(mut self, fade_in: Duration) -> Self {
        self.fade_in = fade_in;
        self
    }

    pub fn with_fade_out(mut self, fade_out: Duration) -> Self {
        self.fade_out = fade_out;
        self
    }

    pub fn with_crossfade(mut self, crossfade: Duration) -> Self {
        self.crossfade = crossfade;
        self
    }

    pub fn default_fade_in(&self) -> Duration {
        self.fade_in
    }

    pub fn default_fade_out(&self) -> Duration {
        self.fade_out
    }

    pub fn crossfade(&self) -> Duration {
        self.crossfade
    }
}

impl AudioPack for LoopPack {
    fn base(&self) -> &PackBase {
        &self.base
    }
}
