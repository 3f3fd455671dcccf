use super::{AudioPack, PackBase};
use crate::timing::Retrigger;
use std::time::Duration;

/// Background music tracks.
#[derive(Debug, Clone)]
pub struct MusicPack {
    base: PackBase,
    retrigger: Retrigger,
    tail: Duration,
    looping: bool,
}

impl MusicPack {
    pub fn new(base: PackBase) -> Self {
        Self {
            base,
            retrigger: Retrigger::default(),
            tail: Duration::ZERO,
            looping: true,
        }
    }

    pub fn with_retrigger(mut self, retrigger: Retrigger) -> Self {
        self.retrigger = retrigger;
        self
    }

    /// Reverb tail held after the last iteration of a non-looping track,
    /// and the hold used by [`BlendOut::Tail`](crate::music::BlendOut::Tail).
    pub fn with_tail(mut self, tail: Duration) -> Self {
        self.tail = tail;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn retrigger(&self) -> Retrigger {
        self.retrigger
    }

    pub fn tail(&self) -> Duration {
        self.tail
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }
}

impl AudioPack for MusicPack {
    fn base(&self) -> &PackBase {
        &self.base
    }
}
