use super::{AudioPack, PackBase};

/// Clips played as fire-and-forget one-shots.
#[derive(Debug, Clone)]
pub struct EffectPack {
    base: PackBase,
}

impl EffectPack {
    pub fn new(base: PackBase) -> Self {
        Self { base }
    }
}

impl AudioPack for EffectPack {
    fn base(&self) -> &PackBase {
        &self.base
    }
}
