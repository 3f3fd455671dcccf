mod placement;
mod strata_desc;

pub use placement::{NodeRef, Placement, RolloffMode, SpatialDefaults, SpatialParams};
pub use strata_desc::{EffectDesc, LoopDesc, MusicDesc, StrataDesc};
