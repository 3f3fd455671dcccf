//! Fire-and-forget one-shot effects.

use crate::channel::{ChannelCategory, ChannelLease};
use crate::config::{EffectDesc, Placement, SpatialDefaults, SpatialParams};
use crate::context::PlaybackContext;
use crate::error::{Result, StrataError};
use crate::events::StrataEvent;
use crate::pack::{AudioPack, EffectPack};
use std::sync::Arc;
use std::time::Duration;

/// Plays effect clips on pooled channels. A channel goes back to idle as
/// soon as its clip ends; nothing here tracks it afterwards.
#[derive(Debug)]
pub struct EffectPlayer {
    defaults: SpatialDefaults,
}

impl EffectPlayer {
    pub fn new(desc: &EffectDesc) -> Self {
        Self {
            defaults: desc.spatial_defaults,
        }
    }

    pub(crate) fn play(
        &self,
        ctx: &mut PlaybackContext<'_>,
        pack: &EffectPack,
        index: usize,
        placement: Placement,
    ) -> Result<ChannelLease> {
        let clip = Arc::clone(pack.checked_clip(index)?);
        let lease = ctx.acquire(ChannelCategory::Effect)?;
        ctx.place(lease, placement)?;

        let pitch = ctx.sample_pitch(pack.pitch());
        let spatial = SpatialParams::resolve(pack.spatial(), &self.defaults, &placement);
        let channel = ctx.pool.checked_mut(lease)?;
        channel.set_clip(ctx.render, Arc::clone(&clip));
        channel.set_looping(ctx.render, false);
        channel.set_output_group(ctx.render, pack.output_group());
        channel.set_volume(ctx.render, pack.play_volume());
        channel.set_pitch(ctx.render, pitch);
        channel.set_spatial(ctx.render, spatial);
        channel.set_time(ctx.render, Duration::ZERO);
        channel.play(ctx.render);

        log::debug!(
            "Effect '{}' from pack '{}' on {} ({:?})",
            clip.name(),
            pack.name(),
            lease,
            placement
        );
        ctx.emit(StrataEvent::EffectPlayed {
            channel: lease.id,
            clip: clip.name().to_string(),
        });
        Ok(lease)
    }

    pub(crate) fn play_random(
        &self,
        ctx: &mut PlaybackContext<'_>,
        pack: &EffectPack,
        placement: Placement,
    ) -> Result<ChannelLease> {
        let index = pack
            .random_index(ctx.rng)
            .ok_or_else(|| StrataError::EmptyPack(pack.name().to_string()))?;
        self.play(ctx, pack, index, placement)
    }
}
