//! Event types for Strata

use crate::channel::{ChannelCategory, ChannelId};
use crate::loops::LoopId;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum StrataEvent {
    ChannelReleased {
        category: ChannelCategory,
        channel: ChannelId,
    },
    MusicStarted {
        channel: ChannelId,
        clip: String,
    },
    MusicRetriggered {
        channel: ChannelId,
        clip: String,
        count: u32,
    },
    MusicDecaying {
        channel: ChannelId,
        tail: Duration,
    },
    MusicStopped {
        channel: ChannelId,
    },
    EffectPlayed {
        channel: ChannelId,
        clip: String,
    },
    LoopStarted {
        loop_id: LoopId,
        channel: ChannelId,
    },
    LoopClipChanged {
        loop_id: LoopId,
        clip_index: usize,
    },
    LoopStopped {
        loop_id: LoopId,
    },
    LoopReclaimed {
        loop_id: LoopId,
    },
}

impl StrataEvent {
    pub fn channel(&self) -> Option<ChannelId> {
        match self {
            Self::ChannelReleased { channel, .. }
            | Self::MusicStarted { channel, .. }
            | Self::MusicRetriggered { channel, .. }
            | Self::MusicDecaying { channel, .. }
            | Self::MusicStopped { channel }
            | Self::EffectPlayed { channel, .. }
            | Self::LoopStarted { channel, .. } => Some(*channel),
            _ => None,
        }
    }

    pub fn loop_id(&self) -> Option<LoopId> {
        match self {
            Self::LoopStarted { loop_id, .. }
            | Self::LoopClipChanged { loop_id, .. }
            | Self::LoopStopped { loop_id }
            | Self::LoopReclaimed { loop_id } => Some(*loop_id),
            _ => None,
        }
    }

    pub fn is_music_event(&self) -> bool {
        matches!(
            self,
            Self::MusicStarted { .. }
                | Self::MusicRetriggered { .. }
                | Self::MusicDecaying { .. }
                | Self::MusicStopped { .. }
        )
    }

    pub fn is_loop_event(&self) -> bool {
        self.loop_id().is_some()
    }
}
