//! Error types for Strata

use crate::channel::{ChannelCategory, ChannelId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrataError {
    #[error("No {0} channel template configured; the backend refused to create a voice")]
    MissingTemplate(ChannelCategory),

    #[error("Pack '{0}' has no clips")]
    EmptyPack(String),

    #[error("Clip index {index} is out of range for pack '{pack}' ({len} clips)")]
    ClipIndexOutOfRange {
        pack: String,
        index: usize,
        len: usize,
    },

    #[error("Channel {0} was reclaimed by another owner")]
    StaleChannel(ChannelId),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, StrataError>;
