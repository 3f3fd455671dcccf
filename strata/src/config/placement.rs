use crate::math::Vec3;
use std::fmt;

/// Opaque reference to a node in the host's object model.
///
/// Strata never inspects it; it is only handed back to the
/// [`AttachmentBackend`](crate::backend::AttachmentBackend) when a channel is parented.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef(pub u64);

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({})", self.0)
    }
}

/// Distance attenuation curve forwarded to the renderer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RolloffMode {
    #[default]
    Logarithmic,
    Linear,
    Custom,
}

/// Spatial parameters of a channel.
///
/// Strata does no panning math; these values are forwarded verbatim to the
/// [`RenderBackend`](crate::backend::RenderBackend).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialParams {
    /// 0.0 = plain 2D, 1.0 = fully 3D
    pub blend: f32,
    pub rolloff: RolloffMode,
    pub min_distance: f32,
    pub max_distance: f32,
    pub doppler: f32,
}

impl Default for SpatialParams {
    fn default() -> Self {
        Self {
            blend: 0.0,
            rolloff: RolloffMode::Logarithmic,
            min_distance: 0.0,
            max_distance: 0.0,
            doppler: 1.0,
        }
    }
}

impl SpatialParams {
    /// Plain 2D playback.
    pub fn flat() -> Self {
        Self::default()
    }

    /// Resolves the parameters a channel should use for a pack played at `placement`.
    ///
    /// Unplaced playback is forced to 2D. Otherwise the pack's values win, with
    /// `defaults` substituted for any non-positive blend or distance.
    pub fn resolve(pack: &SpatialParams, defaults: &SpatialDefaults, placement: &Placement) -> Self {
        if !placement.is_spatial() {
            return Self {
                blend: 0.0,
                ..*pack
            };
        }

        let pick = |value: f32, fallback: f32| if value > 0.0 { value } else { fallback };
        Self {
            blend: pick(pack.blend, defaults.spatial_blend),
            rolloff: pack.rolloff,
            min_distance: pick(pack.min_distance, defaults.min_distance),
            max_distance: pick(pack.max_distance, defaults.max_distance),
            doppler: pack.doppler,
        }
    }

    pub fn is_3d(&self) -> bool {
        self.blend > 0.0
    }
}

/// Orchestrator-level fallbacks for placed playback. Rolloff always comes from the pack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialDefaults {
    pub min_distance: f32,
    pub max_distance: f32,
    pub spatial_blend: f32,
}

impl Default for SpatialDefaults {
    fn default() -> Self {
        Self {
            min_distance: 4.0,
            max_distance: 64.0,
            spatial_blend: 1.0,
        }
    }
}

/// Where a sound is played from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Placement {
    /// No position at all, played 2D
    #[default]
    None,
    /// Fixed point in world space
    WorldPosition(Vec3),
    /// Parented to a host node, `offset` in the node's local space
    AttachedTo { node: NodeRef, offset: Vec3 },
}

impl Placement {
    pub fn at(position: Vec3) -> Self {
        Self::WorldPosition(position)
    }

    pub fn attached(node: NodeRef) -> Self {
        Self::AttachedTo {
            node,
            offset: Vec3::ZERO,
        }
    }

    pub fn attached_with_offset(node: NodeRef, offset: Vec3) -> Self {
        Self::AttachedTo { node, offset }
    }

    /// Builds a placement from the nullable position/parent pair game code usually has.
    ///
    /// A parent takes precedence; the position then becomes the local offset.
    pub fn from_parts(position: Option<Vec3>, parent: Option<NodeRef>) -> Self {
        match (parent, position) {
            (Some(node), offset) => Self::AttachedTo {
                node,
                offset: offset.unwrap_or(Vec3::ZERO),
            },
            (None, Some(position)) => Self::WorldPosition(position),
            (None, None) => Self::None,
        }
    }

    /// Returns true unless this is [`Placement::None`]
    pub fn is_spatial(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// World position, if this placement has one
    pub fn position(&self) -> Option<Vec3> {
        match self {
            Self::WorldPosition(position) => Some(*position),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<NodeRef> {
        match self {
            Self::AttachedTo { node, .. } => Some(*node),
            _ => None,
        }
    }
}
