//! Components which make up a node

use glam::Vec2;
use specs::{Component, DenseVecStorage, VecStorage};

/// Opaque identifier of a node, unique within one simulation.
#[derive(Component, Debug, Clone, PartialEq, Eq, Hash)]
#[storage(VecStorage)]
pub struct NodeId(pub String);

/// The position of a node.
#[derive(Component, Debug, Default, Clone, Copy)]
#[storage(VecStorage)]
pub struct Position(pub Vec2);

/// The velocity of a node.
#[derive(Component, Debug, Default, Clone, Copy)]
#[storage(VecStorage)]
pub struct Velocity(pub Vec2);

/// Whether the integrator moves a node or holds it in place.
///
/// A pinned node still exerts every force on its neighbours; only its own
/// integration is replaced by snapping it to the pin.
#[derive(Component, Debug, Default, Clone, Copy, PartialEq)]
#[storage(VecStorage)]
pub enum PinState {
    #[default]
    Free,
    PinnedAt(Vec2),
}

impl PinState {
    /// Pins only when both coordinates are present.
    pub fn from_fixed(fx: Option<f32>, fy: Option<f32>) -> Self {
        match (fx, fy) {
            (Some(x), Some(y)) => Self::PinnedAt(Vec2::new(x, y)),
            _ => Self::Free,
        }
    }

    pub fn target(self) -> Option<Vec2> {
        match self {
            Self::Free => None,
            Self::PinnedAt(target) => Some(target),
        }
    }

    pub fn is_pinned(self) -> bool {
        matches!(self, Self::PinnedAt(_))
    }
}

/// Group a node is clustered with. Nodes without one are pulled to the canvas center.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
#[storage(DenseVecStorage)]
pub struct GroupKey(pub String);
