//! Components which make up a link

use specs::{Component, DenseVecStorage, Entity, VecStorage};

/// A link connects exactly two nodes.
#[derive(Component, Debug, Clone, Copy)]
#[storage(VecStorage)]
pub struct Connects {
    pub source: Entity,
    pub target: Entity,
}

/// Spring parameters of a link.
///
/// `strength` is `1 / min(degree(source), degree(target))` so hubs are not
/// torn apart by their many links. `bias` is the share of the correction
/// applied to the target, `degree(source) / (degree(source) + degree(target))`.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
#[storage(VecStorage)]
pub struct Spring {
    pub strength: f32,
    pub bias: f32,
}

impl Spring {
    pub fn from_degrees(source: usize, target: usize) -> Self {
        let source = source.max(1) as f32;
        let target = target.max(1) as f32;
        Self {
            strength: 1.0 / source.min(target),
            bias: source / (source + target),
        }
    }
}

/// Identifier used to correlate a link with UI overlays. Not used by the physics.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
#[storage(DenseVecStorage)]
pub struct LinkId(pub String);
