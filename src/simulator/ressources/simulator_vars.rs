//! Ressources used by the graph simulator.

use glam::Vec2;

/// Simulation temperature in `[0, 1]`. Every force but collision scales with it.
#[derive(Debug, Clone, Copy)]
pub struct Alpha(pub f32);

impl Default for Alpha {
    fn default() -> Self {
        Self(1.0)
    }
}

/// Value alpha moves toward each step. Raised while a node is dragged.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlphaTarget(pub f32);

/// Size of the drawing surface the layout is centered in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

impl CanvasSize {
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width, self.height) * 0.5
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}
