use std::f32::consts::TAU;

use glam::Vec2;
use rand::{rngs::StdRng, Rng};

/// Magnitude of the offset separating coincident nodes.
const JIGGLE: f32 = 1e-6;

/// Tiny offset used as the direction between two coincident nodes.
///
/// Deterministic and antisymmetric, `pair_jiggle(a, b) == -pair_jiggle(b, a)`,
/// so a coincident pair is always pushed apart rather than in the same direction.
pub fn pair_jiggle(a: u32, b: u32) -> Vec2 {
    let (low, high, sign) = if a <= b { (a, b, 1.0) } else { (b, a, -1.0) };
    let angle = ((low as f32) * 0.618_034 + (high as f32) * 0.414_214 + 0.37) * TAU;
    Vec2::new(angle.cos(), angle.sin()) * (JIGGLE * sign)
}

/// Half-width of the square nodes without coordinates are scattered in.
pub fn placement_spread(node_count: usize, link_distance: f32) -> f32 {
    ((node_count as f32).sqrt() * link_distance * 0.5).max(60.0)
}

/// Keeps given coordinates and scatters missing ones around `center`.
pub fn initial_position(
    rng: &mut StdRng,
    center: Vec2,
    spread: f32,
    x: Option<f32>,
    y: Option<f32>,
) -> Vec2 {
    let x = x.unwrap_or_else(|| center.x + rng.gen_range(-spread..=spread));
    let y = y.unwrap_or_else(|| center.y + rng.gen_range(-spread..=spread));
    Vec2::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn jiggle_is_antisymmetric_and_tiny() {
        let forward = pair_jiggle(3, 8);
        let backward = pair_jiggle(8, 3);
        assert_eq!(forward, -backward);
        assert!(forward.length() > 0.0);
        assert!(forward.length() <= 1.1e-6);
    }

    #[test]
    fn placement_is_seeded_and_keeps_given_coordinates() {
        let center = Vec2::new(400.0, 300.0);
        let mut first = StdRng::seed_from_u64(7);
        let mut second = StdRng::seed_from_u64(7);

        let a = initial_position(&mut first, center, 80.0, None, None);
        let b = initial_position(&mut second, center, 80.0, None, None);
        assert_eq!(a, b);
        assert!((a - center).abs().max_element() <= 80.0);

        let given = initial_position(&mut first, center, 80.0, Some(1.0), Some(2.0));
        assert_eq!(given, Vec2::new(1.0, 2.0));

        let half = initial_position(&mut first, center, 80.0, Some(5.0), None);
        assert_eq!(half.x, 5.0);
    }
}
