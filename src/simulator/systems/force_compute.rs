use glam::Vec2;
use rayon::prelude::*;
use specs::{Entities, Join, LendJoin, ParJoin, Read, ReadStorage, System, Write, WriteStorage};

use crate::{
    quadtree::{Body, QuadTree},
    simulator::{
        components::{
            edges::{Connects, Spring},
            nodes::{GroupKey, Position, Velocity},
        },
        ressources::{
            config::SimulationConfig,
            simulator_vars::{Alpha, CanvasSize},
        },
        systems::position_compute::pair_jiggle,
    },
};

/// Rebuilds the quad-tree over the current node positions, keyed by entity id.
pub struct QuadTreeConstructor;

impl<'a> System<'a> for QuadTreeConstructor {
    type SystemData = (Entities<'a>, ReadStorage<'a, Position>, Write<'a, QuadTree>);

    fn run(&mut self, (entities, positions, mut quadtree): Self::SystemData) {
        *quadtree = QuadTree::build((&*entities, &positions).join().map(|(entity, position)| {
            Body {
                key: entity.id(),
                position: position.0,
            }
        }));
    }
}

/// Pulls the endpoints of every link toward the configured rest length.
///
/// Uses the positions both endpoints will have after this step's velocity,
/// and applies the correction in place so later links see earlier ones.
pub struct ComputeLinkForce;

impl<'a> System<'a> for ComputeLinkForce {
    type SystemData = (
        ReadStorage<'a, Connects>,
        ReadStorage<'a, Spring>,
        ReadStorage<'a, Position>,
        WriteStorage<'a, Velocity>,
        Read<'a, Alpha>,
        Read<'a, SimulationConfig>,
    );

    fn run(
        &mut self,
        (connections, springs, positions, mut velocities, alpha, config): Self::SystemData,
    ) {
        for (connects, spring) in (&connections, &springs).join() {
            let (Some(source), Some(target)) = (
                positions.get(connects.source),
                positions.get(connects.target),
            ) else {
                continue;
            };
            let source_velocity = velocities.get(connects.source).map_or(Vec2::ZERO, |v| v.0);
            let target_velocity = velocities.get(connects.target).map_or(Vec2::ZERO, |v| v.0);

            let mut delta = (target.0 + target_velocity) - (source.0 + source_velocity);
            if delta == Vec2::ZERO {
                delta = pair_jiggle(connects.source.id(), connects.target.id());
            }
            let length = delta.length();
            let correction =
                delta * ((length - config.link_distance) / length * alpha.0 * spring.strength);

            if let Some(velocity) = velocities.get_mut(connects.target) {
                velocity.0 -= correction * spring.bias;
            }
            if let Some(velocity) = velocities.get_mut(connects.source) {
                velocity.0 += correction * (1.0 - spring.bias);
            }
        }
    }
}

/// Velocity change of the node `key` at `point` caused by `weight` bodies at `other`.
fn charge_between(
    point: Vec2,
    key: u32,
    other: Vec2,
    other_key: Option<u32>,
    weight: f32,
    strength: f32,
    distance_min_sq: f32,
) -> Vec2 {
    let mut delta = other - point;
    let mut distance_sq = delta.length_squared();
    if distance_sq == 0.0 {
        let Some(other_key) = other_key else {
            return Vec2::ZERO;
        };
        delta = pair_jiggle(key, other_key);
        distance_sq = delta.length_squared();
    }
    if distance_sq < distance_min_sq {
        distance_sq = (distance_min_sq * distance_sq).sqrt();
    }
    delta * (strength * weight / distance_sq)
}

/// Many-body repulsion, exact or approximated through the quad-tree.
pub struct ComputeChargeForce {
    pub approximate: bool,
}

impl<'a> System<'a> for ComputeChargeForce {
    type SystemData = (
        Entities<'a>,
        ReadStorage<'a, Position>,
        WriteStorage<'a, Velocity>,
        Read<'a, QuadTree>,
        Read<'a, Alpha>,
        Read<'a, SimulationConfig>,
    );

    fn run(
        &mut self,
        (entities, positions, mut velocities, quadtree, alpha, config): Self::SystemData,
    ) {
        let strength = config.charge_strength * alpha.0;
        let distance_min_sq = config.charge_distance_min * config.charge_distance_min;

        if self.approximate {
            let theta = config.theta;
            let quadtree: &QuadTree = &quadtree;
            (&*entities, &positions, &mut velocities)
                .par_join()
                .for_each(|(entity, position, velocity)| {
                    let key = entity.id();
                    let mut change = Vec2::ZERO;
                    quadtree.for_each_approximation(position.0, key, theta, |other, weight, other_key| {
                        change += charge_between(
                            position.0,
                            key,
                            other,
                            other_key,
                            weight,
                            strength,
                            distance_min_sq,
                        );
                    });
                    velocity.0 += change;
                });
            return;
        }

        let bodies: Vec<Body> = (&*entities, &positions)
            .join()
            .map(|(entity, position)| Body {
                key: entity.id(),
                position: position.0,
            })
            .collect();
        (&*entities, &positions, &mut velocities)
            .par_join()
            .for_each(|(entity, position, velocity)| {
                let key = entity.id();
                let change = bodies
                    .iter()
                    .filter(|body| body.key != key)
                    .fold(Vec2::ZERO, |change, body| {
                        change
                            + charge_between(
                                position.0,
                                key,
                                body.position,
                                Some(body.key),
                                1.0,
                                strength,
                                distance_min_sq,
                            )
                    });
                velocity.0 += change;
            });
    }
}

/// Velocity change pushing the node `key` at `point` out of the disc of `other`.
fn separation(point: Vec2, key: u32, other: Body, reach: f32, strength: f32) -> Vec2 {
    if other.key == key {
        return Vec2::ZERO;
    }

    let mut delta = point - other.position;
    let mut distance_sq = delta.length_squared();
    if distance_sq >= reach * reach {
        return Vec2::ZERO;
    }
    if distance_sq == 0.0 {
        delta = pair_jiggle(other.key, key);
        distance_sq = delta.length_squared();
    }
    let distance = distance_sq.sqrt();
    // Each node of an overlapping pair resolves half of the overlap.
    delta * ((reach - distance) / distance * strength * 0.5)
}

/// Pushes overlapping discs apart by relaxation on the predicted positions.
pub struct ComputeCollisionForce {
    pub indexed: bool,
}

impl<'a> System<'a> for ComputeCollisionForce {
    type SystemData = (
        Entities<'a>,
        ReadStorage<'a, Position>,
        WriteStorage<'a, Velocity>,
        Read<'a, SimulationConfig>,
    );

    fn run(&mut self, (entities, positions, mut velocities, config): Self::SystemData) {
        let reach = config.collision_radius * 2.0;
        let strength = config.collision_strength;

        for _ in 0..config.collision_iterations {
            let predicted: Vec<Body> = (&*entities, &positions, &velocities)
                .join()
                .map(|(entity, position, velocity)| Body {
                    key: entity.id(),
                    position: position.0 + velocity.0,
                })
                .collect();
            let tree = self
                .indexed
                .then(|| QuadTree::build(predicted.iter().copied()));

            (&*entities, &positions, &mut velocities)
                .par_join()
                .for_each(|(entity, position, velocity)| {
                    let key = entity.id();
                    let point = position.0 + velocity.0;
                    let mut push = Vec2::ZERO;
                    let mut resolve = |other: Body| {
                        push += separation(point, key, other, reach, strength);
                    };
                    match &tree {
                        Some(tree) => tree.for_each_within(point, reach, &mut resolve),
                        None => predicted.iter().copied().for_each(&mut resolve),
                    }
                    velocity.0 += push;
                });
        }
    }
}

/// Pulls every node toward its group center, or the canvas center without one.
pub struct ComputeGroupForce;

impl<'a> System<'a> for ComputeGroupForce {
    type SystemData = (
        ReadStorage<'a, Position>,
        ReadStorage<'a, GroupKey>,
        WriteStorage<'a, Velocity>,
        Read<'a, Alpha>,
        Read<'a, CanvasSize>,
        Read<'a, SimulationConfig>,
    );

    fn run(
        &mut self,
        (positions, groups, mut velocities, alpha, canvas, config): Self::SystemData,
    ) {
        let strength = config.group_strength * alpha.0;
        let center = canvas.center();
        for (position, group, velocity) in (&positions, (&groups).maybe(), &mut velocities).join() {
            let target = group
                .and_then(|group| config.group_center(&group.0))
                .unwrap_or(center);
            velocity.0 += (target - position.0) * strength;
        }
    }
}

/// Translates the whole layout so its centroid moves toward the canvas center.
pub struct ComputeCenterForce;

impl<'a> System<'a> for ComputeCenterForce {
    type SystemData = (
        WriteStorage<'a, Position>,
        Read<'a, CanvasSize>,
        Read<'a, SimulationConfig>,
    );

    fn run(&mut self, (mut positions, canvas, config): Self::SystemData) {
        let (sum, count) = (&positions)
            .join()
            .fold((Vec2::ZERO, 0usize), |(sum, count), position| {
                (sum + position.0, count + 1)
            });
        if count == 0 {
            return;
        }

        let shift = (canvas.center() - sum / count as f32) * config.center_strength;
        for position in (&mut positions).join() {
            position.0 += shift;
        }
    }
}
