use glam::Vec2;
use log::debug;
use rayon::prelude::*;
use specs::{Entity, ParJoin, Read, ReadStorage, System, World, WorldExt, WriteStorage};

use crate::simulator::{
    components::nodes::{PinState, Position, Velocity},
    ressources::config::SimulationConfig,
};

/// Applies friction and moves free nodes by their velocity. Pinned nodes
/// are snapped to their pin with zero velocity.
pub struct UpdateNodePosition;

impl<'a> System<'a> for UpdateNodePosition {
    type SystemData = (
        WriteStorage<'a, Position>,
        WriteStorage<'a, Velocity>,
        ReadStorage<'a, PinState>,
        Read<'a, SimulationConfig>,
    );

    fn run(&mut self, (mut positions, mut velocities, pins, config): Self::SystemData) {
        let friction = 1.0 - config.velocity_decay;
        (&mut positions, &mut velocities, &pins)
            .par_join()
            .for_each(|(position, velocity, pin)| match *pin {
                PinState::Free => {
                    velocity.0 *= friction;
                    position.0 += velocity.0;
                }
                PinState::PinnedAt(target) => {
                    position.0 = target;
                    velocity.0 = Vec2::ZERO;
                }
            });
    }
}

/// A node is grabbed or moved by the pointer: pin it there and move it right away.
pub fn sys_pin(world: &World, entity: Entity, point: Vec2) {
    debug!("[{0}] Pinned at {1}", entity.id(), point);
    if let Some(position) = world.write_storage::<Position>().get_mut(entity) {
        position.0 = point;
    }
    let _ = world
        .write_storage::<PinState>()
        .insert(entity, PinState::PinnedAt(point));
}

/// A node is released by the pointer: leave it at `point`, at rest and free.
pub fn sys_release(world: &World, entity: Entity, point: Vec2) {
    debug!("[{0}] Released at {1}", entity.id(), point);
    if let Some(position) = world.write_storage::<Position>().get_mut(entity) {
        position.0 = point;
    }
    if let Some(velocity) = world.write_storage::<Velocity>().get_mut(entity) {
        velocity.0 = Vec2::ZERO;
    }
    let _ = world.write_storage::<PinState>().insert(entity, PinState::Free);
}
