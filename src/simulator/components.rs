//! The ECS components of the simulator. Nodes and links are entities of the same world.

pub mod edges;
pub mod nodes;
