//! Ressources shared by the simulator's systems.

pub mod config;
pub mod simulator_vars;
